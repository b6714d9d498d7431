use std::collections::HashMap;

/// Byte-wide I/O port handler.
///
/// The timing chipset only decodes 8-bit accesses; wider accesses are split by the caller.
pub trait PortIoDevice {
    fn read8(&mut self, port: u16) -> u8;
    fn write8(&mut self, port: u16, value: u8);

    /// Reset the device back to its power-on state.
    fn reset(&mut self) {}
}

/// Port-number dispatch table.
pub struct IoPortBus {
    devices: HashMap<u16, Box<dyn PortIoDevice>>,
}

impl IoPortBus {
    pub fn new() -> Self {
        Self {
            devices: HashMap::new(),
        }
    }

    pub fn register(&mut self, port: u16, device: Box<dyn PortIoDevice>) {
        self.devices.insert(port, device);
    }

    /// Registers one handler per port in `start..start + len`, built by `make`.
    ///
    /// Useful for per-port wrappers around a shared `Rc<RefCell<...>>` device.
    pub fn register_shared_range<F>(&mut self, start: u16, len: u16, mut make: F)
    where
        F: FnMut(u16) -> Box<dyn PortIoDevice>,
    {
        for offset in 0..len {
            let port = start.wrapping_add(offset);
            self.register(port, make(port));
        }
    }

    /// Reads one byte. Unmapped ports float high.
    pub fn read_u8(&mut self, port: u16) -> u8 {
        match self.devices.get_mut(&port) {
            Some(dev) => dev.read8(port),
            None => 0xFF,
        }
    }

    /// Writes one byte. Writes to unmapped ports are dropped.
    pub fn write_u8(&mut self, port: u16, value: u8) {
        if let Some(dev) = self.devices.get_mut(&port) {
            dev.write8(port, value);
        }
    }

    pub fn reset(&mut self) {
        for dev in self.devices.values_mut() {
            dev.reset();
        }
    }
}

impl Default for IoPortBus {
    fn default() -> Self {
        Self::new()
    }
}
