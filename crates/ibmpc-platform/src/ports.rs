use ibmpc_interrupts::pic8259::{ELCR_MASTER, MASTER_CMD, SLAVE_CMD};
use ibmpc_timers::pit8254::{PIT_CH0, PIT_CMD};
use ibmpc_timers::ResetKind;

use crate::io::{IoPortBus, PortIoDevice};
use crate::speaker::SYSTEM_CONTROL_B;
use crate::SharedChipset;

/// Bus handle onto the shared chipset; every timing port forwards to [`crate::Chipset`].
struct ChipsetPort {
    chipset: SharedChipset,
    /// Set on exactly one handle so a bus reset reaches the chipset once.
    owns_reset: bool,
}

impl PortIoDevice for ChipsetPort {
    fn read8(&mut self, port: u16) -> u8 {
        self.chipset.borrow_mut().port_read(port)
    }

    fn write8(&mut self, port: u16, value: u8) {
        self.chipset.borrow_mut().port_write(port, value);
    }

    fn reset(&mut self) {
        if self.owns_reset {
            self.chipset.borrow_mut().reset(ResetKind::Reset);
        }
    }
}

/// Maps the PIT (0x40-0x43), PIC (0x20/0x21, 0xA0/0xA1), ELCR (0x4D0/0x4D1) and system control
/// port B (0x61) onto `bus`. Resetting the bus soft-resets the chipset.
pub fn register_chipset(bus: &mut IoPortBus, chipset: &SharedChipset) {
    let make = |port: u16| -> Box<dyn PortIoDevice> {
        Box::new(ChipsetPort {
            chipset: chipset.clone(),
            owns_reset: port == PIT_CMD,
        })
    };
    bus.register_shared_range(PIT_CH0, 4, make);
    bus.register_shared_range(MASTER_CMD, 2, make);
    bus.register_shared_range(SLAVE_CMD, 2, make);
    bus.register(SYSTEM_CONTROL_B, make(SYSTEM_CONTROL_B));
    bus.register_shared_range(ELCR_MASTER, 2, make);
}
