//! Intel 8259A Programmable Interrupt Controller (PIC) pair.
//!
//! Models the classic PC/AT wiring: a master controller at ports 0x20/0x21 and a slave at
//! 0xA0/0xA1 whose output drives master input 2. Each controller implements the ICW1-ICW4
//! initialisation sequence, OCW1-OCW3 runtime commands (EOI variants, priority rotation, poll,
//! special mask) and the PIIX edge/level control register (ELCR) at 0x4D0/0x4D1.
//!
//! Lines are edge triggered unless the matching ELCR bit selects level mode. IRQ numbers passed
//! to [`DualPic8259::raise_irq`] / [`DualPic8259::lower_irq`] must be below 16; the caller owns
//! that contract.

pub const MASTER_CMD: u16 = 0x20;
pub const MASTER_DATA: u16 = 0x21;
pub const SLAVE_CMD: u16 = 0xA0;
pub const SLAVE_DATA: u16 = 0xA1;
pub const ELCR_MASTER: u16 = 0x4D0;
pub const ELCR_SLAVE: u16 = 0x4D1;

/// Master input line driven by the slave's INT output.
pub const CASCADE_IRQ: u8 = 2;

/// Lines whose trigger mode may be switched through the ELCR (IRQ0-2 are always edge).
const MASTER_ELCR_MASK: u8 = 0xF8;
/// IRQ8 (RTC) and IRQ13 (FPU) are always edge triggered.
const SLAVE_ELCR_MASK: u8 = 0xDE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InitState {
    Ready,
    Icw2,
    Icw3,
    Icw4,
}

#[derive(Debug, Clone)]
struct Pic8259Chip {
    is_master: bool,
    last_irr: u8,
    irr: u8,
    imr: u8,
    isr: u8,
    priority_add: u8,
    irq_base: u8,
    read_isr: bool,
    poll: bool,
    special_mask: bool,
    init_state: InitState,
    auto_eoi: bool,
    rotate_on_auto_eoi: bool,
    special_fully_nested: bool,
    init4: bool,
    single_mode: bool,
    elcr: u8,
    elcr_mask: u8,
}

impl Pic8259Chip {
    fn new(is_master: bool, elcr_mask: u8) -> Self {
        let mut chip = Self {
            is_master,
            last_irr: 0,
            irr: 0,
            imr: 0,
            isr: 0,
            priority_add: 0,
            irq_base: 0,
            read_isr: false,
            poll: false,
            special_mask: false,
            init_state: InitState::Ready,
            auto_eoi: false,
            rotate_on_auto_eoi: false,
            special_fully_nested: false,
            init4: false,
            single_mode: false,
            elcr: 0,
            elcr_mask,
        };
        chip.reset();
        chip
    }

    /// Common reset: everything except the ELCR. Level-triggered requests survive because the
    /// input is still asserted.
    fn reset(&mut self) {
        self.last_irr = 0;
        self.irr &= self.elcr;
        self.imr = 0;
        self.isr = 0;
        self.priority_add = 0;
        self.irq_base = 0;
        self.read_isr = false;
        self.poll = false;
        self.special_mask = false;
        self.init_state = InitState::Ready;
        self.auto_eoi = false;
        self.rotate_on_auto_eoi = false;
        self.special_fully_nested = false;
        self.init4 = false;
        self.single_mode = false;
    }

    /// Returns the priority (0 = highest) of the highest-priority bit set in `mask`.
    fn priority(&self, mask: u8) -> Option<u8> {
        if mask == 0 {
            return None;
        }
        let mut priority = 0u8;
        while mask & (1 << ((priority + self.priority_add) & 7)) == 0 {
            priority += 1;
        }
        Some(priority)
    }

    /// Returns the line this chip would currently present on its INT output.
    fn pending_irq(&self) -> Option<u8> {
        let priority = self.priority(self.irr & !self.imr)?;

        // Compute the current in-service priority. In special mask mode, masked lines do not
        // block lower-priority requests. In special fully nested mode the cascade line does not
        // block further requests from the slave.
        let mut mask = self.isr;
        if self.special_mask {
            mask &= !self.imr;
        }
        if self.special_fully_nested && self.is_master {
            mask &= !(1 << CASCADE_IRQ);
        }
        let current = self.priority(mask).unwrap_or(8);

        (priority < current).then_some((priority + self.priority_add) & 7)
    }

    fn set_irq(&mut self, irq: u8, level: bool) {
        let mask = 1u8 << irq;
        if self.elcr & mask != 0 {
            if level {
                self.irr |= mask;
                self.last_irr |= mask;
            } else {
                self.irr &= !mask;
                self.last_irr &= !mask;
            }
        } else if level {
            if self.last_irr & mask == 0 {
                self.irr |= mask;
            }
            self.last_irr |= mask;
        } else {
            self.last_irr &= !mask;
        }
    }

    fn intack(&mut self, irq: u8) {
        let mask = 1u8 << irq;
        if self.auto_eoi {
            if self.rotate_on_auto_eoi {
                self.priority_add = (irq + 1) & 7;
            }
        } else {
            self.isr |= mask;
        }
        // Level-triggered requests stay latched until the device deasserts the line.
        if self.elcr & mask == 0 {
            self.irr &= !mask;
        }
    }

    fn poll_read(&mut self) -> u8 {
        match self.pending_irq() {
            Some(irq) => {
                self.intack(irq);
                irq | 0x80
            }
            None => 0,
        }
    }

    fn write_command(&mut self, value: u8) {
        if value & 0x10 != 0 {
            // ICW1
            self.reset();
            self.init_state = InitState::Icw2;
            self.init4 = value & 0x01 != 0;
            self.single_mode = value & 0x02 != 0;
            if value & 0x08 != 0 {
                tracing::debug!(value, "ICW1 level-triggered mode ignored; use the ELCR");
            }
        } else if value & 0x08 != 0 {
            // OCW3
            if value & 0x04 != 0 {
                self.poll = true;
            }
            if value & 0x02 != 0 {
                self.read_isr = value & 0x01 != 0;
            }
            if value & 0x40 != 0 {
                self.special_mask = value & 0x20 != 0;
            }
        } else {
            // OCW2
            let cmd = value >> 5;
            match cmd {
                // Clear / set rotate in automatic EOI mode.
                0 | 4 => self.rotate_on_auto_eoi = cmd == 4,
                // Non-specific EOI, optionally rotating.
                1 | 5 => {
                    if let Some(priority) = self.priority(self.isr) {
                        let irq = (priority + self.priority_add) & 7;
                        self.isr &= !(1 << irq);
                        if cmd == 5 {
                            self.priority_add = (irq + 1) & 7;
                        }
                    }
                }
                // Specific EOI.
                3 => {
                    let irq = value & 7;
                    self.isr &= !(1 << irq);
                }
                // Set priority: the given line becomes lowest priority.
                6 => self.priority_add = (value + 1) & 7,
                // Rotate on specific EOI.
                7 => {
                    let irq = value & 7;
                    self.isr &= !(1 << irq);
                    self.priority_add = (irq + 1) & 7;
                }
                _ => {}
            }
        }
    }

    fn write_data(&mut self, value: u8) {
        match self.init_state {
            InitState::Ready => self.imr = value,
            InitState::Icw2 => {
                self.irq_base = value & 0xF8;
                self.init_state = match (self.single_mode, self.init4) {
                    (true, true) => InitState::Icw4,
                    (true, false) => InitState::Ready,
                    (false, _) => InitState::Icw3,
                };
            }
            InitState::Icw3 => {
                self.init_state = if self.init4 {
                    InitState::Icw4
                } else {
                    InitState::Ready
                };
            }
            InitState::Icw4 => {
                self.special_fully_nested = (value >> 4) & 1 != 0;
                self.auto_eoi = (value >> 1) & 1 != 0;
                self.init_state = InitState::Ready;
            }
        }
    }

    fn read(&mut self, command_port: bool) -> u8 {
        if self.poll {
            self.poll = false;
            return self.poll_read();
        }
        match (command_port, self.read_isr) {
            (true, true) => self.isr,
            (true, false) => self.irr,
            (false, _) => self.imr,
        }
    }
}

/// Result of an interrupt acknowledge (INTA) cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Acknowledged {
    /// Vector number presented to the CPU.
    pub vector: u8,
    /// IRQ line that was placed in service, or `None` for a spurious slave interrupt.
    pub irq: Option<u8>,
}

/// Cascaded master/slave 8259A pair.
#[derive(Debug, Clone)]
pub struct DualPic8259 {
    master: Pic8259Chip,
    slave: Pic8259Chip,
}

impl DualPic8259 {
    pub fn new() -> Self {
        Self {
            master: Pic8259Chip::new(true, MASTER_ELCR_MASK),
            slave: Pic8259Chip::new(false, SLAVE_ELCR_MASK),
        }
    }

    /// Resets both controllers (ELCR contents are preserved).
    pub fn reset(&mut self) {
        self.master.reset();
        self.slave.reset();
        self.sync_cascade();
    }

    /// Propagates the slave's INT output level onto master input 2.
    fn sync_cascade(&mut self) {
        let level = self.slave.pending_irq().is_some();
        self.master.set_irq(CASCADE_IRQ, level);
    }

    pub fn set_irq_level(&mut self, irq: u8, level: bool) {
        debug_assert!(irq < 16, "IRQ {irq} out of range");
        match irq {
            0..=7 => self.master.set_irq(irq, level),
            8..=15 => self.slave.set_irq(irq - 8, level),
            _ => return,
        }
        self.sync_cascade();
    }

    pub fn raise_irq(&mut self, irq: u8) {
        self.set_irq_level(irq, true);
    }

    pub fn lower_irq(&mut self, irq: u8) {
        self.set_irq_level(irq, false);
    }

    /// Whether the master is asserting INT (an unmasked request can be delivered).
    pub fn is_pending(&self) -> bool {
        self.master.pending_irq().is_some()
    }

    /// Returns the vector the next INTA cycle would deliver, without changing any state.
    pub fn get_pending_vector(&self) -> Option<u8> {
        let irq = self.master.pending_irq()?;
        if irq == CASCADE_IRQ {
            let slave_irq = self.slave.pending_irq().unwrap_or(7);
            return Some(self.slave.irq_base.wrapping_add(slave_irq));
        }
        Some(self.master.irq_base.wrapping_add(irq))
    }

    /// Runs a full INTA cycle: picks the highest-priority eligible request and marks it in
    /// service. Returns `None` if nothing is eligible.
    pub fn acknowledge_next(&mut self) -> Option<Acknowledged> {
        let irq = self.master.pending_irq()?;
        let ack = if irq == CASCADE_IRQ {
            match self.slave.pending_irq() {
                Some(slave_irq) => {
                    self.slave.intack(slave_irq);
                    self.sync_cascade();
                    Acknowledged {
                        vector: self.slave.irq_base.wrapping_add(slave_irq),
                        irq: Some(8 + slave_irq),
                    }
                }
                // The slave request was withdrawn between INT and INTA.
                None => Acknowledged {
                    vector: self.slave.irq_base.wrapping_add(7),
                    irq: None,
                },
            }
        } else {
            Acknowledged {
                vector: self.master.irq_base.wrapping_add(irq),
                irq: Some(irq),
            }
        };
        self.master.intack(irq);
        self.sync_cascade();
        Some(ack)
    }

    /// Acknowledges `vector` if it is still the one being presented.
    ///
    /// Returns the IRQ placed in service. A request withdrawn before the acknowledge (possible
    /// for level-triggered lines) results in `None` and leaves the ISR untouched.
    pub fn acknowledge(&mut self, vector: u8) -> Option<u8> {
        if self.get_pending_vector() != Some(vector) {
            return None;
        }
        self.acknowledge_next().and_then(|ack| ack.irq)
    }

    /// Combined in-service register (slave in the high byte).
    pub fn isr_mask(&self) -> u16 {
        u16::from(self.master.isr) | (u16::from(self.slave.isr) << 8)
    }

    pub fn irq_in_service(&self, irq: u8) -> bool {
        match irq {
            0..=7 => self.master.isr & (1 << irq) != 0,
            8..=15 => self.slave.isr & (1 << (irq - 8)) != 0,
            _ => false,
        }
    }

    /// Programmed vector bases of the (master, slave) controllers.
    pub fn irq_bases(&self) -> (u8, u8) {
        (self.master.irq_base, self.slave.irq_base)
    }

    /// Combined interrupt mask register (slave in the high byte).
    pub fn imr_mask(&self) -> u16 {
        u16::from(self.master.imr) | (u16::from(self.slave.imr) << 8)
    }

    pub fn elcr(&self) -> (u8, u8) {
        (self.master.elcr, self.slave.elcr)
    }

    pub fn port_read_u8(&mut self, port: u16) -> u8 {
        self.port_read_polled(port).0
    }

    /// Port read that also reports the IRQ line an OCW3 poll placed in service.
    ///
    /// A master poll that lands on the cascade input reports no line; the guest polls the slave
    /// next to learn which slave line it was.
    pub fn port_read_polled(&mut self, port: u16) -> (u8, Option<u8>) {
        let (chip, line_base) = match port {
            MASTER_CMD | MASTER_DATA => (&mut self.master, 0),
            SLAVE_CMD | SLAVE_DATA => (&mut self.slave, 8),
            ELCR_MASTER => return (self.master.elcr, None),
            ELCR_SLAVE => return (self.slave.elcr, None),
            _ => return (0xFF, None),
        };
        let polling = chip.poll;
        let value = chip.read(port == MASTER_CMD || port == SLAVE_CMD);
        // A poll read acknowledges an interrupt.
        self.sync_cascade();

        let polled = (polling && value & 0x80 != 0)
            .then_some(line_base + (value & 0x07))
            .filter(|&irq| irq != CASCADE_IRQ);
        (value, polled)
    }

    pub fn port_write_u8(&mut self, port: u16, value: u8) {
        match port {
            MASTER_CMD => self.master.write_command(value),
            MASTER_DATA => self.master.write_data(value),
            SLAVE_CMD => self.slave.write_command(value),
            SLAVE_DATA => self.slave.write_data(value),
            ELCR_MASTER => self.master.elcr = value & self.master.elcr_mask,
            ELCR_SLAVE => self.slave.elcr = value & self.slave.elcr_mask,
            _ => return,
        }
        self.sync_cascade();
        tracing::trace!(
            port,
            value,
            isr = self.isr_mask(),
            imr = self.imr_mask(),
            "pic write"
        );
    }
}

impl Default for DualPic8259 {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn init_legacy_pc(pic: &mut DualPic8259) {
        // Master: vectors 0x08.., slave on IRQ2, 8086 mode.
        pic.port_write_u8(MASTER_CMD, 0x11);
        pic.port_write_u8(MASTER_DATA, 0x08);
        pic.port_write_u8(MASTER_DATA, 0x04);
        pic.port_write_u8(MASTER_DATA, 0x01);

        // Slave: vectors 0x70.., cascade identity 2, 8086 mode.
        pic.port_write_u8(SLAVE_CMD, 0x11);
        pic.port_write_u8(SLAVE_DATA, 0x70);
        pic.port_write_u8(SLAVE_DATA, 0x02);
        pic.port_write_u8(SLAVE_DATA, 0x01);
    }

    fn take(pic: &mut DualPic8259) -> Option<u8> {
        pic.acknowledge_next().and_then(|ack| ack.irq)
    }

    #[test]
    fn init_sets_vector_bases() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);
        assert_eq!(pic.irq_bases(), (0x08, 0x70));

        pic.raise_irq(0);
        assert_eq!(pic.get_pending_vector(), Some(0x08));
        assert_eq!(pic.acknowledge(0x08), Some(0));
        pic.port_write_u8(MASTER_CMD, 0x20);

        pic.raise_irq(8);
        assert_eq!(pic.get_pending_vector(), Some(0x70));
    }

    #[test]
    fn lower_line_number_wins_by_default() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(5);
        pic.raise_irq(2);
        let ack = pic.acknowledge_next().unwrap();
        // IRQ2 is the cascade input; with nothing on the slave it is reported as spurious IRQ15,
        // but it still outranks IRQ5.
        assert_eq!(ack.vector, 0x77);
        assert_eq!(ack.irq, None);
        assert!(pic.irq_in_service(2));
    }

    #[test]
    fn lower_master_line_is_delivered_first() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(5);
        pic.raise_irq(3);
        assert_eq!(
            pic.acknowledge_next(),
            Some(Acknowledged {
                vector: 0x0B,
                irq: Some(3)
            })
        );
        pic.port_write_u8(MASTER_CMD, 0x20);
        assert_eq!(take(&mut pic), Some(5));
    }

    #[test]
    fn fixed_priority_and_eoi() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(3);
        pic.raise_irq(1);

        assert_eq!(take(&mut pic), Some(1));

        // IRQ3 is lower priority than IRQ1; it is blocked until EOI.
        assert_eq!(pic.get_pending_vector(), None);
        assert!(!pic.is_pending());
        pic.port_write_u8(MASTER_CMD, 0x20);

        assert_eq!(take(&mut pic), Some(3));
    }

    #[test]
    fn higher_priority_request_nests_over_in_service_line() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(4);
        assert_eq!(take(&mut pic), Some(4));
        pic.raise_irq(1);
        assert_eq!(take(&mut pic), Some(1));
        assert_eq!(pic.isr_mask(), 0b1_0010);
    }

    #[test]
    fn masked_irqs_are_not_delivered() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.port_write_u8(MASTER_DATA, 0x02);
        pic.raise_irq(1);
        assert_eq!(pic.get_pending_vector(), None);

        // The latched request becomes deliverable once unmasked.
        pic.port_write_u8(MASTER_DATA, 0x00);
        assert_eq!(pic.get_pending_vector(), Some(0x09));
    }

    #[test]
    fn edge_triggered_line_needs_a_new_edge() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(0);
        assert_eq!(take(&mut pic), Some(0));
        pic.port_write_u8(MASTER_CMD, 0x20);

        // Still asserted, no new edge.
        pic.raise_irq(0);
        assert!(!pic.is_pending());

        pic.lower_irq(0);
        pic.raise_irq(0);
        assert_eq!(take(&mut pic), Some(0));
    }

    #[test]
    fn slave_irqs_route_via_master_irq2() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.port_write_u8(MASTER_DATA, 0x04);
        pic.raise_irq(8);
        assert_eq!(pic.get_pending_vector(), None);

        pic.port_write_u8(MASTER_DATA, 0x00);
        assert_eq!(pic.get_pending_vector(), Some(0x70));
    }

    #[test]
    fn eoi_requires_slave_then_master_for_cascaded_interrupts() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(8);
        pic.raise_irq(9);

        assert_eq!(take(&mut pic), Some(8));

        // EOI only to the slave: the master still has the cascade line in service.
        pic.port_write_u8(SLAVE_CMD, 0x20);
        assert_eq!(pic.get_pending_vector(), None);

        pic.port_write_u8(MASTER_CMD, 0x20);
        assert_eq!(pic.get_pending_vector(), Some(0x71));
    }

    #[test]
    fn level_triggered_request_withdrawn_before_ack_is_spurious() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);
        pic.port_write_u8(ELCR_MASTER, 0x80);

        pic.raise_irq(7);
        assert_eq!(pic.get_pending_vector(), Some(0x0F));

        pic.lower_irq(7);
        assert_eq!(pic.acknowledge(0x0F), None);

        pic.port_write_u8(MASTER_CMD, 0x0B);
        assert_eq!(pic.port_read_u8(MASTER_CMD), 0x00);
    }

    #[test]
    fn spurious_irq15_sets_only_master_cascade_in_service() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);
        pic.port_write_u8(ELCR_SLAVE, 0x80);

        pic.raise_irq(15);
        assert_eq!(pic.get_pending_vector(), Some(0x77));

        pic.lower_irq(15);
        assert_eq!(pic.acknowledge(0x77), None);

        pic.port_write_u8(SLAVE_CMD, 0x0B);
        assert_eq!(pic.port_read_u8(SLAVE_CMD), 0x00);
        pic.port_write_u8(MASTER_CMD, 0x0B);
        assert_eq!(pic.port_read_u8(MASTER_CMD), 1u8 << 2);

        pic.port_write_u8(MASTER_CMD, 0x20);
        assert_eq!(pic.port_read_u8(MASTER_CMD), 0x00);
    }

    #[test]
    fn level_triggered_line_stays_requested_after_ack() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);
        pic.port_write_u8(ELCR_MASTER, 0x08);

        pic.raise_irq(3);
        assert_eq!(take(&mut pic), Some(3));
        pic.port_write_u8(MASTER_CMD, 0x20);
        // Line still asserted: delivered again after EOI.
        assert_eq!(take(&mut pic), Some(3));
        pic.port_write_u8(MASTER_CMD, 0x20);

        pic.lower_irq(3);
        assert!(!pic.is_pending());
    }

    #[test]
    fn elcr_writes_are_masked() {
        let mut pic = DualPic8259::new();
        pic.port_write_u8(ELCR_MASTER, 0xFF);
        pic.port_write_u8(ELCR_SLAVE, 0xFF);
        assert_eq!(pic.port_read_u8(ELCR_MASTER), 0xF8);
        assert_eq!(pic.port_read_u8(ELCR_SLAVE), 0xDE);

        // ICW1 resets the controller but keeps the ELCR.
        init_legacy_pc(&mut pic);
        assert_eq!(pic.elcr(), (0xF8, 0xDE));
    }

    #[test]
    fn rotate_on_eoi_changes_priority_order() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(0);
        assert_eq!(take(&mut pic), Some(0));
        pic.lower_irq(0);

        // Rotate on non-specific EOI: IRQ0 becomes lowest priority.
        pic.port_write_u8(MASTER_CMD, 0xA0);

        pic.raise_irq(0);
        pic.raise_irq(1);
        assert_eq!(pic.get_pending_vector(), Some(0x09));
    }

    #[test]
    fn set_priority_command_rotates_without_eoi() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        // OCW2 set priority: IRQ5 lowest, so IRQ6 highest.
        pic.port_write_u8(MASTER_CMD, 0xC5);
        pic.raise_irq(1);
        pic.raise_irq(6);
        assert_eq!(take(&mut pic), Some(6));
    }

    #[test]
    fn specific_eoi_clears_only_named_line() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(4);
        take(&mut pic);
        pic.raise_irq(1);
        take(&mut pic);
        assert_eq!(pic.isr_mask(), 0b1_0010);

        pic.port_write_u8(MASTER_CMD, 0x64);
        assert_eq!(pic.isr_mask(), 0b0_0010);
    }

    #[test]
    fn auto_eoi_does_not_set_isr() {
        let mut pic = DualPic8259::new();
        pic.port_write_u8(MASTER_CMD, 0x11);
        pic.port_write_u8(MASTER_DATA, 0x08);
        pic.port_write_u8(MASTER_DATA, 0x04);
        pic.port_write_u8(MASTER_DATA, 0x03);

        pic.raise_irq(3);
        assert_eq!(take(&mut pic), Some(3));
        assert_eq!(pic.isr_mask(), 0);
    }

    #[test]
    fn poll_command_acknowledges_highest_request() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(6);
        pic.port_write_u8(MASTER_CMD, 0x0C);
        assert_eq!(pic.port_read_u8(MASTER_CMD), 0x86);
        assert!(pic.irq_in_service(6));

        // Poll is one-shot; nothing pending now.
        pic.port_write_u8(MASTER_CMD, 0x0C);
        assert_eq!(pic.port_read_u8(MASTER_CMD), 0x00);
    }

    #[test]
    fn polled_reads_report_the_line_put_in_service() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(10);
        pic.port_write_u8(MASTER_CMD, 0x0C);
        // The master only sees its cascade input.
        assert_eq!(pic.port_read_polled(MASTER_CMD), (0x82, None));
        pic.port_write_u8(SLAVE_CMD, 0x0C);
        assert_eq!(pic.port_read_polled(SLAVE_CMD), (0x82, Some(10)));
        assert!(pic.irq_in_service(10));

        // Plain register reads never report a line.
        pic.port_write_u8(MASTER_CMD, 0x0B);
        assert_eq!(pic.port_read_polled(MASTER_CMD), (0x04, None));
    }

    #[test]
    fn special_mask_mode_lets_lower_priority_through() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.raise_irq(1);
        assert_eq!(take(&mut pic), Some(1));

        // Mask IRQ1 and enter special mask mode.
        pic.port_write_u8(MASTER_DATA, 0x02);
        pic.port_write_u8(MASTER_CMD, 0x68);

        pic.raise_irq(5);
        assert_eq!(take(&mut pic), Some(5));
    }

    #[test]
    fn imr_and_irr_are_readable() {
        let mut pic = DualPic8259::new();
        init_legacy_pc(&mut pic);

        pic.port_write_u8(SLAVE_DATA, 0xAA);
        assert_eq!(pic.port_read_u8(SLAVE_DATA), 0xAA);

        pic.raise_irq(4);
        pic.port_write_u8(MASTER_CMD, 0x0A);
        assert_eq!(pic.port_read_u8(MASTER_CMD), 0x10);
    }
}
