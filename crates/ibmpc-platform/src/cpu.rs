/// The slice of the guest CPU that the timing chipset needs to see.
pub trait GuestCpu {
    /// Whether the guest currently has interrupts enabled (EFLAGS.IF).
    fn interrupt_flag(&self) -> bool;

    fn set_interrupt_flag(&mut self, enabled: bool);

    /// Whether the guest has a virtual interrupt waiting to be injected (VIP).
    fn virtual_interrupt_pending(&self) -> bool {
        false
    }
}
