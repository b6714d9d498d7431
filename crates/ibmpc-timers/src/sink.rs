/// Destination for interrupt requests produced by the [`crate::IrqScheduler`].
///
/// The scheduler only decides *when* a line is due; the sink decides what raising a line means
/// (a PIC input for lines 0-15, a software request for the others).
pub trait IrqSink {
    fn raise_irq(&mut self, line: u8);

    /// Whether the interrupt controller output is asserted. While this holds, the scheduler does
    /// not raise further lines.
    fn request_pending(&self) -> bool;
}
