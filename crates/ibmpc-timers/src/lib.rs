//! 8254 PIT channel emulation and the virtual IRQ scheduler that turns PIT-rate due-times into
//! interrupt requests.

#![forbid(unsafe_code)]

pub mod pit8254;
pub mod scheduler;

mod sink;

pub use pit8254::{AccessMode, Pit8254, PitChannel};
pub use scheduler::{IrqLineState, IrqScheduler};
pub use sink::IrqSink;

/// Kind of (re-)initialisation applied to the chipset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetKind {
    /// Cold boot: the machine has just been powered on.
    PowerOn,
    /// Soft reset of an already running machine.
    Reset,
}
