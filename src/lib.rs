//! Legacy PC timing hardware: 8254 PIT, cascaded 8259A PICs, the virtual IRQ scheduler that
//! maps host time onto guest interrupts, and the port 0x61 speaker register.
//!
//! This crate re-exports the workspace members; most users only need [`platform::Chipset`].

#![forbid(unsafe_code)]

pub use ibmpc_interrupts as interrupts;
pub use ibmpc_platform as platform;
pub use ibmpc_time as time;
pub use ibmpc_timers as timers;

pub use ibmpc_platform::{Chipset, ChipsetConfig, ChipsetError, GuestCpu, ResetKind};
