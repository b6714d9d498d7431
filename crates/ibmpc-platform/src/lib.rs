//! PC platform timing glue: the [`Chipset`] aggregate (PIT, PIC pair, virtual IRQ scheduler,
//! system control port B), the I/O port bus it is mapped on, and the host-side plumbing that
//! drives it (tick driver, host timer, configuration).

#![forbid(unsafe_code)]

pub mod chipset;
pub mod config;
pub mod cpu;
pub mod driver;
pub mod error;
pub mod host_timer;
pub mod io;
pub mod ports;
pub mod speaker;

pub use chipset::{AckContext, AckHandler, Chipset, SharedChipset};
pub use config::{ChipsetConfig, SpeakerMode};
pub use cpu::GuestCpu;
pub use driver::TickDriver;
pub use error::{ChipsetError, Result};
pub use host_timer::HostTicker;
pub use io::{IoPortBus, PortIoDevice};
pub use ports::register_chipset;
pub use speaker::{NullSpeaker, Speaker, SpeakerPort, SystemControlB};

pub use ibmpc_timers::ResetKind;
