//! Host/guest time modelling for the legacy PC timing chipset.
//!
//! Every timing device in this workspace measures time in **PIT ticks**, the 1.193182MHz input
//! clock of the 8254. Host time is sampled through a [`HostClock`] (a monotonic clock on native,
//! a manually driven clock in tests) and folded into a [`VirtualClock`] that never moves
//! backwards, even when the host sample source wraps or restarts.

#![forbid(unsafe_code)]

mod clock;
mod host;

pub use clock::VirtualClock;
pub use host::{FakeHostClock, HostClock, StdHostClock};

/// Input clock of the 8254 PIT, in Hz.
pub const PIT_TICK_RATE: u64 = 1_193_182;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// Converts a nanosecond duration to whole PIT ticks (rounding down).
pub fn ticks_from_ns(ns: u64) -> u64 {
    ((ns as u128) * (PIT_TICK_RATE as u128) / NANOS_PER_SEC) as u64
}

/// Converts PIT ticks to nanoseconds, rounding up so a deadline is never reported early.
pub fn ns_from_ticks_ceil(ticks: u64) -> u64 {
    let numer = (ticks as u128) * NANOS_PER_SEC;
    let denom = PIT_TICK_RATE as u128;
    numer.div_ceil(denom).min(u64::MAX as u128) as u64
}
