use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use crate::ticks_from_ns;

/// Source of host time samples, expressed in PIT ticks.
///
/// Implementations only need to be monotonic "most of the time": [`crate::VirtualClock`]
/// tolerates samples that jump backwards by resetting its baseline.
pub trait HostClock {
    fn now_ticks(&self) -> u64;
}

/// Host clock backed by [`std::time::Instant`].
#[derive(Debug, Clone, Copy)]
pub struct StdHostClock {
    start: Instant,
}

impl StdHostClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for StdHostClock {
    fn default() -> Self {
        Self::new()
    }
}

impl HostClock for StdHostClock {
    fn now_ticks(&self) -> u64 {
        let ns = u64::try_from(self.start.elapsed().as_nanos()).unwrap_or(u64::MAX);
        ticks_from_ns(ns)
    }
}

/// Manually driven host clock for deterministic tests.
///
/// Clones share the same underlying time, so a test can keep one handle while the chipset owns
/// another.
#[derive(Debug, Clone, Default)]
pub struct FakeHostClock {
    now: Rc<Cell<u64>>,
}

impl FakeHostClock {
    pub fn new(start_ticks: u64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ticks)),
        }
    }

    pub fn get(&self) -> u64 {
        self.now.get()
    }

    pub fn set(&self, ticks: u64) {
        self.now.set(ticks);
    }

    pub fn advance(&self, ticks: u64) {
        self.now.set(self.now.get().saturating_add(ticks));
    }
}

impl HostClock for FakeHostClock {
    fn now_ticks(&self) -> u64 {
        self.now.get()
    }
}
