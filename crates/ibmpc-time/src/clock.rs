/// Monotonic virtual time in PIT ticks, derived from a stream of host samples.
///
/// The first sample only establishes the baseline. Each later sample advances the clock by the
/// distance from the previous sample. A sample that is *smaller* than the previous one (host
/// counter wrapped, or the host source was restarted) resets the baseline and contributes no time,
/// so virtual time never goes backwards.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VirtualClock {
    now: u64,
    last_host: Option<u64>,
}

impl VirtualClock {
    pub const fn new() -> Self {
        Self {
            now: 0,
            last_host: None,
        }
    }

    /// Returns the current virtual time, in PIT ticks.
    #[inline]
    pub const fn now(&self) -> u64 {
        self.now
    }

    /// Feeds one host sample and returns the number of ticks the clock advanced by.
    pub fn sample(&mut self, host_ticks: u64) -> u64 {
        let delta = match self.last_host {
            Some(last) if host_ticks >= last => host_ticks - last,
            Some(last) => {
                tracing::debug!(last, host_ticks, "host clock went backwards; resetting baseline");
                0
            }
            None => 0,
        };
        self.last_host = Some(host_ticks);
        self.now = self.now.saturating_add(delta);
        delta
    }

    /// Forgets the host baseline; the next sample contributes no time.
    pub fn reset_baseline(&mut self) {
        self.last_host = None;
    }
}
