use crate::GuestCpu;

/// Host-tick bookkeeping: accumulated time since channel 0 was last programmed, and the CLI
/// watchdog.
#[derive(Debug, Clone, Default)]
pub struct TickDriver {
    ticks_accum: u64,
    cli_ticks: u32,
    irq0_interval_100us: u32,
}

impl TickDriver {
    pub fn new(irq0_interval_100us: u32) -> Self {
        Self {
            ticks_accum: 0,
            cli_ticks: 0,
            irq0_interval_100us,
        }
    }

    /// PIT ticks accumulated since channel 0 was last reprogrammed.
    pub fn ticks_accum(&self) -> u64 {
        self.ticks_accum
    }

    /// Nominal IRQ0 interval in 100us units.
    pub fn irq0_interval_100us(&self) -> u32 {
        self.irq0_interval_100us
    }

    pub fn record_elapsed(&mut self, ticks: u64) {
        self.ticks_accum = self.ticks_accum.saturating_add(ticks);
    }

    /// Channel 0 was given a new count.
    pub fn restart(&mut self, irq0_interval_100us: u32) {
        self.ticks_accum = 0;
        self.irq0_interval_100us = irq0_interval_100us;
    }

    /// Arms the watchdog after the guest executed CLI. A watchdog that is already counting keeps
    /// its count.
    pub fn note_cli(&mut self) {
        if self.cli_ticks == 0 {
            self.cli_ticks = 1;
        }
    }

    pub fn cli_ticks(&self) -> u32 {
        self.cli_ticks
    }

    /// Runs one watchdog step. Returns `true` if IF had to be forced back on.
    pub fn check_cli(&mut self, cpu: &mut dyn GuestCpu, cli_timeout: u32) -> bool {
        if cli_timeout == 0 || self.cli_ticks == 0 {
            return false;
        }
        if cpu.interrupt_flag() {
            self.cli_ticks = 0;
            return false;
        }

        let waited = self.cli_ticks;
        self.cli_ticks = self.cli_ticks.saturating_add(1);
        if waited < cli_timeout {
            return false;
        }
        tracing::warn!(
            ticks = waited,
            "interrupts were disabled for too long, re-enabling"
        );
        cpu.set_interrupt_flag(true);
        true
    }
}
