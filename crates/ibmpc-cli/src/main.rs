#![forbid(unsafe_code)]

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use ibmpc_platform::{Chipset, ChipsetConfig, GuestCpu, HostTicker, SpeakerMode};
use ibmpc_time::{StdHostClock, PIT_TICK_RATE};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum SpeakerArg {
    Off,
    Emulated,
}

impl From<SpeakerArg> for SpeakerMode {
    fn from(arg: SpeakerArg) -> Self {
        match arg {
            SpeakerArg::Off => SpeakerMode::Off,
            SpeakerArg::Emulated => SpeakerMode::Emulated,
        }
    }
}

#[derive(Debug, Parser)]
#[command(about = "Drive the PC timing chipset from the host clock and report the IRQ0 cadence")]
struct Args {
    /// JSON chipset configuration; flags below override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host timer period in milliseconds.
    #[arg(long, default_value_t = 10)]
    tick_ms: u64,

    /// How long to run, in milliseconds of host time.
    #[arg(long, default_value_t = 1_000)]
    duration_ms: u64,

    /// Program PIT channel 0 (mode 2) with this divisor instead of the BIOS default.
    #[arg(long)]
    divisor: Option<u16>,

    #[arg(long)]
    cli_timeout: Option<u32>,

    #[arg(long, value_enum)]
    speaker: Option<SpeakerArg>,
}

impl Args {
    fn chipset_config(&self) -> Result<ChipsetConfig> {
        let mut config = match &self.config {
            Some(path) => ChipsetConfig::load(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => ChipsetConfig::default(),
        };
        if let Some(cli_timeout) = self.cli_timeout {
            config.cli_timeout = cli_timeout;
        }
        if let Some(speaker) = self.speaker {
            config.speaker = speaker.into();
        }
        config.validate()?;
        Ok(config)
    }
}

/// Stand-in guest that always runs with interrupts enabled.
struct IdleGuest {
    interrupt_flag: bool,
}

impl GuestCpu for IdleGuest {
    fn interrupt_flag(&self) -> bool {
        self.interrupt_flag
    }

    fn set_interrupt_flag(&mut self, enabled: bool) {
        self.interrupt_flag = enabled;
    }
}

/// Programs the PIC pair the way the BIOS does: master vectors at 0x08, slave at 0x70.
fn init_pics(chipset: &mut Chipset) {
    for (port, value) in [
        (0x20, 0x11),
        (0x21, 0x08),
        (0x21, 0x04),
        (0x21, 0x01),
        (0xA0, 0x11),
        (0xA1, 0x70),
        (0xA1, 0x02),
        (0xA1, 0x01),
        (0x21, 0x00),
        (0xA1, 0x00),
    ] {
        chipset.port_write(port, value);
    }
}

fn program_divisor(chipset: &mut Chipset, divisor: u16) {
    let [lo, hi] = divisor.to_le_bytes();
    chipset.port_write(0x43, 0x34);
    chipset.port_write(0x40, lo);
    chipset.port_write(0x40, hi);
}

/// Takes every deliverable interrupt and EOIs it. Returns the number of IRQ0s taken.
fn service_interrupts(chipset: &mut Chipset) -> u64 {
    let mut irq0 = 0;
    while let Some(ack) = chipset.next_pending() {
        match ack.irq {
            Some(0) => irq0 += 1,
            Some(irq) => tracing::debug!(irq, vector = ack.vector, "interrupt taken"),
            None => tracing::debug!(vector = ack.vector, "spurious interrupt"),
        }
        if ack.irq.is_some_and(|irq| irq >= 8) {
            chipset.port_write(0xA0, 0x20);
        }
        chipset.port_write(0x20, 0x20);
    }
    irq0
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let config = args.chipset_config()?;

    let mut chipset = Chipset::new(config, Box::new(StdHostClock::new()))?;
    init_pics(&mut chipset);
    if let Some(divisor) = args.divisor {
        program_divisor(&mut chipset, divisor);
    }

    let ticker = HostTicker::spawn(Duration::from_millis(args.tick_ms))?;
    let mut guest = IdleGuest {
        interrupt_flag: true,
    };

    let start = Instant::now();
    let deadline = start + Duration::from_millis(args.duration_ms);
    let mut irq0 = service_interrupts(&mut chipset);
    loop {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        if !ticker.wait(deadline - now)? {
            continue;
        }
        chipset.tick(&mut guest);
        irq0 += service_interrupts(&mut chipset);
        if !chipset.can_sleep(&guest, ticker.is_pending()) {
            tracing::trace!(
                behind = chipset.pending_periods(0),
                "host cannot idle; catching up"
            );
        }
    }

    let elapsed = start.elapsed().as_secs_f64();
    let count = chipset.pit().channel(0).counter().unwrap_or(0x1_0000);
    println!(
        "IRQ0: {irq0} interrupts in {elapsed:.3}s ({:.2} Hz measured, {:.2} Hz programmed)",
        irq0 as f64 / elapsed,
        PIT_TICK_RATE as f64 / f64::from(count),
    );
    Ok(())
}
