//! Intel 8254 Programmable Interval Timer.
//!
//! Channels are not stepped tick by tick. Each channel remembers the virtual time at which its
//! current countdown epoch began (`base_time`) and derives its count and OUT pin on demand, when
//! the guest latches or reads it.
//!
//! Periodic modes (2/3, and the undefined 6/7 which alias them) derive their phase from absolute
//! virtual time. Channel 0 uses the IRQ0 due-time held by the [`IrqScheduler`], so the count the
//! guest reads is consistent with the timer interrupt it receives.
//!
//! The square-wave (mode 3) count/OUT derivation and the simplified one-shot modes 1/5 keep the
//! historical behaviour DOS software was tuned against; they are not cycle-exact.

use ibmpc_time::PIT_TICK_RATE;

use crate::{IrqScheduler, ResetKind};

pub const PIT_CH0: u16 = 0x40;
pub const PIT_CH1: u16 = 0x41;
pub const PIT_CH2: u16 = 0x42;
pub const PIT_CMD: u16 = 0x43;

pub const PIT_CHANNELS: usize = 3;

/// Effective value of a zero reload.
const FULL_COUNT: u32 = 0x1_0000;

/// Byte access width selected by bits 5-4 of the control word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    Lsb,
    Msb,
    LsbThenMsb,
}

impl AccessMode {
    /// Decodes the RW bits; `0` is the counter latch command, not an access mode.
    fn from_bits(bits: u8) -> Option<Self> {
        match bits & 0b11 {
            0b01 => Some(Self::Lsb),
            0b10 => Some(Self::Msb),
            0b11 => Some(Self::LsbThenMsb),
            _ => None,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::Lsb => 0b01,
            Self::Msb => 0b10,
            Self::LsbThenMsb => 0b11,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BytePhase {
    Low,
    High,
}

#[derive(Debug, Clone)]
pub struct PitChannel {
    mode: u8,
    counter: Option<u32>,
    output: bool,
    count_latch: Option<u32>,
    status_latch: Option<u8>,
    write_latch: u16,
    access: AccessMode,
    read_phase: BytePhase,
    write_phase: BytePhase,
    base_time: u64,
}

impl PitChannel {
    fn new(mode: u8, counter: Option<u32>, write_latch: u16, now: u64) -> Self {
        Self {
            mode,
            counter,
            output: false,
            count_latch: None,
            status_latch: None,
            write_latch,
            access: AccessMode::LsbThenMsb,
            read_phase: BytePhase::Low,
            write_phase: BytePhase::Low,
            base_time: now,
        }
    }

    /// Programmed mode, 0-7 (6 and 7 behave like 2 and 3).
    pub fn mode(&self) -> u8 {
        self.mode
    }

    /// Current reload count (1..=65536), or `None` once a one-shot count has expired.
    pub fn counter(&self) -> Option<u32> {
        self.counter
    }

    /// OUT pin level as of the last latch/read.
    pub fn output(&self) -> bool {
        self.output
    }

    /// Raw 16-bit value last written through the data port.
    pub fn reload_value(&self) -> u16 {
        self.write_latch
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    /// Virtual time at which the current countdown epoch began.
    pub fn base_time(&self) -> u64 {
        self.base_time
    }

    fn is_periodic(&self) -> bool {
        self.mode & 0b010 != 0
    }

    fn status_byte(&self) -> u8 {
        (u8::from(self.output) << 7)
            | (u8::from(self.counter.is_none()) << 6)
            | (self.access.bits() << 4)
            | ((self.mode & 0b111) << 1)
    }
}

#[derive(Debug, Clone)]
pub struct Pit8254 {
    channels: [PitChannel; PIT_CHANNELS],
}

impl Pit8254 {
    pub fn new(kind: ResetKind, now: u64) -> Self {
        Self {
            channels: Self::default_channels(kind, now),
        }
    }

    /// Restores the BIOS-visible defaults: channel 0 in mode 3 with the 18.2Hz count, channel 1
    /// in mode 2 (DRAM refresh), channel 2 in mode 0. On a cold boot channel 2 starts expired.
    pub fn reset(&mut self, kind: ResetKind, now: u64) {
        self.channels = Self::default_channels(kind, now);
    }

    fn default_channels(kind: ResetKind, now: u64) -> [PitChannel; PIT_CHANNELS] {
        let ch2_counter = match kind {
            ResetKind::PowerOn => None,
            ResetKind::Reset => Some(FULL_COUNT),
        };
        [
            PitChannel::new(3, Some(FULL_COUNT), 0, now),
            PitChannel::new(2, Some(18), 18, now),
            PitChannel::new(0, ch2_counter, 0, now),
        ]
    }

    pub fn channel(&self, index: usize) -> &PitChannel {
        &self.channels[index]
    }

    /// Ticks elapsed since `index` started its current countdown epoch.
    pub fn elapsed_ticks(&self, index: usize, now: u64) -> u64 {
        now.saturating_sub(self.channels[index].base_time)
    }

    /// Nominal IRQ0 interval in 100us units derived from channel 0's count (never 0).
    pub fn irq0_interval_100us(&self) -> u32 {
        let count = u64::from(self.channels[0].counter.unwrap_or(FULL_COUNT));
        ((count * 10_000) / PIT_TICK_RATE).max(1) as u32
    }

    /// Computes the current count of `index` and updates its OUT pin.
    fn sample(&mut self, index: usize, now: u64, sched: &mut IrqScheduler) -> u32 {
        if !self.channels[index].is_periodic() {
            return self.sample_one_shot(index, now);
        }

        sched.observe(now);
        let now = sched.now();
        let irq0_due = sched.next_due(0);

        let ch = &mut self.channels[index];
        let counter = u64::from(ch.counter.unwrap_or(FULL_COUNT));
        let ticks = match irq0_due {
            // Counts down towards the next IRQ0; late or lost interrupts wrap around.
            Some(due) if index == 0 => {
                (i128::from(due) - i128::from(now)).rem_euclid(i128::from(counter)) as u64
            }
            _ => counter - now % counter,
        };

        if ch.mode & 0b011 == 0b011 {
            // Square wave counts down by two per tick; OUT flips halfway through the period.
            let doubled = ticks * 2;
            if doubled >= counter {
                ch.output = false;
                ((doubled - counter) & 0xFFFE) as u32
            } else {
                ch.output = true;
                doubled as u32
            }
        } else {
            // Rate generator: OUT pulses low for the single tick at count 1.
            ch.output = ticks != 1;
            ticks as u32
        }
    }

    fn sample_one_shot(&mut self, index: usize, now: u64) -> u32 {
        let ch = &mut self.channels[index];
        // Modes 4/5 drive OUT high while counting and low at terminal count; 0/1 the opposite.
        let strobe = ch.mode & 0b100 != 0;

        if let Some(counter) = ch.counter {
            let elapsed = now.saturating_sub(ch.base_time);
            if elapsed < u64::from(counter) {
                ch.output = strobe;
                return counter - elapsed as u32;
            }
            // Terminal count reached; a new count must be written to restart.
            ch.counter = None;
        }
        ch.output = !strobe;
        u32::from(ch.write_latch)
    }

    /// Recomputes the OUT pin of `index` without disturbing any pending latch.
    pub fn refresh_output(&mut self, index: usize, now: u64, sched: &mut IrqScheduler) -> bool {
        self.sample(index, now, sched);
        self.channels[index].output
    }

    /// Counter latch command. Ignored while a previous latch has not been read.
    pub fn latch(&mut self, index: usize, now: u64, sched: &mut IrqScheduler) {
        if self.channels[index].count_latch.is_some() {
            return;
        }
        let count = self.sample(index, now, sched);
        self.channels[index].count_latch = Some(count);
    }

    /// Read-back status latch. Ignored while a previous status byte has not been read.
    pub fn latch_status(&mut self, index: usize, now: u64, sched: &mut IrqScheduler) {
        if self.channels[index].status_latch.is_some() {
            return;
        }
        self.sample(index, now, sched);
        let ch = &mut self.channels[index];
        ch.status_latch = Some(ch.status_byte());
    }

    /// Data port read.
    pub fn read(&mut self, index: usize, now: u64, sched: &mut IrqScheduler) -> u8 {
        if index == 1 {
            tracing::debug!("PIT channel 1 (DRAM refresh) read");
        }
        if let Some(status) = self.channels[index].status_latch.take() {
            return status;
        }

        let value = match self.channels[index].count_latch {
            Some(value) => value,
            None => {
                let value = self.sample(index, now, sched);
                self.channels[index].count_latch = Some(value);
                value
            }
        };

        let ch = &mut self.channels[index];
        match (ch.access, ch.read_phase) {
            (AccessMode::Lsb, _) => {
                ch.count_latch = None;
                value as u8
            }
            (AccessMode::Msb, _) => {
                ch.count_latch = None;
                (value >> 8) as u8
            }
            (AccessMode::LsbThenMsb, BytePhase::Low) => {
                ch.read_phase = BytePhase::High;
                value as u8
            }
            (AccessMode::LsbThenMsb, BytePhase::High) => {
                ch.read_phase = BytePhase::Low;
                ch.count_latch = None;
                (value >> 8) as u8
            }
        }
    }

    /// Data port write. Returns the committed reload count once the access is complete.
    pub fn write(&mut self, index: usize, value: u8, now: u64) -> Option<u32> {
        if index == 1 {
            tracing::debug!(value, "PIT channel 1 (DRAM refresh) write");
        }
        let ch = &mut self.channels[index];
        let complete = match (ch.access, ch.write_phase) {
            (AccessMode::Lsb, _) => {
                ch.write_latch = u16::from(value);
                true
            }
            (AccessMode::Msb, _) => {
                ch.write_latch = u16::from(value) << 8;
                true
            }
            (AccessMode::LsbThenMsb, BytePhase::Low) => {
                ch.write_latch = u16::from(value);
                ch.write_phase = BytePhase::High;
                false
            }
            (AccessMode::LsbThenMsb, BytePhase::High) => {
                ch.write_latch |= u16::from(value) << 8;
                ch.write_phase = BytePhase::Low;
                true
            }
        };
        if !complete {
            return None;
        }

        let reload = match ch.write_latch {
            0 => FULL_COUNT,
            v => u32::from(v),
        };
        ch.counter = Some(reload);
        ch.base_time = now;
        Some(reload)
    }

    /// Control word write (port 0x43).
    pub fn write_control(&mut self, value: u8, now: u64, sched: &mut IrqScheduler) {
        let channel = value >> 6;
        if channel == 3 {
            self.read_back(value, now, sched);
            return;
        }
        let index = usize::from(channel);

        let Some(access) = AccessMode::from_bits(value >> 4) else {
            self.latch(index, now, sched);
            return;
        };

        let ch = &mut self.channels[index];
        ch.access = access;
        ch.mode = (value >> 1) & 0b111;
        ch.read_phase = BytePhase::Low;
        ch.write_phase = BytePhase::Low;
        ch.count_latch = None;
        ch.status_latch = None;
        if value & 0b100 == 0 {
            // One-shot modes restart their epoch even if the program never rewrites the count.
            ch.base_time = now;
        }
        tracing::debug!(channel, mode = ch.mode, ?access, "PIT channel programmed");
    }

    fn read_back(&mut self, value: u8, now: u64, sched: &mut IrqScheduler) {
        let latch_count = value & 0x20 == 0;
        let latch_status = value & 0x10 == 0;
        for index in 0..PIT_CHANNELS {
            if value & (0x02 << index) == 0 {
                continue;
            }
            if latch_status {
                self.latch_status(index, now, sched);
            }
            if latch_count {
                self.latch(index, now, sched);
            }
        }
    }
}
