//! System control port B (0x61): speaker gate/data and a few read-only status bits.

use bitflags::bitflags;

use crate::SpeakerMode;

pub const SYSTEM_CONTROL_B: u16 = 0x61;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SystemControlB: u8 {
        /// PIT channel 2 gate (speaker driven by the timer).
        const TIMER2_GATE = 1 << 0;
        /// Speaker data enable.
        const SPEAKER_DATA = 1 << 1;
        const PARITY_CHECK_DISABLE = 1 << 2;
        const CHANNEL_CHECK_DISABLE = 1 << 3;
        /// Toggles with each DRAM refresh request (read-only).
        const REFRESH_TOGGLE = 1 << 4;
        /// Mirrors the PIT channel 2 OUT pin (read-only).
        const TIMER2_OUT = 1 << 5;
        const CHANNEL_CHECK = 1 << 6;
        const PARITY_CHECK = 1 << 7;
    }
}

/// Audio backend for the PC speaker.
pub trait Speaker {
    /// Starts a tone for at most `duration_ms`. `period` is the PIT channel 2 divisor; `0xFFF`
    /// requests a steady tone while the guest drives the data bit directly.
    fn on(&mut self, duration_ms: u32, period: u16);

    fn off(&mut self);
}

/// Speaker that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSpeaker;

impl Speaker for NullSpeaker {
    fn on(&mut self, _duration_ms: u32, _period: u16) {}

    fn off(&mut self) {}
}

/// Period handed to [`Speaker::on`] while the guest toggles the data bit itself.
pub const DIRECT_DRIVE_PERIOD: u16 = 0xFFF;

/// Port 0x61 shadow register.
#[derive(Debug, Clone)]
pub struct SpeakerPort {
    shadow: SystemControlB,
    mode: SpeakerMode,
    duration_ms: u32,
}

impl SpeakerPort {
    const POWER_ON: SystemControlB =
        SystemControlB::PARITY_CHECK_DISABLE.union(SystemControlB::CHANNEL_CHECK_DISABLE);

    pub fn new(mode: SpeakerMode, duration_ms: u32) -> Self {
        Self {
            shadow: Self::POWER_ON,
            mode,
            duration_ms,
        }
    }

    pub fn reset(&mut self) {
        self.shadow = Self::POWER_ON;
    }

    pub fn shadow(&self) -> u8 {
        self.shadow.bits()
    }

    /// Composes the value seen by an `IN 0x61`. The caller latches PIT channel 2 first so that
    /// `timer2_out` is current.
    pub fn read(&self, now: u64, timer2_out: bool) -> u8 {
        let mut value = self.shadow & !(SystemControlB::REFRESH_TOGGLE | SystemControlB::TIMER2_OUT);
        value.set(SystemControlB::REFRESH_TOGGLE, now & 0x10 != 0);
        value.set(SystemControlB::TIMER2_OUT, timer2_out);
        value.bits()
    }

    /// Handles an `OUT 0x61`. `timer2_mode` and `period` describe PIT channel 2 as currently
    /// programmed.
    pub fn write(&mut self, value: u8, timer2_mode: u8, period: u16, speaker: &mut dyn Speaker) {
        let enables = SystemControlB::TIMER2_GATE | SystemControlB::SPEAKER_DATA;
        match self.mode {
            SpeakerMode::Off => {
                self.shadow = SystemControlB::from_bits_truncate(value & 0x0C);
            }
            SpeakerMode::Emulated => {
                let value = SystemControlB::from_bits_truncate(value & 0x0F);
                if value & enables == self.shadow & enables {
                    return;
                }
                self.shadow = value;
                self.update_tone(timer2_mode, period, speaker);
            }
        }
    }

    fn update_tone(&self, timer2_mode: u8, period: u16, speaker: &mut dyn Speaker) {
        let gate = self.shadow.contains(SystemControlB::TIMER2_GATE);
        let data = self.shadow.contains(SystemControlB::SPEAKER_DATA);
        match (gate, data) {
            (true, true) if matches!(timer2_mode, 2 | 3 | 6 | 7) => {
                tracing::debug!(period, "speaker tone on");
                speaker.on(self.duration_ms, period);
            }
            (false, true) => speaker.on(self.duration_ms, DIRECT_DRIVE_PERIOD),
            _ => speaker.off(),
        }
    }
}
