use ibmpc_timers::{IrqScheduler, Pit8254, ResetKind};
use proptest::prelude::*;

const CH2: usize = 2;

fn program_ch2(pit: &mut Pit8254, sched: &mut IrqScheduler, control: u8, count: u16, now: u64) {
    pit.write_control(control, now, sched);
    let [lo, hi] = count.to_le_bytes();
    assert_eq!(pit.write(CH2, lo, now), None);
    assert!(pit.write(CH2, hi, now).is_some());
}

fn latched_count(pit: &mut Pit8254, sched: &mut IrqScheduler, now: u64) -> u16 {
    pit.latch(CH2, now, sched);
    let lo = pit.read(CH2, now, sched);
    let hi = pit.read(CH2, now, sched);
    u16::from_le_bytes([lo, hi])
}

#[test]
fn control_word_then_count_matches_bios_beep_sequence() {
    let mut pit = Pit8254::new(ResetKind::PowerOn, 0);
    let mut sched = IrqScheduler::new();

    // The BIOS beep: channel 2, square wave, 1193182 / 1190 ~= 1kHz.
    program_ch2(&mut pit, &mut sched, 0xB6, 1190, 10);
    let ch = pit.channel(CH2);
    assert_eq!(ch.mode(), 3);
    assert_eq!(ch.counter(), Some(1190));
    assert_eq!(ch.reload_value(), 1190);
    assert_eq!(ch.base_time(), 10);
}

proptest! {
    #[test]
    fn mode_0_counts_down_then_raises_out(count in 2u16..=u16::MAX, start in 0u64..1_000_000, k in 0u64..0x2_0000) {
        let mut pit = Pit8254::new(ResetKind::Reset, 0);
        let mut sched = IrqScheduler::new();
        program_ch2(&mut pit, &mut sched, 0xB0, count, start);

        let read = latched_count(&mut pit, &mut sched, start + k);
        if k < u64::from(count) {
            prop_assert_eq!(u64::from(read), u64::from(count) - k);
            prop_assert!(!pit.channel(CH2).output());
        } else {
            prop_assert!(pit.channel(CH2).output());
            prop_assert_eq!(pit.channel(CH2).counter(), None);
        }
    }

    #[test]
    fn completed_write_commits_reload(value in any::<u16>(), now in any::<u32>()) {
        let mut pit = Pit8254::new(ResetKind::Reset, 0);
        let mut sched = IrqScheduler::new();
        pit.write_control(0xB4, u64::from(now), &mut sched);
        let [lo, hi] = value.to_le_bytes();
        prop_assert_eq!(pit.write(CH2, lo, u64::from(now)), None);
        let committed = pit.write(CH2, hi, u64::from(now));

        let expected = if value == 0 { 0x1_0000 } else { u32::from(value) };
        prop_assert_eq!(committed, Some(expected));
        prop_assert_eq!(pit.channel(CH2).counter(), Some(expected));
        prop_assert_eq!(pit.channel(CH2).reload_value(), value);
    }

    #[test]
    fn rate_generator_count_stays_within_period(count in 2u16..=u16::MAX, now in 0u64..u64::from(u32::MAX)) {
        let mut pit = Pit8254::new(ResetKind::Reset, 0);
        let mut sched = IrqScheduler::new();
        program_ch2(&mut pit, &mut sched, 0xB4, count, 0);

        let read = latched_count(&mut pit, &mut sched, now);
        prop_assert!(read >= 1 && read <= count);
        prop_assert_eq!(pit.channel(CH2).output(), read != 1);
    }
}
