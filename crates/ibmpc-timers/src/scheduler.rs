//! Virtual IRQ scheduler.
//!
//! Keeps one due-time per interrupt line, measured in PIT ticks, and raises lines whose due-time
//! has passed. Host time only arrives in coarse samples (typically every 10ms), so a line is
//! raised on the first pass after it became due, and a periodic source re-arms itself from its
//! acknowledgment path relative to the *previous due-time*, not to the time it was delivered.
//! That keeps periodic sources phase-locked no matter how late delivery happens.
//!
//! Slot 32 is a bookkeeping slot: it records the earliest time handled by the last pass, which
//! becomes the "last processed" watermark on the next [`IrqScheduler::watch`]. A watermark that
//! falls far behind the current time means interrupts are not being consumed.

use crate::IrqSink;

/// Number of schedulable lines.
pub const IRQ_LINES: usize = 32;
/// Index of the watermark bookkeeping slot.
pub const WATERMARK_SLOT: usize = IRQ_LINES;
/// Exclusive upper bound for [`IrqScheduler::schedule`] intervals (about 15 minutes of ticks).
pub const MAX_SCHEDULE_INTERVAL: i64 = 0x3FFF_FFFF;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IrqLineState {
    /// Due-time of the most recently delivered activation.
    pub last_honored: Option<u64>,
    /// Time at which the next activation fires.
    pub next_due: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct IrqScheduler {
    lines: [IrqLineState; IRQ_LINES + 1],
    now: u64,
    last_processed: u64,
}

impl IrqScheduler {
    pub fn new() -> Self {
        Self {
            lines: [IrqLineState::default(); IRQ_LINES + 1],
            now: 0,
            last_processed: 0,
        }
    }

    /// Current virtual time as last observed by the scheduler.
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Publishes the current virtual time. Time never moves backwards.
    pub fn observe(&mut self, now: u64) {
        self.now = self.now.max(now);
    }

    pub fn line(&self, line: u8) -> IrqLineState {
        self.lines
            .get(usize::from(line))
            .copied()
            .unwrap_or_default()
    }

    pub fn next_due(&self, line: u8) -> Option<u64> {
        self.line(line).next_due
    }

    /// Earliest due-time handled by the most recent pass that delivered something.
    pub fn last_processed(&self) -> u64 {
        self.last_processed
    }

    /// Periodic reconciliation against host time: publish `now`, move the watermark forward and
    /// raise whatever became due.
    pub fn watch(&mut self, now: u64, sink: &mut dyn IrqSink) -> usize {
        self.observe(now);
        if let Some(watermark) = self.lines[WATERMARK_SLOT].next_due {
            self.last_processed = watermark;
        }
        self.activate(sink)
    }

    /// Raises every line whose due-time has passed and that has not been delivered for that
    /// due-time yet. Lines are visited in ascending order. Returns the number of lines raised.
    pub fn activate(&mut self, sink: &mut dyn IrqSink) -> usize {
        if sink.request_pending() {
            tracing::trace!("request outstanding; deferring activation");
            return 0;
        }

        let now = self.now;
        let mut earliest = now;
        let mut raised = 0;
        for (line, state) in self.lines[..IRQ_LINES].iter_mut().enumerate() {
            let Some(due) = state.next_due else {
                continue;
            };
            if due >= now {
                continue;
            }
            if state.last_honored == Some(due) {
                tracing::trace!(line, due, "due-time already honored; waiting for re-arm");
                continue;
            }
            earliest = earliest.min(due);
            state.last_honored = Some(due);
            sink.raise_irq(line as u8);
            raised += 1;
        }

        self.lines[WATERMARK_SLOT].next_due = Some(earliest);
        if raised > 0 {
            self.last_processed = earliest;
            tracing::trace!(raised, earliest, now, "activated lines");
        }
        raised
    }

    /// Arms `line` to fire `interval` ticks after its previous due-time (or after now, the first
    /// time the line is scheduled), then runs an activation pass.
    ///
    /// Intervals outside `1..0x3FFF_FFFF` leave the schedule untouched. They typically come from
    /// an expired one-shot counter.
    pub fn schedule(&mut self, line: u8, interval: i64, sink: &mut dyn IrqSink) {
        let index = usize::from(line);
        debug_assert!(index < IRQ_LINES, "line {line} out of range");
        if index >= IRQ_LINES {
            return;
        }

        if interval > 0 && interval < MAX_SCHEDULE_INTERVAL {
            let interval = interval as u64;
            let state = &mut self.lines[index];
            let due = match (state.last_honored, state.next_due) {
                (Some(_), Some(previous)) => previous.saturating_add(interval),
                _ => self.now.saturating_add(interval),
            };
            state.next_due = Some(due);
            tracing::trace!(line, interval, due, "scheduled");
        } else {
            tracing::debug!(line, interval, "rejected schedule interval");
        }

        self.activate(sink);
    }

    /// Delivers `line` immediately and marks it honored at the current time, so its
    /// acknowledgment can start a phase-locked periodic schedule.
    pub fn prime(&mut self, line: u8, sink: &mut dyn IrqSink) {
        let index = usize::from(line);
        if index >= IRQ_LINES {
            return;
        }
        let now = self.now;
        self.lines[index] = IrqLineState {
            last_honored: Some(now),
            next_due: Some(now),
        };
        sink.raise_irq(line);
    }

    /// Number of whole `period`s that `line` is behind its due-time, counting the due activation
    /// itself. Zero if the line is not overdue.
    pub fn overdue_periods(&self, line: u8, period: u32) -> u64 {
        let Some(due) = self.next_due(line) else {
            return 0;
        };
        if period == 0 || due > self.now {
            return 0;
        }
        (self.now - due) / u64::from(period) + 1
    }

    /// Whether virtual time has run more than `threshold` ticks past the last processed
    /// activation.
    pub fn is_flooded(&self, threshold: u64) -> bool {
        self.now > self.last_processed.saturating_add(threshold)
    }
}

impl Default for IrqScheduler {
    fn default() -> Self {
        Self::new()
    }
}
