//! The timing chipset aggregate: PIT, PIC pair, virtual IRQ scheduler, port 0x61 and the host
//! tick driver, owned together so that every port handler and scheduler pass sees one consistent
//! virtual time.

use std::cell::RefCell;
use std::rc::Rc;

use ibmpc_interrupts::pic8259::{
    ELCR_MASTER, ELCR_SLAVE, MASTER_CMD, MASTER_DATA, SLAVE_CMD, SLAVE_DATA,
};
use ibmpc_interrupts::{Acknowledged, DualPic8259};
use ibmpc_time::{HostClock, VirtualClock, PIT_TICK_RATE};
use ibmpc_timers::pit8254::{PIT_CH0, PIT_CH2, PIT_CMD};
use ibmpc_timers::scheduler::IRQ_LINES;
use ibmpc_timers::{IrqScheduler, IrqSink, Pit8254, ResetKind};

use crate::speaker::{NullSpeaker, Speaker, SpeakerPort, SYSTEM_CONTROL_B};
use crate::{ChipsetConfig, GuestCpu, Result, TickDriver};

/// Lines below this number are wired to the PIC pair; the rest are software requests.
const PIC_LINES: u8 = 16;

pub type SharedChipset = Rc<RefCell<Chipset>>;

/// Acknowledgment hook for one interrupt line. Runs after the line has been handed to the CPU
/// and is the only place the line may be re-armed.
pub type AckHandler = Box<dyn FnMut(&mut AckContext<'_>)>;

#[derive(Debug, Clone, Copy, Default)]
struct LineState {
    /// PIC lines currently driven high by the scheduler.
    asserted: u16,
    /// Outstanding software requests (lines 16-31).
    soft: u32,
}

/// Routes scheduler activations to the PIC or to the software request mask.
struct LineSink<'a> {
    pic: &'a mut DualPic8259,
    lines: &'a mut LineState,
}

impl IrqSink for LineSink<'_> {
    fn raise_irq(&mut self, line: u8) {
        if line < PIC_LINES {
            self.pic.raise_irq(line);
            self.lines.asserted |= 1 << line;
        } else {
            self.lines.soft |= 1 << line;
        }
    }

    fn request_pending(&self) -> bool {
        self.pic.is_pending()
    }
}

/// What an [`AckHandler`] can see and do.
pub struct AckContext<'a> {
    line: u8,
    pit: &'a Pit8254,
    sched: &'a mut IrqScheduler,
    sink: LineSink<'a>,
}

impl AckContext<'_> {
    /// The line being acknowledged.
    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn now(&self) -> u64 {
        self.sched.now()
    }

    pub fn pit(&self) -> &Pit8254 {
        self.pit
    }

    /// Re-arms the acknowledged line `interval` ticks after its previous due-time.
    pub fn schedule(&mut self, interval: i64) {
        self.sched.schedule(self.line, interval, &mut self.sink);
    }
}

/// IRQ0 follows the channel 0 count. An expired one-shot count yields a rejected interval,
/// which stops the timer until the guest programs a new count.
fn irq0_ack(ctx: &mut AckContext<'_>) {
    let interval = ctx.pit().channel(0).counter().map_or(0, i64::from);
    ctx.schedule(interval);
}

pub struct Chipset {
    config: ChipsetConfig,
    host: Box<dyn HostClock>,
    clock: VirtualClock,
    pic: DualPic8259,
    pit: Pit8254,
    sched: IrqScheduler,
    lines: LineState,
    ack_handlers: Vec<Option<AckHandler>>,
    speaker_port: SpeakerPort,
    speaker: Box<dyn Speaker>,
    driver: TickDriver,
}

impl Chipset {
    /// Builds a chipset in its cold-boot state and starts the system timer.
    pub fn new(config: ChipsetConfig, host: Box<dyn HostClock>) -> Result<Self> {
        config.validate()?;

        let mut clock = VirtualClock::new();
        clock.sample(host.now_ticks());
        let now = clock.now();

        let pit = Pit8254::new(ResetKind::PowerOn, now);
        let driver = TickDriver::new(pit.irq0_interval_100us());
        let mut chipset = Self {
            speaker_port: SpeakerPort::new(config.speaker, config.speaker_duration_ms),
            config,
            host,
            clock,
            pic: DualPic8259::new(),
            pit,
            sched: IrqScheduler::new(),
            lines: LineState::default(),
            ack_handlers: (0..IRQ_LINES).map(|_| None).collect(),
            speaker: Box::new(NullSpeaker),
            driver,
        };
        chipset.sched.observe(now);
        chipset.register_ack_handler(0, Box::new(irq0_ack));
        chipset.prime(0);
        Ok(chipset)
    }

    pub fn into_shared(self) -> SharedChipset {
        Rc::new(RefCell::new(self))
    }

    pub fn set_speaker(&mut self, speaker: Box<dyn Speaker>) {
        self.speaker = speaker;
    }

    /// Re-initialises the devices. A soft reset keeps the scheduler's due-times, so periodic
    /// sources keep their phase.
    pub fn reset(&mut self, kind: ResetKind) {
        let now = self.refresh_time();
        self.pic.reset();
        self.pit.reset(kind, now);
        self.speaker_port.reset();
        self.speaker.off();
        self.driver = TickDriver::new(self.pit.irq0_interval_100us());

        match kind {
            ResetKind::PowerOn => {
                self.lines = LineState::default();
                self.sched = IrqScheduler::new();
                self.sched.observe(now);
                self.prime(0);
            }
            ResetKind::Reset => {
                self.lines.soft = 0;
                self.reassert_lines();
            }
        }
    }

    /// Re-presents scheduler requests that a controller (re)initialisation dropped from the IRR.
    /// They were delivered by the scheduler already and would otherwise never be acknowledged.
    fn reassert_lines(&mut self) {
        let asserted = self.lines.asserted;
        for line in (0..PIC_LINES).filter(|line| asserted & (1 << *line) != 0) {
            self.pic.lower_irq(line);
            self.pic.raise_irq(line);
        }
    }

    /// Folds the latest host sample into virtual time and returns it.
    fn refresh_time(&mut self) -> u64 {
        let delta = self.clock.sample(self.host.now_ticks());
        self.driver.record_elapsed(delta);
        self.clock.now()
    }

    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Host timer notification: advance virtual time, run the CLI watchdog, then deliver whatever
    /// became due. Returns the number of lines raised.
    pub fn tick(&mut self, cpu: &mut dyn GuestCpu) -> usize {
        let now = self.refresh_time();
        self.driver.check_cli(cpu, self.config.cli_timeout);

        let mut sink = LineSink {
            pic: &mut self.pic,
            lines: &mut self.lines,
        };
        self.sched.watch(now, &mut sink)
    }

    /// The guest executed CLI.
    pub fn note_cli(&mut self) {
        self.driver.note_cli();
    }

    /// Device-driven request on `line` (0-15 go to the PIC, 16-31 are software requests).
    pub fn raise_irq(&mut self, line: u8) {
        match line {
            0..=15 => self.pic.raise_irq(line),
            16..=31 => self.lines.soft |= 1 << line,
            _ => tracing::debug!(line, "raise of nonexistent IRQ line"),
        }
    }

    pub fn lower_irq(&mut self, line: u8) {
        match line {
            0..=15 => self.pic.lower_irq(line),
            16..=31 => self.lines.soft &= !(1 << line),
            _ => tracing::debug!(line, "lower of nonexistent IRQ line"),
        }
    }

    /// Whether an unmasked PIC request is waiting for the CPU.
    pub fn is_pending(&self) -> bool {
        self.pic.is_pending()
    }

    /// INTA cycle: hands the highest-priority eligible request to the CPU and runs its
    /// acknowledgment path.
    pub fn next_pending(&mut self) -> Option<Acknowledged> {
        let ack = self.pic.acknowledge_next()?;
        if let Some(irq) = ack.irq {
            self.ack(irq);
        }
        Some(ack)
    }

    /// Split INTA cycle for callers that fetched the vector with [`Self::pending_vector`].
    pub fn acknowledge(&mut self, vector: u8) -> Option<u8> {
        let irq = self.pic.acknowledge(vector)?;
        self.ack(irq);
        Some(irq)
    }

    pub fn pending_vector(&self) -> Option<u8> {
        self.pic.get_pending_vector()
    }

    /// Takes the lowest outstanding software request (line 16-31) and acknowledges it.
    pub fn take_soft_request(&mut self) -> Option<u8> {
        if self.lines.soft == 0 {
            return None;
        }
        let line = self.lines.soft.trailing_zeros() as u8;
        self.lines.soft &= !(1 << line);
        self.ack(line);
        Some(line)
    }

    pub fn register_ack_handler(&mut self, line: u8, handler: AckHandler) {
        match self.ack_handlers.get_mut(usize::from(line)) {
            Some(slot) => *slot = Some(handler),
            None => tracing::debug!(line, "ack handler for nonexistent IRQ line ignored"),
        }
    }

    /// Acknowledgment path of `line`: drop the scheduler's request and run the line's handler.
    pub fn ack(&mut self, line: u8) {
        if line < PIC_LINES && self.lines.asserted & (1 << line) != 0 {
            self.lines.asserted &= !(1 << line);
            self.pic.lower_irq(line);
        }

        let Some(Some(handler)) = self.ack_handlers.get_mut(usize::from(line)) else {
            return;
        };
        let mut ctx = AckContext {
            line,
            pit: &self.pit,
            sched: &mut self.sched,
            sink: LineSink {
                pic: &mut self.pic,
                lines: &mut self.lines,
            },
        };
        handler(&mut ctx);
    }

    /// Starts `line` by delivering it now; its ack handler then keeps it going.
    pub fn prime(&mut self, line: u8) {
        let mut sink = LineSink {
            pic: &mut self.pic,
            lines: &mut self.lines,
        };
        self.sched.prime(line, &mut sink);
    }

    /// Whole channel 0 periods IRQ0 is behind (0 for every other line).
    pub fn pending_periods(&self, line: u8) -> u64 {
        if line != 0 {
            return 0;
        }
        let period = self.pit.channel(0).counter().unwrap_or(0x1_0000);
        self.sched.overdue_periods(0, period)
    }

    /// Whether the host may block until the next timer notification.
    pub fn can_sleep(&self, cpu: &dyn GuestCpu, signal_pending: bool) -> bool {
        !(self.pic.isr_mask() != 0
            || cpu.virtual_interrupt_pending()
            || signal_pending
            || self.sched.is_flooded(self.config.flood_threshold))
    }

    /// Ticks since PIT channel `index` started its current countdown (speaker tone timing).
    pub fn pit_elapsed_ticks(&mut self, index: usize) -> u64 {
        let now = self.refresh_time();
        self.pit.elapsed_ticks(index, now)
    }

    pub fn port_read(&mut self, port: u16) -> u8 {
        let now = self.refresh_time();
        match port {
            PIT_CH0..=PIT_CH2 => self.pit.read(usize::from(port - PIT_CH0), now, &mut self.sched),
            PIT_CMD => 0,
            SYSTEM_CONTROL_B => {
                let out = self.pit.refresh_output(2, now, &mut self.sched);
                self.speaker_port.read(now, out)
            }
            MASTER_CMD | MASTER_DATA | SLAVE_CMD | SLAVE_DATA | ELCR_MASTER | ELCR_SLAVE => {
                let (value, polled) = self.pic.port_read_polled(port);
                // An OCW3 poll is an INTA cycle of its own.
                if let Some(irq) = polled {
                    self.ack(irq);
                }
                value
            }
            _ => 0xFF,
        }
    }

    pub fn port_write(&mut self, port: u16, value: u8) {
        let now = self.refresh_time();
        match port {
            PIT_CH0..=PIT_CH2 => {
                let index = usize::from(port - PIT_CH0);
                let committed = self.pit.write(index, value, now);
                if let (0, Some(count)) = (index, committed) {
                    self.channel0_reloaded(count);
                }
            }
            PIT_CMD => self.pit.write_control(value, now, &mut self.sched),
            SYSTEM_CONTROL_B => {
                let ch2 = self.pit.channel(2);
                let (mode, period) = (ch2.mode(), ch2.reload_value());
                self.speaker_port
                    .write(value, mode, period, self.speaker.as_mut());
            }
            MASTER_CMD | SLAVE_CMD if value & 0x10 != 0 => {
                // ICW1 clears the request register.
                self.pic.port_write_u8(port, value);
                self.reassert_lines();
            }
            MASTER_CMD | MASTER_DATA | SLAVE_CMD | SLAVE_DATA | ELCR_MASTER | ELCR_SLAVE => {
                self.pic.port_write_u8(port, value)
            }
            _ => tracing::debug!(port, value, "write to port outside the timing chipset"),
        }
    }

    fn channel0_reloaded(&mut self, count: u32) {
        let interval = self.pit.irq0_interval_100us();
        self.driver.restart(interval);
        tracing::info!(
            count,
            requested_hz = PIT_TICK_RATE as f64 / f64::from(count),
            granted_hz = 10_000.0 / f64::from(interval),
            "timer interrupt rate changed"
        );
    }

    pub fn config(&self) -> &ChipsetConfig {
        &self.config
    }

    pub fn pic(&self) -> &DualPic8259 {
        &self.pic
    }

    pub fn pit(&self) -> &Pit8254 {
        &self.pit
    }

    pub fn scheduler(&self) -> &IrqScheduler {
        &self.sched
    }

    pub fn driver(&self) -> &TickDriver {
        &self.driver
    }

    pub fn speaker_shadow(&self) -> u8 {
        self.speaker_port.shadow()
    }
}
