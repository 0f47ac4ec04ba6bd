// Licensed under the Apache-2.0 license

//! Two-wire fault injector.
//!
//! Drives the two-wire lines directly, bypassing the engine, to put a bus
//! master under test into states a well-behaved target never produces:
//! transfers cut off without STOP, a data line yanked low mid-transfer, or a
//! fatal stop synchronised to the master's clock.

use crate::arbiter::{Arbiter, BusGuard, Client, ClockLine};
use crate::common::{ConfigurationError, Logger, NoOpLogger};
use crate::fault::completion::{Canceller, Completion, IrqNotifier, WaitOutcome};
use crate::fault::control::{Control, Error, MAX_IRQ_DELAY_US};
use crate::fault::hooks::{Edge, EdgeInterrupt, FatalStop, NoIrq, PanicStop};
use crate::i2c::bitbang::{drive_clock, drive_data};
use crate::i2c::common::{TimingConfig, MAX_ADDRESS};
use crate::line::{Direction, Level, Line, LineError};
use crate::timer::BitTimer;
use fugit::MicrosDurationU32;
use std::sync::Arc;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum IrqAction {
    LoseArbitration,
    FatalStop,
}

/// START, address, read bit, ACK slot held high.
#[must_use]
pub const fn address_phase_pattern(address: u8) -> (u32, u8) {
    (((address as u32) << 2) | 3, 9)
}

/// START, address, write bit, ACK slot, 0x00, ACK slot held high.
#[must_use]
pub const fn write_byte_pattern(address: u8) -> (u32, u8) {
    (((((address as u32) << 2) | 1) << 9) | 1, 18)
}

macro_rules! wire_control {
    ($wire:ident) => {
        paste::paste! {
            #[doc = concat!("Sample ", stringify!($wire), " under the bus lock.")]
            pub fn [<get_ $wire>](&mut self) -> Result<Level, Error> {
                let arbiter = Arc::clone(&self.arbiter);
                let mut bus = arbiter.acquire(Client::FaultInjector);
                Ok(self.[<read_ $wire>](&mut bus)?)
            }

            #[doc = concat!("Drive ", stringify!($wire), " under the bus lock.")]
            pub fn [<set_ $wire>](&mut self, level: Level) -> Result<(), Error> {
                let arbiter = Arc::clone(&self.arbiter);
                let mut bus = arbiter.acquire(Client::FaultInjector);
                Ok(self.[<drive_ $wire>](&mut bus, level)?)
            }
        }
    };
}

pub struct FaultInjector<L: Line, T: BitTimer, Lg: Logger = NoOpLogger, I = NoIrq, F = PanicStop>
{
    arbiter: Arc<Arbiter<L, Lg>>,
    timer: T,
    config: TimingConfig,
    irq: Option<I>,
    fatal: F,
    completion: Arc<Completion>,
}

impl<L: Line, T: BitTimer, Lg: Logger> FaultInjector<L, T, Lg, NoIrq, PanicStop> {
    /// Injector on the lines of a two-wire bus configured with `config`.
    ///
    /// # Errors
    ///
    /// `ClockUnavailable` if the configured clock line is missing.
    pub fn new(
        arbiter: Arc<Arbiter<L, Lg>>,
        timer: T,
        config: TimingConfig,
    ) -> Result<Self, ConfigurationError> {
        if !arbiter.has_clock(config.clock) {
            return Err(ConfigurationError::ClockUnavailable);
        }
        Ok(Self {
            arbiter,
            timer,
            config,
            irq: None,
            fatal: PanicStop,
            completion: Arc::new(Completion::new()),
        })
    }
}

impl<L, T, Lg, I, F> FaultInjector<L, T, Lg, I, F>
where
    L: Line,
    T: BitTimer,
    Lg: Logger,
    I: EdgeInterrupt,
    F: FatalStop,
{
    #[must_use]
    pub fn with_irq<I2: EdgeInterrupt>(self, irq: I2) -> FaultInjector<L, T, Lg, I2, F> {
        FaultInjector {
            arbiter: self.arbiter,
            timer: self.timer,
            config: self.config,
            irq: Some(irq),
            fatal: self.fatal,
            completion: self.completion,
        }
    }

    #[must_use]
    pub fn with_fatal_stop<F2: FatalStop>(self, fatal: F2) -> FaultInjector<L, T, Lg, I, F2> {
        FaultInjector {
            arbiter: self.arbiter,
            timer: self.timer,
            config: self.config,
            irq: self.irq,
            fatal,
            completion: self.completion,
        }
    }

    /// Handle for aborting a pending interrupt wait from another thread.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        Canceller(Arc::clone(&self.completion))
    }

    #[must_use]
    pub fn arbiter(&self) -> &Arc<Arbiter<L, Lg>> {
        &self.arbiter
    }

    fn irq_capable(&self) -> bool {
        !self.config.scl_output_only && self.irq.is_some()
    }

    /// The controls this injector exposes.
    #[must_use]
    pub fn controls(&self) -> heapless::Vec<Control, 6> {
        let irq = self.irq_capable();
        Control::ALL
            .into_iter()
            .filter(|c| irq || !c.needs_irq())
            .collect()
    }

    /// # Errors
    ///
    /// `NotReadable` for write-only controls, or a line failure.
    pub fn read_control(&mut self, control: Control) -> Result<u64, Error> {
        let level = match control {
            Control::Scl => self.get_scl()?,
            Control::Sda => self.get_sda()?,
            other => return Err(Error::NotReadable(other)),
        };
        Ok(u64::from(level.is_high()))
    }

    /// Write `value` to a control as if through its named file.
    ///
    /// # Errors
    ///
    /// Whatever the scenario behind the control reports.
    pub fn write_control(&mut self, control: Control, value: u64) -> Result<(), Error> {
        if !self.controls().contains(&control) {
            return Err(Error::ControlUnavailable(control));
        }
        match control {
            Control::Scl => self.set_scl(Level::from_bit(value != 0)),
            Control::Sda => self.set_sda(Level::from_bit(value != 0)),
            Control::IncompleteAddressPhase => {
                self.incomplete_address_phase(address(value)?)
            }
            Control::IncompleteWriteByte => self.incomplete_write_byte(address(value)?),
            Control::LoseArbitration => self.lose_arbitration(delay(value)?),
            Control::InjectPanic => self.inject_panic(delay(value)?),
        }
    }

    wire_control!(scl);
    wire_control!(sda);

    fn read_scl(&self, bus: &mut BusGuard<'_, L, Lg>) -> Result<Level, LineError> {
        bus.get_clock(self.config.clock)
    }

    fn read_sda(&self, bus: &mut BusGuard<'_, L, Lg>) -> Result<Level, LineError> {
        bus.get_data()
    }

    fn drive_scl(&self, bus: &mut BusGuard<'_, L, Lg>, level: Level) -> Result<(), LineError> {
        drive_clock(&self.config, bus, level)
    }

    fn drive_sda(&self, bus: &mut BusGuard<'_, L, Lg>, level: Level) -> Result<(), LineError> {
        drive_data(&self.config, bus, level)
    }

    /// START, then the low `bits` bits of `pattern` MSB first, then nothing.
    /// The bus is left mid-transfer.
    ///
    /// # Errors
    ///
    /// A line failure.
    pub fn incomplete_transfer(&mut self, pattern: u32, bits: u8) -> Result<(), Error> {
        let arbiter = Arc::clone(&self.arbiter);
        let mut bus = arbiter.acquire(Client::FaultInjector);
        let d = self.config.delay.ticks();

        self.drive_sda(&mut bus, Level::Low)?;
        self.timer.delay_us(d);
        for bit in (0..u32::from(bits.min(32))).rev() {
            self.drive_scl(&mut bus, Level::Low)?;
            self.timer.delay_us(d / 2);
            self.drive_sda(&mut bus, Level::from_bit((pattern >> bit) & 1 != 0))?;
            self.timer.delay_us((d + 1) / 2);
            self.drive_scl(&mut bus, Level::High)?;
            self.timer.delay_us(d);
        }
        Ok(())
    }

    /// # Errors
    ///
    /// `InvalidAddress` above 0x7f, checked before touching the bus.
    pub fn incomplete_address_phase(&mut self, address: u8) -> Result<(), Error> {
        check_address(address)?;
        self.arbiter
            .logger()
            .info(format_args!("fault: incomplete address phase to {address:#04x}"));
        let (pattern, bits) = address_phase_pattern(address);
        self.incomplete_transfer(pattern, bits)
    }

    /// # Errors
    ///
    /// `InvalidAddress` above 0x7f, checked before touching the bus.
    pub fn incomplete_write_byte(&mut self, address: u8) -> Result<(), Error> {
        check_address(address)?;
        self.arbiter
            .logger()
            .info(format_args!("fault: incomplete write byte to {address:#04x}"));
        let (pattern, bits) = write_byte_pattern(address);
        self.incomplete_transfer(pattern, bits)
    }

    /// On the next falling clock edge, hold SDA low for `delay`.
    ///
    /// # Errors
    ///
    /// See [`inject_panic`](Self::inject_panic).
    pub fn lose_arbitration(&mut self, delay: MicrosDurationU32) -> Result<(), Error> {
        self.act_on_scl_irq(delay, IrqAction::LoseArbitration)
    }

    /// On the next falling clock edge, wait `delay` then invoke the fatal stop.
    ///
    /// # Errors
    ///
    /// `DelayOutOfRange` before anything is touched, `IrqUnavailable`,
    /// `IrqRequest`, `Interrupted` if cancelled, or a line failure. The clock
    /// is driven high again on every path past taking the lock.
    pub fn inject_panic(&mut self, delay: MicrosDurationU32) -> Result<(), Error> {
        self.act_on_scl_irq(delay, IrqAction::FatalStop)
    }

    fn act_on_scl_irq(
        &mut self,
        delay: MicrosDurationU32,
        action: IrqAction,
    ) -> Result<(), Error> {
        let us = delay.ticks();
        if us > MAX_IRQ_DELAY_US {
            return Err(Error::DelayOutOfRange(u64::from(us)));
        }
        let Some(irq) = self.irq.as_mut() else {
            return Err(Error::IrqUnavailable);
        };
        let arbiter = Arc::clone(&self.arbiter);
        let logger = arbiter.logger();
        let clock = self.config.clock;
        let mut bus = arbiter.acquire(Client::FaultInjector);
        let mut armed = ArmedClock {
            bus: &mut bus,
            clock,
            irq: None,
            restored: false,
        };

        let outcome = match armed.bus.clock_direction(clock, Direction::Input) {
            Err(err) => Err(Error::Line(err)),
            Ok(()) => {
                self.completion.reset();
                let notifier = IrqNotifier(Arc::clone(&self.completion));
                match irq.request(Edge::Falling, notifier) {
                    Err(err) => {
                        logger.error(format_args!("fault: clock irq request failed: {err:?}"));
                        Err(Error::IrqRequest)
                    }
                    Ok(()) => {
                        armed.irq = Some(irq);
                        logger.info(format_args!("fault: {action:?} armed, {us} us"));
                        match self.completion.wait() {
                            WaitOutcome::Fired => fire(
                                &mut *armed.bus,
                                &self.config,
                                &mut self.timer,
                                &mut self.fatal,
                                action,
                                us,
                            ),
                            WaitOutcome::Cancelled => Err(Error::Interrupted),
                        }
                    }
                }
            }
        };

        match armed.finish() {
            Err(err) => Err(Error::Line(err)),
            Ok(()) => outcome,
        }
    }
}

/// Clock switched to input for an interrupt wait. Frees the interrupt and
/// drives the clock back to output-high exactly once, on
/// [`finish`](Self::finish) or when dropped while a fatal stop unwinds.
struct ArmedClock<'g, 'a, L: Line, Lg: Logger, I: EdgeInterrupt> {
    bus: &'g mut BusGuard<'a, L, Lg>,
    clock: ClockLine,
    irq: Option<&'g mut I>,
    restored: bool,
}

impl<L: Line, Lg: Logger, I: EdgeInterrupt> ArmedClock<'_, '_, L, Lg, I> {
    fn release(&mut self) -> Result<(), LineError> {
        if let Some(irq) = self.irq.take() {
            irq.free();
        }
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        self.bus
            .clock_direction(self.clock, Direction::Output(Level::High))
    }

    fn finish(mut self) -> Result<(), LineError> {
        self.release()
    }
}

impl<L: Line, Lg: Logger, I: EdgeInterrupt> Drop for ArmedClock<'_, '_, L, Lg, I> {
    fn drop(&mut self) {
        // Only reached unfinished while unwinding; nobody is left to report to.
        let _ = self.release();
    }
}

fn fire<L: Line, Lg: Logger, T: BitTimer, F: FatalStop>(
    bus: &mut BusGuard<'_, L, Lg>,
    config: &TimingConfig,
    timer: &mut T,
    fatal: &mut F,
    action: IrqAction,
    us: u32,
) -> Result<(), Error> {
    match action {
        IrqAction::LoseArbitration => {
            drive_data(config, bus, Level::Low)?;
            timer.delay_us(us);
            drive_data(config, bus, Level::High)?;
        }
        IrqAction::FatalStop => {
            timer.delay_us(us);
            fatal.stop();
        }
    }
    Ok(())
}

fn check_address(address: u8) -> Result<(), Error> {
    if address > MAX_ADDRESS {
        return Err(Error::InvalidAddress(u64::from(address)));
    }
    Ok(())
}

fn address(value: u64) -> Result<u8, Error> {
    u8::try_from(value)
        .ok()
        .filter(|a| *a <= MAX_ADDRESS)
        .ok_or(Error::InvalidAddress(value))
}

fn delay(value: u64) -> Result<MicrosDurationU32, Error> {
    u32::try_from(value)
        .ok()
        .filter(|us| *us <= MAX_IRQ_DELAY_US)
        .map(MicrosDurationU32::from_ticks)
        .ok_or(Error::DelayOutOfRange(value))
}
