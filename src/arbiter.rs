// Licensed under the Apache-2.0 license

//! Shared-line arbiter.
//!
//! The [`Arbiter`] exclusively owns the physical lines shared by the two-wire
//! engine, the four-wire engine and the fault injector. A client gets at the
//! lines only through a [`BusGuard`], which holds the arbiter's single lock for
//! the duration of one transaction and gives narrow set/get/direction access.
//! Dropping the guard releases the lock, so the lock is returned exactly once
//! on every path, including early returns on error.
//!
//! Acquisition is not re-entrant: acquiring twice from the same call stack
//! deadlocks.

use crate::common::{Logger, NoOpLogger};
use crate::line::{Direction, Level, Line, LineError};
use core::fmt;
use fugit::MillisDurationU32;
use parking_lot::{Mutex, MutexGuard};
use std::time::Duration;

/// Which clock line a two-wire bus is clocked on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClockLine {
    Primary,
    /// Alternate clock for a second two-wire bus sharing the data line.
    Secondary,
}

/// Identifies the holder of the lock in log output.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Client {
    TwoWire(ClockLine),
    FourWire,
    FaultInjector,
}

impl fmt::Display for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Client::TwoWire(ClockLine::Primary) => write!(f, "i2c(scl)"),
            Client::TwoWire(ClockLine::Secondary) => write!(f, "i2c(scl2)"),
            Client::FourWire => write!(f, "spi"),
            Client::FaultInjector => write!(f, "fault-injector"),
        }
    }
}

/// The physical lines owned by one arbiter.
///
/// `mosi` doubles as the two-wire data line. `sck2` and `miso` are optional.
pub struct LineSet<L> {
    pub sck: L,
    pub sck2: Option<L>,
    pub mosi: L,
    pub miso: Option<L>,
}

impl<L> LineSet<L> {
    pub fn new(sck: L, mosi: L) -> Self {
        Self {
            sck,
            sck2: None,
            mosi,
            miso: None,
        }
    }

    #[must_use]
    pub fn with_secondary_clock(mut self, sck2: L) -> Self {
        self.sck2 = Some(sck2);
        self
    }

    #[must_use]
    pub fn with_miso(mut self, miso: L) -> Self {
        self.miso = Some(miso);
        self
    }
}

pub struct Arbiter<L, Lg: Logger = NoOpLogger> {
    lines: Mutex<LineSet<L>>,
    has_sck2: bool,
    has_miso: bool,
    logger: Lg,
}

impl<L: Line> Arbiter<L, NoOpLogger> {
    pub fn new(lines: LineSet<L>) -> Self {
        Self::with_logger(lines, NoOpLogger)
    }
}

impl<L: Line, Lg: Logger> Arbiter<L, Lg> {
    pub fn with_logger(lines: LineSet<L>, logger: Lg) -> Self {
        let has_sck2 = lines.sck2.is_some();
        let has_miso = lines.miso.is_some();
        Self {
            lines: Mutex::new(lines),
            has_sck2,
            has_miso,
            logger,
        }
    }

    /// Block until the lines are free and take them.
    pub fn acquire(&self, client: Client) -> BusGuard<'_, L, Lg> {
        self.logger.debug(format_args!("{client}: locking"));
        let lines = self.lines.lock();
        self.logger.debug(format_args!("{client}: locked"));
        BusGuard {
            lines,
            client,
            logger: &self.logger,
        }
    }

    /// Like [`acquire`](Self::acquire) but gives up after `timeout`.
    pub fn try_acquire_for(
        &self,
        client: Client,
        timeout: MillisDurationU32,
    ) -> Option<BusGuard<'_, L, Lg>> {
        let wait = Duration::from_millis(u64::from(timeout.ticks()));
        let lines = self.lines.try_lock_for(wait)?;
        self.logger.debug(format_args!("{client}: locked"));
        Some(BusGuard {
            lines,
            client,
            logger: &self.logger,
        })
    }

    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.lines.is_locked()
    }

    #[must_use]
    pub fn has_clock(&self, which: ClockLine) -> bool {
        match which {
            ClockLine::Primary => true,
            ClockLine::Secondary => self.has_sck2,
        }
    }

    #[must_use]
    pub fn has_miso(&self) -> bool {
        self.has_miso
    }

    pub fn logger(&self) -> &Lg {
        &self.logger
    }

    /// Tear down and hand the lines back.
    pub fn into_lines(self) -> LineSet<L> {
        self.lines.into_inner()
    }
}

/// Exclusive access to the line set for one transaction.
pub struct BusGuard<'a, L, Lg: Logger> {
    lines: MutexGuard<'a, LineSet<L>>,
    client: Client,
    logger: &'a Lg,
}

impl<L: Line, Lg: Logger> BusGuard<'_, L, Lg> {
    #[must_use]
    pub fn client(&self) -> Client {
        self.client
    }

    fn clock(&mut self, which: ClockLine) -> Result<&mut L, LineError> {
        match which {
            ClockLine::Primary => Ok(&mut self.lines.sck),
            ClockLine::Secondary => self.lines.sck2.as_mut().ok_or(LineError::Unavailable),
        }
    }

    pub fn set_clock(&mut self, which: ClockLine, level: Level) -> Result<(), LineError> {
        self.clock(which)?.set(level)
    }

    pub fn get_clock(&mut self, which: ClockLine) -> Result<Level, LineError> {
        self.clock(which)?.get()
    }

    pub fn clock_direction(
        &mut self,
        which: ClockLine,
        direction: Direction,
    ) -> Result<(), LineError> {
        self.clock(which)?.set_direction(direction)
    }

    pub fn set_data(&mut self, level: Level) -> Result<(), LineError> {
        self.lines.mosi.set(level)
    }

    pub fn get_data(&mut self) -> Result<Level, LineError> {
        self.lines.mosi.get()
    }

    pub fn data_direction(&mut self, direction: Direction) -> Result<(), LineError> {
        self.lines.mosi.set_direction(direction)
    }

    pub fn get_miso(&mut self) -> Result<Level, LineError> {
        self.lines
            .miso
            .as_mut()
            .ok_or(LineError::Unavailable)?
            .get()
    }

    /// Explicit release; same as dropping the guard.
    pub fn release(self) {}
}

impl<L, Lg: Logger> Drop for BusGuard<'_, L, Lg> {
    fn drop(&mut self) {
        self.logger.debug(format_args!("{}: unlocking", self.client));
    }
}
