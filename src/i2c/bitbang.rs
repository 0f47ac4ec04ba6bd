// Licensed under the Apache-2.0 license

//! Bit-banged two-wire engine.
//!
//! One transaction per call: START, address byte, ACK, data bytes with their
//! ACKs, STOP. Every line access goes through a [`BusGuard`] taken from the
//! shared [`Arbiter`] for the whole transaction.

use crate::arbiter::{Arbiter, BusGuard, Client};
use crate::common::{ConfigurationError, Logger, NoOpLogger};
use crate::i2c::common::{
    Buffer, Error, ErrorKind, SelfTestError, TimingConfig, MAX_ADDRESS,
};
use crate::line::{Direction, Level, Line, LineError};
use crate::timer::BitTimer;
use embedded_hal::i2c::Operation;
use std::sync::Arc;

type Guard<'a, L, Lg> = BusGuard<'a, L, Lg>;

pub struct I2cBitbang<L: Line, T: BitTimer, Lg: Logger = NoOpLogger> {
    arbiter: Arc<Arbiter<L, Lg>>,
    timer: T,
    config: TimingConfig,
}

impl<L: Line, T: BitTimer, Lg: Logger> I2cBitbang<L, T, Lg> {
    /// # Errors
    ///
    /// `ClockUnavailable` if the configured clock line is not in the arbiter's
    /// line set.
    pub fn new(
        arbiter: Arc<Arbiter<L, Lg>>,
        timer: T,
        config: TimingConfig,
    ) -> Result<Self, ConfigurationError> {
        if !arbiter.has_clock(config.clock) {
            return Err(ConfigurationError::ClockUnavailable);
        }
        arbiter.logger().info(format_args!(
            "{}: {} Hz, stretch {}",
            Client::TwoWire(config.clock),
            config.bus_frequency(),
            if config.clock_stretching() { "on" } else { "off" },
        ));
        Ok(Self {
            arbiter,
            timer,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &TimingConfig {
        &self.config
    }

    #[must_use]
    pub fn arbiter(&self) -> &Arc<Arbiter<L, Lg>> {
        &self.arbiter
    }

    /// The engine wants to run without being preempted mid-bit. Only a hint
    /// for the execution environment.
    #[must_use]
    pub const fn can_do_atomic(&self) -> bool {
        true
    }

    fn client(&self) -> Client {
        Client::TwoWire(self.config.clock)
    }

    /// Single-message transfer.
    ///
    /// # Errors
    ///
    /// See [`transaction`](Self::transaction).
    pub fn transfer(&mut self, address: u8, buffer: Buffer<'_>) -> Result<usize, Error> {
        let mut ops = [match buffer {
            Buffer::Read(buf) => Operation::Read(buf),
            Buffer::Write(bytes) => Operation::Write(bytes),
        }];
        self.transaction(address, &mut ops)
    }

    /// # Errors
    ///
    /// See [`transaction`](Self::transaction).
    pub fn read(&mut self, address: u8, buffer: &mut [u8]) -> Result<usize, Error> {
        self.transfer(address, Buffer::Read(buffer))
    }

    /// # Errors
    ///
    /// See [`transaction`](Self::transaction).
    pub fn write(&mut self, address: u8, bytes: &[u8]) -> Result<usize, Error> {
        self.transfer(address, Buffer::Write(bytes))
    }

    /// Run `operations` against one target as a single bus transaction.
    ///
    /// START is issued once, a repeated START (and a new address byte) only
    /// when the direction changes, STOP once at the end. Adjacent reads are
    /// merged: every byte is ACKed except the final byte of a read run that
    /// is followed by a STOP or a write.
    ///
    /// Returns the number of bytes written and acknowledged plus bytes read.
    ///
    /// # Errors
    ///
    /// Aborts at the first failure. The error carries the byte count up to
    /// that point. A STOP is still attempted before returning. Nothing is
    /// retried.
    pub fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<usize, Error> {
        if address > MAX_ADDRESS {
            return Err(Error::new(ErrorKind::InvalidAddress(address), 0));
        }
        if operations.is_empty() {
            return Ok(0);
        }

        let arbiter = Arc::clone(&self.arbiter);
        let mut bus = arbiter.acquire(self.client());
        let mut transferred = 0;

        let result = self.run(&mut bus, address, operations, &mut transferred);
        match result {
            Ok(()) => {
                self.stop(&mut bus)
                    .map_err(|kind| Error::new(kind, transferred))?;
                Ok(transferred)
            }
            Err(kind) => {
                arbiter.logger().debug(format_args!(
                    "{}: addr {address:#04x}: {kind} after {transferred} bytes",
                    self.client()
                ));
                // Best effort; the original failure is what the caller sees.
                // A held clock cannot frame a STOP, so only let go of SDA.
                let cleanup = if kind == ErrorKind::ClockStretchTimeout {
                    self.setsda(&mut bus, Level::High).map_err(ErrorKind::from)
                } else {
                    self.stop(&mut bus)
                };
                if let Err(err) = cleanup {
                    arbiter
                        .logger()
                        .debug(format_args!("{}: bus cleanup failed: {err}", self.client()));
                }
                Err(Error::new(kind, transferred))
            }
        }
    }

    fn run(
        &mut self,
        bus: &mut Guard<'_, L, Lg>,
        address: u8,
        operations: &mut [Operation<'_>],
        transferred: &mut usize,
    ) -> Result<(), ErrorKind> {
        let mut previous_read: Option<bool> = None;
        for index in 0..operations.len() {
            let next_is_read = matches!(operations.get(index + 1), Some(Operation::Read(_)));
            let Some(op) = operations.get_mut(index) else {
                break;
            };
            let is_read = matches!(op, Operation::Read(_));

            if previous_read != Some(is_read) {
                if previous_read.is_none() {
                    self.start(bus)?;
                } else {
                    self.repeated_start(bus)?;
                }
                let header = (address << 1) | u8::from(is_read);
                if !self.write_byte(bus, header)? {
                    return Err(ErrorKind::AddressNack);
                }
            }
            previous_read = Some(is_read);

            match op {
                Operation::Write(bytes) => {
                    for &byte in bytes.iter() {
                        if !self.write_byte(bus, byte)? {
                            return Err(ErrorKind::DataNack);
                        }
                        *transferred += 1;
                    }
                }
                Operation::Read(buffer) => {
                    let len = buffer.len();
                    for (i, slot) in buffer.iter_mut().enumerate() {
                        *slot = self.read_byte(bus)?;
                        *transferred += 1;
                        let last = i + 1 == len && !next_is_read;
                        self.acknak(bus, !last)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// Check that both lines idle high and can each be driven and read back
    /// independently. SCL read-back is skipped on an output-only clock.
    ///
    /// # Errors
    ///
    /// The first check that failed.
    pub fn self_test(&mut self) -> Result<(), SelfTestError> {
        let arbiter = Arc::clone(&self.arbiter);
        let mut bus = arbiter.acquire(self.client());
        let result = self.check_lines(&mut bus);
        if let Err(err) = result {
            arbiter
                .logger()
                .error(format_args!("{}: self-test failed: {err:?}", self.client()));
        }
        result
    }

    fn check_lines(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), SelfTestError> {
        let readable = !self.config.scl_output_only;
        if bus.get_data()?.is_low() || self.scl_level(bus)?.is_low() {
            return Err(SelfTestError::NotIdle);
        }

        self.setsda(bus, Level::Low)?;
        self.udelay(self.config.delay.ticks());
        if bus.get_data()?.is_high() {
            return Err(SelfTestError::SdaStuckHigh);
        }
        if self.scl_level(bus)?.is_low() {
            return Err(SelfTestError::Crosstalk);
        }

        self.setsda(bus, Level::High)?;
        self.udelay(self.config.delay.ticks());
        if bus.get_data()?.is_low() {
            return Err(SelfTestError::SdaStuckLow);
        }

        self.setscl(bus, Level::Low)?;
        self.udelay(self.config.delay.ticks());
        if readable && bus.get_clock(self.config.clock)?.is_high() {
            return Err(SelfTestError::SclStuckHigh);
        }
        if bus.get_data()?.is_low() {
            return Err(SelfTestError::Crosstalk);
        }

        self.setscl(bus, Level::High)?;
        self.udelay(self.config.delay.ticks());
        if self.scl_level(bus)?.is_low() {
            return Err(SelfTestError::SclStuckLow);
        }
        Ok(())
    }

    /// SCL as read back, or assumed high on an output-only clock.
    fn scl_level(&self, bus: &mut Guard<'_, L, Lg>) -> Result<Level, LineError> {
        if self.config.scl_output_only {
            Ok(Level::High)
        } else {
            bus.get_clock(self.config.clock)
        }
    }

    fn udelay(&mut self, us: u32) {
        if us > 0 {
            self.timer.delay_us(us);
        }
    }

    fn half(&self) -> u32 {
        self.config.delay.ticks() / 2
    }

    fn half_up(&self) -> u32 {
        (self.config.delay.ticks() + 1) / 2
    }

    fn setsda(&self, bus: &mut Guard<'_, L, Lg>, level: Level) -> Result<(), LineError> {
        drive_data(&self.config, bus, level)
    }

    fn setscl(&self, bus: &mut Guard<'_, L, Lg>, level: Level) -> Result<(), LineError> {
        drive_clock(&self.config, bus, level)
    }

    fn sdalo(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        self.setsda(bus, Level::Low)?;
        self.udelay(self.half_up());
        Ok(())
    }

    fn sdahi(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        self.setsda(bus, Level::High)?;
        self.udelay(self.half_up());
        Ok(())
    }

    fn scllo(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        self.setscl(bus, Level::Low)?;
        self.udelay(self.half());
        Ok(())
    }

    /// Release SCL and, when stretching is enabled, wait for it to rise.
    fn sclhi(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        self.setscl(bus, Level::High)?;
        if self.config.clock_stretching() {
            let clock = self.config.clock;
            let timeout = u64::from(self.config.timeout.ticks()) * 1_000;
            let start = self.timer.now();
            while bus.get_clock(clock)?.is_low() {
                let elapsed = self.timer.now().ticks().saturating_sub(start.ticks());
                if elapsed > timeout {
                    // One last look: we may have been descheduled.
                    if bus.get_clock(clock)?.is_high() {
                        break;
                    }
                    return Err(ErrorKind::ClockStretchTimeout);
                }
                core::hint::spin_loop();
            }
        }
        self.udelay(self.config.delay.ticks());
        Ok(())
    }

    fn start(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        // SDA falls while SCL is high.
        self.setsda(bus, Level::Low)?;
        self.udelay(self.config.delay.ticks());
        self.scllo(bus)
    }

    fn repeated_start(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        self.sdahi(bus)?;
        self.sclhi(bus)?;
        self.setsda(bus, Level::Low)?;
        self.udelay(self.config.delay.ticks());
        self.scllo(bus)
    }

    fn stop(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<(), ErrorKind> {
        // SDA rises while SCL is high.
        self.sdalo(bus)?;
        self.sclhi(bus)?;
        self.setsda(bus, Level::High)?;
        self.udelay(self.config.delay.ticks());
        Ok(())
    }

    /// Shift a byte out MSB first and return whether the target ACKed it.
    fn write_byte(&mut self, bus: &mut Guard<'_, L, Lg>, byte: u8) -> Result<bool, ErrorKind> {
        for bit in (0..8).rev() {
            self.setsda(bus, Level::from_bit(byte & (1 << bit) != 0))?;
            self.udelay(self.half_up());
            self.sclhi(bus)?;
            self.scllo(bus)?;
        }
        self.sdahi(bus)?;
        self.sclhi(bus)?;
        let ack = bus.get_data()?.is_low();
        self.scllo(bus)?;
        Ok(ack)
    }

    fn read_byte(&mut self, bus: &mut Guard<'_, L, Lg>) -> Result<u8, ErrorKind> {
        let mut byte = 0u8;
        self.sdahi(bus)?;
        for bit in 0..8 {
            self.sclhi(bus)?;
            byte <<= 1;
            if bus.get_data()?.is_high() {
                byte |= 1;
            }
            self.setscl(bus, Level::Low)?;
            let wait = if bit == 7 {
                self.half()
            } else {
                self.config.delay.ticks()
            };
            self.udelay(wait);
        }
        Ok(byte)
    }

    fn acknak(&mut self, bus: &mut Guard<'_, L, Lg>, ack: bool) -> Result<(), ErrorKind> {
        if ack {
            self.setsda(bus, Level::Low)?;
        }
        self.udelay(self.half_up());
        self.sclhi(bus)?;
        self.scllo(bus)
    }
}

/// Drive the data line high (released) or low, emulating open drain through
/// direction changes when the line is not open drain.
pub(crate) fn drive_data<L: Line, Lg: Logger>(
    config: &TimingConfig,
    bus: &mut Guard<'_, L, Lg>,
    level: Level,
) -> Result<(), LineError> {
    if config.sda_open_drain {
        bus.set_data(level)
    } else {
        bus.data_direction(emulated(level))
    }
}

/// Clock counterpart of [`drive_data`] on the configured clock line.
pub(crate) fn drive_clock<L: Line, Lg: Logger>(
    config: &TimingConfig,
    bus: &mut Guard<'_, L, Lg>,
    level: Level,
) -> Result<(), LineError> {
    if config.scl_open_drain {
        bus.set_clock(config.clock, level)
    } else {
        bus.clock_direction(config.clock, emulated(level))
    }
}

/// Open drain emulated through direction: release is input, drive low is
/// output-low.
fn emulated(level: Level) -> Direction {
    match level {
        Level::High => Direction::Input,
        Level::Low => Direction::Output(Level::Low),
    }
}
