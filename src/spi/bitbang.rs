// Licensed under the Apache-2.0 license

//! Bit-banged four-wire engine.
//!
//! A message is a slice of [`Transfer`] segments clocked under one arbiter
//! lock with chip select held active throughout. Everything a message asks
//! for is validated before the lock is taken.

use crate::arbiter::{Arbiter, BusGuard, Client, ClockLine};
use crate::common::{ConfigurationError, Logger, NoOpLogger};
use crate::line::{Direction, Level, Line, LineError};
use crate::spi::common::{
    check_bits, check_speed, word_mask, Error, ErrorKind, SpiConfig, Transfer,
};
use crate::spi::txrx::{select, Duplex, Shifter};
use crate::timer::BitTimer;
use core::convert::Infallible;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::Polarity;
use std::sync::Arc;
use std::vec::Vec;

/// Placeholder for buses whose chip select is handled elsewhere.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoChipSelect;

impl embedded_hal::digital::ErrorType for NoChipSelect {
    type Error = Infallible;
}

impl OutputPin for NoChipSelect {
    fn set_low(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}

/// Source and sink of the words in one segment.
pub(crate) trait WordStream {
    fn tx(&self, index: usize) -> u32;
    fn rx(&mut self, index: usize, word: u32);
}

impl WordStream for Transfer<'_> {
    fn tx(&self, index: usize) -> u32 {
        self.tx.and_then(|tx| tx.get(index)).copied().unwrap_or(0)
    }

    fn rx(&mut self, index: usize, word: u32) {
        if let Some(slot) = self.rx.as_mut().and_then(|rx| rx.get_mut(index)) {
            *slot = word;
        }
    }
}

/// Validated shape of one segment.
#[derive(Copy, Clone, Debug)]
pub(crate) struct Segment {
    pub len: usize,
    pub bits: u8,
    pub half_period_ns: u32,
    pub tx: bool,
    pub rx: bool,
}

pub struct SpiBitbang<L: Line, T: BitTimer, Lg: Logger = NoOpLogger, CS = NoChipSelect> {
    arbiter: Arc<Arbiter<L, Lg>>,
    timer: T,
    config: SpiConfig,
    cs: Option<CS>,
}

impl<L: Line, T: BitTimer, Lg: Logger> SpiBitbang<L, T, Lg, NoChipSelect> {
    /// # Errors
    ///
    /// Invalid word width or clock frequency in `config`.
    pub fn new(
        arbiter: Arc<Arbiter<L, Lg>>,
        timer: T,
        config: SpiConfig,
    ) -> Result<Self, ConfigurationError> {
        Self::build(arbiter, timer, config, None)
    }
}

impl<L: Line, T: BitTimer, Lg: Logger, CS: OutputPin> SpiBitbang<L, T, Lg, CS> {
    /// Same as [`SpiBitbang::new`] with a chip select pin driven around every
    /// message.
    ///
    /// # Errors
    ///
    /// Invalid word width or clock frequency in `config`.
    pub fn with_chip_select(
        arbiter: Arc<Arbiter<L, Lg>>,
        timer: T,
        config: SpiConfig,
        cs: CS,
    ) -> Result<Self, ConfigurationError> {
        Self::build(arbiter, timer, config, Some(cs))
    }

    fn build(
        arbiter: Arc<Arbiter<L, Lg>>,
        timer: T,
        config: SpiConfig,
        cs: Option<CS>,
    ) -> Result<Self, ConfigurationError> {
        check_bits(config.bits_per_word)?;
        check_speed(config.speed)?;
        arbiter.logger().info(format_args!(
            "spi: {:?} {:?} {} bits at {} Hz{}",
            config.mode,
            config.bit_order,
            config.bits_per_word,
            config.speed.raw(),
            if config.three_wire { ", 3-wire" } else { "" },
        ));
        Ok(Self {
            arbiter,
            timer,
            config,
            cs,
        })
    }

    #[must_use]
    pub fn config(&self) -> &SpiConfig {
        &self.config
    }

    #[must_use]
    pub fn arbiter(&self) -> &Arc<Arbiter<L, Lg>> {
        &self.arbiter
    }

    /// Clock every segment of a message. Returns the number of words clocked.
    ///
    /// # Errors
    ///
    /// Configuration errors before any line activity. Line failures abort the
    /// message; chip select is still released.
    pub fn transfer(&mut self, transfers: &mut [Transfer<'_>]) -> Result<usize, Error> {
        let segments = transfers
            .iter()
            .map(|t| self.segment(t))
            .collect::<Result<Vec<_>, _>>()?;
        let arbiter = Arc::clone(&self.arbiter);
        let mut bus = arbiter.acquire(Client::FourWire);
        let mut transferred = 0;

        let result = self.chipselect(&mut bus, true).and_then(|()| {
            transfers
                .iter_mut()
                .zip(segments)
                .try_for_each(|(t, segment)| self.shift(&mut bus, segment, t, &mut transferred))
        });
        let deselect = self.chipselect(&mut bus, false);
        match result.and(deselect) {
            Ok(()) => Ok(transferred),
            Err(err) => {
                arbiter
                    .logger()
                    .debug(format_args!("spi: {err} after {transferred} words"));
                Err(Error::new(ErrorKind::Line(err), transferred))
            }
        }
    }

    /// # Errors
    ///
    /// See [`transfer`](Self::transfer).
    pub fn write_words(&mut self, words: &[u32]) -> Result<usize, Error> {
        self.transfer(&mut [Transfer::write(words)])
    }

    /// # Errors
    ///
    /// See [`transfer`](Self::transfer).
    pub fn read_words(&mut self, words: &mut [u32]) -> Result<usize, Error> {
        self.transfer(&mut [Transfer::read(words)])
    }

    /// Clock `len` words through `stream` as one message.
    pub(crate) fn transfer_stream<S: WordStream>(
        &mut self,
        len: usize,
        bits: Option<u8>,
        (tx, rx): (bool, bool),
        stream: &mut S,
    ) -> Result<usize, Error> {
        let segment = self.shape(len, bits, None, tx, rx)?;
        let arbiter = Arc::clone(&self.arbiter);
        let mut bus = arbiter.acquire(Client::FourWire);
        let mut transferred = 0;
        let result = self
            .chipselect(&mut bus, true)
            .and_then(|()| self.shift(&mut bus, segment, stream, &mut transferred));
        let deselect = self.chipselect(&mut bus, false);
        result
            .and(deselect)
            .map(|()| transferred)
            .map_err(|err| Error::new(ErrorKind::Line(err), transferred))
    }

    fn segment(&self, t: &Transfer<'_>) -> Result<Segment, ConfigurationError> {
        let len = t.len()?;
        self.shape(len, t.bits_per_word, t.speed, t.tx.is_some(), t.rx.is_some())
    }

    fn shape(
        &self,
        len: usize,
        bits: Option<u8>,
        speed: Option<fugit::HertzU32>,
        tx: bool,
        rx: bool,
    ) -> Result<Segment, ConfigurationError> {
        if self.config.three_wire && tx && rx {
            return Err(ConfigurationError::HalfDuplexViolation);
        }
        let bits = check_bits(bits.unwrap_or(self.config.bits_per_word))?;
        let speed = check_speed(speed.unwrap_or(self.config.speed))?;
        Ok(Segment {
            len,
            bits,
            half_period_ns: SpiConfig::half_period_ns(speed),
            tx,
            rx,
        })
    }

    fn idle_high(&self) -> bool {
        self.config.mode.polarity == Polarity::IdleHigh
    }

    /// Park the clock at its idle level, then drive chip select.
    fn chipselect(
        &mut self,
        bus: &mut BusGuard<'_, L, Lg>,
        active: bool,
    ) -> Result<(), LineError> {
        if active {
            bus.set_clock(ClockLine::Primary, Level::from_bit(self.idle_high()))?;
        }
        let Some(cs) = self.cs.as_mut() else {
            return Ok(());
        };
        let high = active == self.config.cs_high;
        let res = if high { cs.set_high() } else { cs.set_low() };
        res.map_err(|_| LineError::Io)
    }

    /// Turn MOSI around on a 3-wire bus.
    fn set_direction(
        &mut self,
        bus: &mut BusGuard<'_, L, Lg>,
        output: bool,
    ) -> Result<(), LineError> {
        if output {
            return bus.data_direction(Direction::Output(Level::High));
        }
        bus.data_direction(Direction::Input)?;
        if self.config.three_wire_hiz {
            let idle = self.idle_high();
            bus.set_clock(ClockLine::Primary, Level::from_bit(!idle))?;
            bus.set_clock(ClockLine::Primary, Level::from_bit(idle))?;
        }
        Ok(())
    }

    fn shift<S: WordStream>(
        &mut self,
        bus: &mut BusGuard<'_, L, Lg>,
        segment: Segment,
        stream: &mut S,
        transferred: &mut usize,
    ) -> Result<(), LineError> {
        let duplex = if self.config.three_wire {
            self.set_direction(bus, segment.tx)?;
            if segment.tx {
                Duplex::TxOnly
            } else {
                Duplex::RxOnly
            }
        } else if segment.rx && self.arbiter.has_miso() {
            Duplex::Full
        } else {
            Duplex::TxOnly
        };
        let word_fn = select::<L, T, Lg>(self.config.mode, self.config.bit_order, duplex);
        let mask = word_mask(segment.bits);
        let mut shifter = Shifter {
            bus,
            timer: &mut self.timer,
            half_period_ns: segment.half_period_ns,
        };
        for index in 0..segment.len {
            let word = word_fn(&mut shifter, stream.tx(index) & mask, segment.bits)?;
            stream.rx(index, word & mask);
            *transferred += 1;
        }
        Ok(())
    }
}
