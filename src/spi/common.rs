// Licensed under the Apache-2.0 license

//! Configuration, transfer descriptors and errors for the bit-banged
//! four-wire bus.

use crate::common::ConfigurationError;
use crate::line::LineError;
use core::fmt;
use embedded_hal::spi::{Mode, MODE_0};
use fugit::HertzU32;

pub const DEFAULT_BITS_PER_WORD: u8 = 8;
pub const DEFAULT_SPEED: HertzU32 = HertzU32::from_raw(100_000);
pub const MAX_BITS_PER_WORD: u8 = 32;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BitOrder {
    MsbFirst,
    LsbFirst,
}

/// Per-device bus configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SpiConfig {
    pub mode: Mode,
    pub bit_order: BitOrder,
    pub bits_per_word: u8,
    pub speed: HertzU32,
    /// MOSI doubles as the input line (half duplex).
    pub three_wire: bool,
    /// Pulse the clock once with MOSI undriven when turning it around to input.
    pub three_wire_hiz: bool,
    /// Chip select is active high.
    pub cs_high: bool,
}

impl SpiConfig {
    /// Nanoseconds per clock half period at `speed`.
    #[must_use]
    pub fn half_period_ns(speed: HertzU32) -> u32 {
        1_000_000_000 / speed.raw().saturating_mul(2).max(1)
    }
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            mode: MODE_0,
            bit_order: BitOrder::MsbFirst,
            bits_per_word: DEFAULT_BITS_PER_WORD,
            speed: DEFAULT_SPEED,
            three_wire: false,
            three_wire_hiz: false,
            cs_high: false,
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct SpiConfigBuilder {
    config: SpiConfig,
}

impl SpiConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
    #[must_use]
    pub fn mode(mut self, mode: Mode) -> Self {
        self.config.mode = mode;
        self
    }
    #[must_use]
    pub fn bit_order(mut self, order: BitOrder) -> Self {
        self.config.bit_order = order;
        self
    }
    #[must_use]
    pub fn bits_per_word(mut self, bits: u8) -> Self {
        self.config.bits_per_word = bits;
        self
    }
    #[must_use]
    pub fn speed(mut self, speed: HertzU32) -> Self {
        self.config.speed = speed;
        self
    }
    #[must_use]
    pub fn three_wire(mut self, enabled: bool) -> Self {
        self.config.three_wire = enabled;
        self
    }
    #[must_use]
    pub fn three_wire_hiz(mut self, enabled: bool) -> Self {
        self.config.three_wire_hiz = enabled;
        self
    }
    #[must_use]
    pub fn cs_high(mut self, enabled: bool) -> Self {
        self.config.cs_high = enabled;
        self
    }

    /// # Errors
    ///
    /// Word width outside 1..=32 or a zero clock frequency.
    pub fn build(self) -> Result<SpiConfig, ConfigurationError> {
        check_bits(self.config.bits_per_word)?;
        check_speed(self.config.speed)?;
        Ok(self.config)
    }
}

pub(crate) fn check_bits(bits: u8) -> Result<u8, ConfigurationError> {
    if (1..=MAX_BITS_PER_WORD).contains(&bits) {
        Ok(bits)
    } else {
        Err(ConfigurationError::InvalidWordSize(bits))
    }
}

pub(crate) fn check_speed(speed: HertzU32) -> Result<HertzU32, ConfigurationError> {
    if speed.raw() == 0 {
        Err(ConfigurationError::ZeroSpeed)
    } else {
        Ok(speed)
    }
}

/// Mask selecting the low `bits` bits of a word.
#[must_use]
pub(crate) fn word_mask(bits: u8) -> u32 {
    u32::MAX >> (32 - u32::from(bits.clamp(1, 32)))
}

/// One segment of a message. Words are right-aligned in `u32` whatever the
/// width.
#[derive(Debug, Default)]
pub struct Transfer<'a> {
    pub tx: Option<&'a [u32]>,
    pub rx: Option<&'a mut [u32]>,
    /// Overrides the configured word width for this segment.
    pub bits_per_word: Option<u8>,
    /// Overrides the configured clock for this segment.
    pub speed: Option<HertzU32>,
}

impl<'a> Transfer<'a> {
    #[must_use]
    pub fn write(tx: &'a [u32]) -> Self {
        Self {
            tx: Some(tx),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn read(rx: &'a mut [u32]) -> Self {
        Self {
            rx: Some(rx),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn duplex(tx: &'a [u32], rx: &'a mut [u32]) -> Self {
        Self {
            tx: Some(tx),
            rx: Some(rx),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn bits(mut self, bits: u8) -> Self {
        self.bits_per_word = Some(bits);
        self
    }

    #[must_use]
    pub fn with_speed(mut self, speed: HertzU32) -> Self {
        self.speed = Some(speed);
        self
    }

    /// Number of words this segment clocks.
    ///
    /// # Errors
    ///
    /// Both buffers present with different lengths.
    pub fn len(&self) -> Result<usize, ConfigurationError> {
        match (&self.tx, &self.rx) {
            (Some(tx), Some(rx)) if tx.len() != rx.len() => {
                Err(ConfigurationError::BufferLengthMismatch)
            }
            (Some(tx), _) => Ok(tx.len()),
            (None, Some(rx)) => Ok(rx.len()),
            (None, None) => Ok(0),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration(ConfigurationError),
    /// A line or the chip select failed.
    Line(LineError),
}

impl From<LineError> for ErrorKind {
    fn from(err: LineError) -> Self {
        ErrorKind::Line(err)
    }
}

impl From<ConfigurationError> for ErrorKind {
    fn from(err: ConfigurationError) -> Self {
        ErrorKind::Configuration(err)
    }
}

/// Failed transfer and the number of words fully clocked before it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Error {
    pub kind: ErrorKind,
    pub transferred: usize,
}

impl Error {
    #[must_use]
    pub const fn new(kind: ErrorKind, transferred: usize) -> Self {
        Self { kind, transferred }
    }
}

impl From<ConfigurationError> for Error {
    fn from(err: ConfigurationError) -> Self {
        Error::new(ErrorKind::Configuration(err), 0)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ErrorKind::Configuration(err) => write!(f, "{err}"),
            ErrorKind::Line(err) => write!(f, "{err} after {} words", self.transferred),
        }
    }
}

impl embedded_hal::spi::Error for Error {
    fn kind(&self) -> embedded_hal::spi::ErrorKind {
        embedded_hal::spi::ErrorKind::Other
    }
}
