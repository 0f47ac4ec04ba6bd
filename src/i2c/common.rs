// Licensed under the Apache-2.0 license

//! Common types for the bit-banged two-wire bus: timing configuration and the
//! transfer error.

use crate::arbiter::ClockLine;
use crate::common::ConfigurationError;
use crate::line::LineError;
use core::fmt;
use fugit::{MicrosDurationU32, MillisDurationU32};

/// Half-bit delay when the clock line can be read back (about 100 kHz).
pub const DEFAULT_DELAY: MicrosDurationU32 = MicrosDurationU32::from_ticks(5);
/// Half-bit delay when the clock line is output-only (about 10 kHz).
pub const OUTPUT_ONLY_DELAY: MicrosDurationU32 = MicrosDurationU32::from_ticks(50);
/// Clock-stretch timeout when none is configured.
pub const DEFAULT_TIMEOUT: MillisDurationU32 = MillisDurationU32::from_ticks(100);

/// Highest 7-bit target address.
pub const MAX_ADDRESS: u8 = 0x7f;

/// Immutable per-bus timing and electrical configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimingConfig {
    /// Half of one bit period.
    pub delay: MicrosDurationU32,
    /// Longest time a target may hold the clock low.
    pub timeout: MillisDurationU32,
    pub sda_open_drain: bool,
    pub scl_open_drain: bool,
    /// The clock line cannot be read back. Disables clock stretching. Lines
    /// carry no readability of their own, so a clock that cannot be sampled
    /// must set this.
    pub scl_output_only: bool,
    /// Clock line this bus is wired to.
    pub clock: ClockLine,
}

impl TimingConfig {
    /// Whether the engine waits for a target holding the clock low. Decided
    /// by [`scl_output_only`](Self::scl_output_only) alone.
    #[must_use]
    pub fn clock_stretching(&self) -> bool {
        !self.scl_output_only
    }

    /// Bus frequency implied by the half-bit delay, in Hz.
    #[must_use]
    pub fn bus_frequency(&self) -> u32 {
        500_000 / self.delay.ticks().max(1)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            delay: DEFAULT_DELAY,
            timeout: DEFAULT_TIMEOUT,
            sda_open_drain: true,
            scl_open_drain: true,
            scl_output_only: false,
            clock: ClockLine::Primary,
        }
    }
}

/// Builder for [`TimingConfig`]. Unset fields take the documented defaults.
#[derive(Copy, Clone, Debug)]
pub struct TimingConfigBuilder {
    delay: Option<MicrosDurationU32>,
    timeout: Option<MillisDurationU32>,
    sda_open_drain: bool,
    scl_open_drain: bool,
    scl_output_only: bool,
    clock: ClockLine,
}

impl Default for TimingConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TimingConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self {
            delay: None,
            timeout: None,
            sda_open_drain: true,
            scl_open_drain: true,
            scl_output_only: false,
            clock: ClockLine::Primary,
        }
    }
    #[must_use]
    pub fn delay(mut self, delay: MicrosDurationU32) -> Self {
        self.delay = Some(delay);
        self
    }
    #[must_use]
    pub fn timeout(mut self, timeout: MillisDurationU32) -> Self {
        self.timeout = Some(timeout);
        self
    }
    #[must_use]
    pub fn sda_open_drain(mut self, enabled: bool) -> Self {
        self.sda_open_drain = enabled;
        self
    }
    #[must_use]
    pub fn scl_open_drain(mut self, enabled: bool) -> Self {
        self.scl_open_drain = enabled;
        self
    }
    #[must_use]
    pub fn scl_output_only(mut self, enabled: bool) -> Self {
        self.scl_output_only = enabled;
        self
    }
    #[must_use]
    pub fn clock(mut self, clock: ClockLine) -> Self {
        self.clock = clock;
        self
    }

    /// # Errors
    ///
    /// Returns an error if an explicit delay or timeout of zero was given.
    pub fn build(self) -> Result<TimingConfig, ConfigurationError> {
        let delay = match self.delay {
            Some(delay) if delay.ticks() == 0 => return Err(ConfigurationError::ZeroDelay),
            Some(delay) => delay,
            None if self.scl_output_only => OUTPUT_ONLY_DELAY,
            None => DEFAULT_DELAY,
        };
        let timeout = match self.timeout {
            Some(timeout) if timeout.ticks() == 0 => {
                return Err(ConfigurationError::ZeroTimeout)
            }
            Some(timeout) => timeout,
            None => DEFAULT_TIMEOUT,
        };
        Ok(TimingConfig {
            delay,
            timeout,
            sda_open_drain: self.sda_open_drain,
            scl_open_drain: self.scl_open_drain,
            scl_output_only: self.scl_output_only,
            clock: self.clock,
        })
    }
}

/// Direction and data of a single-message transfer.
#[derive(Debug)]
pub enum Buffer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
}

/// Why a two-wire transaction stopped.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// No ACK after the address byte.
    AddressNack,
    /// No ACK after a written data byte.
    DataNack,
    /// The target held the clock low past the timeout.
    ClockStretchTimeout,
    /// Address above 0x7f.
    InvalidAddress(u8),
    Line(LineError),
}

impl From<LineError> for ErrorKind {
    fn from(err: LineError) -> Self {
        ErrorKind::Line(err)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AddressNack => write!(f, "address not acknowledged"),
            Self::DataNack => write!(f, "data byte not acknowledged"),
            Self::ClockStretchTimeout => write!(f, "clock stretch timeout"),
            Self::InvalidAddress(addr) => write!(f, "invalid 7-bit address {addr:#04x}"),
            Self::Line(err) => write!(f, "{err}"),
        }
    }
}

/// Failed transaction: the failure kind plus how many bytes made it across
/// before the failure.
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

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} after {} bytes", self.kind, self.transferred)
    }
}

/// Bus self-test failures.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SelfTestError {
    /// SDA or SCL not high while idle.
    NotIdle,
    SdaStuckHigh,
    SdaStuckLow,
    SclStuckHigh,
    SclStuckLow,
    /// Toggling one line moved the other.
    Crosstalk,
    Line(LineError),
}

impl From<LineError> for SelfTestError {
    fn from(err: LineError) -> Self {
        SelfTestError::Line(err)
    }
}
