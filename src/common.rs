// Licensed under the Apache-2.0 license

//! Shared plumbing: the logger seam used by every bus component and the
//! configuration error returned by the builders.

use core::fmt;

/// Destination for diagnostic messages emitted by the arbiter, the engines and
/// the fault injector.
///
/// Messages are passed as [`fmt::Arguments`] so nothing is formatted unless the
/// logger actually records it. Implementations must be shareable because one
/// logger instance is owned by the [`Arbiter`](crate::arbiter::Arbiter) and
/// used from every thread that touches the bus.
pub trait Logger: Send + Sync {
    fn debug(&self, args: fmt::Arguments<'_>);
    fn info(&self, args: fmt::Arguments<'_>);
    fn error(&self, args: fmt::Arguments<'_>);
}

/// Logger that drops everything. Default type parameter for all controllers.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoOpLogger;

impl Logger for NoOpLogger {
    fn debug(&self, _args: fmt::Arguments<'_>) {}
    fn info(&self, _args: fmt::Arguments<'_>) {}
    fn error(&self, _args: fmt::Arguments<'_>) {}
}

/// Forwards to the `log` facade under the given target.
#[derive(Clone, Copy, Debug)]
pub struct LogFacade {
    target: &'static str,
}

impl LogFacade {
    #[must_use]
    pub const fn new(target: &'static str) -> Self {
        Self { target }
    }
}

impl Default for LogFacade {
    fn default() -> Self {
        Self::new("bitbang_mux")
    }
}

impl Logger for LogFacade {
    fn debug(&self, args: fmt::Arguments<'_>) {
        log::debug!(target: self.target, "{args}");
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        log::info!(target: self.target, "{args}");
    }

    fn error(&self, args: fmt::Arguments<'_>) {
        log::error!(target: self.target, "{args}");
    }
}

/// Rejected configuration. Always reported before any line is touched.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ConfigurationError {
    /// Half-bit delay of zero.
    ZeroDelay,
    /// Clock-stretch timeout of zero.
    ZeroTimeout,
    /// The selected clock line is not part of the line set.
    ClockUnavailable,
    /// Word width outside 1..=32.
    InvalidWordSize(u8),
    /// Clock frequency of zero.
    ZeroSpeed,
    /// Transmit and receive buffers of different lengths in one transfer.
    BufferLengthMismatch,
    /// Simultaneous transmit and receive requested on a 3-wire bus.
    HalfDuplexViolation,
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroDelay => write!(f, "half-bit delay must be non-zero"),
            Self::ZeroTimeout => write!(f, "clock-stretch timeout must be non-zero"),
            Self::ClockUnavailable => write!(f, "selected clock line is not present"),
            Self::InvalidWordSize(bits) => write!(f, "word size {bits} outside 1..=32"),
            Self::ZeroSpeed => write!(f, "clock frequency must be non-zero"),
            Self::BufferLengthMismatch => write!(f, "tx and rx buffers differ in length"),
            Self::HalfDuplexViolation => write!(f, "3-wire bus cannot transmit and receive at once"),
        }
    }
}
