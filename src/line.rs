// Licensed under the Apache-2.0 license

//! Minimal capability set over one physical digital line.
//!
//! Every call may block: lines can sit behind a sleep-capable access path
//! (an I2C GPIO expander, a character device, ...). The protocol engines only
//! ever talk to lines through [`Line`], so how a line is physically sourced is
//! irrelevant to them.

use core::fmt;
use embedded_hal::digital::{InputPin, OutputPin, PinState};

/// Logic level of a line.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Level {
    Low,
    High,
}

impl Level {
    #[must_use]
    pub const fn from_bit(bit: bool) -> Self {
        if bit {
            Level::High
        } else {
            Level::Low
        }
    }

    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    #[must_use]
    pub const fn is_low(self) -> bool {
        matches!(self, Level::Low)
    }
}

impl From<bool> for Level {
    fn from(bit: bool) -> Self {
        Level::from_bit(bit)
    }
}

impl From<Level> for PinState {
    fn from(level: Level) -> Self {
        match level {
            Level::Low => PinState::Low,
            Level::High => PinState::High,
        }
    }
}

impl core::ops::Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

/// Requested line direction. Output carries the level to drive immediately.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output(Level),
}

/// Failures surfaced by a line implementation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LineError {
    /// The line is not present or was taken away.
    Unavailable,
    /// The line refused the direction change.
    DirectionRejected,
    /// Reading or writing the level failed.
    Io,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unavailable => write!(f, "line unavailable"),
            Self::DirectionRejected => write!(f, "direction change rejected"),
            Self::Io => write!(f, "line i/o failed"),
        }
    }
}

impl embedded_hal::digital::Error for LineError {
    fn kind(&self) -> embedded_hal::digital::ErrorKind {
        embedded_hal::digital::ErrorKind::Other
    }
}

/// One digital line.
pub trait Line {
    /// Drive the output level. On an open-drain line `High` releases the line.
    fn set(&mut self, level: Level) -> Result<(), LineError>;

    /// Sample the level currently present on the line.
    fn get(&mut self) -> Result<Level, LineError>;

    /// Switch between input and output.
    fn set_direction(&mut self, direction: Direction) -> Result<(), LineError>;
}

impl<T: Line + ?Sized> Line for &mut T {
    fn set(&mut self, level: Level) -> Result<(), LineError> {
        T::set(self, level)
    }

    fn get(&mut self) -> Result<Level, LineError> {
        T::get(self)
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), LineError> {
        T::set_direction(self, direction)
    }
}

/// Adapts an `embedded-hal` open-drain pin to [`Line`].
///
/// An open-drain pin has no separate input mode: switching to input is a
/// release (drive high) and switching to output drives the requested level.
pub struct PinLine<P> {
    pin: P,
}

impl<P> PinLine<P>
where
    P: OutputPin + InputPin,
{
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    pub fn into_inner(self) -> P {
        self.pin
    }
}

impl<P> Line for PinLine<P>
where
    P: OutputPin + InputPin,
{
    fn set(&mut self, level: Level) -> Result<(), LineError> {
        self.pin.set_state(level.into()).map_err(|_| LineError::Io)
    }

    fn get(&mut self) -> Result<Level, LineError> {
        self.pin
            .is_high()
            .map(Level::from_bit)
            .map_err(|_| LineError::Io)
    }

    fn set_direction(&mut self, direction: Direction) -> Result<(), LineError> {
        let level = match direction {
            Direction::Input => Level::High,
            Direction::Output(level) => level,
        };
        self.pin
            .set_state(level.into())
            .map_err(|_| LineError::DirectionRejected)
    }
}
