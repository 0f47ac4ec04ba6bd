// Licensed under the Apache-2.0 license

//! Named diagnostic controls and the injector error.

use crate::line::LineError;
use core::fmt;

/// Longest delay an interrupt-triggered scenario may hold the bus, in µs.
pub const MAX_IRQ_DELAY_US: u32 = 100_000;

/// One individually addressable diagnostic control.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    /// Raw clock level, read/write.
    Scl,
    /// Raw data level, read/write.
    Sda,
    /// Write a 7-bit address.
    IncompleteAddressPhase,
    /// Write a 7-bit address.
    IncompleteWriteByte,
    /// Write a delay in µs.
    LoseArbitration,
    /// Write a delay in µs.
    InjectPanic,
}

impl Control {
    pub const ALL: [Control; 6] = [
        Control::Scl,
        Control::Sda,
        Control::IncompleteAddressPhase,
        Control::IncompleteWriteByte,
        Control::LoseArbitration,
        Control::InjectPanic,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Control::Scl => "scl",
            Control::Sda => "sda",
            Control::IncompleteAddressPhase => "incomplete_address_phase",
            Control::IncompleteWriteByte => "incomplete_write_byte",
            Control::LoseArbitration => "lose_arbitration",
            Control::InjectPanic => "inject_panic",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Control> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Only exists when the clock can be read back and an interrupt source
    /// is attached.
    #[must_use]
    pub const fn needs_irq(self) -> bool {
        matches!(self, Control::LoseArbitration | Control::InjectPanic)
    }

    #[must_use]
    pub const fn is_readable(self) -> bool {
        matches!(self, Control::Scl | Control::Sda)
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    /// Address above 0x7f.
    InvalidAddress(u64),
    /// Delay above [`MAX_IRQ_DELAY_US`].
    DelayOutOfRange(u64),
    /// No interrupt source for the clock line.
    IrqUnavailable,
    /// The interrupt source refused the request.
    IrqRequest,
    /// The wait was cancelled before the interrupt fired.
    Interrupted,
    /// The control does not exist on this injector.
    ControlUnavailable(Control),
    /// The control is write-only.
    NotReadable(Control),
    Line(LineError),
}

impl From<LineError> for Error {
    fn from(err: LineError) -> Self {
        Error::Line(err)
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidAddress(addr) => write!(f, "invalid 7-bit address {addr:#x}"),
            Self::DelayOutOfRange(us) => {
                write!(f, "delay {us} us exceeds {MAX_IRQ_DELAY_US} us")
            }
            Self::IrqUnavailable => write!(f, "no interrupt for the clock line"),
            Self::IrqRequest => write!(f, "interrupt request failed"),
            Self::Interrupted => write!(f, "wait interrupted"),
            Self::ControlUnavailable(c) => write!(f, "control {c} not available"),
            Self::NotReadable(c) => write!(f, "control {c} is write-only"),
            Self::Line(err) => write!(f, "{err}"),
        }
    }
}
