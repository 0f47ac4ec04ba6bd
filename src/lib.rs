// Licensed under the Apache-2.0 license

// Enforce Copilot coding guidelines - prevent panic-prone patterns in production code only
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::indexing_slicing))]
#![cfg_attr(not(test), warn(clippy::expect_used))]

//! Software two-wire and four-wire buses multiplexed over one shared set of
//! digital lines, plus a two-wire fault injector for exercising bus masters.
//!
//! ```text
//!   I2cBitbang ─┐
//!   SpiBitbang ─┼─> Arbiter (one lock) ─> LineSet { sck, sck2?, mosi/sda, miso? }
//!   FaultInjector ┘
//! ```

pub mod arbiter;
pub mod common;
pub mod fault;
pub mod i2c;
pub mod line;
pub mod spi;
pub mod timer;

#[cfg(test)]
mod tests;

pub use arbiter::{Arbiter, BusGuard, Client, ClockLine, LineSet};
pub use common::{ConfigurationError, LogFacade, Logger, NoOpLogger};
pub use line::{Direction, Level, Line, LineError, PinLine};
pub use timer::{BitTimer, StdTimer};
