// Licensed under the Apache-2.0 license

//! Two-wire (I2C-style) bus bit-banged over shared lines.
//!
//! [`I2cBitbang`] drives START, address, ACK, data and STOP on a clock and a
//! data line borrowed from the [`Arbiter`](crate::arbiter::Arbiter) for one
//! transaction at a time. It also implements `embedded_hal::i2c::I2c`.

pub mod bitbang;
pub mod common;
pub mod i2c_controller;

pub use bitbang::I2cBitbang;
pub use common::{Buffer, Error, ErrorKind, SelfTestError, TimingConfig, TimingConfigBuilder};
