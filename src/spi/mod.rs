// Licensed under the Apache-2.0 license

//! Four-wire (SPI-style) bus bit-banged over shared lines.
//!
//! The data line of the two-wire bus doubles as MOSI. MISO is optional; with
//! `three_wire` set MOSI is turned around and used for input as well.

pub mod bitbang;
pub mod common;
pub mod spi_controller;
mod txrx;

pub use bitbang::{NoChipSelect, SpiBitbang};
pub use common::{BitOrder, Error, ErrorKind, SpiConfig, SpiConfigBuilder, Transfer};
pub use txrx::Duplex;
