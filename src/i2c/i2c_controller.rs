// Licensed under the Apache-2.0 license

//! `embedded-hal` front for the bit-banged two-wire engine, so any
//! `embedded_hal::i2c::I2c` driver can sit on top of shared lines.

use crate::common::Logger;
use crate::i2c::bitbang::I2cBitbang;
use crate::i2c::common::{Error, ErrorKind};
use crate::line::Line;
use crate::timer::BitTimer;
use embedded_hal::i2c::{NoAcknowledgeSource, Operation, SevenBitAddress};

impl embedded_hal::i2c::Error for Error {
    fn kind(&self) -> embedded_hal::i2c::ErrorKind {
        match self.kind {
            ErrorKind::AddressNack => {
                embedded_hal::i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
            }
            ErrorKind::DataNack => {
                embedded_hal::i2c::ErrorKind::NoAcknowledge(NoAcknowledgeSource::Data)
            }
            ErrorKind::ClockStretchTimeout => embedded_hal::i2c::ErrorKind::Bus,
            ErrorKind::InvalidAddress(_) | ErrorKind::Line(_) => {
                embedded_hal::i2c::ErrorKind::Other
            }
        }
    }
}

impl<L: Line, T: BitTimer, Lg: Logger> embedded_hal::i2c::ErrorType for I2cBitbang<L, T, Lg> {
    type Error = Error;
}

impl<L: Line, T: BitTimer, Lg: Logger> embedded_hal::i2c::I2c for I2cBitbang<L, T, Lg> {
    fn read(&mut self, addr: SevenBitAddress, buffer: &mut [u8]) -> Result<(), Self::Error> {
        I2cBitbang::read(self, addr, buffer).map(drop)
    }

    fn write(&mut self, addr: SevenBitAddress, bytes: &[u8]) -> Result<(), Self::Error> {
        I2cBitbang::write(self, addr, bytes).map(drop)
    }

    fn write_read(
        &mut self,
        addr: SevenBitAddress,
        bytes: &[u8],
        buffer: &mut [u8],
    ) -> Result<(), Self::Error> {
        let mut ops = [Operation::Write(bytes), Operation::Read(buffer)];
        I2cBitbang::transaction(self, addr, &mut ops).map(drop)
    }

    fn transaction(
        &mut self,
        addr: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        I2cBitbang::transaction(self, addr, operations).map(drop)
    }
}
