// Licensed under the Apache-2.0 license

//! `embedded_hal::spi::SpiBus<u8>` on top of [`SpiBitbang`]. Every call is
//! one message of 8-bit words, whatever width the bus is configured for.

use crate::common::Logger;
use crate::line::Line;
use crate::spi::bitbang::{SpiBitbang, WordStream};
use crate::spi::common::Error;
use crate::timer::BitTimer;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;

const BYTE: Option<u8> = Some(8);

struct Bytes<'a, 'b> {
    read: &'a mut [u8],
    write: &'b [u8],
}

impl WordStream for Bytes<'_, '_> {
    fn tx(&self, index: usize) -> u32 {
        self.write.get(index).copied().map_or(0, u32::from)
    }

    fn rx(&mut self, index: usize, word: u32) {
        if let Some(slot) = self.read.get_mut(index) {
            *slot = word as u8;
        }
    }
}

struct InPlace<'a>(&'a mut [u8]);

impl WordStream for InPlace<'_> {
    fn tx(&self, index: usize) -> u32 {
        self.0.get(index).copied().map_or(0, u32::from)
    }

    fn rx(&mut self, index: usize, word: u32) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = word as u8;
        }
    }
}

impl<L: Line, T: BitTimer, Lg: Logger, CS: OutputPin> embedded_hal::spi::ErrorType
    for SpiBitbang<L, T, Lg, CS>
{
    type Error = Error;
}

impl<L: Line, T: BitTimer, Lg: Logger, CS: OutputPin> SpiBus<u8> for SpiBitbang<L, T, Lg, CS> {
    fn read(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let len = words.len();
        let mut stream = Bytes {
            read: words,
            write: &[],
        };
        self.transfer_stream(len, BYTE, (false, true), &mut stream)
            .map(drop)
    }

    fn write(&mut self, words: &[u8]) -> Result<(), Self::Error> {
        let mut stream = Bytes {
            read: &mut [],
            write: words,
        };
        self.transfer_stream(words.len(), BYTE, (true, false), &mut stream)
            .map(drop)
    }

    fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Self::Error> {
        let len = read.len().max(write.len());
        let mut stream = Bytes { read, write };
        self.transfer_stream(len, BYTE, (true, true), &mut stream)
            .map(drop)
    }

    fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Self::Error> {
        let len = words.len();
        self.transfer_stream(len, BYTE, (true, true), &mut InPlace(words))
            .map(drop)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
