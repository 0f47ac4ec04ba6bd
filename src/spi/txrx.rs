// Licensed under the Apache-2.0 license

//! Word shifters.
//!
//! One shifter per clock mode, bit order and duplex shape, each stamped out
//! from [`txrx`] through const generics so the per-bit loop carries no
//! configuration branches. [`select`] picks one for a transfer.
//!
//! Phase 0 drives the data bit before the leading clock edge and samples on
//! it. Phase 1 drives after the leading edge and samples on the trailing one.
//! MOSI is only written when the outgoing bit differs from the previous one.

use crate::arbiter::{BusGuard, ClockLine};
use crate::common::Logger;
use crate::line::{Level, Line, LineError};
use crate::spi::common::BitOrder;
use crate::timer::BitTimer;
use embedded_hal::spi::{Mode, Phase, Polarity};

const RX_NONE: u8 = 0;
const RX_MISO: u8 = 1;
/// Sample the data line itself (3-wire receive).
const RX_DATA: u8 = 2;

/// Which directions a transfer actually uses.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Duplex {
    /// Drive MOSI and sample MISO.
    Full,
    /// Drive MOSI only.
    TxOnly,
    /// Sample the data line only; MOSI is an input.
    RxOnly,
}

/// Line access and timing for one transfer.
pub(crate) struct Shifter<'s, 'a, L: Line, T, Lg: Logger> {
    pub bus: &'s mut BusGuard<'a, L, Lg>,
    pub timer: &'s mut T,
    pub half_period_ns: u32,
}

impl<L: Line, T: BitTimer, Lg: Logger> Shifter<'_, '_, L, T, Lg> {
    #[inline(always)]
    fn sck(&mut self, high: bool) -> Result<(), LineError> {
        self.bus.set_clock(ClockLine::Primary, Level::from_bit(high))
    }

    #[inline(always)]
    fn mosi(&mut self, high: bool) -> Result<(), LineError> {
        self.bus.set_data(Level::from_bit(high))
    }

    #[inline(always)]
    fn sample<const RX: u8>(&mut self) -> Result<u32, LineError> {
        let level = match RX {
            RX_MISO => self.bus.get_miso()?,
            RX_DATA => self.bus.get_data()?,
            _ => return Ok(0),
        };
        Ok(u32::from(level.is_high()))
    }

    #[inline(always)]
    fn delay(&mut self) {
        self.timer.delay_ns(self.half_period_ns);
    }
}

/// Shift one word of `bits` bits. Returns the received bits right-aligned;
/// callers mask to the word width.
pub(crate) type WordFn<L, T, Lg> =
    for<'s, 'a> fn(&mut Shifter<'s, 'a, L, T, Lg>, u32, u8) -> Result<u32, LineError>;

fn txrx<L, T, Lg, const CPOL: bool, const CPHA: bool, const LSB: bool, const TX: bool, const RX: u8>(
    s: &mut Shifter<'_, '_, L, T, Lg>,
    mut word: u32,
    bits: u8,
) -> Result<u32, LineError>
where
    L: Line,
    T: BitTimer,
    Lg: Logger,
{
    let bits = u32::from(bits);
    let (out_mask, rx_shift) = if LSB {
        (1u32, bits - 1)
    } else {
        word <<= 32 - bits;
        (1u32 << 31, 0)
    };
    // Forces the first bit out.
    let mut oldbit = !word & out_mask;

    for _ in 0..bits {
        if CPHA {
            s.sck(!CPOL)?;
        }
        if TX {
            let bit = word & out_mask;
            if bit != oldbit {
                s.mosi(bit != 0)?;
                oldbit = bit;
            }
        }
        s.delay();
        if CPHA {
            s.sck(CPOL)?;
        } else {
            s.sck(!CPOL)?;
        }
        s.delay();

        if LSB {
            word >>= 1;
        } else {
            word <<= 1;
        }
        if RX != RX_NONE {
            word |= s.sample::<RX>()? << rx_shift;
        }

        if !CPHA {
            s.sck(CPOL)?;
        }
    }
    Ok(word)
}

fn with_shape<L, T, Lg, const TX: bool, const RX: u8>(mode: Mode, order: BitOrder) -> WordFn<L, T, Lg>
where
    L: Line,
    T: BitTimer,
    Lg: Logger,
{
    let cpol = mode.polarity == Polarity::IdleHigh;
    let cpha = mode.phase == Phase::CaptureOnSecondTransition;
    match (cpol, cpha, order) {
        (false, false, BitOrder::MsbFirst) => txrx::<L, T, Lg, false, false, false, TX, RX>,
        (false, false, BitOrder::LsbFirst) => txrx::<L, T, Lg, false, false, true, TX, RX>,
        (false, true, BitOrder::MsbFirst) => txrx::<L, T, Lg, false, true, false, TX, RX>,
        (false, true, BitOrder::LsbFirst) => txrx::<L, T, Lg, false, true, true, TX, RX>,
        (true, false, BitOrder::MsbFirst) => txrx::<L, T, Lg, true, false, false, TX, RX>,
        (true, false, BitOrder::LsbFirst) => txrx::<L, T, Lg, true, false, true, TX, RX>,
        (true, true, BitOrder::MsbFirst) => txrx::<L, T, Lg, true, true, false, TX, RX>,
        (true, true, BitOrder::LsbFirst) => txrx::<L, T, Lg, true, true, true, TX, RX>,
    }
}

/// Resolve the word shifter for one transfer.
pub(crate) fn select<L, T, Lg>(mode: Mode, order: BitOrder, duplex: Duplex) -> WordFn<L, T, Lg>
where
    L: Line,
    T: BitTimer,
    Lg: Logger,
{
    match duplex {
        Duplex::Full => with_shape::<L, T, Lg, true, RX_MISO>(mode, order),
        Duplex::TxOnly => with_shape::<L, T, Lg, true, RX_NONE>(mode, order),
        Duplex::RxOnly => with_shape::<L, T, Lg, false, RX_DATA>(mode, order),
    }
}
