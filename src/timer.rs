// Licensed under the Apache-2.0 license

//! Bit timing: half-bit delays and the monotonic clock behind the
//! clock-stretch deadline.

use embedded_hal::delay::DelayNs;
use fugit::TimerInstantU64;
use std::time::{Duration, Instant};

/// Microsecond-resolution instant used for deadlines.
pub type MicrosInstant = TimerInstantU64<1_000_000>;

/// Delay source plus monotonic clock.
pub trait BitTimer: DelayNs {
    fn now(&mut self) -> MicrosInstant;
}

impl<T: BitTimer + ?Sized> BitTimer for &mut T {
    fn now(&mut self) -> MicrosInstant {
        T::now(self)
    }
}

/// Delays longer than this sleep instead of spinning.
const SPIN_LIMIT_NS: u32 = 1_000_000;

/// [`BitTimer`] on the host clock.
///
/// Half-bit delays are a few microseconds, far below scheduler granularity,
/// so they busy-wait like `udelay`. Long delays (fault injection holds) sleep.
#[derive(Clone, Copy, Debug)]
pub struct StdTimer {
    epoch: Instant,
}

impl StdTimer {
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for StdTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl DelayNs for StdTimer {
    fn delay_ns(&mut self, ns: u32) {
        let wait = Duration::from_nanos(u64::from(ns));
        if ns > SPIN_LIMIT_NS {
            std::thread::sleep(wait);
            return;
        }
        let start = Instant::now();
        while start.elapsed() < wait {
            core::hint::spin_loop();
        }
    }
}

impl BitTimer for StdTimer {
    fn now(&mut self) -> MicrosInstant {
        let micros = u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX);
        MicrosInstant::from_ticks(micros)
    }
}
