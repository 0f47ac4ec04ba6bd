// Licensed under the Apache-2.0 license

//! Inert injector used when fault injection is compiled out.

use crate::arbiter::Arbiter;
use crate::common::{ConfigurationError, Logger, NoOpLogger};
use crate::fault::completion::{Canceller, Completion};
use crate::fault::control::{Control, Error};
use crate::fault::hooks::{EdgeInterrupt, FatalStop, NoIrq, PanicStop};
use crate::i2c::common::TimingConfig;
use crate::line::Line;
use crate::timer::BitTimer;
use core::marker::PhantomData;
use std::sync::Arc;

pub struct FaultInjector<L: Line, T: BitTimer, Lg: Logger = NoOpLogger, I = NoIrq, F = PanicStop>
{
    arbiter: Arc<Arbiter<L, Lg>>,
    completion: Arc<Completion>,
    _hooks: PhantomData<(T, I, F)>,
}

impl<L: Line, T: BitTimer, Lg: Logger> FaultInjector<L, T, Lg, NoIrq, PanicStop> {
    /// Accepts the same arguments as the real injector. Only the arbiter is
    /// kept.
    ///
    /// # Errors
    ///
    /// Never fails.
    pub fn new(
        arbiter: Arc<Arbiter<L, Lg>>,
        _timer: T,
        _config: TimingConfig,
    ) -> Result<Self, ConfigurationError> {
        Ok(Self {
            arbiter,
            completion: Arc::new(Completion::new()),
            _hooks: PhantomData,
        })
    }
}

impl<L, T, Lg, I, F> FaultInjector<L, T, Lg, I, F>
where
    L: Line,
    T: BitTimer,
    Lg: Logger,
    I: EdgeInterrupt,
    F: FatalStop,
{
    /// Drops `irq`; nothing is ever armed.
    #[must_use]
    pub fn with_irq<I2: EdgeInterrupt>(self, _irq: I2) -> FaultInjector<L, T, Lg, I2, F> {
        FaultInjector {
            arbiter: self.arbiter,
            completion: self.completion,
            _hooks: PhantomData,
        }
    }

    /// Drops `fatal`; it is never invoked.
    #[must_use]
    pub fn with_fatal_stop<F2: FatalStop>(self, _fatal: F2) -> FaultInjector<L, T, Lg, I, F2> {
        FaultInjector {
            arbiter: self.arbiter,
            completion: self.completion,
            _hooks: PhantomData,
        }
    }

    /// Never waiting, so cancelling is always a no-op.
    #[must_use]
    pub fn canceller(&self) -> Canceller {
        Canceller(Arc::clone(&self.completion))
    }

    #[must_use]
    pub fn arbiter(&self) -> &Arc<Arbiter<L, Lg>> {
        &self.arbiter
    }

    #[must_use]
    pub fn controls(&self) -> heapless::Vec<Control, 6> {
        heapless::Vec::new()
    }

    /// # Errors
    ///
    /// Always `ControlUnavailable`.
    pub fn read_control(&mut self, control: Control) -> Result<u64, Error> {
        Err(Error::ControlUnavailable(control))
    }

    /// # Errors
    ///
    /// Always `ControlUnavailable`.
    pub fn write_control(&mut self, control: Control, _value: u64) -> Result<(), Error> {
        Err(Error::ControlUnavailable(control))
    }
}
