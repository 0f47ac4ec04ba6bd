// Licensed under the Apache-2.0 license

//! Board hooks the injector is generic over: the clock edge interrupt and what
//! a fatal stop does.

use crate::fault::completion::IrqNotifier;
use core::fmt::Debug;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Edge {
    Falling,
    Rising,
}

/// Edge-triggered interrupt on the clock line.
pub trait EdgeInterrupt: Send {
    type Error: Debug;

    /// Arm a one-shot interrupt. The source calls [`IrqNotifier::notify`] from
    /// whatever context it runs handlers in.
    fn request(&mut self, edge: Edge, notifier: IrqNotifier) -> Result<(), Self::Error>;

    /// Disarm. Called once after every successful request.
    fn free(&mut self);
}

/// Stand-in for boards without a clock interrupt.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoIrq;

impl EdgeInterrupt for NoIrq {
    type Error = ();

    fn request(&mut self, _edge: Edge, _notifier: IrqNotifier) -> Result<(), ()> {
        Err(())
    }

    fn free(&mut self) {}
}

/// What "fatal stop" means on this system.
pub trait FatalStop: Send {
    fn stop(&mut self) {
        panic!("two-wire fault injector induced panic");
    }
}

/// Panics the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct PanicStop;

impl FatalStop for PanicStop {}
