// Licensed under the Apache-2.0 license

//! Diagnostic fault injection on the two-wire lines.
//!
//! Built with the `fault_injector` feature (on by default). Without it,
//! [`FaultInjector`] is an inert stand-in with the same constructors that
//! exposes no controls.

pub mod completion;
pub mod control;
pub mod hooks;

#[cfg(feature = "fault_injector")]
pub mod injector;
#[cfg(not(feature = "fault_injector"))]
pub mod noop;

pub use completion::{Canceller, IrqNotifier};
pub use control::{Control, Error, MAX_IRQ_DELAY_US};
pub use hooks::{Edge, EdgeInterrupt, FatalStop, NoIrq, PanicStop};

#[cfg(feature = "fault_injector")]
pub use injector::{address_phase_pattern, write_byte_pattern, FaultInjector};
#[cfg(not(feature = "fault_injector"))]
pub use noop::FaultInjector;
