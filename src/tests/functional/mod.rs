// Licensed under the Apache-2.0 license

mod arbiter_test;
mod i2c_test;
mod spi_test;

#[cfg(feature = "fault_injector")]
mod fault_test;
