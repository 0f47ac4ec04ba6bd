// Licensed under the Apache-2.0 license

//! Host-side functional tests against a simulated wire bus.

mod functional;
