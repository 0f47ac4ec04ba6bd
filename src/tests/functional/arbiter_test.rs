// Licensed under the Apache-2.0 license

use crate::arbiter::{Client, ClockLine};
use crate::i2c::{I2cBitbang, TimingConfig};
use crate::line::Level;
use crate::spi::{SpiBitbang, SpiConfigBuilder};
use crate::tests::sim::{assert_partitioned, Event, Sim};
use crate::timer::StdTimer;
use fugit::HertzU32;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const ROUNDS: usize = 20;

#[test]
fn test_clients_never_interleave() {
    let sim = Sim::with_target(0x50);
    let arbiter = sim.arbiter();
    let mut workers = Vec::new();

    let shared = Arc::clone(&arbiter);
    workers.push(thread::spawn(move || {
        let mut i2c = I2cBitbang::new(shared, StdTimer::new(), TimingConfig::default()).unwrap();
        for n in 0..ROUNDS {
            // Outcome depends on how the other clients left the target.
            let _ = i2c.write(0x50, &[n as u8]);
        }
    }));

    let shared = Arc::clone(&arbiter);
    workers.push(thread::spawn(move || {
        let config = SpiConfigBuilder::new()
            .speed(HertzU32::MHz(1))
            .build()
            .unwrap();
        let mut spi = SpiBitbang::new(shared, StdTimer::new(), config).unwrap();
        for _ in 0..ROUNDS {
            spi.write_words(&[0xa5, 0x5a]).unwrap();
        }
    }));

    #[cfg(feature = "fault_injector")]
    {
        let shared = Arc::clone(&arbiter);
        workers.push(thread::spawn(move || {
            let mut fault =
                crate::fault::FaultInjector::new(shared, StdTimer::new(), TimingConfig::default())
                    .unwrap();
            for _ in 0..ROUNDS {
                fault.incomplete_address_phase(0x3a).unwrap();
                fault.set_sda(Level::High).unwrap();
            }
        }));
    }

    for worker in workers {
        worker.join().unwrap();
    }

    let events = sim.events();
    assert_partitioned(&events);
    let holds = events
        .iter()
        .filter(|e| matches!(e, Event::Locked(_)))
        .count();
    assert!(holds >= 2 * ROUNDS, "only {holds} lock holds recorded");
    assert!(!arbiter.is_locked());
}

#[test]
fn test_waiter_blocks_until_release() {
    let sim = Sim::new();
    let arbiter = sim.arbiter();
    let guard = arbiter.acquire(Client::FourWire);

    let shared = Arc::clone(&arbiter);
    let waiter = thread::spawn(move || {
        let mut bus = shared.acquire(Client::TwoWire(ClockLine::Primary));
        bus.set_data(Level::Low).unwrap();
    });

    thread::sleep(Duration::from_millis(20));
    assert!(sim.line_ops().is_empty());
    guard.release();
    waiter.join().unwrap();

    assert_eq!(sim.line_ops().len(), 1);
    assert_partitioned(&sim.events());
}
