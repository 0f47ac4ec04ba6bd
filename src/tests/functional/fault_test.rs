// Licensed under the Apache-2.0 license

use crate::fault::{
    address_phase_pattern, Control, Error, FatalStop, FaultInjector, MAX_IRQ_DELAY_US,
};
use crate::i2c::TimingConfig;
use crate::line::{Direction, Level};
use crate::tests::sim::{
    assert_partitioned, wait_for, Event, Sim, SimIrq, SimLine, SimLogger, Wire,
};
use crate::timer::StdTimer;
use fugit::MicrosDurationU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

type Injector<F = crate::fault::PanicStop> =
    FaultInjector<SimLine, StdTimer, SimLogger, SimIrq, F>;

fn injector(sim: &Sim) -> (Injector, SimIrq) {
    let irq = sim.irq();
    let fault = FaultInjector::new(sim.arbiter(), StdTimer::new(), TimingConfig::default())
        .unwrap()
        .with_irq(irq.clone());
    (fault, irq)
}

/// Data level at every SCL rising edge, and whether a STOP was seen.
fn clocked_bits(trace: &[(bool, bool)]) -> (Vec<bool>, bool) {
    let mut bits = Vec::new();
    let mut stop = false;
    let mut prev = (true, true);
    for &(scl, sda) in trace {
        if !prev.0 && scl {
            bits.push(sda);
        }
        if prev.0 && scl && !prev.1 && sda {
            stop = true;
        }
        prev = (scl, sda);
    }
    (bits, stop)
}

#[test]
fn test_incomplete_address_phase_framing() {
    let sim = Sim::new();
    let (mut fault, _irq) = injector(&sim);
    sim.clear();

    fault.incomplete_address_phase(0x3a).unwrap();

    let (bits, stop) = clocked_bits(&sim.trace());
    let (pattern, count) = address_phase_pattern(0x3a);
    let expected: Vec<bool> = (0..count).rev().map(|b| (pattern >> b) & 1 != 0).collect();
    assert_eq!(bits.len(), 9);
    assert_eq!(bits, expected);
    // 0x3a, read bit, ACK slot left high.
    assert_eq!(&bits[..7], &[false, true, true, true, false, true, false]);
    assert!(!stop);
    // Started with SDA falling under a high clock.
    assert_eq!(sim.trace().first(), Some(&(true, false)));
}

#[test]
fn test_incomplete_write_byte_clocks_eighteen() {
    let sim = Sim::new();
    let (mut fault, _irq) = injector(&sim);
    sim.clear();

    fault.write_control(Control::IncompleteWriteByte, 0x50).unwrap();
    let (bits, stop) = clocked_bits(&sim.trace());
    assert_eq!(bits.len(), 18);
    assert!(!stop);
}

#[test]
fn test_out_of_range_rejected_before_bus() {
    let sim = Sim::new();
    let (mut fault, irq) = injector(&sim);
    sim.clear();

    let too_long = u64::from(MAX_IRQ_DELAY_US) + 1;
    assert_eq!(
        fault.write_control(Control::LoseArbitration, too_long),
        Err(Error::DelayOutOfRange(too_long))
    );
    assert_eq!(
        fault.write_control(Control::IncompleteAddressPhase, 0x80),
        Err(Error::InvalidAddress(0x80))
    );
    assert!(sim.events().is_empty());
    assert_eq!(irq.requests.load(Ordering::SeqCst), 0);
}

#[test]
fn test_raw_controls_read_back() {
    let sim = Sim::new();
    let (mut fault, _irq) = injector(&sim);

    fault.write_control(Control::Sda, 0).unwrap();
    assert_eq!(fault.read_control(Control::Sda), Ok(0));
    fault.write_control(Control::Sda, 1).unwrap();
    assert_eq!(fault.read_control(Control::Scl), Ok(1));
    assert_eq!(
        fault.read_control(Control::InjectPanic),
        Err(Error::NotReadable(Control::InjectPanic))
    );
    assert_eq!(fault.controls().len(), 6);
}

#[test]
fn test_lose_arbitration_on_foreign_clock() {
    let sim = Sim::new();
    let (mut fault, _irq) = injector(&sim);
    sim.clear();

    let worker = thread::spawn(move || {
        let result = fault.lose_arbitration(MicrosDurationU32::from_ticks(200));
        (fault, result)
    });
    assert!(wait_for(|| sim.irq_armed()));
    // Another master starts clocking.
    sim.pull_scl(true);
    sim.pull_scl(false);
    let (fault, result) = worker.join().unwrap();
    result.unwrap();

    let ops = sim.line_ops();
    let id = ops.first().unwrap().thread();
    assert_eq!(ops.first(), Some(&Event::Direction(id, Wire::Scl, Direction::Input)));
    assert!(ops.contains(&Event::Set(id, Wire::Sda, Level::Low)));
    assert!(ops.contains(&Event::Set(id, Wire::Sda, Level::High)));
    assert_eq!(
        ops.last(),
        Some(&Event::Direction(id, Wire::Scl, Direction::Output(Level::High)))
    );
    assert!(!sim.irq_armed());
    assert!(!fault.arbiter().is_locked());
    assert_partitioned(&sim.events());
}

#[test]
fn test_cancelled_wait_restores_clock() {
    let sim = Sim::new();
    let (mut fault, _irq) = injector(&sim);
    let canceller = fault.canceller();
    sim.clear();

    let worker = thread::spawn(move || {
        let result = fault.inject_panic(MicrosDurationU32::from_ticks(10));
        (fault, result)
    });
    assert!(wait_for(|| canceller.is_waiting()));
    assert!(canceller.cancel());
    let (fault, result) = worker.join().unwrap();

    assert_eq!(result, Err(Error::Interrupted));
    let ops = sim.line_ops();
    assert!(matches!(
        ops.last(),
        Some(Event::Direction(_, Wire::Scl, Direction::Output(Level::High)))
    ));
    assert!(!fault.arbiter().is_locked());
}

#[test]
fn test_refused_irq_restores_clock() {
    let sim = Sim::new();
    let (mut fault, irq) = injector(&sim);
    irq.refuse.store(true, Ordering::SeqCst);
    sim.clear();

    assert_eq!(
        fault.lose_arbitration(MicrosDurationU32::from_ticks(10)),
        Err(Error::IrqRequest)
    );
    assert!(matches!(
        sim.line_ops().last(),
        Some(Event::Direction(_, Wire::Scl, Direction::Output(Level::High)))
    ));
    assert!(!fault.arbiter().is_locked());
}

struct Flag(Arc<AtomicBool>);

impl FatalStop for Flag {
    fn stop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

#[test]
fn test_inject_panic_reaches_fatal_stop() {
    let sim = Sim::new();
    let (fault, _irq) = injector(&sim);
    let stopped = Arc::new(AtomicBool::new(false));
    let mut fault: Injector<Flag> = fault.with_fatal_stop(Flag(Arc::clone(&stopped)));

    let worker = thread::spawn(move || fault.write_control(Control::InjectPanic, 50));
    assert!(wait_for(|| sim.irq_armed()));
    sim.pull_scl(true);
    sim.pull_scl(false);

    worker.join().unwrap().unwrap();
    assert!(stopped.load(Ordering::SeqCst));
}

#[test]
fn test_default_fatal_stop_frees_bus() {
    let sim = Sim::new();
    let (mut fault, _irq) = injector(&sim);
    let arbiter = Arc::clone(fault.arbiter());

    let worker = thread::spawn(move || fault.inject_panic(MicrosDurationU32::from_ticks(0)));
    assert!(wait_for(|| sim.irq_armed()));
    sim.pull_scl(true);
    assert!(worker.join().is_err());
    sim.pull_scl(false);

    assert!(!arbiter.is_locked());
    assert!(!sim.irq_armed());
    assert!(matches!(
        sim.line_ops().last(),
        Some(Event::Direction(_, Wire::Scl, Direction::Output(Level::High)))
    ));
    assert_partitioned(&sim.events());
}
