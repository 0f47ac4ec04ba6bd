// Licensed under the Apache-2.0 license

use crate::arbiter::ClockLine;
use crate::i2c::{ErrorKind, I2cBitbang, SelfTestError, TimingConfig, TimingConfigBuilder};
use crate::line::LineError;
use crate::tests::sim::{assert_partitioned, Event, Sim, SimLine, SimLogger, Wire};
use crate::timer::StdTimer;
use embedded_hal::i2c::{I2c as _, Operation};
use fugit::MillisDurationU32;
use std::time::{Duration, Instant};

const TARGET: u8 = 0x50;

fn engine(sim: &Sim, config: TimingConfig) -> I2cBitbang<SimLine, StdTimer, SimLogger> {
    I2cBitbang::new(sim.arbiter(), StdTimer::new(), config).unwrap()
}

fn ends_with_stop(trace: &[(bool, bool)]) -> bool {
    matches!(trace, [.., (true, false), (true, true)])
}

#[test]
fn test_write_then_read_back() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());

    assert_eq!(i2c.write(TARGET, &[1, 2, 3]).unwrap(), 3);
    let mut buf = [0u8; 3];
    assert_eq!(i2c.read(TARGET, &mut buf).unwrap(), 3);
    assert_eq!(buf, [1, 2, 3]);
    assert!(ends_with_stop(&sim.trace()));
}

#[test]
fn test_write_read_uses_repeated_start() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());

    let mut buf = [0u8; 2];
    i2c.write_read(TARGET, &[0x10], &mut buf).unwrap();
    // Nothing queued after the echoed byte.
    assert_eq!(buf, [0x10, 0xff]);
}

#[test]
fn test_adjacent_reads_are_one_run() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());
    i2c.write(TARGET, &[7, 8, 9]).unwrap();

    let mut head = [0u8; 2];
    let mut tail = [0u8; 1];
    let n = i2c
        .transaction(
            TARGET,
            &mut [Operation::Read(&mut head), Operation::Read(&mut tail)],
        )
        .unwrap();
    assert_eq!(n, 3);
    assert_eq!(head, [7, 8]);
    assert_eq!(tail, [9]);
}

#[test]
fn test_absent_target_nacks_address() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());

    let err = i2c.write(TARGET + 1, &[1, 2]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AddressNack);
    assert_eq!(err.transferred, 0);
    assert!(ends_with_stop(&sim.trace()));
}

#[test]
fn test_address_out_of_range_touches_nothing() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());
    sim.clear();

    let err = i2c.write(0x80, &[1]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidAddress(0x80));
    assert!(sim.events().is_empty());
}

#[test]
fn test_stretch_timeout_window() {
    let sim = Sim::with_target(TARGET);
    let config = TimingConfigBuilder::new()
        .timeout(MillisDurationU32::from_ticks(20))
        .build()
        .unwrap();
    let mut i2c = engine(&sim, config);
    sim.pull_scl(true);

    let started = Instant::now();
    let err = i2c.write(TARGET, &[0xaa]).unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.kind, ErrorKind::ClockStretchTimeout);
    assert_eq!(err.transferred, 0);
    assert!(elapsed >= Duration::from_millis(20), "{elapsed:?}");
    assert!(elapsed < Duration::from_millis(150), "{elapsed:?}");
    assert!(!i2c.arbiter().is_locked());
}

#[test]
fn test_lock_released_after_failure() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());

    assert!(i2c.write(0x51, &[1]).is_err());
    assert!(!i2c.arbiter().is_locked());
    assert_eq!(i2c.write(TARGET, &[1]).unwrap(), 1);

    let events = sim.events();
    let locked = events
        .iter()
        .filter(|e| matches!(e, Event::Locked(_)))
        .count();
    let unlocked = events
        .iter()
        .filter(|e| matches!(e, Event::Unlocking(_)))
        .count();
    assert_eq!(locked, 2);
    assert_eq!(locked, unlocked);
}

#[test]
fn test_emulated_open_drain_round_trip() {
    let sim = Sim::with_target(TARGET);
    let config = TimingConfigBuilder::new()
        .sda_open_drain(false)
        .scl_open_drain(false)
        .build()
        .unwrap();
    let mut i2c = engine(&sim, config);

    i2c.write(TARGET, &[0x5a]).unwrap();
    let mut buf = [0u8; 1];
    i2c.read(TARGET, &mut buf).unwrap();
    assert_eq!(buf, [0x5a]);
    assert!(sim
        .line_ops()
        .iter()
        .all(|e| !matches!(e, Event::Set(_, Wire::Sda | Wire::Scl, _))));
}

#[test]
fn test_secondary_clock_leaves_primary_alone() {
    let sim = Sim::with_target(TARGET);
    let config = TimingConfigBuilder::new()
        .clock(ClockLine::Secondary)
        .build()
        .unwrap();
    let mut i2c = engine(&sim, config);

    // The target sits on the primary clock and never sees this.
    let err = i2c.write(TARGET, &[1]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::AddressNack);
    assert!(sim.line_ops().iter().all(|e| !matches!(
        e,
        Event::Set(_, Wire::Scl, _) | Event::Direction(_, Wire::Scl, _)
    )));
}

#[test]
fn test_self_test() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());
    i2c.self_test().unwrap();

    sim.pull_scl(true);
    assert!(matches!(i2c.self_test(), Err(SelfTestError::NotIdle)));
}

#[test]
fn test_data_nack_counts_acked_bytes() {
    let sim = Sim::with_nacking_target(TARGET, 1);
    let mut i2c = engine(&sim, TimingConfig::default());

    let err = i2c.write(TARGET, &[1, 2, 3]).unwrap_err();
    assert_eq!(err.kind, ErrorKind::DataNack);
    assert_eq!(err.transferred, 1);
    assert!(ends_with_stop(&sim.trace()));
    assert!(!i2c.arbiter().is_locked());

    let mut buf = [0u8; 2];
    i2c.read(TARGET, &mut buf).unwrap();
    assert_eq!(buf, [1, 0xff]);
}

#[test]
fn test_line_failure_mid_transfer() {
    let sim = Sim::with_target(TARGET);
    let mut i2c = engine(&sim, TimingConfig::default());

    // START takes one clock op, each byte 27 (eight bits and the ACK slot,
    // three ops each). Fail inside the second data byte.
    sim.fail_after(Wire::Scl, 1 + 27 + 27 + 5);
    let err = i2c.write(TARGET, &[1, 2, 3]).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Line(LineError::Io));
    assert_eq!(err.transferred, 1);
    assert!(!i2c.arbiter().is_locked());
    assert_partitioned(&sim.events());
}
