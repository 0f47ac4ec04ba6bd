// Licensed under the Apache-2.0 license

use crate::arbiter::{Arbiter, LineSet};
use crate::common::ConfigurationError;
use crate::line::{Direction, Level, LineError};
use crate::spi::{BitOrder, ErrorKind, SpiBitbang, SpiConfig, SpiConfigBuilder, Transfer};
use crate::tests::sim::{assert_partitioned, Event, Sim, SimLine, SimLogger, Wire};
use crate::timer::StdTimer;
use core::convert::Infallible;
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal::spi::{Mode, SpiBus as _, MODE_0, MODE_1, MODE_2, MODE_3};
use fugit::HertzU32;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

fn config(mode: Mode) -> SpiConfigBuilder {
    SpiConfigBuilder::new().mode(mode).speed(HertzU32::MHz(1))
}

fn engine(sim: &Sim, config: SpiConfig) -> SpiBitbang<SimLine, StdTimer, SimLogger> {
    SpiBitbang::new(sim.arbiter(), StdTimer::new(), config).unwrap()
}

/// Clock and data writes in order, without reads.
fn writes(sim: &Sim) -> Vec<(Wire, Level)> {
    sim.line_ops()
        .into_iter()
        .filter_map(|e| match e {
            Event::Set(_, wire, level) => Some((wire, level)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_loopback_every_mode() {
    for mode in [MODE_0, MODE_1, MODE_2, MODE_3] {
        for order in [BitOrder::MsbFirst, BitOrder::LsbFirst] {
            let sim = Sim::new();
            let mut spi = engine(&sim, config(mode).bit_order(order).build().unwrap());
            let tx = [0b1011_0010, 0xa5, 0x01, 0x80];
            let mut rx = [0u32; 4];
            assert_eq!(spi.transfer(&mut [Transfer::duplex(&tx, &mut rx)]).unwrap(), 4);
            assert_eq!(rx, tx, "{mode:?} {order:?}");
        }
    }
}

#[test]
fn test_loopback_odd_width_per_transfer() {
    let sim = Sim::new();
    let mut spi = engine(&sim, config(MODE_0).build().unwrap());
    let tx = [0xabc, 0xfff];
    let mut rx = [0u32; 2];
    spi.transfer(&mut [Transfer::duplex(&tx, &mut rx).bits(12)])
        .unwrap();
    assert_eq!(rx, tx);
}

#[test]
fn test_phase_zero_sets_data_before_leading_edge() {
    for (mode, idle) in [(MODE_0, Level::Low), (MODE_2, Level::High)] {
        let sim = Sim::new();
        let mut spi = engine(&sim, config(mode).build().unwrap());
        sim.clear();
        spi.write_words(&[0x80]).unwrap();

        let ops = writes(&sim);
        assert_eq!(ops.first(), Some(&(Wire::Scl, idle)));
        let data = ops.iter().position(|op| op.0 == Wire::Sda).unwrap();
        let leading = ops.iter().position(|op| *op == (Wire::Scl, !idle)).unwrap();
        assert!(data < leading, "{mode:?}: {ops:?}");
        let last_clock = ops.iter().rev().find(|op| op.0 == Wire::Scl).unwrap();
        assert_eq!(last_clock.1, idle);
    }
}

#[test]
fn test_phase_one_sets_data_after_leading_edge() {
    for (mode, idle) in [(MODE_1, Level::Low), (MODE_3, Level::High)] {
        let sim = Sim::new();
        let mut spi = engine(&sim, config(mode).build().unwrap());
        sim.clear();
        spi.write_words(&[0x80]).unwrap();

        let ops = writes(&sim);
        let data = ops.iter().position(|op| op.0 == Wire::Sda).unwrap();
        let leading = ops.iter().position(|op| *op == (Wire::Scl, !idle)).unwrap();
        assert!(leading < data, "{mode:?}: {ops:?}");
        let last_clock = ops.iter().rev().find(|op| op.0 == Wire::Scl).unwrap();
        assert_eq!(last_clock.1, idle);
    }
}

#[test]
fn test_unchanged_bits_not_rewritten() {
    let sim = Sim::new();
    let mut spi = engine(&sim, config(MODE_0).build().unwrap());
    sim.clear();
    spi.write_words(&[0xff]).unwrap();
    let data_writes = writes(&sim).iter().filter(|op| op.0 == Wire::Sda).count();
    assert_eq!(data_writes, 1);
}

#[test]
fn test_read_without_miso_yields_zeros() {
    let sim = Sim::new();
    let lines = LineSet::new(sim.line(Wire::Scl), sim.line(Wire::Sda));
    let arbiter = Arc::new(Arbiter::new(lines));
    let mut spi = SpiBitbang::new(arbiter, StdTimer::new(), config(MODE_0).build().unwrap())
        .unwrap();
    let mut rx = [0xffff_ffff; 2];
    spi.read_words(&mut rx).unwrap();
    assert_eq!(rx, [0, 0]);
}

#[test]
fn test_three_wire_reads_data_line() {
    let sim = Sim::new();
    let mut spi = engine(&sim, config(MODE_0).three_wire(true).build().unwrap());
    sim.clear();

    let mut rx = [0u32; 1];
    spi.read_words(&mut rx).unwrap();
    // Nobody drives the released line.
    assert_eq!(rx, [0xff]);
    let ops = sim.line_ops();
    assert!(ops.contains(&Event::Direction(
        std::thread::current().id(),
        Wire::Sda,
        Direction::Input
    )));
    assert!(!ops.iter().any(|e| matches!(e, Event::Get(_, Wire::Miso))));
}

#[test]
fn test_three_wire_duplex_rejected_before_bus() {
    let sim = Sim::new();
    let mut spi = engine(&sim, config(MODE_0).three_wire(true).build().unwrap());
    sim.clear();

    let tx = [1];
    let mut rx = [0u32; 1];
    let err = spi
        .transfer(&mut [Transfer::duplex(&tx, &mut rx)])
        .unwrap_err();
    assert_eq!(
        err.kind,
        ErrorKind::Configuration(ConfigurationError::HalfDuplexViolation)
    );
    assert_eq!(err.transferred, 0);
    assert!(sim.events().is_empty());
}

#[test]
fn test_spi_bus_bytes_in_place() {
    let sim = Sim::new();
    let mut spi = engine(&sim, config(MODE_3).build().unwrap());
    let mut buf = [0xde, 0xad, 0xbe, 0xef];
    spi.transfer_in_place(&mut buf).unwrap();
    assert_eq!(buf, [0xde, 0xad, 0xbe, 0xef]);
    assert!(!spi.arbiter().is_locked());
}

/// Active-low chip select that remembers whether it is asserted.
struct Cs(Arc<AtomicBool>);

impl ErrorType for Cs {
    type Error = Infallible;
}

impl OutputPin for Cs {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.store(false, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_line_failure_mid_message_deselects() {
    let sim = Sim::new();
    let selected = Arc::new(AtomicBool::new(false));
    let config = config(MODE_0).build().unwrap();
    let cs = Cs(Arc::clone(&selected));
    let mut spi = SpiBitbang::with_chip_select(sim.arbiter(), StdTimer::new(), config, cs).unwrap();

    // Clock parked once, then two edges per bit: the third word fails.
    sim.fail_after(Wire::Scl, 1 + 2 * 16 + 3);
    let err = spi.write_words(&[0x11, 0x22, 0x33, 0x44]).unwrap_err();

    assert_eq!(err.kind, ErrorKind::Line(LineError::Io));
    assert_eq!(err.transferred, 2);
    assert!(!selected.load(Ordering::SeqCst));
    assert!(!spi.arbiter().is_locked());
    assert_partitioned(&sim.events());
}
