//! Register probe and temperature soak.

mod common;

use std::sync::Arc;
use std::time::Duration;

use bench_core::capabilities::Resistor;
use bench_core::error::{BenchError, DriverErrorKind};
use bench_driver_mock::{ErrorConfig, ErrorScenario, MockChamber, MockSpi};
use bench_experiment::{RegisterProbe, TemperatureSoak};
use common::Bench;

#[tokio::test]
async fn probe_passes_on_expected_id() {
    let bench = Bench::new();
    let spi = MockSpi::new().with_log(bench.log.clone());

    let passed = RegisterProbe::new(5.0, Resistor::R1)
        .run(&bench.actuators(), &spi, bench.clock.as_ref())
        .await
        .unwrap();

    assert!(passed);
    assert!(bench.de_energized());
    let powered = bench.log.position("supply", "enable_output").unwrap();
    let read = bench.log.position("spi", "read_register").unwrap();
    assert!(powered < read);
    assert_eq!(bench.supply.rail(bench_experiment::SOURCE_RAIL).unwrap().current_limit, 0.4);
}

#[tokio::test]
async fn probe_fails_on_wrong_id() {
    let bench = Bench::new();
    let spi = MockSpi::new().with_register(1, 0x07);

    let passed = RegisterProbe::new(5.0, Resistor::R2)
        .run(&bench.actuators(), &spi, bench.clock.as_ref())
        .await
        .unwrap();

    assert!(!passed);
    assert!(bench.de_energized());
}

#[tokio::test]
async fn failed_read_still_powers_down() {
    let bench = Bench::new();
    let spi = MockSpi::new().with_errors(ErrorConfig::scenario(ErrorScenario::Timeout {
        operation: "read_register",
    }));

    let err = RegisterProbe::new(5.0, Resistor::R3)
        .run(&bench.actuators(), &spi, bench.clock.as_ref())
        .await
        .unwrap_err();

    assert!(matches!(err, BenchError::Driver(_)), "{err}");
    assert!(bench.de_energized());
    assert_eq!(bench.clock.sleeps().last(), Some(&Duration::from_millis(200)));
}

#[tokio::test]
async fn soak_waits_for_set_point() {
    let bench = Bench::new();
    let chamber = MockChamber::new(22.0).with_ramp(10.0);

    let reached = TemperatureSoak::new(-40.0)
        .run(&chamber, bench.clock.as_ref())
        .await
        .unwrap();

    assert_eq!(reached, -40.0);
    assert!(chamber.is_head_down());
    assert!(chamber.is_flowing());
    assert_eq!(chamber.current_set_point(), -40.0);
    // Seven readings to arrive, two more to hold.
    assert_eq!(bench.clock.sleeps().len(), 8);
}

#[tokio::test]
async fn soak_times_out_when_chamber_stalls() {
    let clock = Arc::new(bench_driver_mock::ManualClock::new());
    let chamber = MockChamber::new(22.0).with_ramp(0.0);

    let err = TemperatureSoak::new(85.0)
        .with_timeout(Duration::from_secs(10))
        .run(&chamber, clock.as_ref())
        .await
        .unwrap_err();

    match err {
        BenchError::Driver(e) => {
            assert_eq!(e.kind, DriverErrorKind::Timeout);
            assert_eq!(e.driver_type, "thermal_chamber");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(clock.total_slept(), Duration::from_secs(10));
}
