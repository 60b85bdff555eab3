//! Configure, run and store one test end to end against mock instruments.

use std::sync::Arc;

use bench_driver_mock::{ManualClock, MockGpio, MockScope, MockSupply, SignalShape};
use dcdc_bench::bench_core::analysis::SignalThresholds;
use dcdc_bench::bench_core::capabilities::{BenchSupply, Rail};
use dcdc_bench::{
    load_and_init, MeasurementRecord, MeasurementStore, Resistor, ScopePair, SourceMode,
    StimulusRecipe, TestKind, TestOrchestrator, TestRequest, TestResult, WaveformCapture,
};
use serial_test::serial;
use tempfile::tempdir;

#[tokio::test]
#[serial]
async fn configured_run_is_stored() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("bench.db");
    let cfg = dir.path().join("bench.toml");
    std::fs::write(
        &cfg,
        format!(
            "chip_id = \"A17\"\nlog_format = \"compact\"\n\n[storage]\ndatabase_path = {:?}\n\n[capture]\ntimeout_polls = 5\n\n[source]\nrail = \"P6V\"\n",
            db.display().to_string()
        ),
    )
    .unwrap();

    let config = load_and_init(&cfg).unwrap();
    assert_eq!(config.chip_id, "A17");
    assert_eq!(config.source.mode, SourceMode::BenchSupply);

    let gpio = Arc::new(MockGpio::new());
    let supply = Arc::new(MockSupply::new());
    let supply_handle: Arc<dyn BenchSupply> = supply.clone();
    let actuators = config
        .source
        .actuators(gpio.clone(), None, Some(supply_handle))
        .unwrap();
    let scopes = ScopePair::new(
        Arc::new(MockScope::new("primary").with_signals(
            SignalShape::Step {
                before: 0.0,
                after: 5.0,
            },
            SignalShape::Step {
                before: 0.0,
                after: 3.3,
            },
        )),
        Arc::new(MockScope::new("secondary").with_signals(
            SignalShape::Flat(0.2),
            SignalShape::Flat(0.25),
        )),
    );
    let clock = Arc::new(ManualClock::new());
    let orchestrator = TestOrchestrator::new(
        WaveformCapture::new(config.capture.to_settings().unwrap(), clock.clone()),
        clock,
    );

    let request = TestRequest::new(
        StimulusRecipe::Startup {
            voltage: 5.0,
            resistor: Resistor::R1,
        },
        25.0,
    );
    let run = request.descriptor();
    let bundle = orchestrator
        .run_test(request, &actuators, &scopes)
        .await
        .unwrap();
    assert!(!gpio.any_resistor_enabled());
    assert!(!supply.output_enabled());
    assert_eq!(supply.voltages(Rail::P6V), vec![5.0]);

    let verdict = TestResult::from_bool(bundle.has_signal(&SignalThresholds::default()));
    let store = MeasurementStore::open(&config.storage.database_path).unwrap();
    let id = store
        .insert(&MeasurementRecord::from_run(
            &config.chip_id,
            &run,
            bundle.clone(),
            verdict,
        ))
        .unwrap();

    let stored = store.get(id).unwrap().unwrap();
    assert_eq!(stored.test_kind, TestKind::Startup);
    assert_eq!(stored.result, TestResult::Passed);
    assert_eq!(stored.parameter1, "5.0V");
    assert_eq!(stored.parameter2, "R1");
    assert_eq!(stored.bundle, bundle);
    assert!(stored.bundle.title.contains("25°C"));
    store.close().unwrap();
}

#[test]
#[serial]
fn invalid_configuration_is_reported() {
    let dir = tempdir().unwrap();
    let cfg = dir.path().join("bench.toml");
    std::fs::write(&cfg, "log_level = \"loud\"\n").unwrap();

    let err = load_and_init(&cfg).unwrap_err();
    assert!(format!("{err:#}").contains("Invalid log_level 'loud'"));
}

#[test]
#[serial]
fn logging_init_is_idempotent() {
    use dcdc_bench::logging::{init, LoggingConfig};
    use tracing::Level;

    assert!(init(LoggingConfig::new(Level::INFO)).is_ok());
    assert!(init(LoggingConfig::new(Level::DEBUG)).is_ok());
}
