//! Store behavior across reopen, on a real file.

use bench_core::codec;
use bench_core::record::{MeasurementRecord, RunDescriptor, TestKind, TestResult};
use bench_core::trigger::time_vector;
use bench_core::waveform::{AcquisitionFlags, Trace, WaveformBundle};
use bench_storage::MeasurementStore;
use tempfile::tempdir;

fn captured_bundle() -> WaveformBundle {
    let t = time_vector(2_000, 5e-6);
    let wave = |offset: f64| -> Vec<f64> {
        (0..2_000)
            .map(|i| offset + (f64::from(i) * 0.013).sin() * 1e-3)
            .collect()
    };
    let mut bundle = WaveformBundle {
        title: "DCDC step test with step from 4.3V to 5.5V with resistor R4, -40°C".into(),
        temperature: -40.0,
        flags: AcquisitionFlags {
            primary_timed_out: true,
            secondary_incomplete: false,
        },
        ..Default::default()
    };
    bundle.add_primary(Trace::new("Input voltage", t.clone(), wave(4.3)));
    bundle.add_primary(Trace::new("Output voltage", t.clone(), wave(3.3)));
    bundle.add_secondary(Trace::new("Input current", t.clone(), wave(0.21)));
    bundle.add_secondary(Trace::new("Output current", t, wave(0.25)));
    bundle
}

#[test]
fn records_survive_reopen_bit_identical() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("measurements.db");
    let run = RunDescriptor {
        kind: TestKind::VoltageStep,
        parameter1: "4.3V to 5.5V".into(),
        parameter2: "R4".into(),
        temperature: -40.0,
    };
    let record = MeasurementRecord::from_run("chip-9", &run, captured_bundle(), TestResult::Failed);

    let id = {
        let store = MeasurementStore::open(&path).unwrap();
        assert_eq!(store.path(), Some(path.as_path()));
        let id = store.insert(&record).unwrap();
        store.close().unwrap();
        id
    };

    let store = MeasurementStore::open(&path).unwrap();
    let loaded = store.get(id).unwrap().unwrap();
    assert_eq!(loaded.result, TestResult::Failed);
    assert_eq!(loaded.parameter1, "4.3V to 5.5V");
    assert_eq!(loaded.temperature, -40.0);
    assert_eq!(
        codec::encode(&loaded.bundle).unwrap(),
        codec::encode(&record.bundle).unwrap()
    );
    for (a, b) in loaded.bundle.traces().zip(record.bundle.traces()) {
        let bits = |t: &Trace| t.values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(a), bits(b));
    }
    assert!(loaded.bundle.flags.primary_timed_out);
}

#[test]
fn schema_creation_is_idempotent() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bench.db");

    for round in 0..3 {
        let store = MeasurementStore::open(&path).unwrap();
        let run = RunDescriptor {
            kind: TestKind::Startup,
            parameter1: "5.0V".into(),
            parameter2: "R1".into(),
            temperature: 25.0,
        };
        store
            .insert(&MeasurementRecord::from_run(
                "chip-1",
                &run,
                WaveformBundle::default(),
                TestResult::Passed,
            ))
            .unwrap();
        assert_eq!(store.summaries().unwrap().len(), round + 1);
    }

    let store = MeasurementStore::open(&path).unwrap();
    assert_eq!(store.prune_duplicates().unwrap(), 2);
    assert_eq!(store.newest_unique_ids().unwrap(), vec![3]);
}
