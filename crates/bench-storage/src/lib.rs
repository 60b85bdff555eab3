//! Measurement persistence.
//!
//! One SQLite table, `measurements`, holds every run. Waveforms are stored as
//! opaque blobs produced by [`bench_core::codec`]; the engine itself never
//! reads rows back.

pub mod store;

pub use store::{MeasurementStore, TIMESTAMP_FORMAT};
