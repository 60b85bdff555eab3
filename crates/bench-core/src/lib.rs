//! `bench-core`
//!
//! Core types and capability traits for the DC-DC converter bench.
//!
//! The sequencing engine in `bench-experiment` drives instruments only through
//! the traits in [`capabilities`]. Everything a run produces is described by the
//! data model here: the [`trigger::TriggerConfig`] contract, the captured
//! [`waveform::WaveformBundle`] and the persisted [`record::MeasurementRecord`].
//!
//! ## Modules
//!
//! - [`capabilities`]: GPIO, voltage source, oscilloscope, chamber and register bus traits
//! - [`source`]: SMU and bench-supply adapters implementing `VoltageSource`
//! - [`trigger`]: trigger contract, scope timing, time-vector construction
//! - [`waveform`]: traces, bundles and soft-failure flags
//! - [`record`]: measurement records and test kinds
//! - [`codec`]: blob encoding for stored bundles
//! - [`analysis`]: signal presence and efficiency helpers
//! - [`clock`]: injectable time source
//! - [`error`]: [`BenchError`] and [`DriverError`]

pub mod analysis;
pub mod capabilities;
pub mod clock;
pub mod codec;
pub mod error;
pub mod record;
pub mod source;
pub mod trigger;
pub mod waveform;

pub use capabilities::{
    AcquisitionStatus, BenchSupply, DigitalLines, DriverResult, Oscilloscope, Rail, RegisterBus,
    Resistor, SmuChannels, ThermalChamber, VoltageSource,
};
pub use clock::{Clock, TokioClock};
pub use error::{BenchError, BenchResult, DriverError, DriverErrorKind};
pub use record::{
    MeasurementField, MeasurementRecord, MeasurementSummary, RunDescriptor, TestKind, TestResult,
};
pub use source::{SmuSource, SupplySource};
pub use trigger::{
    Coupling, EdgeTrigger, HorizontalTiming, TriggerConfig, TriggerLine, TriggerSlope,
    VerticalSettings,
};
pub use waveform::{AcquisitionFlags, ChannelLabels, Trace, WaveformBundle};
