//! Measurement records handed to the storage collaborator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::waveform::WaveformBundle;

/// Kind of bench test. Stored as the variant name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestKind {
    /// Power-up with the load connected.
    Startup,
    /// Power-up with reset held, then released.
    ResetAtBoot,
    /// Reset pulse on a running converter.
    ResetWhilePowered,
    /// Input-voltage step.
    VoltageStep,
    /// Load-resistor pulse.
    LoadStep,
}

impl TestKind {
    /// Every kind, in script order.
    pub const ALL: [TestKind; 5] = [
        TestKind::Startup,
        TestKind::ResetAtBoot,
        TestKind::ResetWhilePowered,
        TestKind::VoltageStep,
        TestKind::LoadStep,
    ];

    /// Name stored in the `measurement_type` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestKind::Startup => "Startup",
            TestKind::ResetAtBoot => "ResetAtBoot",
            TestKind::ResetWhilePowered => "ResetWhilePowered",
            TestKind::VoltageStep => "VoltageStep",
            TestKind::LoadStep => "LoadStep",
        }
    }
}

impl std::fmt::Display for TestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TestKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown test kind '{s}'"))
    }
}

/// Pass/fail verdict assigned by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TestResult {
    /// The run showed the expected behaviour.
    Passed,
    /// Anything else.
    Failed,
}

impl TestResult {
    /// `Passed` when `passed`.
    pub fn from_bool(passed: bool) -> Self {
        if passed {
            TestResult::Passed
        } else {
            TestResult::Failed
        }
    }

    /// Name stored in the `result` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TestResult::Passed => "Passed",
            TestResult::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for TestResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TestResult {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Passed" => Ok(TestResult::Passed),
            "Failed" => Ok(TestResult::Failed),
            other => Err(format!("unknown test result '{other}'")),
        }
    }
}

/// What was run: kind, the two recorded parameters and the temperature.
///
/// Produced by the recipe layer so this crate does not need to know about
/// stimulus scripts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// Script that ran.
    pub kind: TestKind,
    /// Voltage or voltage step, e.g. `"5.0V"`.
    pub parameter1: String,
    /// Load resistor, e.g. `"R1"`.
    pub parameter2: String,
    /// Ambient temperature in °C.
    pub temperature: f64,
}

/// One persisted test run.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Assigned by the store on insert.
    pub id: Option<i64>,
    /// Device under test.
    pub chip_id: String,
    /// Script that ran.
    pub test_kind: TestKind,
    /// See [`RunDescriptor::parameter1`].
    pub parameter1: String,
    /// See [`RunDescriptor::parameter2`].
    pub parameter2: String,
    /// Ambient temperature in °C.
    pub temperature: f64,
    /// Captured traces.
    pub bundle: WaveformBundle,
    /// Caller's verdict.
    pub result: TestResult,
    /// UTC time the record was built.
    pub timestamp: DateTime<Utc>,
}

impl MeasurementRecord {
    /// Build the record for a finished run, stamped with the current time.
    pub fn from_run(
        chip_id: impl Into<String>,
        run: &RunDescriptor,
        bundle: WaveformBundle,
        result: TestResult,
    ) -> Self {
        Self {
            id: None,
            chip_id: chip_id.into(),
            test_kind: run.kind,
            parameter1: run.parameter1.clone(),
            parameter2: run.parameter2.clone(),
            temperature: run.temperature,
            bundle,
            result,
            timestamp: Utc::now(),
        }
    }

    /// Replace the timestamp, e.g. when re-importing old data.
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}

/// A stored row without its waveform blob.
///
/// Fields mean the same as on [`MeasurementRecord`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MeasurementSummary {
    pub id: i64,
    pub chip_id: String,
    pub test_kind: TestKind,
    pub parameter1: String,
    pub parameter2: String,
    pub temperature: f64,
    pub result: TestResult,
    pub timestamp: DateTime<Utc>,
}

/// Queryable metadata column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum MeasurementField {
    ChipId,
    MeasurementType,
    Parameter1,
    Parameter2,
    Temperature,
}

impl MeasurementField {
    /// Column name in the `measurements` table.
    pub fn column(&self) -> &'static str {
        match self {
            MeasurementField::ChipId => "chip_id",
            MeasurementField::MeasurementType => "measurement_type",
            MeasurementField::Parameter1 => "parameter1",
            MeasurementField::Parameter2 => "parameter2",
            MeasurementField::Temperature => "temperature",
        }
    }
}
