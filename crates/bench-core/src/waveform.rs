//! Captured waveform data.
//!
//! A [`WaveformBundle`] is the product of one synchronized capture: two traces
//! from the primary scope on the voltage axis and two traces from the
//! secondary scope on the current axis, plus the run title and temperature.

use serde::{Deserialize, Serialize};

/// One labeled time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    /// Channel label, e.g. "Input voltage".
    pub label: String,
    /// Seconds relative to the trigger.
    pub time: Vec<f64>,
    /// Samples aligned with `time`.
    pub values: Vec<f64>,
}

impl Trace {
    /// Build a trace; `time` and `values` are expected to match in length.
    pub fn new(label: impl Into<String>, time: Vec<f64>, values: Vec<f64>) -> Self {
        Self {
            label: label.into(),
            time,
            values,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when nothing was fetched.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Labels for the four captured channels.
///
/// Order: primary ch0, primary ch1, secondary ch0, secondary ch1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelLabels(pub [String; 4]);

impl Default for ChannelLabels {
    fn default() -> Self {
        Self([
            "Input voltage".to_string(),
            "Output voltage".to_string(),
            "Input current".to_string(),
            "Output current".to_string(),
        ])
    }
}

impl ChannelLabels {
    /// Labels for the primary scope's two channels.
    pub fn primary(&self) -> [&str; 2] {
        [&self.0[0], &self.0[1]]
    }

    /// Labels for the secondary scope's two channels.
    pub fn secondary(&self) -> [&str; 2] {
        [&self.0[2], &self.0[3]]
    }
}

impl TryFrom<Vec<String>> for ChannelLabels {
    type Error = crate::error::BenchError;

    fn try_from(labels: Vec<String>) -> Result<Self, Self::Error> {
        let count = labels.len();
        let array: [String; 4] = labels.try_into().map_err(|_| {
            crate::error::BenchError::config(format!(
                "exactly 4 channel labels are required, got {count}"
            ))
        })?;
        Ok(Self(array))
    }
}

/// Soft-failure markers set during acquisition.
///
/// A bundle with any flag set was still recorded, but its data may be stale or
/// empty. The caller decides whether the run counts as failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcquisitionFlags {
    /// The primary scope did not report completion before the poll timeout.
    pub primary_timed_out: bool,
    /// The secondary scope had not completed when the primary finished.
    pub secondary_incomplete: bool,
}

impl AcquisitionFlags {
    /// True when no flag is set.
    pub fn is_clean(&self) -> bool {
        !self.primary_timed_out && !self.secondary_incomplete
    }
}

/// Four synchronized traces grouped on two display axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveformBundle {
    /// Plot title, set by the orchestrator.
    pub title: String,
    /// Ambient temperature in °C.
    pub temperature: f64,
    /// Time axis label.
    pub x_label: String,
    /// Voltage axis label.
    pub y_label: String,
    /// Current axis label.
    pub y2_label: String,
    /// Voltage traces from the primary scope.
    pub primary_axis: Vec<Trace>,
    /// Current traces from the secondary scope.
    pub secondary_axis: Vec<Trace>,
    /// Soft failures seen while acquiring.
    pub flags: AcquisitionFlags,
}

impl Default for WaveformBundle {
    fn default() -> Self {
        Self {
            title: "Voltage vs Time".to_string(),
            temperature: 22.0,
            x_label: "Time [s]".to_string(),
            y_label: "Volt [V]".to_string(),
            y2_label: "Current [A]".to_string(),
            primary_axis: Vec::new(),
            secondary_axis: Vec::new(),
            flags: AcquisitionFlags::default(),
        }
    }
}

impl WaveformBundle {
    /// Add a trace to the voltage axis.
    pub fn add_primary(&mut self, trace: Trace) {
        self.primary_axis.push(trace);
    }

    /// Add a trace to the current axis.
    pub fn add_secondary(&mut self, trace: Trace) {
        self.secondary_axis.push(trace);
    }

    /// All traces, voltage axis first.
    /// All traces, primary axis first.
    pub fn traces(&self) -> impl Iterator<Item = &Trace> {
        self.primary_axis.iter().chain(self.secondary_axis.iter())
    }

    /// First trace with this label.
    pub fn trace(&self, label: &str) -> Option<&Trace> {
        self.traces().find(|t| t.label == label)
    }
}
