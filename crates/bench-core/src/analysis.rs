//! Post-capture helpers for pass/fail classification.
//!
//! Nothing here decides a verdict. These are the measurements a caller uses
//! to make one.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};
use crate::waveform::{Trace, WaveformBundle};

/// Minimum peak magnitude for a trace to count as carrying a signal.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignalThresholds {
    /// Voltage-axis threshold in volts.
    pub volts: f64,
    /// Current-axis threshold in amperes.
    pub amps: f64,
}

impl Default for SignalThresholds {
    fn default() -> Self {
        Self {
            volts: 0.02,
            amps: 0.001,
        }
    }
}

impl Trace {
    /// Largest absolute sample, or 0.0 for an empty trace.
    pub fn peak_abs(&self) -> f64 {
        self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
    }

    /// Mean of the last `fraction` of the samples.
    fn tail_mean(&self, fraction: f64) -> Option<f64> {
        if self.values.is_empty() {
            return None;
        }
        let n = self.values.len();
        let take = ((n as f64 * fraction).ceil() as usize).clamp(1, n);
        let tail = &self.values[n - take..];
        Some(tail.iter().sum::<f64>() / take as f64)
    }
}

impl WaveformBundle {
    /// Traces whose peak exceeds the threshold for their axis.
    pub fn active_traces(&self, thresholds: &SignalThresholds) -> Vec<&Trace> {
        let voltages = self
            .primary_axis
            .iter()
            .filter(|t| t.peak_abs() > thresholds.volts);
        let currents = self
            .secondary_axis
            .iter()
            .filter(|t| t.peak_abs() > thresholds.amps);
        voltages.chain(currents).collect()
    }

    /// True if any trace exceeds its axis threshold.
    pub fn has_signal(&self, thresholds: &SignalThresholds) -> bool {
        !self.active_traces(thresholds).is_empty()
    }
}

/// Steady-state power efficiency `Vout·Iout / (Vin·Iin)`.
///
/// Each quantity is averaged over the trailing `fraction` of its trace. The
/// bundle must carry the default axis layout: primary = [Vin, Vout],
/// secondary = [Iin, Iout].
pub fn steady_state_efficiency(bundle: &WaveformBundle, fraction: f64) -> BenchResult<f64> {
    if !(fraction > 0.0 && fraction <= 1.0) {
        return Err(BenchError::config(format!(
            "efficiency window fraction must be within (0, 1], got {fraction}"
        )));
    }
    let [vin, vout] = pair(&bundle.primary_axis, "voltage")?;
    let [iin, iout] = pair(&bundle.secondary_axis, "current")?;

    let mean = |t: &Trace| {
        t.tail_mean(fraction)
            .ok_or_else(|| BenchError::config(format!("trace '{}' is empty", t.label)))
    };
    let input_power = mean(vin)? * mean(iin)?;
    if input_power.abs() < f64::EPSILON {
        return Err(BenchError::config("input power is zero"));
    }
    Ok(mean(vout)? * mean(iout)? / input_power)
}

fn pair<'a>(axis: &'a [Trace], what: &str) -> BenchResult<[&'a Trace; 2]> {
    match axis {
        [a, b, ..] => Ok([a, b]),
        _ => Err(BenchError::config(format!(
            "efficiency needs two {what} traces, found {}",
            axis.len()
        ))),
    }
}
