//! Cross-instrument trigger contract and scope timing settings.
//!
//! A [`TriggerConfig`] describes one synchronized capture. An edge on the
//! primary scope's analog input fires the acquisition. The primary exports
//! that edge on a backplane [`TriggerLine`] and the secondary scope imports it.
//!
//! The timing model is a single capture window: `sample_interval` is the total
//! window length in seconds and `sample_count` points are spread evenly over
//! it. The resulting sample period is `sample_interval / sample_count`.

use serde::{Deserialize, Serialize};

use crate::error::{BenchError, BenchResult};

/// Edge direction for the primary trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TriggerSlope {
    #[default]
    Rising,
    Falling,
}

/// Input or trigger coupling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Coupling {
    #[default]
    Dc,
    Ac,
}

/// Backplane digital trigger line shared by both scopes (e.g. PXI_Trig0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct TriggerLine(pub u8);

impl std::fmt::Display for TriggerLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PXI_Trig{}", self.0)
    }
}

/// Synchronization contract for one dual-scope capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TriggerConfig {
    /// Analog channel on the primary scope that sources the edge.
    pub primary_channel: u32,
    /// Edge threshold in volts.
    pub trigger_level: f64,
    /// Edge direction that fires the trigger.
    pub trigger_slope: TriggerSlope,
    /// Coupling of the trigger input.
    pub trigger_coupling: Coupling,
    /// Total capture window in seconds.
    pub sample_interval: f64,
    /// Number of points per channel.
    pub sample_count: usize,
    /// Horizontal reference position in percent of the record (0..=100).
    pub pretrigger_fraction: f64,
    /// Backplane line the primary exports and the secondary imports.
    pub trigger_line: TriggerLine,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            primary_channel: 0,
            trigger_level: 1.0,
            trigger_slope: TriggerSlope::Rising,
            trigger_coupling: Coupling::Dc,
            sample_interval: 20e-3,
            sample_count: 20_000,
            pretrigger_fraction: 50.0,
            trigger_line: TriggerLine(0),
        }
    }
}

impl TriggerConfig {
    /// Reject parameters that would produce an unusable capture.
    ///
    /// Runs before any instrument call is issued.
    pub fn validate(&self) -> BenchResult<()> {
        if self.sample_count == 0 {
            return Err(BenchError::config("sample_count must be greater than zero"));
        }
        if !(self.sample_interval.is_finite() && self.sample_interval > 0.0) {
            return Err(BenchError::config(format!(
                "sample_interval must be a positive number of seconds, got {}",
                self.sample_interval
            )));
        }
        if !(0.0..=100.0).contains(&self.pretrigger_fraction) {
            return Err(BenchError::config(format!(
                "pretrigger_fraction must be within 0..=100, got {}",
                self.pretrigger_fraction
            )));
        }
        if !self.trigger_level.is_finite() {
            return Err(BenchError::config("trigger_level must be finite"));
        }
        if self.primary_channel > 1 {
            return Err(BenchError::config(format!(
                "primary_channel {} does not exist on a dual-channel scope",
                self.primary_channel
            )));
        }
        Ok(())
    }

    /// Sample period in seconds.
    pub fn sample_period(&self) -> f64 {
        self.sample_interval / self.sample_count as f64
    }

    /// Sample rate in samples per second.
    pub fn sample_rate(&self) -> f64 {
        self.sample_count as f64 / self.sample_interval
    }

    /// Horizontal settings derived from this trigger contract.
    pub fn horizontal(&self) -> HorizontalTiming {
        HorizontalTiming {
            sample_rate: self.sample_rate(),
            sample_count: self.sample_count,
            ref_position_pct: self.pretrigger_fraction,
        }
    }

    /// Edge trigger settings for the primary scope.
    pub fn edge(&self) -> EdgeTrigger {
        EdgeTrigger {
            channel: self.primary_channel,
            level: self.trigger_level,
            coupling: self.trigger_coupling,
            slope: self.trigger_slope,
        }
    }

    /// Time axis for this capture, symmetric about zero.
    pub fn time_vector(&self) -> Vec<f64> {
        time_vector(self.sample_count, self.sample_period())
    }
}

/// Build an `n`-point time axis centered on zero with spacing `dt`.
///
/// Point `i` sits at `(i - (n - 1) / 2) * dt`. The endpoints are therefore
/// `±(n - 1) / 2 * dt`, half a sample inside the nominal `±n / 2 * dt` window.
pub fn time_vector(n: usize, dt: f64) -> Vec<f64> {
    let center = (n as f64 - 1.0) / 2.0;
    (0..n).map(|i| (i as f64 - center) * dt).collect()
}

/// Per-channel vertical settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalSettings {
    /// Full-scale range in volts.
    pub range: f64,
    /// Input coupling.
    pub coupling: Coupling,
    /// Vertical offset in volts.
    pub offset: f64,
    /// Probe divide ratio.
    pub probe_attenuation: f64,
    /// Channel acquires when true.
    pub enabled: bool,
}

impl Default for VerticalSettings {
    fn default() -> Self {
        Self {
            range: 6.0,
            coupling: Coupling::Dc,
            offset: 0.0,
            probe_attenuation: 1.0,
            enabled: true,
        }
    }
}

/// Horizontal timing applied identically to both scopes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HorizontalTiming {
    /// Samples per second.
    pub sample_rate: f64,
    /// Points per channel.
    pub sample_count: usize,
    /// Trigger position in percent of the record.
    pub ref_position_pct: f64,
}

/// Analog edge trigger on the primary scope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct EdgeTrigger {
    pub channel: u32,
    pub level: f64,
    pub coupling: Coupling,
    pub slope: TriggerSlope,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_is_valid() {
        assert!(TriggerConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_samples() {
        let cfg = TriggerConfig {
            sample_count: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(BenchError::Configuration(_))));
    }

    #[test]
    fn test_rejects_non_positive_interval() {
        for interval in [0.0, -1e-3, f64::NAN, f64::INFINITY] {
            let cfg = TriggerConfig {
                sample_interval: interval,
                ..Default::default()
            };
            assert!(cfg.validate().is_err(), "interval {interval} accepted");
        }
    }

    #[test]
    fn test_rejects_pretrigger_out_of_range() {
        let cfg = TriggerConfig {
            pretrigger_fraction: 120.0,
            ..Default::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_hundred_ms_window_rate_and_span() {
        let cfg = TriggerConfig {
            sample_count: 20_000,
            sample_interval: 0.1,
            ..Default::default()
        };
        assert!((cfg.sample_rate() - 200_000.0).abs() < 1e-6);

        let t = cfg.time_vector();
        assert_eq!(t.len(), 20_000);
        let dt = cfg.sample_period();
        assert!((t[0] + 0.05).abs() <= dt);
        assert!((t[t.len() - 1] - 0.05).abs() <= dt);
    }

    #[test]
    fn test_horizontal_uses_pretrigger_as_reference() {
        let cfg = TriggerConfig {
            pretrigger_fraction: 10.0,
            ..Default::default()
        };
        assert_eq!(cfg.horizontal().ref_position_pct, 10.0);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let cfg: TriggerConfig =
            serde_json::from_str(r#"{"trigger_level": 4.6, "trigger_slope": "falling"}"#).unwrap();
        assert_eq!(cfg.trigger_slope, TriggerSlope::Falling);
        assert_eq!(cfg.trigger_level, 4.6);
        assert_eq!(cfg.sample_count, 20_000);
        assert_eq!(cfg.trigger_line, TriggerLine(0));
    }

    #[test]
    fn test_trigger_line_display() {
        assert_eq!(TriggerLine(3).to_string(), "PXI_Trig3");
    }

    proptest! {
        #[test]
        fn prop_time_vector_shape(n in 1usize..5_000, interval in 1e-6f64..10.0) {
            let cfg = TriggerConfig {
                sample_count: n,
                sample_interval: interval,
                ..Default::default()
            };
            let t = cfg.time_vector();
            let dt = interval / n as f64;

            prop_assert_eq!(t.len(), n);
            for i in 0..n {
                let mirrored = t[n - 1 - i];
                prop_assert!((t[i] + mirrored).abs() <= 1e-9 * interval.max(1.0));
            }
            for pair in t.windows(2) {
                prop_assert!(((pair[1] - pair[0]) - dt).abs() <= 1e-9 * dt.max(1.0));
            }
        }
    }
}
