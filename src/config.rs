//! Bench configuration using Figment.
//!
//! Configuration is layered:
//! 1. Built-in defaults
//! 2. A TOML file (default `config/bench.toml`)
//! 3. Environment variables prefixed with `DCDC_BENCH_`; nested keys use a
//!    double underscore
//!
//! ```text
//! DCDC_BENCH_LOG_LEVEL=debug
//! DCDC_BENCH_CAPTURE__TIMEOUT_POLLS=40
//! DCDC_BENCH_SOURCE__MODE=smu
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use bench_core::capabilities::{BenchSupply, DigitalLines, Rail, SmuChannels, VoltageSource};
use bench_core::error::{BenchError, BenchResult};
use bench_core::source::{SmuSource, SupplySource};
use bench_core::trigger::{Coupling, VerticalSettings};
use bench_core::waveform::ChannelLabels;
use bench_experiment::{Actuators, CaptureSettings};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::logging::LogFormat;

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/bench.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DCDC_BENCH_";

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Top-level bench configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchConfig {
    /// trace, debug, info, warn or error
    pub log_level: String,
    /// Output format of the log lines.
    pub log_format: LogFormat,
    /// Device under test, written into every stored record.
    pub chip_id: String,
    /// Measurement database.
    pub storage: StorageConfig,
    /// Scope settings.
    pub capture: CaptureConfig,
    /// Converter input source.
    pub source: SourceConfig,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            chip_id: "unknown".to_string(),
            storage: StorageConfig::default(),
            capture: CaptureConfig::default(),
            source: SourceConfig::default(),
        }
    }
}

/// Where measurements are stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite file, created on first open.
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("data/measurements.db"),
        }
    }
}

/// Scope settings shared by every capture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Wait between primary status polls.
    pub poll_interval_ms: u64,
    /// Status polls after the first before the wait gives up.
    pub timeout_polls: u32,
    /// Full-scale vertical range in volts.
    pub vertical_range: f64,
    /// Vertical offset in volts.
    pub vertical_offset: f64,
    /// Probe divide ratio, 1.0 for a direct connection.
    pub probe_attenuation: f64,
    /// Input coupling on every channel.
    pub coupling: Coupling,
    /// Primary ch0, primary ch1, secondary ch0, secondary ch1.
    pub channel_labels: Vec<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        let settings = CaptureSettings::default();
        Self {
            poll_interval_ms: settings.poll_interval.as_millis() as u64,
            timeout_polls: settings.timeout_polls,
            vertical_range: settings.vertical.range,
            vertical_offset: settings.vertical.offset,
            probe_attenuation: settings.vertical.probe_attenuation,
            coupling: settings.vertical.coupling,
            channel_labels: settings.labels.0.to_vec(),
        }
    }
}

impl CaptureConfig {
    /// Build engine settings, rejecting a label list that is not four long.
    pub fn to_settings(&self) -> BenchResult<CaptureSettings> {
        let settings = CaptureSettings {
            vertical: VerticalSettings {
                range: self.vertical_range,
                coupling: self.coupling,
                offset: self.vertical_offset,
                probe_attenuation: self.probe_attenuation,
                enabled: true,
            },
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            timeout_polls: self.timeout_polls,
            labels: ChannelLabels::try_from(self.channel_labels.clone())?,
        };
        settings.validate()?;
        Ok(settings)
    }
}

impl TryFrom<&CaptureConfig> for CaptureSettings {
    type Error = BenchError;

    fn try_from(config: &CaptureConfig) -> Result<Self, Self::Error> {
        config.to_settings()
    }
}

/// Which instrument drives the converter input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SourceMode {
    /// Four-channel SMU, all channels driven together.
    Smu,
    /// Programmable bench supply on `rail`.
    #[default]
    BenchSupply,
}

/// Which instrument feeds the converter, and on which rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SourceConfig {
    /// Instrument wrapped into the [`VoltageSource`].
    pub mode: SourceMode,
    /// Bench-supply rail; ignored in SMU mode.
    pub rail: Rail,
}

impl SourceConfig {
    /// Build the stimulus actuators for this source selection.
    ///
    /// Wraps whichever of `smu` and `supply` the mode selects and points
    /// every voltage write at `rail`. The other instrument may be `None`.
    ///
    /// # Errors
    /// `Configuration` when the selected instrument is missing.
    pub fn actuators(
        &self,
        gpio: Arc<dyn DigitalLines>,
        smu: Option<Arc<dyn SmuChannels>>,
        supply: Option<Arc<dyn BenchSupply>>,
    ) -> BenchResult<Actuators> {
        let source: Arc<dyn VoltageSource> = match self.mode {
            SourceMode::Smu => {
                let smu = smu
                    .ok_or_else(|| BenchError::config("source.mode is smu but no SMU was given"))?;
                Arc::new(SmuSource::new(smu))
            }
            SourceMode::BenchSupply => {
                let supply = supply.ok_or_else(|| {
                    BenchError::config("source.mode is bench_supply but no supply was given")
                })?;
                Arc::new(SupplySource::new(supply))
            }
        };
        info!(mode = ?self.mode, rail = %self.rail, "voltage source selected");
        Ok(Actuators::new(gpio, source).with_rail(self.rail))
    }
}

impl BenchConfig {
    /// Load from [`DEFAULT_CONFIG_PATH`] and the environment.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file and the environment.
    ///
    /// A missing file is not an error; defaults and environment still apply.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    /// The layered provider stack, exposed for callers that add their own.
    pub fn figment<P: AsRef<Path>>(path: P) -> Figment {
        Figment::from(Serialized::defaults(BenchConfig::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Validate configuration after loading.
    pub fn validate(&self) -> BenchResult<()> {
        if !VALID_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(BenchError::config(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                VALID_LEVELS.join(", ")
            )));
        }
        if self.chip_id.trim().is_empty() {
            return Err(BenchError::config("chip_id must not be empty"));
        }
        if self.storage.database_path.as_os_str().is_empty() {
            return Err(BenchError::config("storage.database_path must not be empty"));
        }
        self.capture.to_settings()?;
        Ok(())
    }
}
