//! # DC-DC converter bench
//!
//! Synchronized stimulus and dual-scope acquisition for DC-DC converter
//! validation. This crate ties the workspace together:
//!
//! - **`config`**: [`BenchConfig`], loaded with Figment from TOML and
//!   `DCDC_BENCH_` environment variables
//! - **`logging`**: `tracing-subscriber` setup
//!
//! The engine lives in [`bench_experiment`], the data model and instrument
//! traits in [`bench_core`], and persistence in [`bench_storage`].
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use dcdc_bench::bench_core::capabilities::{BenchSupply, DigitalLines, SmuChannels};
//! # async fn run(
//! #     gpio: Arc<dyn DigitalLines>,
//! #     smu: Option<Arc<dyn SmuChannels>>,
//! #     supply: Option<Arc<dyn BenchSupply>>,
//! #     scopes: dcdc_bench::ScopePair,
//! # ) -> anyhow::Result<()> {
//! use dcdc_bench::*;
//!
//! let config = dcdc_bench::load_and_init("config/bench.toml")?;
//! let actuators = config.source.actuators(gpio, smu, supply)?;
//! let clock = Arc::new(TokioClock::new());
//! let orchestrator = TestOrchestrator::new(
//!     WaveformCapture::new(config.capture.to_settings()?, clock.clone()),
//!     clock,
//! );
//! let request = TestRequest::new(
//!     StimulusRecipe::Startup { voltage: 5.0, resistor: Resistor::R1 },
//!     25.0,
//! );
//! let run = request.descriptor();
//! let bundle = orchestrator.run_test(request, &actuators, &scopes).await?;
//!
//! let store = MeasurementStore::open(&config.storage.database_path)?;
//! let verdict = TestResult::from_bool(bundle.has_signal(&Default::default()));
//! store.insert(&MeasurementRecord::from_run(&config.chip_id, &run, bundle, verdict))?;
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use anyhow::Context;
use tracing::info;

pub mod config;
pub mod logging;

pub use bench_core;
pub use bench_experiment;
pub use bench_storage;

pub use bench_core::{
    BenchError, BenchResult, Clock, MeasurementRecord, Resistor, TestKind, TestResult, TokioClock,
    TriggerConfig, WaveformBundle,
};
pub use bench_experiment::{
    Actuators, CaptureSettings, RunError, ScopePair, StimulusRecipe, TestOrchestrator,
    TestRequest, WaveformCapture,
};
pub use bench_storage::MeasurementStore;
pub use config::{BenchConfig, SourceConfig, SourceMode};
pub use logging::{LogFormat, LoggingConfig};

/// Load and validate the configuration at `path`, then install logging.
pub fn load_and_init(path: impl AsRef<Path>) -> anyhow::Result<BenchConfig> {
    let path = path.as_ref();
    let config = BenchConfig::load_from(path)
        .with_context(|| format!("failed to load bench configuration from {}", path.display()))?;
    config
        .validate()
        .context("bench configuration is invalid")?;
    logging::init_from_config(&config).context("failed to initialize logging")?;
    info!(
        chip_id = %config.chip_id,
        source = ?config.source.mode,
        database = %config.storage.database_path.display(),
        "bench configured"
    );
    Ok(config)
}
