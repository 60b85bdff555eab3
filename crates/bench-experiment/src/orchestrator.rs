//! TestOrchestrator - runs one stimulus and one capture concurrently.
//!
//! The capture and the stimulus are spawned as two tokio tasks and both are
//! joined before `run_test` returns. There is no rendezvous between them: the
//! recipe's arm lead time gives the capture room to arm first.

use std::sync::Arc;

use bench_core::clock::Clock;
use bench_core::error::BenchError;
use bench_core::record::RunDescriptor;
use bench_core::trigger::TriggerConfig;
use bench_core::waveform::WaveformBundle;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::capture::{ScopePair, WaveformCapture};
use crate::recipe::{Actuators, StimulusRecipe};

/// One test to run.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRequest {
    /// Stimulus to apply.
    pub recipe: StimulusRecipe,
    /// Ambient temperature in °C, recorded on the bundle.
    pub temperature: f64,
    /// Overrides the recipe's trigger preset.
    pub trigger: Option<TriggerConfig>,
}

impl TestRequest {
    /// Request that uses the recipe's trigger preset.
    pub fn new(recipe: StimulusRecipe, temperature: f64) -> Self {
        Self {
            recipe,
            temperature,
            trigger: None,
        }
    }

    /// Capture with `trigger` instead of the preset.
    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.trigger = Some(trigger);
        self
    }

    /// The trigger actually used: the override, or the recipe preset.
    pub fn trigger_config(&self) -> TriggerConfig {
        self.trigger
            .clone()
            .unwrap_or_else(|| self.recipe.trigger_preset())
    }

    /// Record metadata for this run.
    pub fn descriptor(&self) -> RunDescriptor {
        self.recipe.descriptor(self.temperature)
    }
}

/// Why a run produced no usable bundle.
#[derive(Error, Debug)]
pub enum RunError {
    /// The stimulus failed. The capture was still awaited; its bundle, if
    /// any, is in `partial`.
    #[error("Stimulus failed: {source}")]
    Stimulus {
        /// What the stimulus reported.
        #[source]
        source: BenchError,
        /// Titled bundle from the capture, when it succeeded.
        partial: Option<Box<WaveformBundle>>,
    },

    /// The capture failed while the stimulus succeeded.
    #[error("Capture failed: {0}")]
    Capture(#[source] BenchError),

    /// A task panicked or was cancelled.
    #[error("Task failed to complete: {0}")]
    TaskJoin(#[from] tokio::task::JoinError),
}

/// Runs tests one at a time against injected instruments.
pub struct TestOrchestrator {
    capture: Arc<WaveformCapture>,
    clock: Arc<dyn Clock>,
}

impl TestOrchestrator {
    /// The stimulus and the capture share `clock`.
    pub fn new(capture: WaveformCapture, clock: Arc<dyn Clock>) -> Self {
        Self {
            capture: Arc::new(capture),
            clock,
        }
    }

    /// The capture engine runs use.
    pub fn capture(&self) -> &WaveformCapture {
        &self.capture
    }

    /// Run one test and return the titled bundle.
    ///
    /// The recipe, the trigger and the capture settings are all checked
    /// before either task starts. The stimulus cleans up after itself; this
    /// does not touch the actuators again.
    #[instrument(skip_all, fields(kind = %request.recipe.kind(), temperature = request.temperature))]
    pub async fn run_test(
        &self,
        request: TestRequest,
        actuators: &Actuators,
        scopes: &ScopePair,
    ) -> Result<WaveformBundle, RunError> {
        let trigger = request.trigger_config();
        // Nothing is spawned when either half is misconfigured.
        if let Err(source) = request.recipe.validate() {
            return Err(RunError::Stimulus {
                source,
                partial: None,
            });
        }
        trigger.validate().map_err(RunError::Capture)?;
        self.capture.settings().validate().map_err(RunError::Capture)?;

        let title = request.recipe.title(request.temperature);
        let temperature = request.temperature;
        info!(%title, "test started");

        let capture_task = {
            let capture = Arc::clone(&self.capture);
            let scopes = scopes.clone();
            let labels = self.capture.settings().labels.clone();
            tokio::spawn(async move { capture.acquire(&scopes, &trigger, &labels).await })
        };
        let stimulus_task = {
            let actuators = actuators.clone();
            let clock = Arc::clone(&self.clock);
            let recipe = request.recipe;
            tokio::spawn(async move { recipe.execute(&actuators, clock.as_ref()).await })
        };

        let (capture_joined, stimulus_joined) = tokio::join!(capture_task, stimulus_task);
        let capture_result = capture_joined?;
        let stimulus_result = stimulus_joined?;

        let finish = |mut bundle: WaveformBundle| {
            bundle.title = title.clone();
            bundle.temperature = temperature;
            bundle
        };

        match (stimulus_result, capture_result) {
            (Err(source), capture) => {
                error!(error = %source, "stimulus failed");
                let partial = match capture {
                    Ok(bundle) => Some(Box::new(finish(bundle))),
                    Err(capture_err) => {
                        warn!(error = %capture_err, "capture also failed");
                        None
                    }
                };
                Err(RunError::Stimulus { source, partial })
            }
            (Ok(_), Err(e)) => {
                error!(error = %e, "capture failed");
                Err(RunError::Capture(e))
            }
            (Ok(trace), Ok(bundle)) => {
                info!(actions = trace.entries.len(), flags = ?bundle.flags, "test finished");
                Ok(finish(bundle))
            }
        }
    }
}
