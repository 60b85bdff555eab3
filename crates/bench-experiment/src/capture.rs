//! Synchronized dual-scope acquisition.
//!
//! The primary scope triggers on an analog edge and exports that trigger on a
//! backplane line; the secondary imports it. Both are armed (secondary first),
//! the primary is polled at a fixed interval until it completes or the poll
//! budget runs out, and then two channels are fetched from each.
//!
//! # State Machine
//!
//! ```text
//! ┌───────┐  Triggered   ┌───────────┐
//! │ Armed │─────────────▶│ Triggered │
//! └───┬───┘              └─────┬─────┘
//!     │ Complete               │ Complete
//!     ▼                        ▼
//! ┌─────────────────────────────────┐
//! │            Complete             │
//! └─────────────────────────────────┘
//!
//! Armed / Triggered ── poll budget exhausted ──▶ TimedOut
//! ```
//!
//! A timeout is not an error: the bundle is still fetched and returned with
//! [`AcquisitionFlags::primary_timed_out`] set.

use std::sync::Arc;
use std::time::Duration;

use bench_core::capabilities::{AcquisitionStatus, Oscilloscope};
use bench_core::clock::Clock;
use bench_core::error::{BenchError, BenchResult};
use bench_core::trigger::{TriggerConfig, VerticalSettings};
use bench_core::waveform::{AcquisitionFlags, ChannelLabels, Trace, WaveformBundle};
use tracing::{debug, info, instrument, warn};

/// Channels fetched from each scope.
const CHANNELS: [u32; 2] = [0, 1];

/// The two scopes taking part in a capture.
#[derive(Clone)]
pub struct ScopePair {
    /// Triggers on the analog edge and exports it. Carries the voltages.
    pub primary: Arc<dyn Oscilloscope>,
    /// Imports the trigger. Carries the currents.
    pub secondary: Arc<dyn Oscilloscope>,
}

impl ScopePair {
    /// Pair a triggering primary with a trigger-importing secondary.
    pub fn new(primary: Arc<dyn Oscilloscope>, secondary: Arc<dyn Oscilloscope>) -> Self {
        Self { primary, secondary }
    }

    fn both(&self) -> [&Arc<dyn Oscilloscope>; 2] {
        [&self.primary, &self.secondary]
    }
}

/// Capture settings that do not change between runs.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureSettings {
    /// Applied to both channels of both scopes.
    pub vertical: VerticalSettings,
    /// Wait between two status queries of the primary.
    pub poll_interval: Duration,
    /// Status queries after the first before the wait gives up.
    pub timeout_polls: u32,
    /// Trace labels, primary channels first.
    pub labels: ChannelLabels,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            vertical: VerticalSettings::default(),
            poll_interval: Duration::from_millis(100),
            timeout_polls: 20,
            labels: ChannelLabels::default(),
        }
    }
}

impl CaptureSettings {
    /// Reject settings no scope can be driven with.
    ///
    /// The total wait `poll_interval * timeout_polls` must fit in a
    /// [`Duration`].
    pub fn validate(&self) -> BenchResult<()> {
        if self.poll_interval.is_zero() {
            return Err(BenchError::config("poll_interval must be greater than zero"));
        }
        if self.poll_interval.checked_mul(self.timeout_polls).is_none() {
            return Err(BenchError::config(format!(
                "poll_interval {:?} x {} polls overflows the completion timeout",
                self.poll_interval, self.timeout_polls
            )));
        }
        if !(self.vertical.range.is_finite() && self.vertical.range > 0.0) {
            return Err(BenchError::config(format!(
                "vertical range must be positive, got {}",
                self.vertical.range
            )));
        }
        if !(self.vertical.probe_attenuation.is_finite() && self.vertical.probe_attenuation > 0.0)
        {
            return Err(BenchError::config("probe_attenuation must be positive"));
        }
        Ok(())
    }

    /// Upper bound on the completion wait.
    pub fn timeout(&self) -> Duration {
        self.poll_interval.saturating_mul(self.timeout_polls)
    }
}

/// Progress of the primary acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Both scopes initiated, no trigger seen yet.
    Armed,
    /// The primary reported its trigger.
    Triggered,
    /// The primary record is complete.
    Complete,
    /// The poll budget ran out first.
    TimedOut,
}

impl CaptureState {
    /// Fold one status reading into the state.
    pub fn advance(self, status: AcquisitionStatus) -> Self {
        match (self, status) {
            (CaptureState::Complete | CaptureState::TimedOut, _) => self,
            (_, AcquisitionStatus::Complete) => CaptureState::Complete,
            (_, AcquisitionStatus::Triggered) => CaptureState::Triggered,
            // A driver that cannot see the trigger keeps reporting InProgress.
            (state, AcquisitionStatus::InProgress) => state,
        }
    }

    /// True once no further status reading can change the state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, CaptureState::Complete | CaptureState::TimedOut)
    }
}

/// Runs synchronized captures with a fixed set of [`CaptureSettings`].
pub struct WaveformCapture {
    settings: CaptureSettings,
    clock: Arc<dyn Clock>,
}

impl WaveformCapture {
    /// `settings` are checked on every [`WaveformCapture::acquire`] and by
    /// the orchestrator before it spawns a run.
    pub fn new(settings: CaptureSettings, clock: Arc<dyn Clock>) -> Self {
        Self { settings, clock }
    }

    /// Settings every capture uses.
    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    /// Arm both scopes, wait for the primary, then fetch all four traces.
    ///
    /// # Errors
    /// - `Configuration` if `trigger` or the settings are invalid, before any
    ///   instrument call
    /// - `Driver` on instrument communication failure
    #[instrument(skip_all, fields(
        primary = scopes.primary.name(),
        secondary = scopes.secondary.name(),
        samples = trigger.sample_count,
    ))]
    pub async fn acquire(
        &self,
        scopes: &ScopePair,
        trigger: &TriggerConfig,
        labels: &ChannelLabels,
    ) -> BenchResult<WaveformBundle> {
        trigger.validate()?;
        self.settings.validate()?;

        self.abort_if_running(scopes).await?;
        self.configure(scopes, trigger).await?;

        // The secondary must be waiting on the backplane line before the
        // primary can fire it.
        scopes.secondary.initiate().await?;
        scopes.primary.initiate().await?;
        debug!("both scopes armed");

        let mut flags = AcquisitionFlags::default();
        let final_state = self.wait_for_primary(scopes.primary.as_ref()).await?;
        if final_state == CaptureState::TimedOut {
            flags.primary_timed_out = true;
            warn!(
                timeout_ms = self.settings.timeout().as_millis() as u64,
                "primary acquisition did not complete, fetching stale data"
            );
        }

        let secondary_status = scopes.secondary.acquisition_status().await?;
        if secondary_status != AcquisitionStatus::Complete {
            flags.secondary_incomplete = true;
            warn!(status = ?secondary_status, "secondary acquisition not complete");
        }

        let bundle = self.fetch(scopes, trigger, labels, flags).await?;
        info!(
            timed_out = flags.primary_timed_out,
            secondary_incomplete = flags.secondary_incomplete,
            "capture finished"
        );
        Ok(bundle)
    }

    async fn abort_if_running(&self, scopes: &ScopePair) -> BenchResult<()> {
        let mut running = false;
        for scope in scopes.both() {
            running |= scope.acquisition_status().await?.is_running();
        }
        if running {
            debug!("acquisition left running, aborting both scopes");
            for scope in scopes.both() {
                scope.abort().await?;
            }
        }
        Ok(())
    }

    async fn configure(&self, scopes: &ScopePair, trigger: &TriggerConfig) -> BenchResult<()> {
        let horizontal = trigger.horizontal();
        for scope in scopes.both() {
            for channel in CHANNELS {
                scope.configure_vertical(channel, &self.settings.vertical).await?;
            }
            scope.configure_horizontal(&horizontal).await?;
        }

        scopes.primary.configure_trigger_edge(&trigger.edge()).await?;
        scopes.primary.export_trigger(trigger.trigger_line).await?;
        scopes.secondary.import_trigger(trigger.trigger_line).await?;
        Ok(())
    }

    async fn wait_for_primary(&self, primary: &dyn Oscilloscope) -> BenchResult<CaptureState> {
        let mut state = CaptureState::Armed;
        let mut polls = 0u32;
        loop {
            let status = primary.acquisition_status().await?;
            let next = state.advance(status);
            if next != state {
                debug!(from = ?state, to = ?next, polls, "capture state changed");
            }
            state = next;
            if state.is_terminal() {
                return Ok(state);
            }
            if polls >= self.settings.timeout_polls {
                return Ok(CaptureState::TimedOut);
            }
            polls += 1;
            self.clock.sleep(self.settings.poll_interval).await;
        }
    }

    async fn fetch(
        &self,
        scopes: &ScopePair,
        trigger: &TriggerConfig,
        labels: &ChannelLabels,
        flags: AcquisitionFlags,
    ) -> BenchResult<WaveformBundle> {
        let time = trigger.time_vector();
        let count = trigger.sample_count;
        let mut bundle = WaveformBundle {
            flags,
            ..Default::default()
        };

        for (channel, label) in CHANNELS.into_iter().zip(labels.primary()) {
            let values = scopes.primary.fetch(channel, count).await?;
            bundle.add_primary(Trace::new(label, time.clone(), values));
        }
        for (channel, label) in CHANNELS.into_iter().zip(labels.secondary()) {
            let values = scopes.secondary.fetch(channel, count).await?;
            bundle.add_secondary(Trace::new(label, time.clone(), values));
        }
        Ok(bundle)
    }
}
