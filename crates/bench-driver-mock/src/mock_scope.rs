//! Mock dual-channel digitizer with backplane trigger routing.
//!
//! Completion is driven by status queries rather than wall time, so capture
//! tests stay deterministic on any clock. Pass a shared
//! [`crate::CallLog`] to two scopes to check their relative call order.

use async_trait::async_trait;
use bench_core::capabilities::{AcquisitionStatus, DriverResult, Oscilloscope};
use bench_core::error::{DriverError, DriverErrorKind};
use bench_core::trigger::{EdgeTrigger, HorizontalTiming, TriggerLine, VerticalSettings};
use std::sync::Mutex;
use tracing::debug;

use crate::common::{harness_builders, lock, MockHarness, MockRng, TimingConfig};

/// When an initiated acquisition reports completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Complete on the first status query.
    Immediate,
    /// `InProgress` for the first `triggered - 1` queries, then `Triggered`
    /// until query number `complete`, which reports `Complete`.
    AfterPolls { triggered: u32, complete: u32 },
    /// Never completes; the trigger never arrives.
    Never,
}

/// Waveform produced on one channel when an acquisition completes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalShape {
    Flat(f64),
    /// `before` up to the trigger point, `after` from it on.
    Step { before: f64, after: f64 },
}

#[derive(Debug, Default)]
struct ScopeState {
    vertical: [Option<VerticalSettings>; 2],
    horizontal: Option<HorizontalTiming>,
    edge: Option<EdgeTrigger>,
    exported: Option<TriggerLine>,
    imported: Option<TriggerLine>,
    running: bool,
    polls: u32,
    initiations: u32,
    record: Option<[Vec<f64>; 2]>,
}

/// Simulated PXI digitizer.
pub struct MockScope {
    harness: MockHarness,
    completion: Completion,
    signals: [SignalShape; 2],
    noise: f64,
    rng: MockRng,
    state: Mutex<ScopeState>,
}

impl MockScope {
    pub fn new(name: &str) -> Self {
        Self {
            harness: MockHarness::new(name, "mock_scope", TimingConfig::scope()),
            completion: Completion::Immediate,
            signals: [SignalShape::Flat(0.0), SignalShape::Flat(0.0)],
            noise: 0.0,
            rng: MockRng::new(None),
            state: Mutex::new(ScopeState::default()),
        }
    }

    pub fn with_completion(mut self, completion: Completion) -> Self {
        self.completion = completion;
        self
    }

    pub fn with_signals(mut self, ch0: SignalShape, ch1: SignalShape) -> Self {
        self.signals = [ch0, ch1];
        self
    }

    /// Add seeded uniform noise of the given amplitude to every sample.
    pub fn with_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise = amplitude;
        self.rng = MockRng::new(Some(seed));
        self
    }

    /// Start with an acquisition already running, as left by an earlier
    /// capture that timed out.
    pub fn already_running(self) -> Self {
        lock(&self.state).running = true;
        self
    }

    pub fn is_running(&self) -> bool {
        lock(&self.state).running
    }

    pub fn initiations(&self) -> u32 {
        lock(&self.state).initiations
    }

    pub fn vertical(&self, channel: u32) -> Option<VerticalSettings> {
        lock(&self.state)
            .vertical
            .get(channel as usize)
            .copied()
            .flatten()
    }

    pub fn horizontal(&self) -> Option<HorizontalTiming> {
        lock(&self.state).horizontal
    }

    pub fn edge_trigger(&self) -> Option<EdgeTrigger> {
        lock(&self.state).edge
    }

    pub fn exported_line(&self) -> Option<TriggerLine> {
        lock(&self.state).exported
    }

    pub fn imported_line(&self) -> Option<TriggerLine> {
        lock(&self.state).imported
    }

    fn status_for_poll(&self, poll: u32) -> AcquisitionStatus {
        match self.completion {
            Completion::Immediate => AcquisitionStatus::Complete,
            Completion::AfterPolls {
                triggered,
                complete,
            } => {
                if poll >= complete {
                    AcquisitionStatus::Complete
                } else if poll >= triggered {
                    AcquisitionStatus::Triggered
                } else {
                    AcquisitionStatus::InProgress
                }
            }
            Completion::Never => AcquisitionStatus::InProgress,
        }
    }

    fn synthesize(&self, horizontal: Option<HorizontalTiming>) -> [Vec<f64>; 2] {
        let (count, ref_pct) = horizontal
            .map(|h| (h.sample_count, h.ref_position_pct))
            .unwrap_or((1000, 50.0));
        let trigger_index = ((count as f64) * ref_pct / 100.0).round() as usize;
        let build = |shape: SignalShape| -> Vec<f64> {
            let mut values: Vec<f64> = (0..count)
                .map(|i| match shape {
                    SignalShape::Flat(v) => v,
                    SignalShape::Step { before, after } => {
                        if i < trigger_index {
                            before
                        } else {
                            after
                        }
                    }
                })
                .collect();
            self.rng.add_noise(&mut values, self.noise);
            values
        };
        [build(self.signals[0]), build(self.signals[1])]
    }

    fn check_channel(&self, channel: u32) -> DriverResult<usize> {
        if channel > 1 {
            return Err(DriverError::new(
                "mock_scope",
                DriverErrorKind::InvalidParameter,
                format!("channel {channel} does not exist"),
            ));
        }
        Ok(channel as usize)
    }
}

harness_builders!(MockScope);

#[async_trait]
impl Oscilloscope for MockScope {
    fn name(&self) -> &str {
        self.harness.name()
    }

    async fn configure_vertical(
        &self,
        channel: u32,
        settings: &VerticalSettings,
    ) -> DriverResult<()> {
        self.harness
            .enter("configure_vertical", format!("{channel}"))
            .await?;
        let idx = self.check_channel(channel)?;
        lock(&self.state).vertical[idx] = Some(*settings);
        Ok(())
    }

    async fn configure_horizontal(&self, timing: &HorizontalTiming) -> DriverResult<()> {
        self.harness
            .enter(
                "configure_horizontal",
                format!("{} S/s, {} points", timing.sample_rate, timing.sample_count),
            )
            .await?;
        lock(&self.state).horizontal = Some(*timing);
        Ok(())
    }

    async fn configure_trigger_edge(&self, edge: &EdgeTrigger) -> DriverResult<()> {
        self.harness
            .enter("configure_trigger_edge", format!("ch{} @ {} V", edge.channel, edge.level))
            .await?;
        self.check_channel(edge.channel)?;
        lock(&self.state).edge = Some(*edge);
        Ok(())
    }

    async fn export_trigger(&self, line: TriggerLine) -> DriverResult<()> {
        self.harness
            .enter("export_trigger", line.to_string())
            .await?;
        lock(&self.state).exported = Some(line);
        Ok(())
    }

    async fn import_trigger(&self, line: TriggerLine) -> DriverResult<()> {
        self.harness
            .enter("import_trigger", line.to_string())
            .await?;
        lock(&self.state).imported = Some(line);
        Ok(())
    }

    async fn initiate(&self) -> DriverResult<()> {
        self.harness.enter("initiate", "").await?;
        debug!(scope = self.harness.name(), "acquisition initiated");
        let mut state = lock(&self.state);
        state.running = true;
        state.polls = 0;
        state.initiations += 1;
        Ok(())
    }

    async fn abort(&self) -> DriverResult<()> {
        self.harness.enter("abort", "").await?;
        let mut state = lock(&self.state);
        state.running = false;
        state.polls = 0;
        Ok(())
    }

    async fn acquisition_status(&self) -> DriverResult<AcquisitionStatus> {
        self.harness.enter("acquisition_status", "").await?;
        let mut state = lock(&self.state);
        if !state.running {
            return Ok(AcquisitionStatus::Complete);
        }
        state.polls += 1;
        let status = self.status_for_poll(state.polls);
        if status == AcquisitionStatus::Complete {
            state.running = false;
            state.record = Some(self.synthesize(state.horizontal));
        }
        Ok(status)
    }

    async fn fetch(&self, channel: u32, sample_count: usize) -> DriverResult<Vec<f64>> {
        self.harness
            .enter("fetch", format!("{channel}, {sample_count}"))
            .await?;
        let idx = self.check_channel(channel)?;
        let state = lock(&self.state);
        // Without a completed record the digitizer returns whatever is in
        // its buffer, modeled as zeros.
        let mut values = state
            .record
            .as_ref()
            .map(|r| r[idx].clone())
            .unwrap_or_default();
        values.resize(sample_count, 0.0);
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timing(count: usize) -> HorizontalTiming {
        HorizontalTiming {
            sample_rate: 1e6,
            sample_count: count,
            ref_position_pct: 50.0,
        }
    }

    #[tokio::test]
    async fn test_after_polls_walks_states() {
        let scope = MockScope::new("scope").with_completion(Completion::AfterPolls {
            triggered: 2,
            complete: 3,
        });
        scope.initiate().await.unwrap();
        assert_eq!(
            scope.acquisition_status().await.unwrap(),
            AcquisitionStatus::InProgress
        );
        assert_eq!(
            scope.acquisition_status().await.unwrap(),
            AcquisitionStatus::Triggered
        );
        assert_eq!(
            scope.acquisition_status().await.unwrap(),
            AcquisitionStatus::Complete
        );
        assert!(!scope.is_running());
    }

    #[tokio::test]
    async fn test_never_completes_until_abort() {
        let scope = MockScope::new("scope").with_completion(Completion::Never);
        scope.initiate().await.unwrap();
        for _ in 0..50 {
            assert!(scope.acquisition_status().await.unwrap().is_running());
        }
        scope.abort().await.unwrap();
        assert!(!scope.is_running());
    }

    #[tokio::test]
    async fn test_step_signal_switches_at_reference() {
        let scope = MockScope::new("scope")
            .with_signals(SignalShape::Step { before: 0.0, after: 5.0 }, SignalShape::Flat(1.0));
        scope.configure_horizontal(&timing(10)).await.unwrap();
        scope.initiate().await.unwrap();
        scope.acquisition_status().await.unwrap();

        let ch0 = scope.fetch(0, 10).await.unwrap();
        assert_eq!(&ch0[..5], &[0.0; 5]);
        assert_eq!(&ch0[5..], &[5.0; 5]);
        assert_eq!(scope.fetch(1, 10).await.unwrap(), vec![1.0; 10]);
    }

    #[tokio::test]
    async fn test_fetch_without_record_returns_zeros() {
        let scope = MockScope::new("scope").with_signals(SignalShape::Flat(3.0), SignalShape::Flat(3.0));
        assert_eq!(scope.fetch(0, 4).await.unwrap(), vec![0.0; 4]);
        assert!(scope.fetch(2, 4).await.is_err());
    }
}
