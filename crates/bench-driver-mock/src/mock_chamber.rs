//! Mock thermal forcing system.
//!
//! The device temperature moves toward the set point by a fixed step on each
//! `temperature()` query, but only while the head is down and air flows.

use async_trait::async_trait;
use bench_core::capabilities::{DriverResult, ThermalChamber};
use std::sync::Mutex;
use tracing::debug;

use crate::common::{harness_builders, lock, MockHarness, TimingConfig};

#[derive(Debug)]
struct ChamberState {
    set_point: f64,
    temperature: f64,
    head_down: bool,
    flow: bool,
}

/// Simulated thermal head.
pub struct MockChamber {
    harness: MockHarness,
    step_per_query: f64,
    state: Mutex<ChamberState>,
}

impl MockChamber {
    /// Chamber at `ambient` °C, moving 5 °C per query.
    pub fn new(ambient: f64) -> Self {
        Self {
            harness: MockHarness::new("chamber", "mock_chamber", TimingConfig::chamber()),
            step_per_query: 5.0,
            state: Mutex::new(ChamberState {
                set_point: ambient,
                temperature: ambient,
                head_down: false,
                flow: false,
            }),
        }
    }

    /// Degrees moved per query. Zero freezes the temperature.
    pub fn with_ramp(mut self, step_per_query: f64) -> Self {
        self.step_per_query = step_per_query.abs();
        self
    }

    pub fn current_set_point(&self) -> f64 {
        lock(&self.state).set_point
    }

    pub fn is_head_down(&self) -> bool {
        lock(&self.state).head_down
    }

    pub fn is_flowing(&self) -> bool {
        lock(&self.state).flow
    }
}

harness_builders!(MockChamber);

#[async_trait]
impl ThermalChamber for MockChamber {
    async fn set_point(&self, celsius: f64) -> DriverResult<()> {
        self.harness.enter("set_point", format!("{celsius}")).await?;
        lock(&self.state).set_point = celsius;
        Ok(())
    }

    async fn temperature(&self) -> DriverResult<f64> {
        self.harness.enter("temperature", "").await?;
        let mut state = lock(&self.state);
        if state.head_down && state.flow {
            let delta = state.set_point - state.temperature;
            let step = delta.clamp(-self.step_per_query, self.step_per_query);
            state.temperature += step;
        }
        debug!(temperature = state.temperature, set_point = state.set_point, "chamber read");
        Ok(state.temperature)
    }

    async fn head_down(&self, down: bool) -> DriverResult<()> {
        self.harness.enter("head_down", format!("{down}")).await?;
        lock(&self.state).head_down = down;
        Ok(())
    }

    async fn flow(&self, enabled: bool) -> DriverResult<()> {
        self.harness.enter("flow", format!("{enabled}")).await?;
        lock(&self.state).flow = enabled;
        Ok(())
    }
}
