//! Mock SMU and bench supply.
//!
//! Wrap either one in [`bench_core::SmuSource`] / [`bench_core::SupplySource`]
//! (through an `Arc`, so the test can still inspect it) to get a
//! `VoltageSource`.

use async_trait::async_trait;
use bench_core::capabilities::{BenchSupply, DriverResult, Rail, SmuChannels};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::debug;

use crate::common::{harness_builders, lock, MockHarness, TimingConfig};

/// Programmed voltage and current limit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceSetting {
    pub volts: f64,
    pub current_limit: f64,
}

// =============================================================================
// MockSmu
// =============================================================================

#[derive(Debug, Default)]
struct SmuState {
    setting: Option<SourceSetting>,
    enabled: bool,
    history: Vec<SourceSetting>,
}

/// Simulated multi-channel SMU. All channels move together.
pub struct MockSmu {
    harness: MockHarness,
    channels: usize,
    state: Mutex<SmuState>,
}

impl MockSmu {
    pub fn new() -> Self {
        Self {
            harness: MockHarness::new("smu", "mock_smu", TimingConfig::smu()),
            channels: 4,
            state: Mutex::new(SmuState::default()),
        }
    }

    pub fn channel_count(&self) -> usize {
        self.channels
    }

    pub fn enabled(&self) -> bool {
        lock(&self.state).enabled
    }

    pub fn setting(&self) -> Option<SourceSetting> {
        lock(&self.state).setting
    }

    /// Every programmed setting, in order.
    pub fn history(&self) -> Vec<SourceSetting> {
        lock(&self.state).history.clone()
    }
}

impl Default for MockSmu {
    fn default() -> Self {
        Self::new()
    }
}

harness_builders!(MockSmu);

#[async_trait]
impl SmuChannels for MockSmu {
    async fn configure_all_vdc(&self, volts: f64, current_limit: f64) -> DriverResult<()> {
        self.harness
            .enter("configure_all_vdc", format!("{volts}, {current_limit}"))
            .await?;
        debug!(channels = self.channels, volts, current_limit, "SMU configured");
        let setting = SourceSetting {
            volts,
            current_limit,
        };
        let mut state = lock(&self.state);
        state.setting = Some(setting);
        state.history.push(setting);
        Ok(())
    }

    async fn set_all_enabled(&self, enabled: bool) -> DriverResult<()> {
        self.harness
            .enter("set_all_enabled", format!("{enabled}"))
            .await?;
        lock(&self.state).enabled = enabled;
        Ok(())
    }
}

// =============================================================================
// MockSupply
// =============================================================================

#[derive(Debug, Default)]
struct SupplyState {
    rails: HashMap<Rail, SourceSetting>,
    output_enabled: bool,
    history: Vec<(Rail, SourceSetting)>,
}

/// Simulated triple-output bench supply.
pub struct MockSupply {
    harness: MockHarness,
    state: Mutex<SupplyState>,
}

impl MockSupply {
    pub fn new() -> Self {
        Self {
            harness: MockHarness::new("supply", "mock_supply", TimingConfig::supply()),
            state: Mutex::new(SupplyState::default()),
        }
    }

    pub fn output_enabled(&self) -> bool {
        lock(&self.state).output_enabled
    }

    pub fn rail(&self, rail: Rail) -> Option<SourceSetting> {
        lock(&self.state).rails.get(&rail).copied()
    }

    /// Programmed voltages for one rail, in order.
    pub fn voltages(&self, rail: Rail) -> Vec<f64> {
        lock(&self.state)
            .history
            .iter()
            .filter(|(r, _)| *r == rail)
            .map(|(_, s)| s.volts)
            .collect()
    }
}

impl Default for MockSupply {
    fn default() -> Self {
        Self::new()
    }
}

harness_builders!(MockSupply);

#[async_trait]
impl BenchSupply for MockSupply {
    async fn set_rail(&self, rail: Rail, volts: f64, current_limit: f64) -> DriverResult<()> {
        self.harness
            .enter("set_rail", format!("{rail}, {volts}, {current_limit}"))
            .await?;
        debug!(%rail, volts, current_limit, "supply rail programmed");
        let setting = SourceSetting {
            volts,
            current_limit,
        };
        let mut state = lock(&self.state);
        state.rails.insert(rail, setting);
        state.history.push((rail, setting));
        Ok(())
    }

    async fn enable_output(&self, enabled: bool) -> DriverResult<()> {
        self.harness
            .enter("enable_output", format!("{enabled}"))
            .await?;
        lock(&self.state).output_enabled = enabled;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bench_core::capabilities::VoltageSource;
    use bench_core::source::{SmuSource, SupplySource};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_smu_source_parks_before_release() {
        let smu = Arc::new(MockSmu::new());
        let source = SmuSource::new(smu.clone());

        source.set_source_voltage(Rail::P25V, 5.0, 1.0).await.unwrap();
        source.set_source_enabled(true).await.unwrap();
        assert!(smu.enabled());

        source.set_source_enabled(false).await.unwrap();
        assert!(!smu.enabled());
        assert_eq!(smu.setting().map(|s| s.volts), Some(0.0));
        assert_eq!(smu.history().len(), 2);
    }

    #[tokio::test]
    async fn test_supply_source_tracks_rail_history() {
        let supply = Arc::new(MockSupply::new());
        let source = SupplySource::new(supply.clone());

        for v in [4.3, 5.5, 4.3] {
            source.set_source_voltage(Rail::P25V, v, 0.4).await.unwrap();
        }
        assert_eq!(supply.voltages(Rail::P25V), vec![4.3, 5.5, 4.3]);
        assert!(supply.voltages(Rail::P6V).is_empty());
        assert_eq!(
            supply.rail(Rail::P25V),
            Some(SourceSetting {
                volts: 4.3,
                current_limit: 0.4
            })
        );
    }
}
