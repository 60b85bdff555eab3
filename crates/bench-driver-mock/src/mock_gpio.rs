//! Mock digital I/O bank (reset line plus four load-resistor lines).

use async_trait::async_trait;
use bench_core::capabilities::{DigitalLines, DriverResult, Resistor};
use std::sync::Mutex;
use tracing::debug;

use crate::common::{harness_builders, lock, MockHarness, TimingConfig};

/// A line write observed by the mock, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioEvent {
    Reset(bool),
    Resistor(Resistor, bool),
}

#[derive(Debug, Default)]
struct GpioState {
    reset: bool,
    resistors: [bool; 4],
    events: Vec<GpioEvent>,
}

/// Simulated GPIO bank.
///
/// A failed write (injected through [`crate::ErrorConfig`]) leaves the line
/// unchanged, like a USB transfer that never reached the device.
pub struct MockGpio {
    harness: MockHarness,
    state: Mutex<GpioState>,
}

impl MockGpio {
    pub fn new() -> Self {
        Self::named("gpio")
    }

    pub fn named(name: &str) -> Self {
        Self {
            harness: MockHarness::new(name, "mock_gpio", TimingConfig::gpio()),
            state: Mutex::new(GpioState::default()),
        }
    }

    pub fn reset_asserted(&self) -> bool {
        lock(&self.state).reset
    }

    pub fn resistor_enabled(&self, resistor: Resistor) -> bool {
        lock(&self.state).resistors[index(resistor)]
    }

    /// True if any load resistor is still connected.
    pub fn any_resistor_enabled(&self) -> bool {
        lock(&self.state).resistors.iter().any(|on| *on)
    }

    /// Successful writes, in order.
    pub fn events(&self) -> Vec<GpioEvent> {
        lock(&self.state).events.clone()
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

harness_builders!(MockGpio);

fn index(resistor: Resistor) -> usize {
    match resistor {
        Resistor::R1 => 0,
        Resistor::R2 => 1,
        Resistor::R3 => 2,
        Resistor::R4 => 3,
    }
}

#[async_trait]
impl DigitalLines for MockGpio {
    async fn set_reset(&self, asserted: bool) -> DriverResult<()> {
        self.harness
            .enter("set_reset", format!("{asserted}"))
            .await?;
        debug!(device = self.harness.name(), asserted, "reset line");
        let mut state = lock(&self.state);
        state.reset = asserted;
        state.events.push(GpioEvent::Reset(asserted));
        Ok(())
    }

    async fn set_resistor_enable(&self, resistor: Resistor, enabled: bool) -> DriverResult<()> {
        self.harness
            .enter("set_resistor_enable", format!("{resistor}, {enabled}"))
            .await?;
        debug!(device = self.harness.name(), %resistor, enabled, "resistor line");
        let mut state = lock(&self.state);
        state.resistors[index(resistor)] = enabled;
        state.events.push(GpioEvent::Resistor(resistor, enabled));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{ErrorConfig, ErrorScenario};

    #[tokio::test]
    async fn test_lines_track_writes() {
        let gpio = MockGpio::new();
        gpio.set_reset(true).await.unwrap();
        gpio.set_resistor_enable(Resistor::R3, true).await.unwrap();

        assert!(gpio.reset_asserted());
        assert!(gpio.resistor_enabled(Resistor::R3));
        assert!(!gpio.resistor_enabled(Resistor::R1));
        assert_eq!(
            gpio.events(),
            vec![GpioEvent::Reset(true), GpioEvent::Resistor(Resistor::R3, true)]
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_line_unchanged() {
        let gpio = MockGpio::new().with_errors(ErrorConfig::scenario(ErrorScenario::FailAt {
            operation: "set_resistor_enable",
            call: 1,
        }));
        assert!(gpio.set_resistor_enable(Resistor::R1, true).await.is_err());
        assert!(!gpio.any_resistor_enabled());
        // The attempt is still logged.
        assert_eq!(gpio.log().count("gpio", "set_resistor_enable"), 1);
    }
}
