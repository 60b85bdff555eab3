//! Operating modes for the simulated instruments.

use std::time::Duration;

use super::timing::TimingConfig;

/// How a mock instrument behaves on each call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MockMode {
    /// No delays. Used by unit tests.
    #[default]
    Instant,
    /// Each call waits for the instrument's communication delay.
    Realistic,
    /// Realistic timing plus a background random failure rate.
    Chaos,
}

impl MockMode {
    /// Latency to apply to one instrument call.
    pub fn call_delay(&self, timing: &TimingConfig) -> Option<Duration> {
        match self {
            MockMode::Instant => None,
            MockMode::Realistic | MockMode::Chaos => {
                Some(Duration::from_millis(timing.communication_delay_ms))
            }
        }
    }

    /// Failure rate applied to every operation in this mode.
    pub fn background_failure_rate(&self) -> f64 {
        match self {
            MockMode::Chaos => 0.05,
            _ => 0.0,
        }
    }
}

/// Sleep for the call latency of `mode`, if any.
pub(crate) async fn simulate_latency(mode: MockMode, timing: &TimingConfig) {
    if let Some(delay) = mode.call_delay(timing) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_mode() {
        assert_eq!(MockMode::default(), MockMode::Instant);
    }

    #[test]
    fn test_instant_has_no_delay() {
        assert_eq!(MockMode::Instant.call_delay(&TimingConfig::scope()), None);
        assert_eq!(
            MockMode::Realistic.call_delay(&TimingConfig::scope()),
            Some(Duration::from_millis(TimingConfig::scope().communication_delay_ms))
        );
    }

    #[test]
    fn test_only_chaos_fails_in_background() {
        assert_eq!(MockMode::Realistic.background_failure_rate(), 0.0);
        assert!(MockMode::Chaos.background_failure_rate() > 0.0);
    }
}
