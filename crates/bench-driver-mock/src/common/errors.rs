//! Failure injection for the simulated instruments.
//!
//! Failures surface as [`DriverError`] so they travel through the engine
//! exactly like a real instrument fault.

use super::lock;
use super::rng::MockRng;
use bench_core::error::{DriverError, DriverErrorKind};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Failure injection settings, cheap to clone and share.
#[derive(Clone, Debug)]
pub struct ErrorConfig {
    /// Per-operation failure rate (0.0 to 1.0). `"*"` matches any operation.
    failure_rates: Arc<HashMap<&'static str, f64>>,
    scenarios: Arc<Vec<ErrorScenario>>,
    rng: Arc<MockRng>,
    state: Arc<Mutex<ErrorState>>,
}

/// Deterministic failure pattern.
#[derive(Debug, Clone)]
pub enum ErrorScenario {
    /// Every call to `operation` after the first `count` fails.
    FailAfterN {
        operation: &'static str,
        count: u32,
    },
    /// Only the `call`-th invocation (1-based) of `operation` fails.
    FailAt {
        operation: &'static str,
        call: u32,
    },
    /// `operation` always times out.
    Timeout { operation: &'static str },
    /// The first call fails and the link stays down.
    CommunicationLoss,
    /// The first call latches a hardware fault code.
    HardwareFault { code: u32 },
}

#[derive(Default, Debug)]
struct ErrorState {
    operation_counts: HashMap<&'static str, u32>,
    communication_lost: bool,
    hardware_fault_code: u32,
}

impl ErrorConfig {
    /// No injected failures.
    pub fn none() -> Self {
        Self::build(HashMap::new(), Vec::new(), None)
    }

    /// Uniform random failures on every operation.
    pub fn random_failures_seeded(rate: f64, seed: Option<u64>) -> Self {
        let mut rates = HashMap::new();
        rates.insert("*", rate);
        Self::build(rates, Vec::new(), seed)
    }

    pub fn scenario(scenario: ErrorScenario) -> Self {
        Self::scenarios(vec![scenario])
    }

    pub fn scenarios(scenarios: Vec<ErrorScenario>) -> Self {
        Self::build(HashMap::new(), scenarios, None)
    }

    /// Custom failure rate per operation.
    pub fn with_rates(rates: HashMap<&'static str, f64>) -> Self {
        Self::build(rates, Vec::new(), None)
    }

    fn build(
        rates: HashMap<&'static str, f64>,
        scenarios: Vec<ErrorScenario>,
        seed: Option<u64>,
    ) -> Self {
        Self {
            failure_rates: Arc::new(rates),
            scenarios: Arc::new(scenarios),
            rng: Arc::new(MockRng::new(seed)),
            state: Arc::new(Mutex::new(ErrorState::default())),
        }
    }

    /// Decide whether this call of `operation` fails.
    pub fn check_operation(
        &self,
        driver_type: &str,
        operation: &'static str,
    ) -> Result<(), DriverError> {
        let mut state = lock(&self.state);

        if state.communication_lost {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                "Communication lost",
            ));
        }
        if state.hardware_fault_code != 0 {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Hardware,
                format!("Hardware fault: {}", state.hardware_fault_code),
            ));
        }

        let call = {
            let count = state.operation_counts.entry(operation).or_insert(0);
            *count += 1;
            *count
        };

        for scenario in self.scenarios.iter() {
            match scenario {
                ErrorScenario::FailAfterN {
                    operation: op,
                    count,
                } if *op == operation && call > *count => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Injected failure after {count} operations"),
                    ));
                }
                ErrorScenario::FailAt {
                    operation: op,
                    call: target,
                } if *op == operation && call == *target => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Injected failure on call {call} of '{operation}'"),
                    ));
                }
                ErrorScenario::Timeout { operation: op } if *op == operation => {
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Timeout,
                        format!("Operation '{operation}' timed out"),
                    ));
                }
                ErrorScenario::CommunicationLoss => {
                    state.communication_lost = true;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Communication,
                        "Communication lost",
                    ));
                }
                ErrorScenario::HardwareFault { code } => {
                    state.hardware_fault_code = *code;
                    return Err(DriverError::new(
                        driver_type,
                        DriverErrorKind::Hardware,
                        format!("Hardware fault: {code}"),
                    ));
                }
                _ => {}
            }
        }

        let rate = self
            .failure_rates
            .get(operation)
            .or_else(|| self.failure_rates.get("*"))
            .copied()
            .unwrap_or(0.0);
        if self.rng.should_fail(rate) {
            return Err(DriverError::new(
                driver_type,
                DriverErrorKind::Communication,
                format!("Random failure on operation '{operation}'"),
            ));
        }

        Ok(())
    }

    /// Number of times `operation` has been checked.
    pub fn calls(&self, operation: &str) -> u32 {
        lock(&self.state)
            .operation_counts
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    /// Clear counters and latched faults.
    pub fn reset(&self) {
        *lock(&self.state) = ErrorState::default();
    }
}

impl Default for ErrorConfig {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_errors() {
        let config = ErrorConfig::none();
        for _ in 0..100 {
            assert!(config.check_operation("mock_gpio", "set_reset").is_ok());
        }
        assert_eq!(config.calls("set_reset"), 100);
    }

    #[test]
    fn test_random_failures() {
        let config = ErrorConfig::random_failures_seeded(0.5, Some(42));
        let failures = (0..1000)
            .filter(|_| config.check_operation("mock_scope", "fetch").is_err())
            .count();
        assert!(failures > 400 && failures < 600, "Got {failures} failures");
    }

    #[test]
    fn test_fail_after_n() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "set_rail",
            count: 3,
        });
        for _ in 0..3 {
            assert!(config.check_operation("mock_supply", "set_rail").is_ok());
        }
        for _ in 0..3 {
            assert!(config.check_operation("mock_supply", "set_rail").is_err());
        }
    }

    #[test]
    fn test_fail_at_only_hits_one_call() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAt {
            operation: "set_resistor_enable",
            call: 2,
        });
        assert!(config.check_operation("mock_gpio", "set_resistor_enable").is_ok());
        let err = config
            .check_operation("mock_gpio", "set_resistor_enable")
            .unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Hardware);
        assert!(config.check_operation("mock_gpio", "set_resistor_enable").is_ok());
        // Other operations are unaffected.
        assert!(config.check_operation("mock_gpio", "set_reset").is_ok());
    }

    #[test]
    fn test_timeout_scenario() {
        let config = ErrorConfig::scenario(ErrorScenario::Timeout { operation: "fetch" });
        let err = config.check_operation("mock_scope", "fetch").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Timeout);
        assert!(err.message.contains("timed out"));
    }

    #[test]
    fn test_communication_loss_latches() {
        let config = ErrorConfig::scenario(ErrorScenario::CommunicationLoss);
        let err = config.check_operation("mock_scope", "initiate").unwrap_err();
        assert_eq!(err.kind, DriverErrorKind::Communication);
        assert!(config.check_operation("mock_scope", "abort").is_err());
    }

    #[test]
    fn test_hardware_fault_latches_code() {
        let config = ErrorConfig::scenario(ErrorScenario::HardwareFault { code: 0x42 });
        let err = config.check_operation("mock_smu", "configure_all_vdc").unwrap_err();
        assert!(err.message.contains("66"));
        assert!(config.check_operation("mock_smu", "set_all_enabled").is_err());
    }

    #[test]
    fn test_reset_clears_counters() {
        let config = ErrorConfig::scenario(ErrorScenario::FailAfterN {
            operation: "read_register",
            count: 1,
        });
        assert!(config.check_operation("mock_spi", "read_register").is_ok());
        assert!(config.check_operation("mock_spi", "read_register").is_err());
        config.reset();
        assert!(config.check_operation("mock_spi", "read_register").is_ok());
    }

    #[test]
    fn test_custom_rates() {
        let mut rates = HashMap::new();
        rates.insert("fetch", 1.0);
        rates.insert("initiate", 0.0);
        let config = ErrorConfig::with_rates(rates);
        assert!((0..10).all(|_| config.check_operation("mock_scope", "fetch").is_err()));
        assert!((0..10).all(|_| config.check_operation("mock_scope", "initiate").is_ok()));
    }
}
