//! Shared infrastructure for the simulated instruments.
//!
//! - **mode**: operating modes (Instant, Realistic, Chaos)
//! - **timing**: per-instrument communication latencies
//! - **errors**: failure injection
//! - **rng**: seeded random source
//! - **call_log**: cross-instrument call ordering

pub mod call_log;
pub mod errors;
pub mod mode;
pub mod rng;
pub mod timing;

pub use call_log::{CallLog, CallRecord};
pub use errors::{ErrorConfig, ErrorScenario};
pub use mode::MockMode;
pub use rng::MockRng;
pub use timing::TimingConfig;

use bench_core::error::{DriverError, DriverErrorKind};
use std::sync::{Arc, Mutex, MutexGuard};

/// Lock a mock's state, recovering the data if a test thread panicked while
/// holding it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Per-call plumbing shared by every mock instrument.
///
/// Each trait method calls [`MockHarness::enter`] first: it applies the mode's
/// latency, records the call in the shared log and runs failure injection.
#[derive(Debug, Clone)]
pub struct MockHarness {
    name: String,
    driver_type: &'static str,
    mode: MockMode,
    timing: TimingConfig,
    errors: ErrorConfig,
    chaos: Arc<MockRng>,
    log: CallLog,
}

impl MockHarness {
    pub fn new(name: impl Into<String>, driver_type: &'static str, timing: TimingConfig) -> Self {
        Self {
            name: name.into(),
            driver_type,
            mode: MockMode::Instant,
            timing,
            errors: ErrorConfig::none(),
            chaos: Arc::new(MockRng::new(None)),
            log: CallLog::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    pub fn errors(&self) -> &ErrorConfig {
        &self.errors
    }

    pub(crate) fn set_mode(&mut self, mode: MockMode) {
        self.mode = mode;
    }

    pub(crate) fn set_errors(&mut self, errors: ErrorConfig) {
        self.errors = errors;
    }

    pub(crate) fn set_log(&mut self, log: CallLog) {
        self.log = log;
    }

    pub(crate) async fn enter(
        &self,
        operation: &'static str,
        detail: impl Into<String>,
    ) -> Result<(), DriverError> {
        mode::simulate_latency(self.mode, &self.timing).await;
        self.log.record(&self.name, operation, detail);
        self.errors.check_operation(self.driver_type, operation)?;
        if self.chaos.should_fail(self.mode.background_failure_rate()) {
            return Err(DriverError::new(
                self.driver_type,
                DriverErrorKind::Communication,
                format!("Chaos failure on '{operation}'"),
            ));
        }
        Ok(())
    }
}

/// Builder methods shared by every mock that owns a [`MockHarness`].
macro_rules! harness_builders {
    ($ty:ty) => {
        impl $ty {
            /// Use the given operating mode.
            pub fn with_mode(mut self, mode: $crate::common::MockMode) -> Self {
                self.harness.set_mode(mode);
                self
            }

            /// Inject failures.
            pub fn with_errors(mut self, errors: $crate::common::ErrorConfig) -> Self {
                self.harness.set_errors(errors);
                self
            }

            /// Record calls into a log shared with other mocks.
            pub fn with_log(mut self, log: $crate::common::CallLog) -> Self {
                self.harness.set_log(log);
                self
            }

            /// Calls recorded so far (shared with any mock using the same log).
            pub fn log(&self) -> &$crate::common::CallLog {
                self.harness.log()
            }
        }
    };
}
pub(crate) use harness_builders;
