//! Error types for the bench engine.
//!
//! `BenchError` is the single error type shared by the capability traits, the
//! sequencing engine and the storage collaborator. It is built with `thiserror`
//! so that every layer can use `?` and still keep the failure category.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`**: trigger or capture parameters rejected before any
//!   instrument is touched (non-positive sample count, bad pretrigger, ...).
//! - **`Driver`**: structured instrument communication failure carrying a
//!   [`DriverErrorKind`]. Unreachable device, malformed response, timeout.
//! - **`ActuatorFault`**: a GPIO or source write failed during a stimulus
//!   script. Fatal to the run. By the time this error is observed the cleanup
//!   pass has already de-energized the device under test.
//! - **`CleanupFailed`**: one or more cleanup writes failed.
//! - **`Codec`** / **`Storage`**: persistence boundary errors.
//!
//! An acquisition that never completes is NOT an error. It is reported through
//! [`crate::waveform::AcquisitionFlags`] and a warning log.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Category of an instrument driver failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverErrorKind {
    /// The instrument did not answer or the link dropped.
    Communication,
    /// The instrument reported a fault.
    Hardware,
    /// An operation did not finish in time.
    Timeout,
    /// The instrument rejected an argument.
    InvalidParameter,
}

impl std::fmt::Display for DriverErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            DriverErrorKind::Communication => "communication",
            DriverErrorKind::Hardware => "hardware",
            DriverErrorKind::Timeout => "timeout",
            DriverErrorKind::InvalidParameter => "invalid_parameter",
        };
        write!(f, "{}", label)
    }
}

/// Structured failure reported by an instrument driver.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Driver '{driver_type}' {kind} error: {message}")]
pub struct DriverError {
    /// Driver that raised the error, e.g. `mock_scope`.
    pub driver_type: String,
    /// Failure category.
    pub kind: DriverErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl DriverError {
    /// Build a driver error.
    pub fn new(
        driver_type: impl Into<String>,
        kind: DriverErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            driver_type: driver_type.into(),
            kind,
            message: message.into(),
        }
    }
}

/// Convenience alias for results using the bench error type.
pub type BenchResult<T> = std::result::Result<T, BenchError>;

/// Primary error type for the bench engine.
#[derive(Error, Debug)]
pub enum BenchError {
    /// Capture or trigger parameters failed validation.
    ///
    /// Always raised before the first hardware call, so the instruments are
    /// left exactly as they were.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Instrument communication failure.
    #[error("{0}")]
    Driver(#[from] DriverError),

    /// A stimulus actuator write failed.
    ///
    /// `action` names the step that failed. The recipe cleanup pass has run
    /// before this error reaches the caller.
    #[error("Actuator fault during '{action}': {source}")]
    ActuatorFault {
        /// The write that failed, e.g. `set_source_enabled(true)`.
        action: String,
        /// What the driver reported.
        #[source]
        source: DriverError,
    },

    /// One or more cleanup writes failed.
    ///
    /// Every cleanup write is attempted; this carries each failure.
    #[error("Cleanup failed with {} error(s)", .0.len())]
    CleanupFailed(Vec<BenchError>),

    /// Waveform blob could not be encoded or decoded.
    #[error("Codec error: {0}")]
    Codec(String),

    /// Measurement store failure.
    #[error("Storage error: {0}")]
    Storage(String),
}

impl BenchError {
    /// Shorthand for a configuration rejection.
    pub fn config(message: impl Into<String>) -> Self {
        BenchError::Configuration(message.into())
    }

    /// True when the error came from an actuator write inside a stimulus script.
    pub fn is_actuator_fault(&self) -> bool {
        matches!(self, BenchError::ActuatorFault { .. })
    }
}
