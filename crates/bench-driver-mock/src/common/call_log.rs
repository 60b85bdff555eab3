//! Shared, ordered record of instrument calls.
//!
//! Several mocks can write into one [`CallLog`], which lets a test assert the
//! relative order of calls made to different instruments (for example that
//! the secondary scope was initiated before the primary).

use super::lock;
use std::sync::{Arc, Mutex};

/// One logged call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    /// Instrument name as passed to the mock constructor.
    pub device: String,
    /// Operation name, e.g. `"initiate"`.
    pub operation: String,
    /// Formatted arguments, empty when the call takes none.
    pub detail: String,
}

/// Cloneable handle to a shared call list.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<CallRecord>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, device: &str, operation: &str, detail: impl Into<String>) {
        lock(&self.entries).push(CallRecord {
            device: device.to_string(),
            operation: operation.to_string(),
            detail: detail.into(),
        });
    }

    /// Snapshot of every call so far.
    pub fn entries(&self) -> Vec<CallRecord> {
        lock(&self.entries).clone()
    }

    /// Index of the first `operation` call on `device`.
    pub fn position(&self, device: &str, operation: &str) -> Option<usize> {
        lock(&self.entries)
            .iter()
            .position(|r| r.device == device && r.operation == operation)
    }

    /// Number of `operation` calls on `device`.
    pub fn count(&self, device: &str, operation: &str) -> usize {
        lock(&self.entries)
            .iter()
            .filter(|r| r.device == device && r.operation == operation)
            .count()
    }

    pub fn clear(&self) {
        lock(&self.entries).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interleaved_devices_keep_order() {
        let log = CallLog::new();
        let shared = log.clone();
        log.record("secondary", "initiate", "");
        shared.record("primary", "initiate", "");
        log.record("primary", "acquisition_status", "");

        assert_eq!(log.position("secondary", "initiate"), Some(0));
        assert_eq!(log.position("primary", "initiate"), Some(1));
        assert_eq!(log.count("primary", "acquisition_status"), 1);
        assert_eq!(log.position("primary", "abort"), None);

        log.clear();
        assert!(shared.entries().is_empty());
    }
}
