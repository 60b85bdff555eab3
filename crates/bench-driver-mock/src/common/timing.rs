//! Communication latencies used in realistic mode.

/// Per-instrument timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TimingConfig {
    /// Round-trip time of one command in milliseconds (VISA, PXI, USB).
    pub communication_delay_ms: u64,
    /// Time for an output to settle after a change, in milliseconds.
    pub settling_time_ms: u64,
}

impl TimingConfig {
    /// USB digital I/O module.
    pub fn gpio() -> Self {
        Self {
            communication_delay_ms: 1,
            settling_time_ms: 0,
        }
    }

    /// PXI source-measurement unit.
    pub fn smu() -> Self {
        Self {
            communication_delay_ms: 2,
            settling_time_ms: 5,
        }
    }

    /// GPIB bench supply. Noticeably slower than the PXI instruments.
    pub fn supply() -> Self {
        Self {
            communication_delay_ms: 20,
            settling_time_ms: 50,
        }
    }

    /// PXI digitizer.
    pub fn scope() -> Self {
        Self {
            communication_delay_ms: 2,
            settling_time_ms: 0,
        }
    }

    /// Serial thermal forcing system.
    pub fn chamber() -> Self {
        Self {
            communication_delay_ms: 30,
            settling_time_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timing_is_zero() {
        let config = TimingConfig::default();
        assert_eq!(config.communication_delay_ms, 0);
        assert_eq!(config.settling_time_ms, 0);
    }

    #[test]
    fn test_supply_slower_than_pxi() {
        assert!(
            TimingConfig::supply().communication_delay_ms
                > TimingConfig::smu().communication_delay_ms
        );
        assert_eq!(TimingConfig::gpio().communication_delay_ms, 1);
    }
}
