//! Instrument Capabilities
//!
//! Fine-grained capability traits for the bench instruments. The sequencing
//! engine only ever talks to these traits; vendor drivers and the mock crate
//! implement them.
//!
//! - A GPIO bank implements [`DigitalLines`]
//! - An SMU or a bench supply is wrapped into a [`VoltageSource`]
//!   (see [`crate::source`])
//! - Each oscilloscope implements [`Oscilloscope`]
//! - The thermal forcing head implements [`ThermalChamber`]
//! - The SPI bridge implements [`RegisterBus`]
//!
//! # Design Philosophy
//!
//! Each capability trait:
//! - Is async (uses #[async_trait])
//! - Is thread-safe (requires Send + Sync)
//! - Returns [`DriverResult`] so callers keep the failure category
//! - Focuses on ONE thing
//!
//! All methods take `&self`. Drivers use interior mutability for state, which
//! lets the orchestrator hand the same `Arc` handle to a spawned task.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DriverError;
use crate::trigger::{EdgeTrigger, HorizontalTiming, TriggerLine, VerticalSettings};

/// Result type returned at the instrument boundary.
pub type DriverResult<T> = std::result::Result<T, DriverError>;

// =============================================================================
// Shared identifiers
// =============================================================================

/// Load resistor that can be switched onto the converter output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Resistor {
    R1,
    R2,
    R3,
    R4,
}

impl Resistor {
    /// Every load resistor on the board, in line order.
    pub const ALL: [Resistor; 4] = [Resistor::R1, Resistor::R2, Resistor::R3, Resistor::R4];

    /// Board label of the resistor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Resistor::R1 => "R1",
            Resistor::R2 => "R2",
            Resistor::R3 => "R3",
            Resistor::R4 => "R4",
        }
    }
}

impl std::fmt::Display for Resistor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Resistor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "R1" => Ok(Resistor::R1),
            "R2" => Ok(Resistor::R2),
            "R3" => Ok(Resistor::R3),
            "R4" => Ok(Resistor::R4),
            other => Err(format!("unknown resistor '{other}'")),
        }
    }
}

/// Output rail of the bench supply.
///
/// SMU-backed sources drive all channels together and ignore the rail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Rail {
    /// +6 V rail, used for the board's auxiliary supply.
    P6V,
    /// +25 V rail feeding the converter input.
    #[default]
    P25V,
    /// -25 V rail.
    N25V,
}

impl std::fmt::Display for Rail {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Rail::P6V => "P6V",
            Rail::P25V => "P25V",
            Rail::N25V => "N25V",
        };
        f.write_str(label)
    }
}

/// Status reported by a scope's acquisition engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionStatus {
    /// Armed or still filling the record. Drivers that cannot tell whether the
    /// trigger has fired report this until the record is complete.
    InProgress,
    /// Trigger seen, post-trigger samples still being acquired.
    Triggered,
    /// Record complete and ready to fetch.
    Complete,
}

impl AcquisitionStatus {
    /// True while the acquisition engine is running.
    pub fn is_running(&self) -> bool {
        !matches!(self, AcquisitionStatus::Complete)
    }
}

// =============================================================================
// Actuators
// =============================================================================

/// Capability: digital control lines on the test board.
///
/// # Contract
/// - Writes are fire-and-forget; no readback is implied
/// - `set_reset(true)` holds the device under test in reset
#[async_trait]
pub trait DigitalLines: Send + Sync {
    /// Drive the reset line.
    async fn set_reset(&self, asserted: bool) -> DriverResult<()>;

    /// Connect or disconnect one load resistor.
    async fn set_resistor_enable(&self, resistor: Resistor, enabled: bool) -> DriverResult<()>;
}

/// Capability: a programmable DC source feeding the converter input.
///
/// Implemented by [`crate::source::SmuSource`] and
/// [`crate::source::SupplySource`]; the two are interchangeable for the
/// stimulus scripts.
#[async_trait]
pub trait VoltageSource: Send + Sync {
    /// Program the output voltage and current limit.
    ///
    /// Does not change the output enable state.
    async fn set_source_voltage(&self, rail: Rail, volts: f64, current_limit: f64)
        -> DriverResult<()>;

    /// Switch the output on or off.
    async fn set_source_enabled(&self, enabled: bool) -> DriverResult<()>;
}

/// Capability: a multi-channel source-measurement unit.
#[async_trait]
pub trait SmuChannels: Send + Sync {
    /// Configure every channel as a DC voltage source.
    async fn configure_all_vdc(&self, volts: f64, current_limit: f64) -> DriverResult<()>;

    /// Enable or disable every channel output.
    async fn set_all_enabled(&self, enabled: bool) -> DriverResult<()>;
}

/// Capability: a triple-output bench power supply (E3631A-style).
#[async_trait]
pub trait BenchSupply: Send + Sync {
    /// Program one rail.
    async fn set_rail(&self, rail: Rail, volts: f64, current_limit: f64) -> DriverResult<()>;

    /// Switch all supply outputs together.
    async fn enable_output(&self, enabled: bool) -> DriverResult<()>;
}

// =============================================================================
// Acquisition
// =============================================================================

/// Capability: a dual-channel digitizer with backplane trigger routing.
///
/// # Contract
/// - Configuration calls only take effect on the next `initiate`
/// - `export_trigger` routes this scope's start trigger onto a backplane line
/// - `import_trigger` replaces the analog trigger with the backplane line
/// - `fetch` returns the most recent record, which may be stale if the
///   acquisition never completed
#[async_trait]
pub trait Oscilloscope: Send + Sync {
    /// Human-readable instrument name for logs.
    fn name(&self) -> &str;

    async fn configure_vertical(&self, channel: u32, settings: &VerticalSettings)
        -> DriverResult<()>;

    async fn configure_horizontal(&self, timing: &HorizontalTiming) -> DriverResult<()>;

    async fn configure_trigger_edge(&self, edge: &EdgeTrigger) -> DriverResult<()>;

    async fn export_trigger(&self, line: TriggerLine) -> DriverResult<()>;

    async fn import_trigger(&self, line: TriggerLine) -> DriverResult<()>;

    /// Commit configuration and start waiting for the trigger.
    async fn initiate(&self) -> DriverResult<()>;

    /// Stop any acquisition in progress.
    async fn abort(&self) -> DriverResult<()>;

    async fn acquisition_status(&self) -> DriverResult<AcquisitionStatus>;

    /// Read `sample_count` points of one channel.
    async fn fetch(&self, channel: u32, sample_count: usize) -> DriverResult<Vec<f64>>;
}

// =============================================================================
// Environment
// =============================================================================

/// Capability: thermal forcing system (TP04300-style head).
#[async_trait]
pub trait ThermalChamber: Send + Sync {
    /// Request a new set point in °C. Returns immediately.
    async fn set_point(&self, celsius: f64) -> DriverResult<()>;

    /// Current device temperature in °C.
    async fn temperature(&self) -> DriverResult<f64>;

    /// Lower or raise the thermal head onto the device.
    async fn head_down(&self, down: bool) -> DriverResult<()>;

    /// Enable or disable air flow.
    async fn flow(&self, enabled: bool) -> DriverResult<()>;
}

/// Capability: register access to the device under test (SPI bridge).
#[async_trait]
pub trait RegisterBus: Send + Sync {
    async fn read_register(&self, address: u8) -> DriverResult<u8>;

    async fn write_register(&self, address: u8, value: u8) -> DriverResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resistor_round_trip_through_str() {
        for r in Resistor::ALL {
            assert_eq!(r.as_str().parse::<Resistor>(), Ok(r));
        }
        assert_eq!(" r3 ".parse::<Resistor>(), Ok(Resistor::R3));
        assert!("R5".parse::<Resistor>().is_err());
    }

    #[test]
    fn test_acquisition_status_running() {
        assert!(AcquisitionStatus::InProgress.is_running());
        assert!(AcquisitionStatus::Triggered.is_running());
        assert!(!AcquisitionStatus::Complete.is_running());
    }
}
