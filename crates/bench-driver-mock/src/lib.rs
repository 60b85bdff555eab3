//! Mock instruments for the DC-DC converter bench.
//!
//! Every mock implements the matching `bench-core` capability trait, keeps
//! its state behind interior mutability and exposes accessors for tests.
//!
//! # Available Mocks
//!
//! - [`MockGpio`] - reset and load-resistor lines
//! - [`MockSmu`] / [`MockSupply`] - voltage sources (wrap in `SmuSource` / `SupplySource`)
//! - [`MockScope`] - dual-channel digitizer with trigger export/import
//! - [`MockChamber`] - thermal head that ramps toward its set point
//! - [`MockSpi`] - register file behind an SPI bridge
//! - [`ManualClock`] - virtual clock recording every sleep
//!
//! All mocks accept an [`ErrorConfig`] for failure injection and a shared
//! [`CallLog`] for cross-instrument ordering checks.
//!
//! ```rust,ignore
//! let log = CallLog::new();
//! let primary = MockScope::new("primary").with_log(log.clone());
//! let secondary = MockScope::new("secondary").with_log(log.clone());
//! ```

pub mod common;
mod clock;
mod mock_chamber;
mod mock_gpio;
mod mock_scope;
mod mock_source;
mod mock_spi;

pub use common::{
    CallLog, CallRecord, ErrorConfig, ErrorScenario, MockHarness, MockMode, MockRng, TimingConfig,
};

pub use clock::ManualClock;
pub use mock_chamber::MockChamber;
pub use mock_gpio::{GpioEvent, MockGpio};
pub use mock_scope::{Completion, MockScope, SignalShape};
pub use mock_source::{MockSmu, MockSupply, SourceSetting};
pub use mock_spi::{MockSpi, DEFAULT_ID_REGISTER};
