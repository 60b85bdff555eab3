//! Test sequencing for the DC-DC converter bench.
//!
//! - [`recipe`]: the five stimulus scripts and their cleanup guarantee
//! - [`capture`]: synchronized dual-scope acquisition with a bounded wait
//! - [`orchestrator`]: runs a stimulus and a capture concurrently
//! - [`register_probe`]: SPI ID-register check
//! - [`soak`]: thermal chamber set-point wait
//!
//! ```rust,ignore
//! let orchestrator = TestOrchestrator::new(
//!     WaveformCapture::new(CaptureSettings::default(), clock.clone()),
//!     clock,
//! );
//! let recipe = StimulusRecipe::Startup { voltage: 5.0, resistor: Resistor::R1 };
//! let bundle = orchestrator
//!     .run_test(TestRequest::new(recipe, 25.0), &actuators, &scopes)
//!     .await?;
//! ```

pub mod capture;
pub mod orchestrator;
pub mod recipe;
pub mod register_probe;
pub mod soak;

pub use capture::{CaptureSettings, CaptureState, ScopePair, WaveformCapture};
pub use orchestrator::{RunError, TestOrchestrator, TestRequest};
pub use recipe::{
    format_volts, Action, ActuatorTrace, Actuators, Phase, StimulusRecipe, TimedAction,
    TraceEntry, VoltageStep, MIN_ARM_LEAD, SOURCE_RAIL,
};
pub use register_probe::RegisterProbe;
pub use soak::TemperatureSoak;
