//! Mock bench shared by the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use bench_core::capabilities::Resistor;
use bench_core::source::{SmuSource, SupplySource};
use bench_driver_mock::{CallLog, ManualClock, MockGpio, MockScope, MockSmu, MockSupply};
use bench_experiment::{
    Actuators, CaptureSettings, ScopePair, StimulusRecipe, TestOrchestrator, VoltageStep,
    WaveformCapture,
};

/// Every instrument the engine touches, wired to one call log.
pub struct Bench {
    pub gpio: Arc<MockGpio>,
    pub supply: Arc<MockSupply>,
    pub primary: Arc<MockScope>,
    pub secondary: Arc<MockScope>,
    pub clock: Arc<ManualClock>,
    pub log: CallLog,
}

impl Bench {
    pub fn new() -> Self {
        Self::build(
            MockGpio::new(),
            MockSupply::new(),
            MockScope::new("primary"),
            MockScope::new("secondary"),
        )
    }

    /// Wire the given mocks onto a fresh shared log.
    pub fn build(
        gpio: MockGpio,
        supply: MockSupply,
        primary: MockScope,
        secondary: MockScope,
    ) -> Self {
        let log = CallLog::new();
        Self {
            gpio: Arc::new(gpio.with_log(log.clone())),
            supply: Arc::new(supply.with_log(log.clone())),
            primary: Arc::new(primary.with_log(log.clone())),
            secondary: Arc::new(secondary.with_log(log.clone())),
            clock: Arc::new(ManualClock::new()),
            log,
        }
    }

    pub fn actuators(&self) -> Actuators {
        Actuators::new(
            self.gpio.clone(),
            Arc::new(SupplySource::new(self.supply.clone())),
        )
    }

    pub fn scopes(&self) -> ScopePair {
        ScopePair::new(self.primary.clone(), self.secondary.clone())
    }

    pub fn capture(&self) -> WaveformCapture {
        WaveformCapture::new(CaptureSettings::default(), self.clock.clone())
    }

    pub fn orchestrator(&self) -> TestOrchestrator {
        TestOrchestrator::new(self.capture(), self.clock.clone())
    }

    /// True when no resistor is connected and the supply output is off.
    pub fn de_energized(&self) -> bool {
        !self.gpio.any_resistor_enabled() && !self.supply.output_enabled()
    }
}

/// SMU-backed actuators for tests that exercise the other source adapter.
pub fn smu_actuators(gpio: Arc<MockGpio>, smu: Arc<MockSmu>) -> Actuators {
    Actuators::new(gpio, Arc::new(SmuSource::new(smu)))
}

/// One recipe of each kind.
pub fn all_recipes() -> Vec<StimulusRecipe> {
    vec![
        StimulusRecipe::Startup {
            voltage: 5.0,
            resistor: Resistor::R1,
        },
        StimulusRecipe::ResetAtBoot {
            voltage: 5.0,
            resistor: Resistor::R2,
        },
        StimulusRecipe::ResetWhilePowered {
            voltage: 5.0,
            resistor: Resistor::R3,
        },
        StimulusRecipe::VoltageStep {
            step: VoltageStep {
                low: 4.3,
                high: 5.5,
            },
            resistor: Resistor::R4,
        },
        StimulusRecipe::LoadStep {
            voltage: 4.3,
            resistor: Resistor::R2,
        },
    ]
}
