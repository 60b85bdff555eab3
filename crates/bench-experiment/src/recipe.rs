//! Stimulus recipes.
//!
//! A [`StimulusRecipe`] is one of the five bench test scripts. Each variant
//! expands into an ordered list of [`TimedAction`]s which [`StimulusRecipe::execute`]
//! issues strictly in order, waiting each action's settle delay on the
//! injected [`Clock`] before the next one.
//!
//! # Cleanup
//!
//! Whatever happens in the script, a cleanup pass then disconnects every load
//! resistor and disables the source. Every cleanup write is attempted even
//! when an earlier one fails.
//!
//! # Arming race
//!
//! The stimulus and the capture run as independent tasks with no rendezvous.
//! Acquisition arming wins the race because every script waits at least
//! [`MIN_ARM_LEAD`] before its first energizing edge (see
//! [`StimulusRecipe::arm_lead_time`]).

use std::sync::Arc;
use std::time::Duration;

use bench_core::capabilities::{DigitalLines, DriverResult, Rail, Resistor, VoltageSource};
use bench_core::clock::Clock;
use bench_core::error::{BenchError, BenchResult};
use bench_core::record::{RunDescriptor, TestKind};
use bench_core::trigger::{TriggerConfig, TriggerSlope};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};

/// Minimum delay between the start of a script and its first energizing edge.
pub const MIN_ARM_LEAD: Duration = Duration::from_millis(100);

/// Default rail that feeds the converter input.
pub const SOURCE_RAIL: Rail = Rail::P25V;

/// Current limit while the converter starts unloaded.
const STARTUP_CURRENT_LIMIT: f64 = 1.0;
/// Current limit for every other script.
const DEFAULT_CURRENT_LIMIT: f64 = 0.4;
/// Trigger level above the low step voltage.
const STEP_TRIGGER_MARGIN: f64 = 0.4;

/// Input-voltage step endpoints in volts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoltageStep {
    /// Voltage before and after the step.
    pub low: f64,
    /// Voltage held for the 10 ms step.
    pub high: f64,
}

/// One bench stimulus script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum StimulusRecipe {
    /// Power-up from cold with the load already connected.
    Startup {
        /// Input voltage.
        voltage: f64,
        /// Load connected before power-up.
        resistor: Resistor,
    },
    /// Power-up with reset held, then release reset.
    ResetAtBoot {
        /// Input voltage.
        voltage: f64,
        /// Load connected before power-up.
        resistor: Resistor,
    },
    /// Short reset pulse on a running converter.
    ResetWhilePowered {
        /// Input voltage.
        voltage: f64,
        /// Load connected throughout.
        resistor: Resistor,
    },
    /// Input-voltage step low -> high -> low.
    VoltageStep {
        /// Step endpoints.
        step: VoltageStep,
        /// Load connected throughout.
        resistor: Resistor,
    },
    /// Short load pulse on a running converter.
    LoadStep {
        /// Input voltage.
        voltage: f64,
        /// Load pulsed on for 5 ms.
        resistor: Resistor,
    },
}

/// A single actuator write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Drive the reset line; `true` holds the converter in reset.
    SetReset(bool),
    /// Connect (`true`) or disconnect one load resistor.
    SetResistorEnable(Resistor, bool),
    /// Program the source without changing its enable state.
    SetSourceVoltage {
        /// Supply rail; SMU sources ignore it.
        rail: Rail,
        /// Output voltage in volts.
        volts: f64,
        /// Current limit in amperes.
        current_limit: f64,
    },
    /// Switch the source output.
    SetSourceEnabled(bool),
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::SetReset(on) => write!(f, "set_reset({on})"),
            Action::SetResistorEnable(r, on) => write!(f, "set_resistor_enable({r}, {on})"),
            Action::SetSourceVoltage {
                rail,
                volts,
                current_limit,
            } => write!(f, "set_source_voltage({rail}, {volts} V, {current_limit} A)"),
            Action::SetSourceEnabled(on) => write!(f, "set_source_enabled({on})"),
        }
    }
}

/// An action and the delay to wait after it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedAction {
    /// The write to issue.
    pub action: Action,
    /// Wait after a successful write; zero means none.
    pub settle: Duration,
}

fn step(action: Action, settle_ms: u64) -> TimedAction {
    TimedAction {
        action,
        settle: Duration::from_millis(settle_ms),
    }
}

/// Actuator handles used by the stimulus scripts.
#[derive(Clone)]
pub struct Actuators {
    /// Reset and load-resistor lines.
    pub gpio: Arc<dyn DigitalLines>,
    /// Converter input source.
    pub source: Arc<dyn VoltageSource>,
    /// Rail every voltage write targets.
    pub rail: Rail,
}

impl Actuators {
    /// Actuators writing to [`SOURCE_RAIL`].
    pub fn new(gpio: Arc<dyn DigitalLines>, source: Arc<dyn VoltageSource>) -> Self {
        Self {
            gpio,
            source,
            rail: SOURCE_RAIL,
        }
    }

    /// Send voltage writes to `rail` instead.
    pub fn with_rail(mut self, rail: Rail) -> Self {
        self.rail = rail;
        self
    }

    /// Issue one action.
    pub async fn apply(&self, action: &Action) -> DriverResult<()> {
        match *action {
            Action::SetReset(on) => self.gpio.set_reset(on).await,
            Action::SetResistorEnable(r, on) => self.gpio.set_resistor_enable(r, on).await,
            Action::SetSourceVoltage {
                rail,
                volts,
                current_limit,
            } => self.source.set_source_voltage(rail, volts, current_limit).await,
            Action::SetSourceEnabled(on) => self.source.set_source_enabled(on).await,
        }
    }
}

/// Which pass issued a traced action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// The recipe's own actions.
    Script,
    /// The shutdown pass that always follows.
    Cleanup,
}

/// One issued action with its clock time and outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct TraceEntry {
    /// Pass that issued the action.
    pub phase: Phase,
    /// The write itself.
    pub action: Action,
    /// Clock reading when the action was issued.
    pub at: Duration,
    /// False when the driver returned an error.
    pub ok: bool,
}

/// Record of every actuator write issued during one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActuatorTrace {
    /// Script entries first, then cleanup entries.
    pub entries: Vec<TraceEntry>,
}

impl ActuatorTrace {
    fn push(&mut self, phase: Phase, action: Action, at: Duration, ok: bool) {
        self.entries.push(TraceEntry {
            phase,
            action,
            at,
            ok,
        });
    }

    /// Actions issued by the script, in order.
    pub fn script_actions(&self) -> Vec<Action> {
        self.actions_in(Phase::Script)
    }

    /// Actions issued by the cleanup pass, in order.
    pub fn cleanup_actions(&self) -> Vec<Action> {
        self.actions_in(Phase::Cleanup)
    }

    fn actions_in(&self, phase: Phase) -> Vec<Action> {
        self.entries
            .iter()
            .filter(|e| e.phase == phase)
            .map(|e| e.action)
            .collect()
    }

    /// Index of the first entry with this action.
    pub fn position(&self, action: &Action) -> Option<usize> {
        self.entries.iter().position(|e| e.action == *action)
    }

    /// Programmed source voltages, in order.
    pub fn source_voltages(&self) -> Vec<f64> {
        self.entries
            .iter()
            .filter_map(|e| match e.action {
                Action::SetSourceVoltage { volts, .. } => Some(volts),
                _ => None,
            })
            .collect()
    }
}

/// Format a voltage for titles and record parameters: whole numbers keep one
/// decimal place ("5.0"), others print as-is ("4.3").
pub fn format_volts(volts: f64) -> String {
    if volts.is_finite() && volts.fract() == 0.0 {
        format!("{volts:.1}")
    } else {
        format!("{volts}")
    }
}

impl StimulusRecipe {
    /// Record kind for this script.
    pub fn kind(&self) -> TestKind {
        match self {
            StimulusRecipe::Startup { .. } => TestKind::Startup,
            StimulusRecipe::ResetAtBoot { .. } => TestKind::ResetAtBoot,
            StimulusRecipe::ResetWhilePowered { .. } => TestKind::ResetWhilePowered,
            StimulusRecipe::VoltageStep { .. } => TestKind::VoltageStep,
            StimulusRecipe::LoadStep { .. } => TestKind::LoadStep,
        }
    }

    /// Load resistor the script switches.
    pub fn resistor(&self) -> Resistor {
        match self {
            StimulusRecipe::Startup { resistor, .. }
            | StimulusRecipe::ResetAtBoot { resistor, .. }
            | StimulusRecipe::ResetWhilePowered { resistor, .. }
            | StimulusRecipe::VoltageStep { resistor, .. }
            | StimulusRecipe::LoadStep { resistor, .. } => *resistor,
        }
    }

    /// Reject voltages that cannot be programmed.
    pub fn validate(&self) -> BenchResult<()> {
        let check = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(BenchError::config(format!(
                    "{name} must be a non-negative voltage, got {v}"
                )))
            }
        };
        match self {
            StimulusRecipe::VoltageStep { step, .. } => {
                check("step.low", step.low)?;
                check("step.high", step.high)
            }
            StimulusRecipe::Startup { voltage, .. }
            | StimulusRecipe::ResetAtBoot { voltage, .. }
            | StimulusRecipe::ResetWhilePowered { voltage, .. }
            | StimulusRecipe::LoadStep { voltage, .. } => check("voltage", *voltage),
        }
    }

    /// Record parameters: the voltage (or step) and the resistor.
    pub fn parameters(&self) -> (String, String) {
        let first = match self {
            StimulusRecipe::VoltageStep { step, .. } => format!(
                "{}V to {}V",
                format_volts(step.low),
                format_volts(step.high)
            ),
            StimulusRecipe::Startup { voltage, .. }
            | StimulusRecipe::ResetAtBoot { voltage, .. }
            | StimulusRecipe::ResetWhilePowered { voltage, .. }
            | StimulusRecipe::LoadStep { voltage, .. } => format!("{}V", format_volts(*voltage)),
        };
        (first, self.resistor().to_string())
    }

    /// Plot title without the temperature suffix.
    pub fn base_title(&self) -> String {
        match self {
            StimulusRecipe::Startup { voltage, resistor } => format!(
                "DCDC startup test with {}V and resistor {resistor}",
                format_volts(*voltage)
            ),
            StimulusRecipe::ResetAtBoot { voltage, resistor } => format!(
                "DCDC reset test with {}V and resistor {resistor}",
                format_volts(*voltage)
            ),
            StimulusRecipe::ResetWhilePowered { voltage, resistor } => format!(
                "DCDC reset while powered {}V with resistor {resistor}",
                format_volts(*voltage)
            ),
            StimulusRecipe::VoltageStep { step, resistor } => format!(
                "DCDC step test with step from {}V to {}V with resistor {resistor}",
                format_volts(step.low),
                format_volts(step.high)
            ),
            StimulusRecipe::LoadStep { voltage, resistor } => format!(
                "DCDC load step with resistor {resistor} at voltage {}V",
                format_volts(*voltage)
            ),
        }
    }

    /// Full title including the run temperature.
    pub fn title(&self, temperature: f64) -> String {
        format!("{}, {temperature}°C", self.base_title())
    }

    /// Metadata for the measurement record.
    pub fn descriptor(&self, temperature: f64) -> RunDescriptor {
        let (parameter1, parameter2) = self.parameters();
        RunDescriptor {
            kind: self.kind(),
            parameter1,
            parameter2,
            temperature,
        }
    }

    /// Trigger settings the bench uses for this script.
    pub fn trigger_preset(&self) -> TriggerConfig {
        let base = TriggerConfig::default();
        match self {
            StimulusRecipe::Startup { .. } => TriggerConfig {
                primary_channel: 0,
                trigger_level: 1.0,
                trigger_slope: TriggerSlope::Rising,
                sample_interval: 20e-3,
                pretrigger_fraction: 50.0,
                ..base
            },
            StimulusRecipe::ResetAtBoot { .. } => TriggerConfig {
                primary_channel: 1,
                trigger_level: 2.0,
                trigger_slope: TriggerSlope::Rising,
                sample_interval: 20e-3,
                ..base
            },
            StimulusRecipe::ResetWhilePowered { .. } => TriggerConfig {
                primary_channel: 1,
                trigger_level: 4.6,
                trigger_slope: TriggerSlope::Falling,
                sample_interval: 50e-3,
                pretrigger_fraction: 10.0,
                ..base
            },
            StimulusRecipe::VoltageStep { step, .. } => TriggerConfig {
                primary_channel: 0,
                trigger_level: step.low + STEP_TRIGGER_MARGIN,
                trigger_slope: TriggerSlope::Rising,
                sample_interval: 100e-3,
                pretrigger_fraction: 5.0,
                ..base
            },
            StimulusRecipe::LoadStep { .. } => TriggerConfig {
                primary_channel: 1,
                trigger_level: 0.01,
                trigger_slope: TriggerSlope::Rising,
                sample_interval: 25e-3,
                pretrigger_fraction: 10.0,
                ..base
            },
        }
    }

    /// The ordered action list for this script on [`SOURCE_RAIL`].
    pub fn script(&self) -> Vec<TimedAction> {
        self.script_on(SOURCE_RAIL)
    }

    /// The ordered action list, programming voltages on `rail`.
    pub fn script_on(&self, rail: Rail) -> Vec<TimedAction> {
        use Action::*;
        let volts = |v: f64, limit: f64| SetSourceVoltage {
            rail,
            volts: v,
            current_limit: limit,
        };
        match *self {
            StimulusRecipe::Startup { voltage, resistor } => vec![
                step(SetReset(false), 0),
                step(SetResistorEnable(resistor, true), 500),
                step(volts(voltage, STARTUP_CURRENT_LIMIT), 100),
                step(SetSourceEnabled(true), 100),
                step(SetResistorEnable(resistor, false), 0),
                step(SetSourceEnabled(false), 0),
            ],
            StimulusRecipe::ResetAtBoot { voltage, resistor } => vec![
                step(SetReset(true), 0),
                step(SetResistorEnable(resistor, true), 400),
                step(volts(voltage, DEFAULT_CURRENT_LIMIT), 100),
                step(SetSourceEnabled(true), 100),
                step(SetReset(false), 200),
                step(SetResistorEnable(resistor, false), 0),
                step(SetSourceEnabled(false), 0),
            ],
            StimulusRecipe::ResetWhilePowered { voltage, resistor } => vec![
                step(SetReset(false), 0),
                step(SetResistorEnable(resistor, true), 200),
                step(volts(voltage, DEFAULT_CURRENT_LIMIT), 100),
                step(SetSourceEnabled(true), 300),
                step(SetReset(true), 10),
                step(SetReset(false), 100),
                step(SetResistorEnable(resistor, false), 0),
                step(SetSourceEnabled(false), 0),
            ],
            StimulusRecipe::VoltageStep { step: vs, resistor } => vec![
                step(SetReset(false), 0),
                step(SetResistorEnable(resistor, true), 200),
                step(volts(vs.low, DEFAULT_CURRENT_LIMIT), 100),
                step(SetSourceEnabled(true), 300),
                step(volts(vs.high, DEFAULT_CURRENT_LIMIT), 10),
                step(volts(vs.low, DEFAULT_CURRENT_LIMIT), 200),
                step(SetResistorEnable(resistor, false), 0),
                step(SetSourceEnabled(false), 0),
            ],
            StimulusRecipe::LoadStep { voltage, resistor } => vec![
                step(SetReset(false), 200),
                step(volts(voltage, DEFAULT_CURRENT_LIMIT), 100),
                step(SetSourceEnabled(true), 300),
                step(SetResistorEnable(resistor, true), 5),
                step(SetResistorEnable(resistor, false), 100),
                step(SetSourceEnabled(false), 200),
            ],
        }
    }

    /// Time from the start of the script to its first energizing edge.
    ///
    /// Every script starts with the source off, and nothing on the board can
    /// produce a trigger edge before the source is switched on.
    pub fn arm_lead_time(&self) -> Duration {
        self.script()
            .iter()
            .take_while(|t| t.action != Action::SetSourceEnabled(true))
            .map(|t| t.settle)
            .sum()
    }

    /// Run the script, then the cleanup pass.
    ///
    /// Consumes the recipe: it is built for one run and dropped afterwards.
    ///
    /// # Errors
    /// - `Configuration` if the recipe is invalid; nothing is written
    /// - `ActuatorFault` if a script write fails; cleanup has already run
    /// - `CleanupFailed` if only cleanup writes failed
    #[instrument(skip_all, fields(kind = %self.kind(), resistor = %self.resistor()))]
    pub async fn execute(self, actuators: &Actuators, clock: &dyn Clock) -> BenchResult<ActuatorTrace> {
        self.validate()?;
        info!("stimulus started");

        let mut trace = ActuatorTrace::default();
        let script = self.script_on(actuators.rail);
        let fault = run_script(&script, actuators, clock, &mut trace).await;
        let cleanup_errors = cleanup(actuators, clock, &mut trace).await;

        match fault {
            Some(fault) => {
                if !cleanup_errors.is_empty() {
                    warn!(
                        count = cleanup_errors.len(),
                        "cleanup also failed after actuator fault"
                    );
                }
                Err(fault)
            }
            None if cleanup_errors.is_empty() => {
                info!(actions = trace.entries.len(), "stimulus finished");
                Ok(trace)
            }
            None => Err(BenchError::CleanupFailed(cleanup_errors)),
        }
    }
}

/// Issue `script` in order, stopping at the first failed write.
///
/// Returns the fault, if any, as `ActuatorFault`.
pub(crate) async fn run_script(
    script: &[TimedAction],
    actuators: &Actuators,
    clock: &dyn Clock,
    trace: &mut ActuatorTrace,
) -> Option<BenchError> {
    for timed in script {
        let at = clock.now();
        match actuators.apply(&timed.action).await {
            Ok(()) => {
                debug!(action = %timed.action, at_ms = at.as_millis() as u64, "action issued");
                trace.push(Phase::Script, timed.action, at, true);
                if !timed.settle.is_zero() {
                    clock.sleep(timed.settle).await;
                }
            }
            Err(source) => {
                error!(action = %timed.action, error = %source, "actuator write failed");
                trace.push(Phase::Script, timed.action, at, false);
                return Some(BenchError::ActuatorFault {
                    action: timed.action.to_string(),
                    source,
                });
            }
        }
    }
    None
}

/// Disconnect every load resistor and disable the source.
///
/// Every write is attempted; the failures are returned.
pub(crate) async fn cleanup(
    actuators: &Actuators,
    clock: &dyn Clock,
    trace: &mut ActuatorTrace,
) -> Vec<BenchError> {
    let actions = Resistor::ALL
        .iter()
        .map(|r| Action::SetResistorEnable(*r, false))
        .chain(std::iter::once(Action::SetSourceEnabled(false)));

    let mut errors = Vec::new();
    for action in actions {
        let at = clock.now();
        let result = actuators.apply(&action).await;
        trace.push(Phase::Cleanup, action, at, result.is_ok());
        if let Err(source) = result {
            warn!(%action, error = %source, "cleanup write failed");
            errors.push(BenchError::ActuatorFault {
                action: action.to_string(),
                source,
            });
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_variants() -> Vec<StimulusRecipe> {
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
                resistor: Resistor::R1,
            },
        ]
    }

    #[test]
    fn test_every_script_leaves_arm_lead() {
        for recipe in all_variants() {
            assert!(
                recipe.arm_lead_time() >= MIN_ARM_LEAD,
                "{} leads by {:?}",
                recipe.kind(),
                recipe.arm_lead_time()
            );
        }
    }

    #[test]
    fn test_arm_lead_values() {
        let leads: Vec<u128> = all_variants()
            .iter()
            .map(|r| r.arm_lead_time().as_millis())
            .collect();
        assert_eq!(leads, vec![600, 500, 300, 300, 300]);
    }

    #[test]
    fn test_every_script_ends_de_energized() {
        for recipe in all_variants() {
            let script = recipe.script();
            assert_eq!(
                script.last().map(|t| t.action),
                Some(Action::SetSourceEnabled(false)),
                "{}",
                recipe.kind()
            );
        }
    }

    #[test]
    fn test_format_volts() {
        assert_eq!(format_volts(5.0), "5.0");
        assert_eq!(format_volts(4.3), "4.3");
        assert_eq!(format_volts(25.0), "25.0");
    }

    #[test]
    fn test_titles_and_parameters() {
        let startup = StimulusRecipe::Startup {
            voltage: 5.0,
            resistor: Resistor::R1,
        };
        assert_eq!(
            startup.title(25.0),
            "DCDC startup test with 5.0V and resistor R1, 25°C"
        );
        assert_eq!(startup.parameters(), ("5.0V".to_string(), "R1".to_string()));

        let step = StimulusRecipe::VoltageStep {
            step: VoltageStep {
                low: 4.3,
                high: 5.5,
            },
            resistor: Resistor::R2,
        };
        assert_eq!(
            step.title(-40.0),
            "DCDC step test with step from 4.3V to 5.5V with resistor R2, -40°C"
        );
        assert_eq!(step.parameters().0, "4.3V to 5.5V");

        let load = StimulusRecipe::LoadStep {
            voltage: 5.0,
            resistor: Resistor::R3,
        };
        assert_eq!(
            load.base_title(),
            "DCDC load step with resistor R3 at voltage 5.0V"
        );
    }

    #[test]
    fn test_presets_are_valid_and_match_bench() {
        for recipe in all_variants() {
            assert!(recipe.trigger_preset().validate().is_ok());
        }
        let rwp = StimulusRecipe::ResetWhilePowered {
            voltage: 5.0,
            resistor: Resistor::R1,
        }
        .trigger_preset();
        assert_eq!(rwp.primary_channel, 1);
        assert_eq!(rwp.trigger_slope, TriggerSlope::Falling);
        assert_eq!(rwp.pretrigger_fraction, 10.0);

        let step = all_variants()[3].trigger_preset();
        assert!((step.trigger_level - 4.7).abs() < 1e-12);
        assert_eq!(step.sample_interval, 0.1);
    }

    #[test]
    fn test_validate_rejects_bad_voltage() {
        let bad = StimulusRecipe::Startup {
            voltage: f64::NAN,
            resistor: Resistor::R1,
        };
        assert!(bad.validate().is_err());
        let negative = StimulusRecipe::VoltageStep {
            step: VoltageStep {
                low: -1.0,
                high: 5.0,
            },
            resistor: Resistor::R1,
        };
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_recipe_serde_tagged_by_kind() {
        let json = r#"{"kind":"LoadStep","voltage":5.0,"resistor":"R2"}"#;
        let recipe: StimulusRecipe = serde_json::from_str(json).unwrap();
        assert_eq!(
            recipe,
            StimulusRecipe::LoadStep {
                voltage: 5.0,
                resistor: Resistor::R2
            }
        );
    }
}
