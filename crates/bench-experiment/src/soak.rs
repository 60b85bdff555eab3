//! Temperature soak before a group of tests.

use std::time::Duration;

use bench_core::capabilities::ThermalChamber;
use bench_core::clock::Clock;
use bench_core::error::{BenchError, BenchResult, DriverError, DriverErrorKind};
use tracing::{debug, info, instrument};

/// Drive the thermal head to a set point and wait until the device is there.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemperatureSoak {
    /// Target temperature in °C.
    pub set_point: f64,
    /// Accepted distance from the set point in °C.
    pub window: f64,
    /// Wait between two temperature readings.
    pub poll_interval: Duration,
    /// Consecutive in-window readings required before the soak ends.
    pub hold_readings: u32,
    /// Give up after this long.
    pub timeout: Duration,
}

impl TemperatureSoak {
    /// Soak to `set_point` within 1 °C, holding for three readings.
    pub fn new(set_point: f64) -> Self {
        Self {
            set_point,
            window: 1.0,
            poll_interval: Duration::from_millis(500),
            hold_readings: 3,
            timeout: Duration::from_secs(30 * 60),
        }
    }

    /// Replace the 30 minute default timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lower the head, start the air flow, program the set point and wait.
    ///
    /// Returns the last temperature reading.
    ///
    /// # Errors
    /// `Driver` with kind `Timeout` when the window is not held before
    /// `timeout` elapses on `clock`.
    #[instrument(skip_all, fields(set_point = self.set_point))]
    pub async fn run(&self, chamber: &dyn ThermalChamber, clock: &dyn Clock) -> BenchResult<f64> {
        if !(self.window.is_finite() && self.window > 0.0) || self.poll_interval.is_zero() {
            return Err(BenchError::config("soak window and poll interval must be positive"));
        }

        chamber.head_down(true).await?;
        chamber.flow(true).await?;
        chamber.set_point(self.set_point).await?;

        let start = clock.now();
        let mut held = 0u32;
        loop {
            let temperature = chamber.temperature().await?;
            if (temperature - self.set_point).abs() <= self.window {
                held += 1;
            } else {
                held = 0;
            }
            debug!(temperature, held, "soak reading");
            if held >= self.hold_readings.max(1) {
                info!(temperature, "soak complete");
                return Ok(temperature);
            }
            if clock.now().saturating_sub(start) >= self.timeout {
                return Err(DriverError::new(
                    "thermal_chamber",
                    DriverErrorKind::Timeout,
                    format!(
                        "temperature {temperature} °C not within {} °C of {} °C after {:?}",
                        self.window, self.set_point, self.timeout
                    ),
                )
                .into());
            }
            clock.sleep(self.poll_interval).await;
        }
    }
}
