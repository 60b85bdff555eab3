//! Operating-mode behavior across mock instruments.

use bench_core::capabilities::{DigitalLines, Oscilloscope, Resistor};
use bench_driver_mock::{
    CallLog, ErrorConfig, ErrorScenario, MockGpio, MockMode, MockScope, TimingConfig,
};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn realistic_mode_waits_for_communication_delay() {
    let scope = MockScope::new("primary").with_mode(MockMode::Realistic);
    let start = tokio::time::Instant::now();
    scope.initiate().await.unwrap();
    scope.abort().await.unwrap();

    let expected = Duration::from_millis(2 * TimingConfig::scope().communication_delay_ms);
    assert!(start.elapsed() >= expected);
}

#[tokio::test]
async fn instant_mode_never_sleeps() {
    let gpio = MockGpio::new();
    let start = std::time::Instant::now();
    for r in Resistor::ALL {
        gpio.set_resistor_enable(r, true).await.unwrap();
    }
    assert!(start.elapsed() < Duration::from_millis(50));
}

#[tokio::test]
async fn shared_log_orders_calls_across_instruments() {
    let log = CallLog::new();
    let gpio = MockGpio::new().with_log(log.clone());
    let scope = MockScope::new("primary").with_log(log.clone());

    scope.initiate().await.unwrap();
    gpio.set_reset(false).await.unwrap();

    let devices: Vec<String> = log.entries().into_iter().map(|r| r.device).collect();
    assert_eq!(devices, vec!["primary".to_string(), "gpio".to_string()]);
}

#[tokio::test]
async fn communication_loss_fails_every_later_call() {
    let scope = MockScope::new("secondary")
        .with_errors(ErrorConfig::scenario(ErrorScenario::CommunicationLoss));
    assert!(scope.initiate().await.is_err());
    assert!(scope.acquisition_status().await.is_err());
    assert!(scope.fetch(0, 10).await.is_err());
}
