//! Hardware integration tests for nusterm-core
//!
//! These tests require a powered NUS peripheral in range and should be run with:
//! ```
//! cargo test --package nusterm-core --test hardware_tests -- --ignored --nocapture
//! ```
//!
//! Set `NUSTERM_DEVICE` to a name or address substring to pick the device.
//! The shell tests assume a Zephyr or NCS shell that echoes input.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use nusterm_core::scan::{ScanOptions, scan_with_options};
use nusterm_core::{
    BleTransport, BufferSink, MatchPicker, SessionConfig, SessionController, SessionState,
};
use tokio::time::{sleep, timeout};

/// Default timeout for BLE operations
const BLE_TIMEOUT: Duration = Duration::from_secs(30);

fn get_device() -> Option<String> {
    env::var("NUSTERM_DEVICE").ok().filter(|s| !s.is_empty())
}

fn controller_for(device: &str) -> (SessionController, BufferSink) {
    let transport = BleTransport::new(Arc::new(MatchPicker::new(device)));
    let output = BufferSink::new();
    let controller = SessionController::new(
        Arc::new(transport),
        Arc::new(output.clone()),
        SessionConfig::new(),
    );
    (controller, output)
}

// =============================================================================
// Scan Tests
// =============================================================================

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_discovers_nus_devices() {
    let options = ScanOptions::default().duration_secs(10);
    let devices = timeout(BLE_TIMEOUT, scan_with_options(options))
        .await
        .expect("scan timed out")
        .expect("scan failed");

    println!("Found {} NUS device(s)", devices.len());
    for device in &devices {
        println!("  {} ({:?} dBm)", device.display_name(), device.rssi);
        assert!(device.advertises_service);
    }
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_scan_unfiltered() {
    let options = ScanOptions::default().duration_secs(5).all_devices();
    let devices = timeout(BLE_TIMEOUT, scan_with_options(options))
        .await
        .expect("scan timed out")
        .expect("scan failed");
    println!("Found {} BLE device(s)", devices.len());
}

// =============================================================================
// Session Tests
// =============================================================================

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_connect_disconnect_cycle() {
    let Some(device) = get_device() else {
        println!("Skipping: NUSTERM_DEVICE not set");
        return;
    };
    let (controller, output) = controller_for(&device);

    timeout(BLE_TIMEOUT, controller.connect())
        .await
        .expect("connect timed out")
        .expect("connect failed");
    assert_eq!(controller.state().await, SessionState::Connected);
    assert!(output.contents().contains("Connected."));

    controller.disconnect().await.expect("disconnect failed");
    assert_eq!(controller.state().await, SessionState::Disconnected);
    assert!(output.contents().contains("Disconnected."));
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_shell_echoes_line() {
    let Some(device) = get_device() else {
        println!("Skipping: NUSTERM_DEVICE not set");
        return;
    };
    let (controller, output) = controller_for(&device);

    timeout(BLE_TIMEOUT, controller.connect())
        .await
        .expect("connect timed out")
        .expect("connect failed");

    controller.send_text("help\n").await.expect("write failed");
    sleep(Duration::from_secs(2)).await;
    println!("{}", output.contents());
    assert!(output.contents().contains("help"));

    controller.disconnect().await.expect("disconnect failed");
}

#[tokio::test]
#[ignore = "requires BLE hardware"]
async fn test_reconnect_after_disconnect() {
    let Some(device) = get_device() else {
        println!("Skipping: NUSTERM_DEVICE not set");
        return;
    };
    let (controller, _output) = controller_for(&device);

    for attempt in 1..=2 {
        println!("Connect attempt {}", attempt);
        timeout(BLE_TIMEOUT, controller.connect())
            .await
            .expect("connect timed out")
            .expect("connect failed");
        controller.disconnect().await.expect("disconnect failed");
        sleep(Duration::from_secs(1)).await;
    }
}
