//! Session controller tests against the mock transport.
//!
//! These run without BLE hardware:
//! `cargo test --package nusterm-core --test session`

use std::sync::Arc;
use std::time::Duration;

use nusterm_core::uuids::NUS_TX;
use nusterm_core::{
    BufferSink, DisconnectReason, Error, EventReceiver, LineBuffer, LineEdit, MockDevice,
    MockRequest, MockTransport, RequestOptions, SessionConfig, SessionController, SessionEvent,
    SessionState,
};
use tokio::time::{sleep, timeout};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    controller: SessionController,
    output: BufferSink,
    device: Arc<MockDevice>,
    transport: Arc<MockTransport>,
}

fn harness_with(config: SessionConfig) -> Harness {
    let device = Arc::new(MockDevice::new("Zephyr Shell"));
    let transport = Arc::new(MockTransport::with_device(Arc::clone(&device)));
    let output = BufferSink::new();
    let controller = SessionController::new(
        Arc::clone(&transport) as Arc<dyn nusterm_core::Transport>,
        Arc::new(output.clone()),
        config,
    );
    Harness {
        controller,
        output,
        device,
        transport,
    }
}

fn harness() -> Harness {
    harness_with(SessionConfig::new())
}

async fn connected() -> Harness {
    let h = harness();
    h.controller.connect().await.expect("mock connect should succeed");
    h
}

/// Poll until `cond` holds or the wait budget runs out.
async fn wait_until(mut cond: impl FnMut() -> bool) {
    timeout(WAIT, async {
        while !cond() {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

async fn wait_for_state(controller: &SessionController, state: SessionState) {
    timeout(WAIT, async {
        while controller.state().await != state {
            sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("state not reached in time");
}

async fn next_event(rx: &mut EventReceiver) -> SessionEvent {
    timeout(WAIT, rx.recv())
        .await
        .expect("no event in time")
        .expect("event channel closed")
}

// =============================================================================
// Connect
// =============================================================================

#[tokio::test]
async fn test_connect_announces_and_sends_primer() {
    let h = connected().await;

    assert_eq!(h.controller.state().await, SessionState::Connected);
    assert_eq!(h.controller.button_label().await, "Disconnect");
    assert!(h.output.contents().contains("\r\nZephyr Shell Connected.\r\n"));
    assert_eq!(h.device.writes(), vec![b"\r".to_vec()]);
}

#[tokio::test]
async fn test_connect_emits_lifecycle_events() {
    let h = harness();
    let mut events = h.controller.subscribe();

    h.controller.connect().await.unwrap();

    assert_eq!(next_event(&mut events).await, SessionEvent::Connecting);
    match next_event(&mut events).await {
        SessionEvent::Connected { device } => {
            assert_eq!(device.name.as_deref(), Some("Zephyr Shell"));
        }
        other => panic!("expected Connected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unnamed_device_announced_by_identifier() {
    let device = Arc::new(MockDevice::unnamed());
    let identifier = nusterm_core::RemoteDevice::identifier(device.as_ref());
    let output = BufferSink::new();
    let controller = SessionController::new(
        Arc::new(MockTransport::with_device(device)),
        Arc::new(output.clone()),
        SessionConfig::new(),
    );

    controller.connect().await.unwrap();
    assert!(output.contents().contains(&format!("{} Connected.", identifier)));
}

#[tokio::test]
async fn test_request_options_reach_transport() {
    let config =
        SessionConfig::new().request(RequestOptions::new().accept_all_devices(true));
    let h = harness_with(config);

    h.controller.connect().await.unwrap();
    let options = h.transport.last_options().unwrap();
    assert!(options.accept_all_devices);
    assert!(options.ids.is_nus());
}

#[tokio::test]
async fn test_picker_cancelled_stays_disconnected() {
    let h = harness();
    h.transport.set_next(MockRequest::Cancel).await;
    let mut events = h.controller.subscribe();

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::Cancelled)));
    assert_eq!(h.controller.state().await, SessionState::Disconnected);
    assert_eq!(h.controller.button_label().await, "Connect");
    assert!(h.output.contents().contains("Device selection cancelled"));
    assert_eq!(h.device.open_count(), 0);

    assert_eq!(next_event(&mut events).await, SessionEvent::Connecting);
    assert!(matches!(
        next_event(&mut events).await,
        SessionEvent::Error { .. }
    ));
}

#[tokio::test]
async fn test_adapter_unavailable_is_printed() {
    let h = harness();
    h.transport.set_next(MockRequest::NoAdapter).await;

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::AdapterUnavailable)));
    assert!(h.output.contents().contains("Bluetooth is not available"));
    assert_eq!(h.controller.state().await, SessionState::Disconnected);
}

#[tokio::test]
async fn test_no_devices_in_range() {
    let h = harness();
    h.transport.set_next(MockRequest::NoDevices).await;

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::DeviceNotFound(_))));
    assert!(h.output.contents().contains("no devices in range"));
}

#[tokio::test]
async fn test_open_failure_does_not_close() {
    let h = harness();
    h.device.set_fail_open(true);

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::Timeout { .. })));
    assert_eq!(h.device.close_count(), 0);
    assert_eq!(h.controller.state().await, SessionState::Disconnected);
}

#[tokio::test]
async fn test_missing_service_closes_link() {
    let h = harness();
    h.device.set_service_missing(true);

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::ServiceNotFound { .. })));
    assert_eq!(h.device.close_count(), 1);
    assert!(!nusterm_core::RemoteDevice::is_open(h.device.as_ref()).await);
    assert_eq!(h.controller.state().await, SessionState::Disconnected);
    assert!(h.output.contents().contains("Service not found"));
    assert!(h.device.writes().is_empty());
}

#[tokio::test]
async fn test_missing_tx_endpoint_closes_link() {
    let h = harness();
    h.device.set_endpoint_missing(Some(NUS_TX));

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::CharacteristicNotFound { .. })));
    assert_eq!(h.device.close_count(), 1);
    assert_eq!(h.controller.button_label().await, "Connect");
}

#[tokio::test]
async fn test_connect_while_connected_is_busy() {
    let h = connected().await;

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::Busy)));
    assert_eq!(h.transport.request_count(), 1);
    assert_eq!(h.controller.state().await, SessionState::Connected);
}

#[tokio::test]
async fn test_overlapping_connect_is_busy() {
    let h = harness();
    h.transport.set_request_latency(Duration::from_millis(200));

    let first = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.connect().await }
    });
    wait_for_state(&h.controller, SessionState::Connecting).await;

    let second = h.controller.connect().await;
    assert!(matches!(second, Err(Error::Busy)));
    assert!(!h.output.contents().contains("already in progress"));

    first.await.unwrap().unwrap();
    assert_eq!(h.controller.state().await, SessionState::Connected);
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn test_disconnect_during_connecting_keeps_guard() {
    let h = connected().await;
    h.device.drop_link();
    wait_for_state(&h.controller, SessionState::Disconnected).await;
    h.transport.set_request_latency(Duration::from_millis(200));

    let first = tokio::spawn({
        let controller = h.controller.clone();
        async move { controller.connect().await }
    });
    wait_for_state(&h.controller, SessionState::Connecting).await;

    // Only clears the stale session left by the link loss
    h.controller.disconnect().await.unwrap();
    assert_eq!(h.controller.state().await, SessionState::Connecting);
    assert!(h.controller.session().await.is_none());

    let second = h.controller.connect().await;
    assert!(matches!(second, Err(Error::Busy)));

    first.await.unwrap().unwrap();
    assert_eq!(h.controller.state().await, SessionState::Connected);
    assert_eq!(h.transport.request_count(), 2);
}

// =============================================================================
// Outbound bridge
// =============================================================================

#[tokio::test]
async fn test_typed_line_is_one_write() {
    let h = connected().await;
    h.device.clear_writes();
    let mut buffer = LineBuffer::new();

    for key in ["a", "b", "c"] {
        assert!(matches!(buffer.feed(key), LineEdit::Echo(_)));
    }
    let LineEdit::Submit(line) = buffer.feed("\r") else {
        panic!("terminator should submit");
    };
    h.controller.send_text(&line).await.unwrap();

    assert_eq!(h.device.writes(), vec![b"abc\n".to_vec()]);
    assert!(buffer.is_empty());
}

#[tokio::test]
async fn test_utf8_line_is_encoded() {
    let h = connected().await;
    h.device.clear_writes();

    h.controller.send_text("über\n").await.unwrap();

    assert_eq!(h.device.writes(), vec!["über\n".as_bytes().to_vec()]);
}

#[tokio::test]
async fn test_send_while_disconnected_is_refused() {
    let h = harness();

    let result = h.controller.send_text("ls\n").await;

    assert!(matches!(result, Err(Error::NotConnected)));
    assert!(h.device.writes().is_empty());
    assert_eq!(h.output.contents(), "Not connected to a device yet.\r\n");
}

#[tokio::test]
async fn test_chunked_writes_in_order() {
    let h = harness_with(SessionConfig::new().write_chunk_size(Some(4)));
    h.controller.connect().await.unwrap();
    h.device.clear_writes();

    h.controller.send_text("abcdefghij\n").await.unwrap();

    assert_eq!(
        h.device.writes(),
        vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij\n".to_vec()]
    );
}

#[tokio::test]
async fn test_zero_chunk_size_fails_connect() {
    let h = harness_with(SessionConfig::new().write_chunk_size(Some(0)));

    let result = h.controller.connect().await;

    assert!(matches!(result, Err(Error::InvalidConfig(_))));
    assert_eq!(h.transport.request_count(), 0);
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let h = connected().await;
    h.device.set_fail_writes(true);

    let result = h.controller.send_text("ls\n").await;

    assert!(matches!(result, Err(Error::WriteFailed { .. })));
    assert!(h.output.contents().contains("mock write failure"));
    assert_eq!(h.controller.state().await, SessionState::Connected);
}

// =============================================================================
// Inbound bridge
// =============================================================================

#[tokio::test]
async fn test_notifications_print_in_order() {
    let h = connected().await;
    h.output.clear();

    assert!(h.device.notify(b"uart:~$ "));
    assert!(h.device.notify(b"hel"));
    assert!(h.device.notify(b"lo\r\n"));

    wait_until(|| h.output.prints().len() >= 3).await;
    assert_eq!(
        h.output.prints(),
        vec!["uart:~$ ".to_string(), "hel".to_string(), "lo\r\n".to_string()]
    );
}

#[tokio::test]
async fn test_notification_bytes_decode_per_byte() {
    let h = connected().await;
    h.output.clear();

    h.device.notify(&[0x41, 0xE9, 0x1B]);

    wait_until(|| !h.output.prints().is_empty()).await;
    assert_eq!(h.output.contents(), "A\u{e9}\u{1b}");
}

// =============================================================================
// Disconnect
// =============================================================================

#[tokio::test]
async fn test_disconnect_while_disconnected_is_noop() {
    let h = harness();
    let mut events = h.controller.subscribe();

    h.controller.disconnect().await.unwrap();

    assert!(h.output.contents().is_empty());
    assert!(events.try_recv().is_err());
    assert_eq!(h.device.close_count(), 0);
}

#[tokio::test]
async fn test_user_disconnect() {
    let h = connected().await;
    let mut events = h.controller.subscribe();

    h.controller.disconnect().await.unwrap();

    assert_eq!(h.controller.state().await, SessionState::Disconnected);
    assert_eq!(h.controller.button_label().await, "Connect");
    assert!(h.controller.session().await.is_none());
    assert_eq!(h.device.close_count(), 1);
    assert!(h.output.contents().ends_with("\r\nZephyr Shell Disconnected.\r\n"));

    match next_event(&mut events).await {
        SessionEvent::Disconnected { reason, .. } => {
            assert_eq!(reason, DisconnectReason::UserRequested)
        }
        other => panic!("expected Disconnected, got {:?}", other),
    }

    // No second announcement from the watcher
    sleep(Duration::from_millis(50)).await;
    assert_eq!(h.output.contents().matches("Disconnected.").count(), 1);
}

#[tokio::test]
async fn test_toggle_connects_then_disconnects() {
    let h = harness();

    h.controller.toggle().await.unwrap();
    assert_eq!(h.controller.button_label().await, "Disconnect");

    h.controller.toggle().await.unwrap();
    assert_eq!(h.controller.button_label().await, "Connect");
    assert_eq!(h.transport.request_count(), 1);
}

#[tokio::test]
async fn test_link_loss_keeps_buffer_and_guards_next_submit() {
    let h = connected().await;
    let mut events = h.controller.subscribe();
    let mut buffer = LineBuffer::new();
    buffer.feed("l");
    buffer.feed("s");

    h.device.drop_link();
    wait_for_state(&h.controller, SessionState::Disconnected).await;

    match next_event(&mut events).await {
        SessionEvent::Disconnected { reason, .. } => assert_eq!(reason, DisconnectReason::LinkLost),
        other => panic!("expected Disconnected, got {:?}", other),
    }
    assert!(h.output.contents().contains("\r\nZephyr Shell Disconnected.\r\n"));
    assert_eq!(buffer.as_str(), "ls");

    h.device.clear_writes();
    let LineEdit::Submit(line) = buffer.feed("\r") else {
        panic!("terminator should submit");
    };
    let result = h.controller.send_text(&line).await;

    assert!(matches!(result, Err(Error::NotConnected)));
    assert!(h.device.writes().is_empty());
    assert!(h.output.contents().ends_with("Not connected to a device yet.\r\n"));
}

#[tokio::test]
async fn test_disconnect_after_link_loss_is_quiet() {
    let h = connected().await;
    h.device.drop_link();
    wait_for_state(&h.controller, SessionState::Disconnected).await;

    // Stale session stays until the next disconnect
    let stale = h.controller.session().await.unwrap();
    assert!(!stale.is_alive());

    let mut events = h.controller.subscribe();
    h.controller.disconnect().await.unwrap();

    assert!(h.controller.session().await.is_none());
    assert_eq!(h.output.contents().matches("Disconnected.").count(), 1);
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_reconnect_after_link_loss() {
    let h = connected().await;
    h.device.drop_link();
    wait_for_state(&h.controller, SessionState::Disconnected).await;
    h.device.clear_writes();

    h.controller.connect().await.unwrap();

    assert_eq!(h.controller.state().await, SessionState::Connected);
    assert!(h.controller.session().await.unwrap().is_alive());
    assert_eq!(h.device.writes(), vec![b"\r".to_vec()]);
    assert_eq!(h.output.contents().matches("Connected.").count(), 2);
}
