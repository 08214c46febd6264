//! Background worker that owns the session controller.
//!
//! The UI loop never awaits BLE work. It sends [`Command`]s here. Toggles run
//! on their own task so a slow connect does not hold up a shutdown; lines go
//! through a single sender task and reach the device in submission order.
//! Lifecycle events are forwarded to the UI together with the controller's
//! state and button label.

use async_trait::async_trait;
use nusterm_core::{
    DeviceNotFoundReason, DevicePicker, DiscoveredDevice, Error, Result, SessionController,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use super::messages::{Command, PickRequest, UiEvent};

/// Picker that shows the candidates in the terminal UI and waits for a choice.
#[derive(Debug, Clone)]
pub struct TuiPicker {
    event_tx: mpsc::UnboundedSender<UiEvent>,
}

impl TuiPicker {
    pub fn new(event_tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { event_tx }
    }
}

#[async_trait]
impl DevicePicker for TuiPicker {
    async fn pick(&self, mut candidates: Vec<DiscoveredDevice>) -> Result<DiscoveredDevice> {
        if candidates.is_empty() {
            return Err(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange));
        }

        let (reply, chosen) = oneshot::channel();
        let request = PickRequest {
            candidates: candidates.clone(),
            reply,
        };
        if self.event_tx.send(UiEvent::Pick(request)).is_err() {
            return Err(Error::Cancelled);
        }

        match chosen.await {
            Ok(Some(index)) if index < candidates.len() => Ok(candidates.swap_remove(index)),
            // Dismissed, or the UI went away
            _ => Err(Error::Cancelled),
        }
    }
}

/// Runs controller operations for the UI.
pub struct SessionWorker {
    command_rx: mpsc::Receiver<Command>,
    event_tx: mpsc::UnboundedSender<UiEvent>,
    controller: SessionController,
}

impl SessionWorker {
    pub fn new(
        command_rx: mpsc::Receiver<Command>,
        event_tx: mpsc::UnboundedSender<UiEvent>,
        controller: SessionController,
    ) -> Self {
        Self {
            command_rx,
            event_tx,
            controller,
        }
    }

    /// Run the worker's main loop until shutdown.
    pub async fn run(mut self) {
        info!("Session worker started");
        let mut events = self.controller.subscribe();
        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let sender = tokio::spawn(send_lines(self.controller.clone(), line_rx));

        loop {
            tokio::select! {
                cmd = self.command_rx.recv() => match cmd {
                    Some(Command::Toggle) => self.spawn_toggle(),
                    Some(Command::Send(text)) => {
                        if line_tx.send(text).is_err() {
                            warn!("Line sender stopped; dropping line");
                        }
                    }
                    Some(Command::Shutdown) | None => break,
                },
                event = events.recv() => match event {
                    Ok(event) => self.forward(event).await,
                    Err(RecvError::Lagged(n)) => debug!("Skipped {} session events", n),
                    Err(RecvError::Closed) => break,
                },
            }
        }

        // Let queued lines go out before tearing the session down
        drop(line_tx);
        let _ = sender.await;

        if self.controller.is_connected().await
            && let Err(e) = self.controller.disconnect().await
        {
            warn!("Disconnect on shutdown failed: {}", e);
        }
        info!("Session worker stopped");
    }

    fn spawn_toggle(&self) {
        let controller = self.controller.clone();
        tokio::spawn(async move {
            // Failures are already printed and published by the controller
            if let Err(e) = controller.toggle().await {
                debug!("Toggle ended with: {}", e);
            }
        });
    }

    async fn forward(&self, event: nusterm_core::SessionEvent) {
        let _ = self.event_tx.send(UiEvent::Session(event));
        let _ = self.event_tx.send(UiEvent::Status {
            state: self.controller.state().await,
            button: self.controller.button_label().await,
        });
    }
}

/// Write each line in turn, waiting for one to finish before the next.
async fn send_lines(controller: SessionController, mut lines: mpsc::UnboundedReceiver<String>) {
    while let Some(text) = lines.recv().await {
        if let Err(e) = controller.send_text(&text).await {
            debug!("Send ended with: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use nusterm_core::{
        MockDevice, MockRequest, MockTransport, SessionConfig, SessionEvent, SessionState,
        Transport,
    };
    use tokio::time::timeout;

    use super::*;
    use crate::tui::messages::UiSink;

    const WAIT: Duration = Duration::from_secs(2);

    struct Harness {
        command_tx: mpsc::Sender<Command>,
        event_rx: mpsc::UnboundedReceiver<UiEvent>,
        device: Arc<MockDevice>,
        transport: Arc<MockTransport>,
    }

    fn start() -> Harness {
        let device = Arc::new(MockDevice::new("Zephyr Shell"));
        let transport = Arc::new(MockTransport::with_device(Arc::clone(&device)));
        let (command_tx, command_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let controller = SessionController::new(
            Arc::clone(&transport) as Arc<dyn Transport>,
            Arc::new(UiSink::new(event_tx.clone())),
            SessionConfig::new(),
        );
        tokio::spawn(SessionWorker::new(command_rx, event_tx, controller).run());
        Harness {
            command_tx,
            event_rx,
            device,
            transport,
        }
    }

    /// Collect events until one matches, returning the output seen so far.
    async fn wait_for(
        rx: &mut mpsc::UnboundedReceiver<UiEvent>,
        mut done: impl FnMut(&UiEvent) -> bool,
    ) -> String {
        let mut output = String::new();
        timeout(WAIT, async {
            while let Some(event) = rx.recv().await {
                if let UiEvent::Output(text) = &event {
                    output.push_str(text);
                }
                if done(&event) {
                    return;
                }
            }
        })
        .await
        .expect("timed out waiting for UI event");
        output
    }

    fn is_status(event: &UiEvent, want: SessionState) -> bool {
        matches!(event, UiEvent::Status { state, .. } if *state == want)
    }

    #[tokio::test]
    async fn test_toggle_connects_and_reports_status() {
        let mut h = start();
        h.command_tx.send(Command::Toggle).await.unwrap();

        let output = wait_for(&mut h.event_rx, |e| {
            matches!(
                e,
                UiEvent::Status {
                    state: SessionState::Connected,
                    button: "Disconnect"
                }
            )
        })
        .await;
        assert!(output.contains("Zephyr Shell Connected."));
    }

    #[tokio::test]
    async fn test_send_reaches_device() {
        let mut h = start();
        h.command_tx.send(Command::Toggle).await.unwrap();
        wait_for(&mut h.event_rx, |e| is_status(e, SessionState::Connected)).await;

        h.command_tx
            .send(Command::Send("help\n".to_string()))
            .await
            .unwrap();
        timeout(WAIT, async {
            while !h.device.written_text().ends_with("help\n") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("line was not written");
        assert!(h.device.writes().contains(&b"help\n".to_vec()));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_lines_are_written_in_submission_order() {
        let mut h = start();
        h.command_tx.send(Command::Toggle).await.unwrap();
        wait_for(&mut h.event_rx, |e| is_status(e, SessionState::Connected)).await;

        let want: Vec<Vec<u8>> = (0..300).map(|i| format!("{i}\n").into_bytes()).collect();
        for line in &want {
            let text = String::from_utf8(line.clone()).unwrap();
            h.command_tx.send(Command::Send(text)).await.unwrap();
        }

        let lines = || -> Vec<Vec<u8>> {
            h.device
                .writes()
                .into_iter()
                .filter(|w| w.as_slice() != b"\r")
                .collect()
        };
        timeout(WAIT, async {
            while lines().len() < want.len() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("lines were not all written");
        assert_eq!(lines(), want);
    }

    #[tokio::test]
    async fn test_cancelled_request_leaves_connect_label() {
        let mut h = start();
        h.transport.set_next(MockRequest::Cancel).await;
        h.command_tx.send(Command::Toggle).await.unwrap();

        let output = wait_for(&mut h.event_rx, |e| {
            matches!(
                e,
                UiEvent::Status {
                    state: SessionState::Disconnected,
                    button: "Connect"
                }
            )
        })
        .await;
        assert!(output.contains("Device selection cancelled"));
    }

    #[tokio::test]
    async fn test_link_loss_is_forwarded() {
        let mut h = start();
        h.command_tx.send(Command::Toggle).await.unwrap();
        wait_for(&mut h.event_rx, |e| is_status(e, SessionState::Connected)).await;

        h.device.drop_link();
        wait_for(&mut h.event_rx, |e| {
            matches!(e, UiEvent::Session(SessionEvent::Disconnected { .. }))
        })
        .await;
    }

    #[tokio::test]
    async fn test_picker_rejects_empty_list_without_prompting() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let picker = TuiPicker::new(event_tx);

        assert!(matches!(
            picker.pick(Vec::new()).await,
            Err(Error::DeviceNotFound(DeviceNotFoundReason::NoDevicesInRange))
        ));
        assert!(event_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_shutdown_disconnects() {
        let mut h = start();
        h.command_tx.send(Command::Toggle).await.unwrap();
        wait_for(&mut h.event_rx, |e| is_status(e, SessionState::Connected)).await;

        h.command_tx.send(Command::Shutdown).await.unwrap();
        timeout(WAIT, async {
            while h.device.close_count() == 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("device was not closed");
    }
}
