//! Message types passed between the UI loop and the session worker.
//!
//! - [`Command`]: UI to worker
//! - [`UiEvent`]: worker (and the output sink) to UI

use nusterm_core::{DiscoveredDevice, OutputSink, SessionEvent, SessionState};
use tokio::sync::{mpsc, oneshot};

/// Requests from the UI thread to the session worker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Connect when disconnected, disconnect when connected.
    Toggle,
    /// Send a submitted line (already terminated with `\n`).
    Send(String),
    /// Disconnect and stop the worker.
    Shutdown,
}

/// The picker asks the UI to choose among scan results.
#[derive(Debug)]
pub struct PickRequest {
    pub candidates: Vec<DiscoveredDevice>,
    /// Index of the chosen candidate, or `None` when dismissed.
    pub reply: oneshot::Sender<Option<usize>>,
}

/// Everything the UI reacts to.
#[derive(Debug)]
pub enum UiEvent {
    /// Text for the output pane.
    Output(String),
    /// Lifecycle event from the controller.
    Session(SessionEvent),
    /// Controller state after a lifecycle event.
    Status {
        state: SessionState,
        button: &'static str,
    },
    /// Show the device picker.
    Pick(PickRequest),
}

/// Output sink that forwards text to the UI loop.
#[derive(Debug, Clone)]
pub struct UiSink {
    tx: mpsc::UnboundedSender<UiEvent>,
}

impl UiSink {
    pub fn new(tx: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { tx }
    }
}

impl OutputSink for UiSink {
    fn print(&self, text: &str) {
        // Receiver gone means the UI is shutting down
        let _ = self.tx.send(UiEvent::Output(text.to_string()));
    }
}
