//! The output surface contract.
//!
//! Everything the user should see (remote text, connect/disconnect notices,
//! errors) is pushed through an [`OutputSink`]. Sinks must preserve call
//! order; the inbound bridge relies on that for notification ordering.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

/// Receives text for the output surface.
pub trait OutputSink: Send + Sync {
    /// Print text verbatim.
    fn print(&self, text: &str);

    /// Print text followed by CR LF.
    fn println(&self, text: &str) {
        self.print(&format!("{text}\r\n"));
    }
}

impl OutputSink for mpsc::UnboundedSender<String> {
    fn print(&self, text: &str) {
        // Receiver gone means the UI is shutting down
        let _ = self.send(text.to_string());
    }
}

impl<S: OutputSink + ?Sized> OutputSink for Arc<S> {
    fn print(&self, text: &str) {
        (**self).print(text);
    }
}

/// Sink that records every print, for tests and headless use.
#[derive(Debug, Clone, Default)]
pub struct BufferSink {
    prints: Arc<Mutex<Vec<String>>>,
}

impl BufferSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each `print` call as it was received.
    pub fn prints(&self) -> Vec<String> {
        self.prints.lock().map(|p| p.clone()).unwrap_or_default()
    }

    /// Everything printed so far, concatenated.
    pub fn contents(&self) -> String {
        self.prints().concat()
    }

    pub fn clear(&self) {
        if let Ok(mut prints) = self.prints.lock() {
            prints.clear();
        }
    }
}

impl OutputSink for BufferSink {
    fn print(&self, text: &str) {
        if let Ok(mut prints) = self.prints.lock() {
            prints.push(text.to_string());
        }
    }
}
