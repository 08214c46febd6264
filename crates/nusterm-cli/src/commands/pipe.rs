//! Line mode: stdin lines go to the device, device output goes to stdout.

use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use nusterm_core::{
    BleTransport, DisconnectReason, Error, OutputSink, SessionController, SessionEvent,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::config::SessionSettings;
use crate::picker::{DialoguerPicker, picker_for};
use crate::style;

/// How long to keep printing replies after stdin closes.
const DRAIN_AFTER_EOF: Duration = Duration::from_secs(1);

/// Writes remote text straight to stdout.
struct StdoutSink;

impl OutputSink for StdoutSink {
    fn print(&self, text: &str) {
        let mut stdout = io::stdout().lock();
        // A closed stdout ends the session through the stdin side
        let _ = stdout.write_all(text.as_bytes());
        let _ = stdout.flush();
    }
}

pub async fn cmd_pipe(settings: SessionSettings, quiet: bool) -> Result<()> {
    let picker = picker_for(settings.device.as_deref(), Arc::new(DialoguerPicker));
    let transport = BleTransport::new(picker).scan_duration(settings.scan_timeout);
    let controller = SessionController::new(
        Arc::new(transport),
        Arc::new(StdoutSink),
        settings.session_config(),
    );
    let mut events = controller.subscribe();

    // The interactive picker shares stderr, so only spin when no prompt can appear
    let spinner = if !quiet && settings.device.is_some() && io::stderr().is_terminal() {
        Some(style::connecting_spinner())
    } else {
        None
    };
    let connected = controller.connect().await;
    if let Some(sp) = spinner {
        sp.finish_and_clear();
    }
    match connected {
        Ok(()) => {}
        Err(e) if e.is_cancellation() => return Ok(()),
        Err(e) => bail!(e),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut link_lost = false;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                debug!("Interrupted");
                break;
            }
            event = events.recv() => match event {
                Ok(SessionEvent::Disconnected { reason: DisconnectReason::LinkLost, .. }) => {
                    link_lost = true;
                    break;
                }
                Ok(_) | Err(RecvError::Lagged(_)) => {}
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => match controller.send_text(&format!("{}\n", line)).await {
                    Ok(()) => {}
                    Err(Error::NotConnected) => break,
                    Err(e) => warn!("Send failed: {}", e),
                },
                Ok(None) => {
                    info!("stdin closed");
                    tokio::time::sleep(DRAIN_AFTER_EOF).await;
                    break;
                }
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    if controller.is_connected().await {
        controller.disconnect().await?;
    }
    if link_lost {
        bail!("Link to the device was lost");
    }
    Ok(())
}
