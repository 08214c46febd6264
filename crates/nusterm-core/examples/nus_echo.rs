//! Example: Send one line to a NUS device and print the reply
//!
//! Connects to the first device whose name or address contains the given
//! text, sends a line, waits for output, and disconnects.
//!
//! Run with: `cargo run --example nus_echo -- "Zephyr" "help"`

use std::sync::Arc;
use std::time::Duration;

use nusterm_core::{BleTransport, MatchPicker, SessionConfig, SessionController};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let mut args = std::env::args().skip(1);
    let device = args.next().unwrap_or_else(|| "Zephyr".to_string());
    let line = args.next().unwrap_or_else(|| "help".to_string());

    let transport = BleTransport::new(Arc::new(MatchPicker::new(device)));
    let (out_tx, mut out_rx) = tokio::sync::mpsc::unbounded_channel::<String>();
    let controller =
        SessionController::new(Arc::new(transport), Arc::new(out_tx), SessionConfig::new());

    let printer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            print!("{}", text);
        }
    });

    controller.connect().await?;
    controller.send_text(&format!("{}\n", line)).await?;
    tokio::time::sleep(Duration::from_secs(2)).await;
    controller.disconnect().await?;

    drop(controller);
    let _ = printer.await;
    Ok(())
}
