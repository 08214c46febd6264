//! Two-pane terminal UI.
//!
//! This module ties together the TUI components and provides the main event
//! loop. It handles:
//!
//! - Terminal setup and restoration
//! - Spawning the session worker and wiring its channels
//! - The main event loop with input handling and rendering
//! - Graceful shutdown coordination

pub mod app;
pub mod input;
pub mod messages;
pub mod scrollback;
pub mod ui;
pub mod worker;

pub use app::App;
pub use messages::{Command, UiEvent};
pub use worker::{SessionWorker, TuiPicker};

use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use crossterm::{
    ExecutableCommand,
    event::{
        self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste,
        EnableMouseCapture, Event, KeyEventKind,
    },
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use nusterm_core::{BleTransport, SessionController};
use ratatui::prelude::*;
use tokio::sync::mpsc;
use tracing::info;

use crate::config::SessionSettings;
use crate::picker::picker_for;
use messages::UiSink;

/// Poll interval for terminal input; also bounds how stale the screen gets.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Set up the terminal for TUI rendering.
///
/// Enables raw mode, mouse capture and bracketed paste, and switches to the
/// alternate screen buffer.
pub fn setup_terminal() -> Result<Terminal<CrosstermBackend<io::Stdout>>> {
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    stdout().execute(EnableMouseCapture)?;
    stdout().execute(EnableBracketedPaste)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    Ok(terminal)
}

/// Restore the terminal to its original state.
pub fn restore_terminal() -> Result<()> {
    stdout().execute(DisableBracketedPaste)?;
    stdout().execute(DisableMouseCapture)?;
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    Ok(())
}

/// Run the terminal UI until the user quits.
pub async fn run(settings: SessionSettings, scrollback: usize) -> Result<()> {
    let (cmd_tx, cmd_rx) = mpsc::channel::<Command>(32);
    let (event_tx, event_rx) = mpsc::unbounded_channel::<UiEvent>();

    let picker = picker_for(
        settings.device.as_deref(),
        Arc::new(TuiPicker::new(event_tx.clone())),
    );
    let transport = BleTransport::new(picker).scan_duration(settings.scan_timeout);
    let controller = SessionController::new(
        Arc::new(transport),
        Arc::new(UiSink::new(event_tx.clone())),
        settings.session_config(),
    );

    let worker = SessionWorker::new(cmd_rx, event_tx, controller);
    let worker_handle = tokio::spawn(worker.run());

    let mut app = App::new(event_rx, scrollback);
    let mut terminal = setup_terminal()?;

    let result = run_event_loop(&mut terminal, &mut app, &cmd_tx).await;

    // Closes any open picker so a pending connect can finish
    drop(app);
    let _ = cmd_tx.send(Command::Shutdown).await;

    restore_terminal()?;

    let _ = worker_handle.await;
    info!("Terminal UI closed");

    result
}

/// Main event loop for the TUI.
async fn run_event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
    command_tx: &mpsc::Sender<Command>,
) -> Result<()> {
    while !app.should_quit() {
        terminal.draw(|f| ui::draw(f, app))?;

        // Poll for keyboard and mouse events with timeout
        if event::poll(POLL_INTERVAL)? {
            let action = match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    input::handle_key(key, input::Mode::of(app))
                }
                Event::Mouse(mouse) => input::handle_mouse(mouse),
                Event::Paste(text) => input::Action::Paste(text),
                _ => input::Action::None,
            };
            let first = input::apply_action(app, action);
            for cmd in first.into_iter().chain(app.take_pending()) {
                // Only fails once the worker is gone
                let _ = command_tx.send(cmd).await;
            }
        }

        // Non-blocking receive of worker events
        while let Ok(event) = app.event_rx.try_recv() {
            app.handle_ui_event(event);
        }

        // Let spawned controller tasks run between frames
        tokio::task::yield_now().await;
    }

    Ok(())
}
