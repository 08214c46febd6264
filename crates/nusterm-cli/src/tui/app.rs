//! Application state for the TUI.
//!
//! Holds the two panes (scrollback output and the line-buffered input), the
//! connect button state mirrored from the worker, and the menu and picker
//! overlays.

use std::io;
use std::time::{Duration, Instant};

use nusterm_core::{DiscoveredDevice, LineBuffer, LineEdit, SessionEvent, SessionState};
use ratatui::layout::Rect;
use tokio::sync::{mpsc, oneshot};

use super::messages::{Command, PickRequest, UiEvent};
use super::scrollback::Scrollback;
use crate::picker::picker_label;

/// Project page opened from the context menu.
pub const PROJECT_URL: &str = "https://github.com/nusterm/nusterm";

/// How long a status line message stays visible.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(5);

/// Which pane receives keystrokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Input,
    Output,
}

/// Output pane context menu entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuItem {
    TerminalReset,
    TerminalClear,
    ProjectPage,
}

impl MenuItem {
    pub const ALL: [MenuItem; 3] = [
        MenuItem::TerminalReset,
        MenuItem::TerminalClear,
        MenuItem::ProjectPage,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::TerminalReset => "Terminal Reset",
            Self::TerminalClear => "Terminal Clear",
            Self::ProjectPage => "Project Page",
        }
    }
}

/// Open context menu.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Menu {
    pub selected: usize,
}

/// Open device picker.
#[derive(Debug)]
pub struct Picker {
    pub labels: Vec<String>,
    pub selected: usize,
    reply: Option<oneshot::Sender<Option<usize>>>,
}

impl Picker {
    fn new(candidates: &[DiscoveredDevice], reply: oneshot::Sender<Option<usize>>) -> Self {
        Self {
            labels: candidates.iter().map(picker_label).collect(),
            selected: 0,
            reply: Some(reply),
        }
    }

    fn answer(&mut self, choice: Option<usize>) {
        if let Some(reply) = self.reply.take() {
            // The connect attempt may already have been abandoned
            let _ = reply.send(choice);
        }
    }
}

impl Drop for Picker {
    fn drop(&mut self) {
        self.answer(None);
    }
}

/// Screen regions from the last draw, for mouse hit testing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Areas {
    pub button: Rect,
    pub output: Rect,
    pub input: Rect,
    pub menu: Option<Rect>,
    pub picker: Option<Rect>,
}

/// Main application state for the TUI.
pub struct App {
    should_quit: bool,
    pub output: Scrollback,
    pub input: LineBuffer,
    pub focus: Focus,
    /// Lines scrolled back from the bottom of the output pane.
    pub scroll: usize,
    pub state: SessionState,
    pub button: &'static str,
    /// Name of the connected device.
    pub device: Option<String>,
    pub menu: Option<Menu>,
    pub picker: Option<Picker>,
    pub areas: Areas,
    status_message: Option<(String, Instant)>,
    /// Commands produced outside a single keystroke, such as a multi-line paste.
    pending: Vec<Command>,
    pub event_rx: mpsc::UnboundedReceiver<UiEvent>,
}

impl App {
    pub fn new(event_rx: mpsc::UnboundedReceiver<UiEvent>, scrollback: usize) -> Self {
        let mut app = Self {
            should_quit: false,
            output: Scrollback::new(scrollback),
            input: LineBuffer::new(),
            focus: Focus::Input,
            scroll: 0,
            state: SessionState::Disconnected,
            button: "Connect",
            device: None,
            menu: None,
            picker: None,
            areas: Areas::default(),
            status_message: None,
            pending: Vec::new(),
            event_rx,
        };
        app.print_banner();
        app
    }

    pub fn should_quit(&self) -> bool {
        self.should_quit
    }

    pub fn quit(&mut self) {
        self.should_quit = true;
        // Dropping the picker answers a pending pick with "cancelled"
        self.picker = None;
    }

    pub fn print_banner(&mut self) {
        self.output.println(&format!(
            "Welcome to nusterm {}, a serial console for Nordic UART Service devices.",
            env!("CARGO_PKG_VERSION")
        ));
        self.output
            .println("Press F5 or click Connect to pick a device. F2 opens the menu.");
        self.output.println(&format!("Source: {}", PROJECT_URL));
        self.output.println("");
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message
            .as_ref()
            .filter(|(_, at)| at.elapsed() < STATUS_MESSAGE_TTL)
            .map(|(msg, _)| msg.as_str())
    }

    pub fn set_status_message(&mut self, message: impl Into<String>) {
        self.status_message = Some((message.into(), Instant::now()));
    }

    pub fn handle_ui_event(&mut self, event: UiEvent) {
        match event {
            UiEvent::Output(text) => self.output.feed(&text),
            UiEvent::Session(event) => self.handle_session_event(event),
            UiEvent::Status { state, button } => {
                self.state = state;
                self.button = button;
            }
            UiEvent::Pick(PickRequest { candidates, reply }) => {
                self.menu = None;
                self.picker = Some(Picker::new(&candidates, reply));
            }
        }
    }

    fn handle_session_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Connecting => self.set_status_message("Scanning for devices..."),
            SessionEvent::Connected { device } => {
                self.set_status_message(format!("Connected to {}", device.display_name()));
                self.device = Some(device.display_name().to_string());
            }
            SessionEvent::Disconnected { device, .. } => {
                self.set_status_message(format!("{} disconnected", device.display_name()));
                self.device = None;
                // A connect attempt that ends this way never needs the picker
                self.picker = None;
            }
            SessionEvent::Error { error } => {
                self.set_status_message(error);
                self.picker = None;
            }
            _ => {}
        }
    }

    /// Feed one keystroke to the input pane.
    ///
    /// A completed line is echoed to the output pane and returned as a send
    /// command.
    pub fn key(&mut self, key: &str) -> Option<Command> {
        self.focus = Focus::Input;
        match self.input.feed(key) {
            LineEdit::Submit(line) => {
                self.output.println(line.trim_end_matches('\n'));
                self.scroll = 0;
                Some(Command::Send(line))
            }
            LineEdit::Echo(_) | LineEdit::Erase | LineEdit::Ignored => None,
        }
    }

    pub fn queue(&mut self, command: Command) {
        self.pending.push(command);
    }

    pub fn take_pending(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.pending)
    }

    /// Press the connect button.
    pub fn toggle(&mut self) -> Command {
        self.menu = None;
        self.focus = Focus::Input;
        Command::Toggle
    }

    pub fn cycle_focus(&mut self) {
        self.focus = match self.focus {
            Focus::Input => Focus::Output,
            Focus::Output => Focus::Input,
        };
    }

    fn visible_lines(&self) -> usize {
        usize::from(self.areas.output.height.saturating_sub(2)).max(1)
    }

    fn max_scroll(&self) -> usize {
        self.output.len().saturating_sub(self.visible_lines())
    }

    pub fn page(&self) -> usize {
        self.visible_lines().saturating_sub(1).max(1)
    }

    pub fn scroll_up(&mut self, lines: usize) {
        self.scroll = (self.scroll + lines).min(self.max_scroll());
    }

    pub fn scroll_down(&mut self, lines: usize) {
        self.scroll = self.scroll.saturating_sub(lines);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll = self.max_scroll();
    }

    pub fn scroll_to_bottom(&mut self) {
        self.scroll = 0;
    }

    pub fn open_menu(&mut self) {
        if self.picker.is_none() {
            self.menu = Some(Menu::default());
        }
    }

    pub fn close_overlay(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            picker.answer(None);
            self.picker = None;
        } else {
            self.menu = None;
        }
    }

    pub fn overlay_next(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            if !picker.labels.is_empty() {
                picker.selected = (picker.selected + 1) % picker.labels.len();
            }
        } else if let Some(menu) = self.menu.as_mut() {
            menu.selected = (menu.selected + 1) % MenuItem::ALL.len();
        }
    }

    pub fn overlay_previous(&mut self) {
        if let Some(picker) = self.picker.as_mut() {
            let len = picker.labels.len();
            if len > 0 {
                picker.selected = (picker.selected + len - 1) % len;
            }
        } else if let Some(menu) = self.menu.as_mut() {
            let len = MenuItem::ALL.len();
            menu.selected = (menu.selected + len - 1) % len;
        }
    }

    /// Confirm the highlighted picker row or menu entry.
    pub fn overlay_select(&mut self) {
        if let Some(mut picker) = self.picker.take() {
            let choice = picker.selected;
            picker.answer(Some(choice));
        } else if let Some(menu) = self.menu.take() {
            self.run_menu_item(MenuItem::ALL[menu.selected], |url| open::that(url));
        }
    }

    /// Select an overlay row by index, as a mouse click does.
    pub fn overlay_select_row(&mut self, row: usize) {
        if let Some(picker) = self.picker.as_mut() {
            if row < picker.labels.len() {
                picker.selected = row;
                self.overlay_select();
            }
        } else if let Some(menu) = self.menu.as_mut()
            && row < MenuItem::ALL.len()
        {
            menu.selected = row;
            self.overlay_select();
        }
    }

    pub fn run_menu_item(&mut self, item: MenuItem, open: impl FnOnce(&str) -> io::Result<()>) {
        self.menu = None;
        self.focus = Focus::Input;
        match item {
            MenuItem::TerminalReset => {
                self.output.clear();
                self.scroll = 0;
                self.print_banner();
            }
            MenuItem::TerminalClear => {
                self.output.clear();
                self.scroll = 0;
            }
            MenuItem::ProjectPage => {
                if let Err(e) = open(PROJECT_URL) {
                    tracing::warn!("Failed to open browser: {}", e);
                    self.output.println(&format!("Project page: {}", PROJECT_URL));
                }
            }
        }
    }
}
