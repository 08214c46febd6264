//! Keyboard and mouse input handling for the TUI.
//!
//! # Key Bindings
//!
//! | Key                 | Action                                   |
//! |---------------------|------------------------------------------|
//! | `F5` / `Ctrl-T`     | Connect / Disconnect                     |
//! | `F2` / right click  | Output pane menu                         |
//! | `Tab`               | Switch focus between input and output    |
//! | `PgUp` / `PgDn`     | Scroll output                            |
//! | `↑` / `↓`           | Scroll output (output focus), or move in a list |
//! | `Enter`             | Send the line, or choose a list entry    |
//! | `Esc`               | Close the menu or cancel the picker      |
//! | `Ctrl-C` / `Ctrl-Q` | Quit                                     |

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers, MouseButton, MouseEvent, MouseEventKind};
use nusterm_types::{BACKSPACE, DELETE, TERMINATOR};
use ratatui::layout::{Position, Rect};

use super::app::{App, Focus};
use super::messages::Command;

/// Lines moved per mouse wheel step.
const WHEEL_LINES: usize = 3;

/// What the UI should do in response to input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Quit,
    /// Press the connect button.
    Toggle,
    /// Raw keystroke for the input pane.
    Key(String),
    /// Pasted text.
    Paste(String),
    CycleFocus,
    ScrollUp(usize),
    ScrollDown(usize),
    PageUp,
    PageDown,
    ScrollTop,
    ScrollBottom,
    OpenMenu,
    /// Move up in the open list.
    ListPrevious,
    /// Move down in the open list.
    ListNext,
    /// Choose the highlighted list entry.
    ListSelect,
    /// Close the menu or dismiss the picker.
    CloseOverlay,
    MouseClick { x: u16, y: u16 },
    None,
}

/// Which surface currently owns the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Input,
    Output,
    Overlay,
}

impl Mode {
    pub fn of(app: &App) -> Self {
        if app.picker.is_some() || app.menu.is_some() {
            Mode::Overlay
        } else if app.focus == Focus::Output {
            Mode::Output
        } else {
            Mode::Input
        }
    }
}

fn key_str(c: char) -> Action {
    Action::Key(c.to_string())
}

/// Map a key event to an action.
pub fn handle_key(key: KeyEvent, mode: Mode) -> Action {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    // Global bindings
    match key.code {
        KeyCode::Char('c') | KeyCode::Char('q') if ctrl => return Action::Quit,
        KeyCode::F(5) if mode != Mode::Overlay => return Action::Toggle,
        KeyCode::Char('t') if ctrl && mode != Mode::Overlay => return Action::Toggle,
        KeyCode::F(2) if mode == Mode::Overlay => return Action::CloseOverlay,
        KeyCode::F(2) => return Action::OpenMenu,
        _ => {}
    }

    match mode {
        Mode::Overlay => match key.code {
            KeyCode::Up => Action::ListPrevious,
            KeyCode::Down | KeyCode::Tab => Action::ListNext,
            KeyCode::Enter => Action::ListSelect,
            KeyCode::Esc => Action::CloseOverlay,
            _ => Action::None,
        },
        Mode::Output => match key.code {
            KeyCode::Up => Action::ScrollUp(1),
            KeyCode::Down => Action::ScrollDown(1),
            KeyCode::PageUp => Action::PageUp,
            KeyCode::PageDown => Action::PageDown,
            KeyCode::Home => Action::ScrollTop,
            KeyCode::End => Action::ScrollBottom,
            KeyCode::Tab | KeyCode::Esc => Action::CycleFocus,
            _ => input_key(key, ctrl),
        },
        Mode::Input => match key.code {
            KeyCode::Tab => Action::CycleFocus,
            KeyCode::PageUp => Action::PageUp,
            KeyCode::PageDown => Action::PageDown,
            _ => input_key(key, ctrl),
        },
    }
}

/// Keys that produce a keystroke for the line buffer.
fn input_key(key: KeyEvent, ctrl: bool) -> Action {
    match key.code {
        KeyCode::Enter => key_str(TERMINATOR),
        KeyCode::Backspace => key_str(DELETE),
        KeyCode::Char('h') if ctrl => key_str(BACKSPACE),
        KeyCode::Char(c) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => key_str(c),
        _ => Action::None,
    }
}

/// Map a mouse event to an action.
pub fn handle_mouse(event: MouseEvent) -> Action {
    match event.kind {
        MouseEventKind::Down(MouseButton::Left) => Action::MouseClick {
            x: event.column,
            y: event.row,
        },
        MouseEventKind::Down(MouseButton::Right) => Action::OpenMenu,
        MouseEventKind::ScrollUp => Action::ScrollUp(WHEEL_LINES),
        MouseEventKind::ScrollDown => Action::ScrollDown(WHEEL_LINES),
        _ => Action::None,
    }
}

/// Row index inside a bordered list, if the point is on one.
fn list_row(area: Rect, x: u16, y: u16) -> Option<usize> {
    let inner = Rect::new(
        area.x.saturating_add(1),
        area.y.saturating_add(1),
        area.width.saturating_sub(2),
        area.height.saturating_sub(2),
    );
    inner
        .contains(Position::new(x, y))
        .then(|| usize::from(y - inner.y))
}

/// Apply an action to the app, returning a command for the worker.
pub fn apply_action(app: &mut App, action: Action) -> Option<Command> {
    match action {
        Action::Quit => app.quit(),
        Action::Toggle => return Some(app.toggle()),
        Action::Key(key) => return app.key(&key),
        Action::Paste(text) => {
            // One line per terminator; `\r\n` counts once
            let normalized = text.replace("\r\n", "\n").replace('\n', "\r");
            for c in normalized.chars() {
                if let Some(cmd) = app.key(c.encode_utf8(&mut [0; 4])) {
                    app.queue(cmd);
                }
            }
        }
        Action::CycleFocus => app.cycle_focus(),
        Action::ScrollUp(n) => app.scroll_up(n),
        Action::ScrollDown(n) => app.scroll_down(n),
        Action::PageUp => app.scroll_up(app.page()),
        Action::PageDown => app.scroll_down(app.page()),
        Action::ScrollTop => app.scroll_to_top(),
        Action::ScrollBottom => app.scroll_to_bottom(),
        Action::OpenMenu => app.open_menu(),
        Action::ListPrevious => app.overlay_previous(),
        Action::ListNext => app.overlay_next(),
        Action::ListSelect => app.overlay_select(),
        Action::CloseOverlay => app.close_overlay(),
        Action::MouseClick { x, y } => return click(app, x, y),
        Action::None => {}
    }
    None
}

fn click(app: &mut App, x: u16, y: u16) -> Option<Command> {
    let areas = app.areas;
    let overlay = if app.picker.is_some() {
        areas.picker
    } else if app.menu.is_some() {
        areas.menu
    } else {
        None
    };

    if let Some(area) = overlay {
        match list_row(area, x, y) {
            Some(row) => app.overlay_select_row(row),
            None if !area.contains(Position::new(x, y)) && app.picker.is_none() => {
                // Clicking away closes the menu; the picker needs an explicit answer
                app.close_overlay();
            }
            None => {}
        }
        return None;
    }

    let point = Position::new(x, y);
    if areas.button.contains(point) {
        return Some(app.toggle());
    }
    if areas.output.contains(point) {
        app.focus = Focus::Output;
    } else if areas.input.contains(point) {
        app.focus = Focus::Input;
    }
    None
}
