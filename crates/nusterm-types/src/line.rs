//! Input line buffering.
//!
//! Keystrokes arrive as the raw strings a terminal produces for them. The
//! buffer accumulates printable characters until the line terminator, then
//! hands back the whole line with a trailing newline for sending.

/// Carriage return, produced by the Enter key.
pub const TERMINATOR: char = '\r';

/// Backspace (`^H`).
pub const BACKSPACE: char = '\u{8}';

/// Delete (`^?`), what most terminals send for the Backspace key.
pub const DELETE: char = '\u{7f}';

/// What the input surface should do after a keystroke.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEdit {
    /// Character was buffered; echo it.
    Echo(char),
    /// Last buffered character was removed; erase it on screen.
    Erase,
    /// Line complete. Contains the buffered text plus `'\n'`; the buffer is
    /// now empty.
    Submit(String),
    /// Keystroke had no effect.
    Ignored,
}

/// Accumulates typed characters since the last line terminator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    pending: String,
}

impl LineBuffer {
    /// Create an empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one keystroke.
    ///
    /// A key is accepted only if it is a single character that is not a
    /// control character. The terminator submits the line (even when empty),
    /// erase removes the last character if there is one.
    pub fn feed(&mut self, key: &str) -> LineEdit {
        let mut chars = key.chars();
        let (Some(c), None) = (chars.next(), chars.next()) else {
            return LineEdit::Ignored;
        };

        match c {
            TERMINATOR => {
                let mut line = std::mem::take(&mut self.pending);
                line.push('\n');
                LineEdit::Submit(line)
            }
            BACKSPACE | DELETE => match self.pending.pop() {
                Some(_) => LineEdit::Erase,
                None => LineEdit::Ignored,
            },
            c if c.is_control() => LineEdit::Ignored,
            c => {
                self.pending.push(c);
                LineEdit::Echo(c)
            }
        }
    }

    /// Text typed since the last terminator.
    pub fn as_str(&self) -> &str {
        &self.pending
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Drop any pending text.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
