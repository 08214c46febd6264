//! Output pane model.
//!
//! Remote shells write with carriage returns, backspaces and ANSI escapes
//! (colors, erase-line). The pane keeps plain lines: `\r` moves the cursor to
//! column zero, `\n` starts a new line, backspace moves the cursor left and
//! later characters overwrite in place. CSI sequences are dropped except
//! erase-in-line, which truncates at the cursor. Escape state survives across
//! fragments because notifications can split a sequence.

use std::collections::VecDeque;

const ESC: char = '\u{1b}';
const TAB_WIDTH: usize = 8;
/// Longest CSI parameter run kept before the sequence is abandoned.
const MAX_CSI_PARAMS: usize = 32;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
enum Escape {
    #[default]
    Ground,
    Escape,
    Csi(String),
}

#[derive(Debug, Clone)]
pub struct Scrollback {
    lines: VecDeque<String>,
    /// Cursor column in the last line, in chars.
    column: usize,
    capacity: usize,
    escape: Escape,
}

impl Scrollback {
    pub fn new(capacity: usize) -> Self {
        let mut lines = VecDeque::new();
        lines.push_back(String::new());
        Self {
            lines,
            column: 0,
            capacity: capacity.max(1),
            escape: Escape::Ground,
        }
    }

    /// Interpret a fragment of terminal output.
    pub fn feed(&mut self, text: &str) {
        for c in text.chars() {
            match std::mem::take(&mut self.escape) {
                Escape::Escape => {
                    if c == '[' {
                        self.escape = Escape::Csi(String::new());
                    }
                    // Other two-byte escapes are dropped whole
                }
                Escape::Csi(mut params) => {
                    if ('\u{40}'..='\u{7e}').contains(&c) {
                        self.csi(&params, c);
                    } else if params.len() < MAX_CSI_PARAMS {
                        params.push(c);
                        self.escape = Escape::Csi(params);
                    }
                    // Too long: back to ground, dropping this char
                }
                Escape::Ground => self.ground(c),
            }
        }
    }

    fn ground(&mut self, c: char) {
        match c {
            ESC => self.escape = Escape::Escape,
            '\r' => self.column = 0,
            '\n' => self.newline(),
            '\u{8}' => self.column = self.column.saturating_sub(1),
            '\t' => {
                let next = (self.column / TAB_WIDTH + 1) * TAB_WIDTH;
                while self.column < next {
                    self.put(' ');
                }
            }
            c if c.is_control() => {}
            c => self.put(c),
        }
    }

    fn csi(&mut self, params: &str, action: char) {
        // Erase in line, cursor to end
        if action == 'K' && (params.is_empty() || params == "0") {
            let column = self.column;
            let line = self.current();
            if let Some((at, _)) = line.char_indices().nth(column) {
                line.truncate(at);
            }
        }
    }

    fn current(&mut self) -> &mut String {
        if self.lines.is_empty() {
            self.lines.push_back(String::new());
        }
        let last = self.lines.len() - 1;
        &mut self.lines[last]
    }

    fn put(&mut self, c: char) {
        let column = self.column;
        let line = self.current();
        let len = line.chars().count();
        if column >= len {
            line.extend(std::iter::repeat_n(' ', column - len));
            line.push(c);
        } else if let Some((at, old)) = line.char_indices().nth(column) {
            line.replace_range(at..at + old.len_utf8(), c.encode_utf8(&mut [0; 4]));
        }
        self.column += 1;
    }

    fn newline(&mut self) {
        self.lines.push_back(String::new());
        self.column = 0;
        while self.lines.len() > self.capacity {
            self.lines.pop_front();
        }
    }

    /// Print text followed by a line break.
    pub fn println(&mut self, text: &str) {
        self.feed(text);
        self.feed("\r\n");
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.lines.push_back(String::new());
        self.column = 0;
        self.escape = Escape::Ground;
    }

    pub fn lines(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.lines.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Everything on screen joined with `\n`.
    pub fn text(&self) -> String {
        self.lines().collect::<Vec<_>>().join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_lines() {
        let mut sb = Scrollback::new(100);
        sb.feed("uart:~$ help\r\nPlease press Tab\r\n");
        assert_eq!(sb.text(), "uart:~$ help\nPlease press Tab\n");
    }

    #[test]
    fn test_carriage_return_overwrites() {
        let mut sb = Scrollback::new(100);
        sb.feed("progress 10%\rprogress 99%");
        assert_eq!(sb.text(), "progress 99%");
    }

    #[test]
    fn test_backspace_erase_sequence() {
        let mut sb = Scrollback::new(100);
        sb.feed("helo\u{8} \u{8}");
        sb.feed("lo");
        assert_eq!(sb.text(), "hello");
    }

    #[test]
    fn test_color_codes_stripped() {
        let mut sb = Scrollback::new(100);
        sb.feed("\u{1b}[1;32muart:~$ \u{1b}[m");
        assert_eq!(sb.text(), "uart:~$ ");
    }

    #[test]
    fn test_escape_split_across_fragments() {
        let mut sb = Scrollback::new(100);
        sb.feed("ok\u{1b}");
        sb.feed("[1;3");
        sb.feed("1mred");
        assert_eq!(sb.text(), "okred");
    }

    #[test]
    fn test_erase_in_line() {
        let mut sb = Scrollback::new(100);
        sb.feed("uart:~$ kernel\r\u{1b}[8C");
        // Cursor moves are ignored, so erase applies from column zero
        sb.feed("\u{1b}[K");
        assert_eq!(sb.text(), "");

        sb.feed("abcdef\u{8}\u{8}\u{1b}[K");
        assert_eq!(sb.text(), "abcd");
    }

    #[test]
    fn test_capacity_drops_oldest() {
        let mut sb = Scrollback::new(3);
        sb.feed("1\n2\n3\n4");
        assert_eq!(sb.len(), 3);
        assert_eq!(sb.text(), "2\n3\n4");
    }

    #[test]
    fn test_clear_resets_escape_state() {
        let mut sb = Scrollback::new(10);
        sb.feed("text\u{1b}[");
        sb.clear();
        sb.feed("m");
        assert_eq!(sb.text(), "m");
    }

    #[test]
    fn test_latin1_text_kept() {
        let mut sb = Scrollback::new(10);
        sb.feed("caf\u{e9}");
        assert_eq!(sb.text(), "café");
    }

    #[test]
    fn test_overlong_csi_is_abandoned() {
        let mut sb = Scrollback::new(10);
        let params = "1".repeat(MAX_CSI_PARAMS + 8);
        sb.feed(&format!("\u{1b}[{params}"));
        assert_eq!(sb.escape, Escape::Ground);
        // The char past the cap is dropped, the rest is plain text
        assert_eq!(sb.text(), "1".repeat(7));
    }

    #[test]
    fn test_tab_expands_to_stop() {
        let mut sb = Scrollback::new(10);
        sb.feed("a\tb");
        assert_eq!(sb.text(), "a       b");
    }
}
