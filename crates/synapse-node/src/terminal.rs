//! Raw-keystroke line editing for one session.

/// Submit key.
const CR: char = '\r';
const LF: char = '\n';
/// DEL, what most terminals send for Backspace.
const DEL: char = '\u{7f}';
/// BS, sent by some terminals instead of DEL.
const BS: char = '\u{8}';

/// Echo sequence that erases the last character on screen.
pub const ERASE: &str = "\u{8} \u{8}";

/// What the session should see or run after a chunk of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// Text to echo back verbatim.
    Echo(String),
    /// A completed line, already trimmed. May be empty.
    Submit(String),
}

/// Line buffer state machine. Idle while the buffer is empty, accumulating
/// otherwise.
#[derive(Debug, Default, Clone)]
pub struct LineBuffer {
    buffer: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Characters typed since the last submit.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// Scan `chunk` keystroke by keystroke.
    ///
    /// Consecutive echoed characters are merged into one event. A `\n` right
    /// after `\r` in the same chunk is swallowed.
    pub fn feed(&mut self, chunk: &str) -> Vec<TerminalEvent> {
        let mut events = Vec::new();
        let mut echo = String::new();
        let mut after_cr = false;

        for ch in chunk.chars() {
            match ch {
                CR => {
                    flush(&mut echo, &mut events);
                    let line = self.buffer.trim().to_string();
                    self.buffer.clear();
                    events.push(TerminalEvent::Submit(line));
                    after_cr = true;
                    continue;
                }
                LF if after_cr => {}
                DEL | BS => {
                    if self.buffer.pop().is_some() {
                        echo.push_str(ERASE);
                    }
                }
                other => {
                    self.buffer.push(other);
                    echo.push(other);
                }
            }
            after_cr = false;
        }
        flush(&mut echo, &mut events);
        events
    }
}

fn flush(echo: &mut String, events: &mut Vec<TerminalEvent>) {
    if !echo.is_empty() {
        events.push(TerminalEvent::Echo(std::mem::take(echo)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typing_echoes_and_accumulates() {
        let mut lb = LineBuffer::new();
        assert_eq!(lb.feed("l"), vec![TerminalEvent::Echo("l".into())]);
        assert_eq!(lb.feed("s"), vec![TerminalEvent::Echo("s".into())]);
        assert_eq!(lb.pending(), "ls");
        assert_eq!(lb.feed("\r"), vec![TerminalEvent::Submit("ls".into())]);
        assert!(lb.is_idle());
    }

    #[test]
    fn backspace_on_empty_buffer_is_silent() {
        let mut lb = LineBuffer::new();
        assert!(lb.feed("\u{7f}").is_empty());
        assert!(lb.is_idle());
    }

    #[test]
    fn backspace_erases_one_char() {
        let mut lb = LineBuffer::new();
        lb.feed("lsx");
        assert_eq!(lb.feed("\u{7f}"), vec![TerminalEvent::Echo(ERASE.into())]);
        assert_eq!(lb.pending(), "ls");
        lb.feed("\u{8}");
        assert_eq!(lb.pending(), "l");
    }

    #[test]
    fn pasted_chunk_is_split_into_lines() {
        let mut lb = LineBuffer::new();
        let events = lb.feed("mkdir docs\r\nls\r");
        assert_eq!(
            events,
            vec![
                TerminalEvent::Echo("mkdir docs".into()),
                TerminalEvent::Submit("mkdir docs".into()),
                TerminalEvent::Echo("ls".into()),
                TerminalEvent::Submit("ls".into()),
            ]
        );
    }

    #[test]
    fn lone_newline_is_ordinary_input() {
        let mut lb = LineBuffer::new();
        lb.feed("a\nb");
        assert_eq!(lb.pending(), "a\nb");
    }

    #[test]
    fn submit_trims_whitespace() {
        let mut lb = LineBuffer::new();
        assert_eq!(
            lb.feed("   \r"),
            vec![
                TerminalEvent::Echo("   ".into()),
                TerminalEvent::Submit(String::new())
            ]
        );
    }
}
