//! Terminal text: prompts, tagged lines, and rendered replies.

use synapse_core::{ActorConfig, Persona};

pub const RESET: &str = "\x1b[0m";
pub const CLEAR_SCREEN: &str = "\x1b[2J\x1b[H";
pub const NEWLINE: &str = "\r\n";
pub const ERROR_PREFIX: &str = "[ERROR] ";

/// ANSI color a persona's prompt tag is drawn in.
pub fn persona_color(persona: Persona) -> &'static str {
    match persona {
        Persona::Coder => "\x1b[32m",
        Persona::Reviewer => "\x1b[36m",
        Persona::Security => "\x1b[31m",
        Persona::System => "\x1b[33m",
    }
}

/// Prompt shown after every command, ending in `<id>:<cwd>$ `.
pub fn prompt(config: &ActorConfig) -> String {
    format!(
        "{}[{}]{RESET} {}:{}$ ",
        persona_color(config.persona),
        config.persona,
        config.id,
        config.cwd
    )
}

pub fn system_line(text: &str) -> String {
    format!("\x1b[33m[SYSTEM]{RESET} {text}")
}

pub fn agent_line(text: &str) -> String {
    format!("\x1b[35m[AGENT]{RESET} {text}")
}

pub fn relay_line(text: &str) -> String {
    format!("\x1b[36m[RELAY]{RESET} {text}")
}

pub fn error_line(text: impl std::fmt::Display) -> String {
    format!("{ERROR_PREFIX}{text}")
}

/// Boot transcript sent to a freshly opened session, before its prompt.
pub fn boot_transcript(config: &ActorConfig, sessions: usize) -> Vec<String> {
    vec![
        system_line(&format!("Synapse node '{}' online.", config.id)),
        system_line(&format!(
            "{} | persona: {} | status: {}",
            config.display_name, config.persona, config.status
        )),
        system_line(&format!("Attached sessions: {sessions}")),
        system_line("Type 'help' for commands, '@<node> <message>' to relay."),
    ]
}

/// Output of one dispatched line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub lines: Vec<String>,
    /// Clear the screen before the lines.
    pub clear: bool,
}

impl Reply {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn line(text: impl Into<String>) -> Self {
        Self {
            lines: vec![text.into()],
            clear: false,
        }
    }

    pub fn lines(lines: Vec<String>) -> Self {
        Self {
            lines,
            clear: false,
        }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        Self::line(error_line(err))
    }

    pub fn clear_screen() -> Self {
        Self {
            lines: Vec::new(),
            clear: true,
        }
    }

    /// Append text, splitting on line breaks.
    pub fn push_text(&mut self, text: &str) {
        self.lines.extend(text.lines().map(str::to_string));
    }

    /// Text for a live session: every line terminated by `\r\n`.
    pub fn to_terminal(&self) -> String {
        let mut out = String::new();
        if self.clear {
            out.push_str(CLEAR_SCREEN);
        }
        for line in &self.lines {
            out.push_str(line);
            out.push_str(NEWLINE);
        }
        out
    }

    /// Text returned to a relay caller: lines joined by `\r\n`, screen
    /// control dropped.
    pub fn to_relay(&self) -> String {
        self.lines.join(NEWLINE)
    }
}
