//! Inbound command lines

/// ASCII ETX, sent by the terminal client on Ctrl+C
pub const INTERRUPT: &str = "\x03";

/// A trimmed, non-empty command line received from a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine(String);

impl CommandLine {
    /// Trim `raw`; `None` when nothing is left
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// The command text
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First whitespace separated word
    #[must_use]
    pub fn program(&self) -> &str {
        self.0.split_whitespace().next().unwrap_or(&self.0)
    }
}

impl std::fmt::Display for CommandLine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CommandLine {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Classification of one inbound text message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Blank message, ignored
    Empty,
    /// Lone Ctrl+C, ignored
    Interrupt,
    /// A command to execute
    Command(CommandLine),
}

impl Inbound {
    /// Classify a raw text message
    #[must_use]
    pub fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed == INTERRUPT {
            return Self::Interrupt;
        }
        match CommandLine::parse(trimmed) {
            Some(line) => Self::Command(line),
            None => Self::Empty,
        }
    }
}
