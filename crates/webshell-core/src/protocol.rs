//! Wire protocol shared with the terminal client
//!
//! Streaming sessions wrap every chunk in a JSON envelope:
//!
//! ```text
//! { "type": "stdout" | "stderr" | "system", "content": "<string>" }
//! ```
//!
//! Combined-output sessions send the chunk content as raw text. Both modes
//! open with one `__SYSTEM_INFO__:<json>` message that carries no envelope.

use serde::{Deserialize, Serialize};

use crate::config::OutputMode;
use crate::error::Result;

/// Prefix of the identity message sent once when a session opens
pub const SYSTEM_INFO_PREFIX: &str = "__SYSTEM_INFO__:";

/// Sentinel content of the `system` chunk that ends a streamed command
pub const COMMAND_COMPLETE: &str = "__COMMAND_COMPLETE__";

/// Origin of an output chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamTag {
    /// Process standard output
    Stdout,
    /// Process standard error
    Stderr,
    /// Server generated status (errors, completion marker)
    System,
}

impl std::fmt::Display for StreamTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
            Self::System => write!(f, "system"),
        }
    }
}

/// One tagged unit of output on its way to the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputChunk {
    /// Stream the content came from
    #[serde(rename = "type")]
    pub tag: StreamTag,
    /// Text content
    pub content: String,
}

impl OutputChunk {
    /// Create a chunk
    pub fn new(tag: StreamTag, content: impl Into<String>) -> Self {
        Self {
            tag,
            content: content.into(),
        }
    }

    /// Create a `system` chunk
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(StreamTag::System, content)
    }

    /// The completion marker chunk
    #[must_use]
    pub fn complete() -> Self {
        Self::system(COMMAND_COMPLETE)
    }

    /// Whether this chunk is the completion marker
    #[must_use]
    pub fn is_complete_marker(&self) -> bool {
        self.tag == StreamTag::System && self.content == COMMAND_COMPLETE
    }

    /// Encode for the wire according to the session output mode
    pub fn encode(&self, mode: OutputMode) -> Result<String> {
        match mode {
            OutputMode::Streaming => Ok(serde_json::to_string(self)?),
            OutputMode::Combined => Ok(self.content.clone()),
        }
    }
}

/// Host identity shown in the client prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Login name of the server process owner
    pub username: String,
    /// Host name of the server
    pub hostname: String,
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            username: "user".to_string(),
            hostname: "web-cli".to_string(),
        }
    }
}

impl SystemInfo {
    /// Encode as the out-of-band session opening message
    pub fn encode(&self) -> Result<String> {
        Ok(format!("{}{}", SYSTEM_INFO_PREFIX, serde_json::to_string(self)?))
    }

    /// Parse a session opening message, if `text` is one
    #[must_use]
    pub fn decode(text: &str) -> Option<Self> {
        let json = text.strip_prefix(SYSTEM_INFO_PREFIX)?;
        serde_json::from_str(json).ok()
    }
}
