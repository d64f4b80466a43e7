//! Error types for webshell-core

use thiserror::Error;

/// Execution and session error type
#[derive(Debug, Error)]
pub enum Error {
    /// Command line was empty after trimming
    #[error("empty command")]
    EmptyCommand,

    /// Could not obtain a readable handle on a process output stream
    #[error("pipe setup failed: {0}")]
    PipeSetup(String),

    /// Executable not found or not resolvable
    #[error("command '{0}' not found")]
    NotFound(String),

    /// Process could not be spawned
    #[error("failed to start: {0}")]
    Start(#[source] std::io::Error),

    /// Deadline exceeded, process was killed
    #[error("deadline exceeded after {0}s")]
    DeadlineExceeded(u64),

    /// Sending to the transport failed
    #[error("transport write failed: {0}")]
    TransportWrite(String),

    /// Receiving from the transport failed
    #[error("transport read failed: {0}")]
    TransportRead(String),

    /// Output sink no longer accepts chunks
    #[error("output sink closed")]
    SinkClosed,

    /// Wire encoding failed
    #[error("encode error: {0}")]
    Encode(#[from] serde_json::Error),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
