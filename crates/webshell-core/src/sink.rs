//! Output sinks
//!
//! A sink is shared by the executor and both drain tasks of a command, so
//! every implementation must accept concurrent `deliver` calls.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};

use crate::error::{Error, Result};
use crate::protocol::{OutputChunk, StreamTag};

/// Destination for the output of a command
#[async_trait]
pub trait OutputSink: Send + Sync {
    /// Deliver one chunk. `Err(Error::SinkClosed)` once the peer is gone.
    async fn deliver(&self, chunk: OutputChunk) -> Result<()>;
}

/// Sink backed by a bounded channel read by the session writer.
///
/// The channel serializes concurrent producers. A full channel suspends
/// `deliver`, so the drains stop reading and the process blocks on its pipe
/// until the writer catches up. Once the receiver is dropped every delivery
/// fails with [`Error::SinkClosed`] and callers treat the sink as a no-op.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<OutputChunk>,
}

impl ChannelSink {
    /// Wrap an existing sender
    #[must_use]
    pub fn new(tx: mpsc::Sender<OutputChunk>) -> Self {
        Self { tx }
    }

    /// Create a sink holding at most `capacity` undelivered chunks, with its receiving end
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<OutputChunk>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self::new(tx), rx)
    }

    /// Whether the receiving side is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[async_trait]
impl OutputSink for ChannelSink {
    async fn deliver(&self, chunk: OutputChunk) -> Result<()> {
        self.tx.send(chunk).await.map_err(|_| Error::SinkClosed)
    }
}

/// Sink that keeps every chunk in memory.
///
/// Backs combined-output mode and is handy in tests.
#[derive(Debug, Default)]
pub struct CollectSink {
    chunks: Mutex<Vec<OutputChunk>>,
}

impl CollectSink {
    /// Create an empty collector
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the chunks delivered so far
    pub async fn chunks(&self) -> Vec<OutputChunk> {
        self.chunks.lock().await.clone()
    }

    /// Remove and return every chunk
    pub async fn take(&self) -> Vec<OutputChunk> {
        std::mem::take(&mut *self.chunks.lock().await)
    }

    /// Concatenated content of all chunks with the given tag
    pub async fn text(&self, tag: StreamTag) -> String {
        self.chunks
            .lock()
            .await
            .iter()
            .filter(|c| c.tag == tag)
            .map(|c| c.content.as_str())
            .collect()
    }
}

#[async_trait]
impl OutputSink for CollectSink {
    async fn deliver(&self, chunk: OutputChunk) -> Result<()> {
        self.chunks.lock().await.push(chunk);
        Ok(())
    }
}
