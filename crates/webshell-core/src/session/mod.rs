//! Client session - one connection, one command at a time
//!
//! The session loop multiplexes three things:
//! - inbound messages, classified and pushed onto a bounded FIFO
//! - output chunks from the worker, encoded and written to the transport
//! - the shutdown token
//!
//! A single worker task drains the FIFO, so a command never starts before
//! the previous one delivered its completion marker. The outbound channel is
//! bounded; a client that reads slowly holds back the drains and, through
//! the pipe, the process itself.

#[cfg(test)]
mod tests;

use std::sync::Arc;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Instrument};

use crate::command::{CommandLine, Inbound};
use crate::config::{OutputMode, SessionConfig};
use crate::executor::CommandExecutor;
use crate::protocol::{OutputChunk, SystemInfo};
use crate::sink::ChannelSink;
use crate::transport::{TransportReceiver, TransportSender};

/// Chunks buffered between the worker and the writer before drains are held back
pub const OUTBOUND_CAPACITY: usize = 32;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Peer closed the connection
    Closed,
    /// Receiving failed
    ReceiveFailed,
    /// Too many consecutive send failures, or the opening message failed
    SendFailed,
    /// Server shutdown
    Shutdown,
}

/// State and control loop of one client connection
pub struct Session {
    executor: Arc<CommandExecutor>,
    config: SessionConfig,
    system_info: SystemInfo,
    cancel: CancellationToken,
}

impl Session {
    /// Create a session. `cancel` should be a child of the server shutdown token.
    #[must_use]
    pub fn new(
        executor: Arc<CommandExecutor>,
        config: SessionConfig,
        system_info: SystemInfo,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            executor,
            config,
            system_info,
            cancel,
        }
    }

    /// Drive the session until the connection ends.
    ///
    /// On return the session token is cancelled, which kills any in-flight
    /// subprocess and drops queued commands.
    pub async fn run<R, W>(self, mut rx: R, mut tx: W) -> SessionEnd
    where
        R: TransportReceiver,
        W: TransportSender,
    {
        let mode = self.executor.config().output_mode;
        let opening = match self.system_info.encode() {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode system info");
                self.cancel.cancel();
                return SessionEnd::SendFailed;
            }
        };
        if let Err(e) = tx.send(opening).await {
            warn!(error = %e, "Failed to send system info");
            self.cancel.cancel();
            return SessionEnd::SendFailed;
        }

        let (sink, mut outbound) = ChannelSink::channel(OUTBOUND_CAPACITY);
        let depth = self.config.queue_depth.max(1);
        let (queue_tx, queue_rx) = mpsc::channel::<CommandLine>(depth);
        tokio::spawn(
            run_worker(
                self.executor.clone(),
                queue_rx,
                Arc::new(sink),
                self.cancel.clone(),
            )
            .in_current_span(),
        );

        let mut writer = Writer {
            mode,
            failures: 0,
            max_failures: self.config.max_send_failures,
        };
        let end = loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break SessionEnd::Shutdown,
                msg = rx.receive_next() => match msg {
                    Ok(Some(text)) => match Inbound::classify(&text) {
                        Inbound::Empty => {}
                        Inbound::Interrupt => debug!("Received Ctrl+C from client, ignoring"),
                        Inbound::Command(line) => match queue_tx.try_send(line) {
                            Ok(()) => {}
                            Err(TrySendError::Full(line)) => {
                                info!(command = %line, depth, "Command queue full, rejecting");
                                let notice = format!(
                                    "command '{}' rejected: {} commands already queued",
                                    line, depth
                                );
                                // Bypasses the outbound channel, which the worker may have filled
                                if !writer.write(&mut tx, OutputChunk::system(notice)).await {
                                    break SessionEnd::SendFailed;
                                }
                            }
                            Err(TrySendError::Closed(_)) => break SessionEnd::Shutdown,
                        },
                    },
                    Ok(None) => break SessionEnd::Closed,
                    Err(e) => {
                        warn!(error = %e, "Receive failed");
                        break SessionEnd::ReceiveFailed;
                    }
                },
                Some(chunk) = outbound.recv() => {
                    if !writer.write(&mut tx, chunk).await {
                        break SessionEnd::SendFailed;
                    }
                }
            }
        };

        self.cancel.cancel();
        if end != SessionEnd::SendFailed {
            if let Err(e) = tx.close().await {
                debug!(error = %e, "Close failed");
            }
        }
        info!(reason = ?end, "Session ended");
        end
    }
}

/// Encodes chunks and tracks consecutive send failures
struct Writer {
    mode: OutputMode,
    failures: u32,
    max_failures: u32,
}

impl Writer {
    /// Send one chunk. `false` once the failure limit is reached.
    async fn write<W: TransportSender>(&mut self, tx: &mut W, chunk: OutputChunk) -> bool {
        let text = match chunk.encode(self.mode) {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to encode chunk");
                return true;
            }
        };
        match tx.send(text).await {
            Ok(()) => {
                self.failures = 0;
                true
            }
            Err(e) => {
                self.failures += 1;
                warn!(error = %e, failures = self.failures, "Send failed");
                self.failures < self.max_failures
            }
        }
    }
}

async fn run_worker(
    executor: Arc<CommandExecutor>,
    mut queue: mpsc::Receiver<CommandLine>,
    sink: Arc<ChannelSink>,
    cancel: CancellationToken,
) {
    loop {
        let line = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = queue.recv() => match next {
                Some(line) => line,
                None => break,
            },
        };
        let outcome = executor.execute(line.as_str(), sink.clone(), &cancel).await;
        debug!(command = %line, outcome = ?outcome, "Worker finished command");
    }
    debug!("Command worker stopped");
}
