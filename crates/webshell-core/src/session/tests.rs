use super::*;
use crate::config::{ExecConfig, OutputMode};
use crate::error::{Error, Result};
use crate::protocol::{StreamTag, COMMAND_COMPLETE, SYSTEM_INFO_PREFIX};
use crate::transport::channel::{self, ChannelSender, Peer};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

struct Harness {
    peer: Peer,
    cancel: CancellationToken,
    handle: JoinHandle<SessionEnd>,
}

fn start(exec: ExecConfig, config: SessionConfig) -> Harness {
    let (rx, tx, peer) = channel::pair();
    let cancel = CancellationToken::new();
    let session = Session::new(
        Arc::new(CommandExecutor::new(exec)),
        config,
        SystemInfo {
            username: "tester".to_string(),
            hostname: "box".to_string(),
        },
        cancel.child_token(),
    );
    let handle = tokio::spawn(session.run(rx, tx));
    Harness {
        peer,
        cancel,
        handle,
    }
}

fn start_default() -> Harness {
    start(ExecConfig::default(), SessionConfig::default())
}

impl Harness {
    fn send(&self, text: &str) {
        self.peer.outgoing.send(text.to_string()).unwrap();
    }

    async fn next(&mut self) -> String {
        tokio::time::timeout(Duration::from_secs(10), self.peer.incoming.recv())
            .await
            .expect("timed out waiting for session output")
            .expect("session closed")
    }

    async fn next_chunk(&mut self) -> OutputChunk {
        let text = self.next().await;
        serde_json::from_str(&text).unwrap()
    }

    /// Chunks up to and including the `n`th completion marker
    async fn until_markers(&mut self, n: usize) -> Vec<OutputChunk> {
        let mut chunks = Vec::new();
        let mut seen = 0;
        while seen < n {
            let chunk = self.next_chunk().await;
            if chunk.is_complete_marker() {
                seen += 1;
            }
            chunks.push(chunk);
        }
        chunks
    }

    async fn skip_system_info(&mut self) {
        let opening = self.next().await;
        assert!(opening.starts_with(SYSTEM_INFO_PREFIX));
    }

    async fn finish(self) -> SessionEnd {
        tokio::time::timeout(Duration::from_secs(10), self.handle)
            .await
            .expect("session did not end")
            .unwrap()
    }
}

#[tokio::test]
async fn test_system_info_is_first_message() {
    let mut harness = start_default();
    let opening = harness.next().await;
    let info = SystemInfo::decode(&opening).unwrap();
    assert_eq!(info.username, "tester");
    assert_eq!(info.hostname, "box");
}

#[cfg(unix)]
#[tokio::test]
async fn test_interrupt_and_blank_produce_nothing() {
    let mut harness = start_default();
    harness.skip_system_info().await;

    harness.send("\x03");
    harness.send("   ");
    harness.send("echo after");

    let chunks = harness.until_markers(1).await;
    assert_eq!(
        chunks,
        vec![
            OutputChunk::new(StreamTag::Stdout, "after\n"),
            OutputChunk::complete(),
        ]
    );
}

#[cfg(unix)]
#[tokio::test]
async fn test_commands_run_one_at_a_time() {
    let mut harness = start_default();
    harness.skip_system_info().await;

    harness.send("echo A; sleep 0.3; echo A2");
    harness.send("echo B");

    let chunks = harness.until_markers(2).await;
    let first_marker = chunks.iter().position(|c| c.is_complete_marker()).unwrap();
    let first_b = chunks.iter().position(|c| c.content == "B\n").unwrap();
    assert!(first_b > first_marker, "B started before A completed: {chunks:?}");

    let a_output: String = chunks[..first_marker]
        .iter()
        .map(|c| c.content.as_str())
        .collect();
    assert_eq!(a_output, "A\nA2\n");
}

#[cfg(unix)]
#[tokio::test]
async fn test_full_queue_rejects_command() {
    let mut harness = start(
        ExecConfig::default(),
        SessionConfig {
            queue_depth: 1,
            ..SessionConfig::default()
        },
    );
    harness.skip_system_info().await;

    harness.send("sleep 1");
    // Let the worker pick it up so the queue is empty again
    tokio::time::sleep(Duration::from_millis(300)).await;
    harness.send("echo queued");
    harness.send("echo extra");

    let rejection = harness.next_chunk().await;
    assert_eq!(
        rejection,
        OutputChunk::system("command 'echo extra' rejected: 1 commands already queued")
    );

    let chunks = harness.until_markers(2).await;
    assert!(chunks.contains(&OutputChunk::new(StreamTag::Stdout, "queued\n")));
    assert!(!chunks.iter().any(|c| c.content.contains("extra")));
}

#[tokio::test]
async fn test_peer_close_ends_session() {
    let mut harness = start_default();
    harness.skip_system_info().await;

    let Harness {
        peer,
        handle,
        cancel,
    } = harness;
    drop(peer.outgoing);
    let end = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(end, SessionEnd::Closed);
    assert!(!cancel.is_cancelled());
}

#[cfg(unix)]
#[tokio::test]
async fn test_send_failures_end_session() {
    let mut harness = start_default();
    harness.skip_system_info().await;

    harness.send("true");
    harness.send("true");
    // Peer stops reading; every following write fails
    let Harness {
        peer,
        handle,
        cancel,
    } = harness;
    let Peer { outgoing, incoming } = peer;
    drop(incoming);

    let end = tokio::time::timeout(Duration::from_secs(10), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(end, SessionEnd::SendFailed);
    drop(outgoing);
    drop(cancel);
}

#[tokio::test]
async fn test_opening_send_failure() {
    let (rx, tx, peer) = channel::pair();
    drop(peer.incoming);
    let session = Session::new(
        Arc::new(CommandExecutor::new(ExecConfig::default())),
        SessionConfig::default(),
        SystemInfo::default(),
        CancellationToken::new(),
    );
    assert_eq!(session.run(rx, tx).await, SessionEnd::SendFailed);
}

#[cfg(unix)]
#[tokio::test]
async fn test_shutdown_kills_running_command() {
    let mut harness = start_default();
    harness.skip_system_info().await;

    harness.send("sleep 30");
    tokio::time::sleep(Duration::from_millis(200)).await;
    harness.cancel.cancel();

    let started = std::time::Instant::now();
    assert_eq!(harness.finish().await, SessionEnd::Shutdown);
    assert!(started.elapsed() < Duration::from_secs(5));
}

#[cfg(unix)]
#[tokio::test]
async fn test_combined_mode_sends_raw_text() {
    let mut harness = start(
        ExecConfig {
            output_mode: OutputMode::Combined,
            ..ExecConfig::default()
        },
        SessionConfig::default(),
    );
    harness.skip_system_info().await;

    harness.send("echo hi");
    assert_eq!(harness.next().await, "hi\n");

    harness.send("true");
    let reply = harness.next().await;
    assert_eq!(reply, "command 'true' executed successfully (no output)");
    assert!(!reply.contains(COMMAND_COMPLETE));

    // Silent failure still gets its one reply, so the next command is not mistaken for it
    harness.send("false");
    assert_eq!(harness.next().await, "");
    harness.send("echo after");
    assert_eq!(harness.next().await, "after\n");
}

/// Passes the opening message, then holds every send until the gate opens
struct GatedSender {
    inner: ChannelSender,
    gate: watch::Receiver<bool>,
    sent: usize,
}

#[async_trait]
impl TransportSender for GatedSender {
    async fn send(&mut self, text: String) -> Result<()> {
        if self.sent > 0 {
            self.gate
                .wait_for(|open| *open)
                .await
                .map_err(|_| Error::TransportWrite("gate dropped".to_string()))?;
        }
        self.sent += 1;
        self.inner.send(text).await
    }
}

#[cfg(unix)]
#[tokio::test]
async fn test_stalled_transport_holds_back_producer() {
    let dir = tempfile::tempdir().unwrap();
    let finished = dir.path().join("finished");

    let (rx, tx, mut peer) = channel::pair();
    let (open, gate) = watch::channel(false);
    let session = Session::new(
        Arc::new(CommandExecutor::new(ExecConfig::default())),
        SessionConfig::default(),
        SystemInfo::default(),
        CancellationToken::new(),
    );
    let handle = tokio::spawn(session.run(
        rx,
        GatedSender {
            inner: tx,
            gate,
            sent: 0,
        },
    ));
    assert!(peer.incoming.recv().await.unwrap().starts_with(SYSTEM_INFO_PREFIX));

    peer.outgoing
        .send(format!(
            "head -c 2000000 /dev/zero | tr '\\0' x; touch {}",
            finished.display()
        ))
        .unwrap();

    // Far more output than the pipe and outbound buffers hold
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(!finished.exists(), "producer ran ahead of the transport");

    open.send(true).unwrap();
    let mut received = 0;
    loop {
        let text = tokio::time::timeout(Duration::from_secs(15), peer.incoming.recv())
            .await
            .unwrap()
            .unwrap();
        let chunk: OutputChunk = serde_json::from_str(&text).unwrap();
        if chunk.is_complete_marker() {
            break;
        }
        assert_eq!(chunk.tag, StreamTag::Stdout);
        received += chunk.content.len();
    }
    assert_eq!(received, 2000000);
    assert!(finished.exists());

    drop(peer);
    assert_eq!(handle.await.unwrap(), SessionEnd::Closed);
}
