//! Stream drain - chunked forwarding of one process output pipe

use std::io::ErrorKind;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::{debug, warn};

use crate::protocol::{OutputChunk, StreamTag};
use crate::sink::OutputSink;

/// Read `reader` until EOF, forwarding each read to `sink` as one chunk.
///
/// Chunks are not line-buffered. The only bytes held back are the leading
/// bytes of a UTF-8 sequence cut by the read boundary; they are prepended to
/// the next chunk. Once the sink is closed the rest of the stream is read and
/// discarded so the writer never blocks on a full pipe.
///
/// Returns the number of bytes read.
pub async fn drain<R>(
    mut reader: R,
    tag: StreamTag,
    sink: Arc<dyn OutputSink>,
    chunk_size: usize,
) -> u64
where
    R: AsyncRead + Unpin + Send,
{
    let mut buf = vec![0u8; chunk_size.max(1)];
    let mut pending: Vec<u8> = Vec::new();
    let mut total: u64 = 0;
    let mut sink_open = true;

    loop {
        let n = match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream = %tag, error = %e, "Error reading process output");
                break;
            }
        };
        total += n as u64;
        if !sink_open {
            continue;
        }

        pending.extend_from_slice(&buf[..n]);
        let cut = complete_prefix(&pending);
        if cut == 0 {
            continue;
        }
        let rest = pending.split_off(cut);
        let content = String::from_utf8_lossy(&pending).into_owned();
        pending = rest;

        if let Err(e) = sink.deliver(OutputChunk::new(tag, content)).await {
            debug!(stream = %tag, error = %e, "Sink closed, discarding remaining output");
            sink_open = false;
        }
    }

    if sink_open && !pending.is_empty() {
        let content = String::from_utf8_lossy(&pending).into_owned();
        if let Err(e) = sink.deliver(OutputChunk::new(tag, content)).await {
            debug!(stream = %tag, error = %e, "Sink closed, dropping trailing bytes");
        }
    }

    debug!(stream = %tag, bytes = total, "Drain finished");
    total
}

/// Length of the prefix that does not end in a truncated UTF-8 sequence
fn complete_prefix(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Err(e) if e.error_len().is_none() => e.valid_up_to(),
        _ => bytes.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::sink::{ChannelSink, CollectSink};
    use async_trait::async_trait;
    use std::pin::Pin;
    use std::task::{Context, Poll};
    use tokio::io::ReadBuf;

    struct FailingReader {
        served: bool,
    }

    impl AsyncRead for FailingReader {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<std::io::Result<()>> {
            if self.served {
                Poll::Ready(Err(std::io::Error::other("pipe broke")))
            } else {
                self.served = true;
                buf.put_slice(b"partial");
                Poll::Ready(Ok(()))
            }
        }
    }

    /// Accepts the first chunk, then reports closed
    #[derive(Default)]
    struct OneShotSink {
        taken: CollectSink,
    }

    #[async_trait]
    impl OutputSink for OneShotSink {
        async fn deliver(&self, chunk: OutputChunk) -> Result<()> {
            if self.taken.chunks().await.is_empty() {
                self.taken.deliver(chunk).await
            } else {
                Err(Error::SinkClosed)
            }
        }
    }

    #[tokio::test]
    async fn test_chunks_reassemble_exactly() {
        let data: Vec<u8> = (0..5000u32).map(|i| b'a' + (i % 26) as u8).collect();
        let sink = Arc::new(CollectSink::new());

        let n = drain(&data[..], StreamTag::Stdout, sink.clone(), 1024).await;
        assert_eq!(n, 5000);

        let chunks = sink.chunks().await;
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.content.len() <= 1024));
        assert!(chunks.iter().all(|c| c.tag == StreamTag::Stdout));
        assert_eq!(sink.text(StreamTag::Stdout).await.as_bytes(), &data[..]);
    }

    #[tokio::test]
    async fn test_partial_lines_are_not_buffered() {
        let sink = Arc::new(CollectSink::new());
        drain(&b"abcdefgh\n"[..], StreamTag::Stderr, sink.clone(), 4).await;

        let contents: Vec<String> = sink.take().await.into_iter().map(|c| c.content).collect();
        assert_eq!(contents, vec!["abcd", "efgh", "\n"]);
    }

    #[tokio::test]
    async fn test_multibyte_split_across_reads() {
        let sink = Arc::new(CollectSink::new());
        drain("héllo ✓".as_bytes(), StreamTag::Stdout, sink.clone(), 1).await;

        let text = sink.text(StreamTag::Stdout).await;
        assert_eq!(text, "héllo ✓");
        assert!(!text.contains('\u{FFFD}'));
    }

    #[tokio::test]
    async fn test_empty_stream_produces_nothing() {
        let sink = Arc::new(CollectSink::new());
        let n = drain(&b""[..], StreamTag::Stdout, sink.clone(), 1024).await;
        assert_eq!(n, 0);
        assert!(sink.chunks().await.is_empty());
    }

    #[tokio::test]
    async fn test_read_error_ends_drain() {
        let sink = Arc::new(CollectSink::new());
        let n = drain(FailingReader { served: false }, StreamTag::Stderr, sink.clone(), 64).await;
        assert_eq!(n, 7);
        assert_eq!(sink.text(StreamTag::Stderr).await, "partial");
    }

    #[tokio::test]
    async fn test_closed_sink_still_consumes_stream() {
        let (sink, rx) = ChannelSink::channel(1);
        drop(rx);
        let data = vec![b'x'; 4096];
        let n = drain(&data[..], StreamTag::Stdout, Arc::new(sink), 512).await;
        assert_eq!(n, 4096);
    }

    #[tokio::test]
    async fn test_trailing_flush_into_closed_sink() {
        let sink = Arc::new(OneShotSink::default());
        // Ends inside a two-byte sequence, so the last byte is held for the flush
        let n = drain(&b"ab\xc3"[..], StreamTag::Stdout, sink.clone(), 64).await;
        assert_eq!(n, 3);
        assert_eq!(sink.taken.text(StreamTag::Stdout).await, "ab");
    }
}
