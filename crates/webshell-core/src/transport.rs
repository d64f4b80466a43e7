//! Transport seams for a session
//!
//! A session needs a message-oriented, full-duplex connection. The two halves
//! are separate traits so the receive loop and the writer can be driven from
//! one `select!` without borrowing the same object twice.

use async_trait::async_trait;

use crate::error::Result;

/// Inbound half of a connection
#[async_trait]
pub trait TransportReceiver: Send {
    /// Next text message. `Ok(None)` once the peer closed the connection.
    async fn receive_next(&mut self) -> Result<Option<String>>;
}

/// Outbound half of a connection
#[async_trait]
pub trait TransportSender: Send {
    /// Send one text message
    async fn send(&mut self, text: String) -> Result<()>;

    /// Close the connection from this side. Called once when the session ends.
    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// In-process transport over unbounded channels.
///
/// Pairs a [`ChannelReceiver`] and a [`ChannelSender`] with the opposite
/// channel ends so a session can be driven without a network socket.
pub mod channel {
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    use super::{TransportReceiver, TransportSender};
    use crate::error::{Error, Result};

    /// Inbound half backed by a channel. Closes when every peer sender is dropped.
    #[derive(Debug)]
    pub struct ChannelReceiver {
        rx: mpsc::UnboundedReceiver<String>,
    }

    /// Outbound half backed by a channel. Fails once the peer receiver is dropped.
    #[derive(Debug, Clone)]
    pub struct ChannelSender {
        tx: mpsc::UnboundedSender<String>,
    }

    /// Client side of an in-process connection
    #[derive(Debug)]
    pub struct Peer {
        /// Messages to the session
        pub outgoing: mpsc::UnboundedSender<String>,
        /// Messages from the session
        pub incoming: mpsc::UnboundedReceiver<String>,
    }

    /// Create a connected transport and its peer
    #[must_use]
    pub fn pair() -> (ChannelReceiver, ChannelSender, Peer) {
        let (to_session, from_peer) = mpsc::unbounded_channel();
        let (to_peer, from_session) = mpsc::unbounded_channel();
        (
            ChannelReceiver { rx: from_peer },
            ChannelSender { tx: to_peer },
            Peer {
                outgoing: to_session,
                incoming: from_session,
            },
        )
    }

    #[async_trait]
    impl TransportReceiver for ChannelReceiver {
        async fn receive_next(&mut self) -> Result<Option<String>> {
            Ok(self.rx.recv().await)
        }
    }

    #[async_trait]
    impl TransportSender for ChannelSender {
        async fn send(&mut self, text: String) -> Result<()> {
            self.tx
                .send(text)
                .map_err(|_| Error::TransportWrite("peer closed".to_string()))
        }
    }
}
