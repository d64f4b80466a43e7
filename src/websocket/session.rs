//! Shell WebSocket session management

use async_trait::async_trait;
use axum::extract::ws::{close_code, CloseFrame, Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, info, info_span, Instrument};
use uuid::Uuid;

use webshell_core::{Error, Session, TransportReceiver, TransportSender};

use crate::server::init::AppState;
use crate::server::system_info;

/// Inbound half of a client socket. Ping, pong and binary frames are consumed here.
pub struct WsReceiver {
    inner: SplitStream<WebSocket>,
}

/// Outbound half of a client socket
pub struct WsSender {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl TransportReceiver for WsReceiver {
    async fn receive_next(&mut self) -> webshell_core::Result<Option<String>> {
        while let Some(msg) = self.inner.next().await {
            match msg {
                Ok(Message::Text(text)) => return Ok(Some(text)),
                Ok(Message::Close(frame)) => {
                    debug!(?frame, "Close frame received");
                    return Ok(None);
                }
                Ok(Message::Binary(data)) => {
                    debug!(len = data.len(), "Ignoring binary frame");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Err(e) => return Err(Error::TransportRead(e.to_string())),
            }
        }
        Ok(None)
    }
}

#[async_trait]
impl TransportSender for WsSender {
    async fn send(&mut self, text: String) -> webshell_core::Result<()> {
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::TransportWrite(e.to_string()))
    }

    async fn close(&mut self) -> webshell_core::Result<()> {
        self.inner
            .send(Message::Close(Some(CloseFrame {
                code: close_code::NORMAL,
                reason: "Connection closed".into(),
            })))
            .await
            .map_err(|e| Error::TransportWrite(e.to_string()))
    }
}

/// Handle WebSocket connection
pub async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = Uuid::new_v4();

    async move {
        info!("Client connected");

        let (sender, receiver) = socket.split();
        let session = Session::new(
            state.executor.clone(),
            state.session.clone(),
            system_info::lookup(),
            state.shutdown.child_token(),
        );

        let end = session
            .run(WsReceiver { inner: receiver }, WsSender { inner: sender })
            .await;

        info!(reason = ?end, "Client disconnected");
    }
    .instrument(info_span!("session", %conn_id))
    .await
}
