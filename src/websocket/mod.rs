//! WebSocket transport for shell sessions

pub mod session;

use axum::{extract::ws::WebSocketUpgrade, response::IntoResponse, Extension};

use crate::server::init::AppState;

/// WebSocket upgrade handler
pub async fn shell_handler(
    ws: WebSocketUpgrade,
    Extension(state): Extension<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| session::handle_socket(socket, state))
}
