//! WebSocket endpoint: one polling session per connection.
//!
//! `/ws/{stream}` registers a session, upgrades the connection and drives
//! [`run_stream`] against a sink that writes text frames. A reader task
//! watches the inbound half and cancels the session when the peer closes.

use async_trait::async_trait;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, Path, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::{stream::SplitSink, SinkExt, StreamExt};
use herakles_live_monitor::{run_stream, SessionContext, SinkError, SnapshotSink, StreamKind};
use std::net::SocketAddr;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::state::{AppState, SessionGuard, SharedState};

/// Writes each payload as one text frame.
pub struct WsSink {
    sender: SplitSink<WebSocket, Message>,
}

impl WsSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self { sender }
    }
}

#[async_trait]
impl SnapshotSink for WsSink {
    async fn push(&mut self, payload: String) -> Result<(), SinkError> {
        self.sender
            .send(Message::Text(payload.into()))
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        // The peer may already be gone; the close frame is best effort
        let _ = self.sender.send(Message::Close(None)).await;
        self.sender
            .close()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))
    }
}

/// Handler for `/ws/{stream}`.
#[instrument(skip(state, ws))]
pub async fn ws_handler(
    State(state): State<SharedState>,
    Path(stream): Path<String>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    ws: WebSocketUpgrade,
) -> Response {
    debug!("Processing /ws/{} request from {}", stream, peer);

    let kind = match stream.parse::<StreamKind>() {
        Ok(kind) if state.config.stream_enabled(kind) => kind,
        Ok(_) => {
            return (StatusCode::NOT_FOUND, format!("Stream '{}' is disabled", stream))
                .into_response();
        }
        Err(e) => return (StatusCode::NOT_FOUND, e).into_response(),
    };

    let Some(guard) = AppState::try_register(&state, kind, Some(peer)) else {
        warn!(
            "Rejecting {} session from {}: session limit {} reached",
            kind,
            peer,
            state.config.max_sessions()
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "Too many concurrent sessions",
        )
            .into_response();
    };

    // A failed upgrade drops the guard with the callback
    ws.on_upgrade(move |socket| handle_socket(state, socket, kind, guard))
}

async fn handle_socket(
    state: SharedState,
    socket: WebSocket,
    kind: StreamKind,
    guard: SessionGuard,
) {
    let id = guard.id();
    let cancel = guard.token();
    let (sender, receiver) = socket.split();

    let watcher = tokio::spawn(watch_peer(receiver, id, cancel.clone()));

    let ctx = SessionContext {
        id,
        stats: Some(state.session_stats.clone()),
    };
    let outcome = run_stream(
        kind,
        &state.settings,
        WsSink::new(sender),
        state.config.interval(),
        cancel.clone(),
        ctx,
    )
    .await;

    // Cancels the watcher when the session ended on its own
    drop(guard);
    watcher.abort();
    debug!(session_id = id, ?outcome, "WebSocket session finished");
}

/// Cancels the session once the peer sends Close or the socket errors.
async fn watch_peer(
    mut receiver: futures_util::stream::SplitStream<WebSocket>,
    id: u64,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            msg = receiver.next() => match msg {
                Some(Ok(Message::Close(_))) | None => {
                    info!(session_id = id, "WebSocket client disconnected");
                    break;
                }
                Some(Ok(Message::Text(text))) => {
                    debug!(session_id = id, "Ignoring client message: {}", text.as_str());
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(session_id = id, "WebSocket error: {}", e);
                    break;
                }
            }
        }
    }
    cancel.cancel();
}
