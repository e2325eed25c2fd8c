//! One-shot snapshot endpoint.
//!
//! `/api/snapshot/{stream}` returns a single JSON snapshot without opening a
//! session. Rate-based streams are sampled twice, one push interval apart
//! (capped at one second).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use herakles_live_monitor::{snapshot_once, StreamKind};
use std::time::Duration;
use tracing::{debug, error, instrument};

use crate::state::SharedState;

const MAX_PRIME_DELAY: Duration = Duration::from_secs(1);

/// Handler for `/api/snapshot/{stream}`.
#[instrument(skip(state))]
pub async fn snapshot_handler(
    State(state): State<SharedState>,
    Path(stream): Path<String>,
) -> Response {
    debug!("Processing /api/snapshot/{} request", stream);

    let kind = match stream.parse::<StreamKind>() {
        Ok(kind) if state.config.stream_enabled(kind) => kind,
        Ok(_) => {
            return (StatusCode::NOT_FOUND, format!("Stream '{}' is disabled", stream))
                .into_response();
        }
        Err(e) => return (StatusCode::NOT_FOUND, e).into_response(),
    };

    let prime_delay = state.config.interval().min(MAX_PRIME_DELAY);
    match snapshot_once(kind, &state.settings, prime_delay).await {
        Ok(value) => Json(value).into_response(),
        Err(e) => {
            error!("Snapshot of {} failed: {}", kind, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Snapshot failed: {}", e),
            )
                .into_response()
        }
    }
}
