//! Health check endpoint handler.
//!
//! This module provides the `/health` endpoint handler that returns
//! session statistics and the live session list as plain text.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::state::SharedState;

// Time conversion constants
const SECONDS_PER_HOUR: f64 = 3600.0;
const MINUTES_PER_HOUR: f64 = 60.0;
const HOURS_PER_DAY: f64 = 24.0;

/// Footer text for human-readable HTTP endpoints.
pub const FOOTER_TEXT: &str = "Project: https://github.com/cansp-dev/herakles-live-monitor · More info: https://www.herakles.now · Support: exporter@herakles.now";

/// "1.5 minutes", "3.2 hours", "2.0 days"
pub fn format_uptime(uptime_seconds: u64) -> String {
    let uptime_hours = uptime_seconds as f64 / SECONDS_PER_HOUR;
    if uptime_hours < 1.0 {
        format!("{:.1} minutes", uptime_hours * MINUTES_PER_HOUR)
    } else if uptime_hours < HOURS_PER_DAY {
        format!("{:.1} hours", uptime_hours)
    } else {
        format!("{:.1} days", uptime_hours / HOURS_PER_DAY)
    }
}

/// "1h 2m 3s"
pub fn format_uptime_hms(uptime_secs: u64) -> String {
    let hours = uptime_secs / 3600;
    let minutes = (uptime_secs % 3600) / 60;
    let seconds = uptime_secs % 60;
    format!("{}h {}m {}s", hours, minutes, seconds)
}

/// Handler for the /health endpoint.
#[instrument(skip(state))]
pub async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing /health request");

    let shutting_down = state.shutdown.is_cancelled();
    let status = if shutting_down {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };
    let message = if shutting_down {
        "Shutting down"
    } else {
        "OK"
    };

    let uptime_str = format_uptime(state.session_stats.get_uptime_seconds());
    let table = state.session_stats.render_table();
    let sessions = render_sessions(&state);

    debug!("Health check: {} - {}", status, message);
    (
        status,
        [("Content-Type", "text/plain; charset=utf-8")],
        format!("{message}\n\nUptime: {uptime_str}\n\n{table}\n{sessions}\n{FOOTER_TEXT}"),
    )
}

/// Renders the live session registry as a plain-text table.
fn render_sessions(state: &SharedState) -> String {
    let mut out = String::new();
    writeln!(out, "LIVE SESSIONS").ok();
    writeln!(out, "=============").ok();
    writeln!(out).ok();
    writeln!(
        out,
        "{:>6} | {:12} | {:22} | {:25}",
        "id", "stream", "peer", "started"
    )
    .ok();
    writeln!(out, "{}", "-".repeat(74)).ok();

    let mut rows: Vec<_> = state
        .sessions
        .iter()
        .map(|entry| (*entry.key(), entry.value().clone()))
        .collect();
    rows.sort_by_key(|(id, _)| *id);

    for (id, session) in rows {
        let peer = session
            .peer
            .map(|p| p.to_string())
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            out,
            "{:>6} | {:12} | {:22} | {:25}",
            id,
            session.stream.as_str(),
            peer,
            session.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )
        .ok();
    }
    out
}
