//! Root endpoint handler for the landing page.
//!
//! This module provides the `/` endpoint handler that displays
//! a landing page with the enabled streams and their endpoints.

use axum::{
    extract::State,
    response::{Html, IntoResponse},
};
use std::fmt::Write as FmtWrite;
use tracing::{debug, instrument};

use crate::handlers::health::{format_uptime_hms, FOOTER_TEXT};
use crate::state::SharedState;

/// Handler for the root `/` endpoint.
#[instrument(skip(state))]
pub async fn root_handler(State(state): State<SharedState>) -> impl IntoResponse {
    debug!("Processing / request");

    let version = env!("CARGO_PKG_VERSION");
    let uptime_str = format_uptime_hms(state.start_time.elapsed().as_secs());
    let interval_ms = state.config.interval().as_millis();

    let mut streams = String::new();
    for (kind, active) in state.sessions_per_stream() {
        if !state.config.stream_enabled(kind) {
            continue;
        }
        writeln!(
            streams,
            r#"        <li>
            <code>/ws/{kind}</code> &middot; <a href="/api/snapshot/{kind}">/api/snapshot/{kind}</a>
            <div class="endpoint-desc">{active} active session(s)</div>
        </li>"#
        )
        .ok();
    }

    let health_item = if state.config.enable_health.unwrap_or(true) {
        r#"        <li>
            <a href="/health">/health</a>
            <div class="endpoint-desc">Session and push statistics (text)</div>
        </li>"#
    } else {
        ""
    };

    let html = format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Herakles Live Monitor</title>
    <style>
        body {{
            font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, sans-serif;
            margin: 0;
            padding: 20px;
            background: #f5f5f5;
            line-height: 1.6;
        }}
        .container {{
            max-width: 900px;
            margin: 0 auto;
            background: white;
            padding: 40px;
            border-radius: 8px;
            box-shadow: 0 2px 8px rgba(0,0,0,0.1);
        }}
        h1 {{ color: #333; border-bottom: 3px solid #007bff; padding-bottom: 15px; }}
        .info {{ background: #e9ecef; padding: 15px; border-radius: 4px; margin: 20px 0; }}
        .endpoint-list {{ list-style: none; padding: 0; }}
        .endpoint-list li {{
            margin: 15px 0;
            padding: 12px;
            background: #f8f9fa;
            border-left: 4px solid #007bff;
            border-radius: 4px;
        }}
        .endpoint-desc {{ color: #666; margin-top: 5px; }}
        .footer {{ margin-top: 40px; border-top: 1px solid #ddd; color: #666; font-size: 0.9em; text-align: center; }}
        code {{ background: #e9ecef; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
<div class="container">
    <h1>Herakles Live Monitor</h1>
    <div class="info">
        Version <b>{version}</b> &middot; Uptime <b>{uptime}</b> &middot; Push interval <b>{interval_ms} ms</b>
    </div>

    <h2>Streams</h2>
    <ul class="endpoint-list">
{streams}    </ul>

    <h2>Service</h2>
    <ul class="endpoint-list">
{health_item}
    </ul>

    <div class="footer">
        <p>{footer}</p>
    </div>
</div>
</body>
</html>"#,
        version = version,
        uptime = uptime_str,
        interval_ms = interval_ms,
        streams = streams,
        health_item = health_item,
        footer = FOOTER_TEXT
    );

    Html(html)
}
