//! Application state management for the live monitor.
//!
//! This module defines the shared application state that is passed
//! to HTTP handlers and owned by every streaming session task.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use herakles_live_monitor::{SessionStats, SourceSettings, StreamKind};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::Config;

/// Type alias for shared application state.
pub type SharedState = Arc<AppState>;

/// A streaming session currently attached to a client.
#[derive(Debug, Clone)]
pub struct ActiveSession {
    pub stream: StreamKind,
    pub peer: Option<SocketAddr>,
    pub started_at: DateTime<Utc>,
}

/// Global application state shared across requests and session tasks.
pub struct AppState {
    pub config: Arc<Config>,
    /// Settings every new source is created from.
    pub settings: SourceSettings,
    pub session_stats: Arc<SessionStats>,
    /// Live sessions by id.
    pub sessions: DashMap<u64, ActiveSession>,
    /// Reserved session slots, bounded by `max_sessions`.
    active: AtomicUsize,
    /// Parent of every session token; cancelled on shutdown.
    pub shutdown: CancellationToken,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let settings = config.source_settings();
        Self {
            config: Arc::new(config),
            settings,
            session_stats: Arc::new(SessionStats::new()),
            sessions: DashMap::new(),
            active: AtomicUsize::new(0),
            shutdown: CancellationToken::new(),
            start_time: Instant::now(),
        }
    }

    /// Reserves a session slot and registers the session.
    ///
    /// Returns `None` when the configured session limit is reached. The slot
    /// is released when the returned guard is dropped, including when the
    /// upgrade never completes.
    pub fn try_register(
        state: &SharedState,
        stream: StreamKind,
        peer: Option<SocketAddr>,
    ) -> Option<SessionGuard> {
        let limit = state.config.max_sessions();
        let reserved = state
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < limit).then_some(n + 1)
            });
        if reserved.is_err() {
            state.session_stats.record_rejected();
            return None;
        }

        let id = state.session_stats.allocate_session_id();
        state.sessions.insert(
            id,
            ActiveSession {
                stream,
                peer,
                started_at: Utc::now(),
            },
        );
        Some(SessionGuard {
            state: Arc::clone(state),
            id,
            cancel: state.shutdown.child_token(),
        })
    }

    /// Number of live sessions per stream, in stream order.
    pub fn sessions_per_stream(&self) -> Vec<(StreamKind, usize)> {
        StreamKind::ALL
            .into_iter()
            .map(|kind| {
                let n = self.sessions.iter().filter(|s| s.stream == kind).count();
                (kind, n)
            })
            .collect()
    }
}

/// Registry entry of one session. Unregisters it on drop.
pub struct SessionGuard {
    state: SharedState,
    id: u64,
    cancel: CancellationToken,
}

impl SessionGuard {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Token cancelled on shutdown or when the session is stopped.
    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.state.sessions.remove(&self.id);
        self.state.active.fetch_sub(1, Ordering::AcqRel);
    }
}
