//! Per-client polling sessions.
//!
//! A [`PollingSession`] owns one [`MetricSource`] and one [`SnapshotSink`].
//! Every tick it takes a snapshot, serializes it to JSON and pushes exactly
//! one text payload, then sleeps until the interval measured from the start
//! of the tick has elapsed. The session ends when its cancellation token
//! fires, the sink rejects a push, or the source fails.

use crate::error::{SinkError, SourceError};
use crate::session_stats::{SessionEnd, SessionStats};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Anything that can produce a serializable snapshot on demand.
///
/// Expected "data unavailable" conditions should yield partial or default
/// data. Only unexpected failures return `Err`, which ends the session.
#[async_trait]
pub trait MetricSource: Send {
    type Snapshot: Serialize + Send;

    /// Short stream name used in logs.
    fn name(&self) -> &'static str;

    async fn snapshot(&mut self) -> Result<Self::Snapshot, SourceError>;
}

/// Destination for serialized snapshots.
#[async_trait]
pub trait SnapshotSink: Send {
    async fn push(&mut self, payload: String) -> Result<(), SinkError>;

    async fn close(&mut self) -> Result<(), SinkError>;
}

/// How [`PollingSession::run`] finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The cancellation token fired. Not an error.
    Cancelled,
    /// The sink rejected a push; the client is gone.
    SinkClosed,
    /// The source (or serialization) failed.
    SourceFailed,
}

impl From<SessionOutcome> for SessionEnd {
    fn from(outcome: SessionOutcome) -> Self {
        match outcome {
            SessionOutcome::Cancelled => SessionEnd::Cancelled,
            SessionOutcome::SinkClosed => SessionEnd::SinkClosed,
            SessionOutcome::SourceFailed => SessionEnd::SourceFailed,
        }
    }
}

pub struct PollingSession<S, K> {
    id: u64,
    source: S,
    sink: K,
    interval: Duration,
    cancel: CancellationToken,
    stats: Option<Arc<SessionStats>>,
}

impl<S, K> PollingSession<S, K>
where
    S: MetricSource,
    K: SnapshotSink,
{
    pub fn new(source: S, sink: K, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            id: 0,
            source,
            sink,
            interval,
            cancel,
            stats: None,
        }
    }

    /// Id used in logs; 0 unless set.
    pub fn with_id(mut self, id: u64) -> Self {
        self.id = id;
        self
    }

    /// Records lifecycle and push counters into `stats`.
    pub fn with_stats(mut self, stats: Arc<SessionStats>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Runs until cancelled or a fatal error. The sink is closed on every exit path.
    pub async fn run(mut self) -> SessionOutcome {
        let session_id = self.id;
        if let Some(stats) = &self.stats {
            stats.record_session_start();
        }
        let stream = self.source.name();
        info!(session_id, stream, interval_ms = self.interval.as_millis() as u64, "Session started");

        let outcome = self.poll_loop(session_id).await;

        if let Err(e) = self.sink.close().await {
            debug!(session_id, stream, "Closing sink failed: {}", e);
        }
        if let Some(stats) = &self.stats {
            stats.record_session_end(outcome.into());
        }
        info!(session_id, stream, ?outcome, "Session ended");
        outcome
    }

    async fn poll_loop(&mut self, session_id: u64) -> SessionOutcome {
        let stream = self.source.name();

        loop {
            if self.cancel.is_cancelled() {
                return SessionOutcome::Cancelled;
            }

            let started = Instant::now();

            let snapshot = match self.source.snapshot().await {
                Ok(s) => s,
                Err(e) => {
                    error!(session_id, stream, "Snapshot failed, ending session: {}", e);
                    return SessionOutcome::SourceFailed;
                }
            };

            // The client may have left while the snapshot was in flight
            if self.cancel.is_cancelled() {
                return SessionOutcome::Cancelled;
            }

            let payload = match serde_json::to_string(&snapshot) {
                Ok(p) => p,
                Err(e) => {
                    error!(session_id, stream, "Snapshot serialization failed: {}", e);
                    return SessionOutcome::SourceFailed;
                }
            };
            let payload_len = payload.len();

            if let Err(e) = self.sink.push(payload).await {
                debug!(session_id, stream, "Push failed: {}", e);
                return SessionOutcome::SinkClosed;
            }
            if let Some(stats) = &self.stats {
                stats.record_push(started.elapsed().as_secs_f64() * 1000.0, payload_len);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return SessionOutcome::Cancelled,
                _ = sleep_until(started + self.interval) => {}
            }
        }
    }
}

/// Sink feeding an in-process channel. Used by the CLI and tests.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<String>>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::Sender<String>) -> Self {
        Self { tx: Some(tx) }
    }

    /// A sink and the receiver of its payloads.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }
}

#[async_trait]
impl SnapshotSink for ChannelSink {
    async fn push(&mut self, payload: String) -> Result<(), SinkError> {
        let tx = self.tx.as_ref().ok_or(SinkError::Closed)?;
        tx.send(payload).await.map_err(|_| SinkError::Closed)
    }

    async fn close(&mut self) -> Result<(), SinkError> {
        if self.tx.take().is_none() {
            warn!("Channel sink closed twice");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u64);

    #[async_trait]
    impl MetricSource for Counter {
        type Snapshot = u64;

        fn name(&self) -> &'static str {
            "counter"
        }

        async fn snapshot(&mut self) -> Result<u64, SourceError> {
            self.0 += 1;
            Ok(self.0)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_pushes_json_until_receiver_drops() {
        let (sink, mut rx) = ChannelSink::channel(8);
        let cancel = CancellationToken::new();
        let session = PollingSession::new(Counter(0), sink, Duration::from_secs(1), cancel);
        let handle = tokio::spawn(session.run());

        assert_eq!(rx.recv().await.as_deref(), Some("1"));
        assert_eq!(rx.recv().await.as_deref(), Some("2"));
        drop(rx);

        assert_eq!(handle.await.unwrap(), SessionOutcome::SinkClosed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_start() {
        let (sink, mut rx) = ChannelSink::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = PollingSession::new(Counter(0), sink, Duration::from_secs(1), cancel)
            .run()
            .await;
        assert_eq!(outcome, SessionOutcome::Cancelled);
        assert!(rx.recv().await.is_none());
    }
}
