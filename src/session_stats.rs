//! Shared counters describing live polling sessions.
//!
//! Sessions only touch these through atomics or short mutex sections, so
//! any number of session tasks can record into one `SessionStats`.

use std::fmt::Write as FmtWrite;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Instant;

/// Running statistics for a single metric.
#[derive(Clone, Copy, Default)]
pub struct RunningStat {
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
    last: f64,
}

impl RunningStat {
    pub fn add(&mut self, value: f64) {
        if self.count == 0 {
            self.min = value;
            self.max = value;
        }
        self.count += 1;
        self.sum += value;
        self.last = value;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    pub fn avg(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / (self.count as f64)
        }
    }
}

/// Thread-safe wrapper for running statistics.
#[derive(Default)]
pub struct Stat {
    inner: Mutex<RunningStat>,
}

impl Stat {
    pub fn add_sample(&self, value: f64) {
        if let Ok(mut s) = self.inner.lock() {
            s.add(value);
        }
    }

    /// (last, avg, max, min, count)
    pub fn snapshot(&self) -> (f64, f64, f64, f64, u64) {
        if let Ok(s) = self.inner.lock() {
            (s.last, s.avg(), s.max, s.min, s.count)
        } else {
            (0.0, 0.0, 0.0, 0.0, 0)
        }
    }
}

/// How a session ended, as counted by [`SessionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Cancelled,
    SinkClosed,
    SourceFailed,
}

pub struct SessionStats {
    pub sessions_started: AtomicU64,
    pub sessions_active: AtomicU64,
    pub sessions_rejected: AtomicU64,
    pub pushes_total: AtomicU64,

    pub ended_cancelled: AtomicU64,
    pub ended_sink_closed: AtomicU64,
    pub ended_source_failed: AtomicU64,

    pub snapshot_duration_ms: Stat,
    pub payload_size_kb: Stat,

    next_session_id: AtomicU64,
    pub start_time: Instant,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self {
            sessions_started: AtomicU64::new(0),
            sessions_active: AtomicU64::new(0),
            sessions_rejected: AtomicU64::new(0),
            pushes_total: AtomicU64::new(0),
            ended_cancelled: AtomicU64::new(0),
            ended_sink_closed: AtomicU64::new(0),
            ended_source_failed: AtomicU64::new(0),
            snapshot_duration_ms: Stat::default(),
            payload_size_kb: Stat::default(),
            next_session_id: AtomicU64::new(1),
            start_time: Instant::now(),
        }
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Default::default()
    }

    /// Unique, monotonically increasing session id.
    pub fn allocate_session_id(&self) -> u64 {
        self.next_session_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record_session_start(&self) {
        self.sessions_started.fetch_add(1, Ordering::Relaxed);
        self.sessions_active.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_session_end(&self, end: SessionEnd) {
        let _ = self
            .sessions_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |v| {
                Some(v.saturating_sub(1))
            });
        let counter = match end {
            SessionEnd::Cancelled => &self.ended_cancelled,
            SessionEnd::SinkClosed => &self.ended_sink_closed,
            SessionEnd::SourceFailed => &self.ended_source_failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.sessions_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_push(&self, snapshot_ms: f64, payload_bytes: usize) {
        self.pushes_total.fetch_add(1, Ordering::Relaxed);
        self.snapshot_duration_ms.add_sample(snapshot_ms);
        self.payload_size_kb.add_sample(payload_bytes as f64 / 1024.0);
    }

    pub fn active(&self) -> u64 {
        self.sessions_active.load(Ordering::Relaxed)
    }

    pub fn get_uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render_table(&self) -> String {
        let left_col = 26usize;
        let col_w = 12usize;
        let mut out = String::new();

        let row = |out: &mut String, label: &str, cells: [String; 4]| {
            writeln!(
                out,
                "{:left$} | {:^col$} | {:^col$} | {:^col$} | {:^col$}",
                label,
                cells[0],
                cells[1],
                cells[2],
                cells[3],
                left = left_col,
                col = col_w
            )
            .ok();
        };
        let counter = |v: &AtomicU64| {
            [
                v.load(Ordering::Relaxed).to_string(),
                "N/A".to_string(),
                "N/A".to_string(),
                "N/A".to_string(),
            ]
        };
        let stat = |s: &Stat, precision: usize| {
            let (cur, avg, max, min, _) = s.snapshot();
            [
                format!("{:.*}", precision, cur),
                format!("{:.*}", precision, avg),
                format!("{:.*}", precision, max),
                format!("{:.*}", precision, min),
            ]
        };

        writeln!(out, "HEALTH ENDPOINT - LIVE SESSION STATS").ok();
        writeln!(out, "====================================").ok();
        writeln!(out).ok();
        row(
            &mut out,
            "",
            [
                "current".into(),
                "average".into(),
                "max".into(),
                "min".into(),
            ],
        );

        writeln!(out).ok();
        writeln!(out, "SESSIONS").ok();
        writeln!(out, "--------").ok();
        row(&mut out, "sessions_active", counter(&self.sessions_active));
        row(&mut out, "sessions_started", counter(&self.sessions_started));
        row(&mut out, "sessions_rejected", counter(&self.sessions_rejected));
        row(&mut out, "ended_cancelled", counter(&self.ended_cancelled));
        row(&mut out, "ended_sink_closed", counter(&self.ended_sink_closed));
        row(&mut out, "ended_source_failed", counter(&self.ended_source_failed));

        writeln!(out).ok();
        writeln!(out, "PUSHES").ok();
        writeln!(out, "------").ok();
        row(&mut out, "pushes_total", counter(&self.pushes_total));
        row(&mut out, "snapshot_duration (ms)", stat(&self.snapshot_duration_ms, 2));
        row(&mut out, "payload_size (KB)", stat(&self.payload_size_kb, 1));

        writeln!(out).ok();
        writeln!(out, "uptime: {}s", self.get_uptime_seconds()).ok();
        out
    }
}
