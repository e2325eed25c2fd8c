//! [`MetricSource`] implementations, one per stream.
//!
//! Every source reads the kernel through `spawn_blocking` and owns whatever
//! history it needs between ticks (rate state, CPU counters). A source is
//! created per session and dropped with it.

pub mod connections;
pub mod cpu;
pub mod disk;
pub mod gpu;
pub mod memory;
pub mod network;
pub mod process;

pub use connections::{ConnectionsSnapshot, ConnectionsSource};
pub use cpu::{CpuSnapshot, CpuSource};
pub use disk::{DiskSnapshot, DiskSource, DiskSpeed, DEFAULT_DISK_SMOOTHING};
pub use gpu::{GpuMetrics, GpuSnapshot, GpuSource, DEFAULT_GPU_COMMAND};
pub use memory::{MemorySnapshot, MemorySource};
pub use network::{InterfaceStats, NetworkSnapshot, NetworkSource};
pub use process::{ProcessInfo, ProcessSnapshot, ProcessSource};

use crate::error::SourceError;
use crate::session::{MetricSource, PollingSession, SessionOutcome, SnapshotSink};
use crate::session_stats::SessionStats;
use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Roots of the kernel pseudo-filesystems the sources read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostPaths {
    pub proc_root: PathBuf,
    pub sys_root: PathBuf,
}

impl Default for HostPaths {
    fn default() -> Self {
        Self {
            proc_root: PathBuf::from("/proc"),
            sys_root: PathBuf::from("/sys"),
        }
    }
}

/// Knobs shared by all sources of one server.
#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub paths: HostPaths,
    /// EMA factor for disk throughput; `None` reports raw rates.
    pub disk_smoothing: Option<f64>,
    /// Attach the connection table to the network stream.
    pub network_connections: bool,
    /// Program queried by the GPU stream.
    pub gpu_command: PathBuf,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self {
            paths: HostPaths::default(),
            disk_smoothing: Some(DEFAULT_DISK_SMOOTHING),
            network_connections: true,
            gpu_command: PathBuf::from(DEFAULT_GPU_COMMAND),
        }
    }
}

/// The streams a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Disks,
    Network,
    Connections,
    Memory,
    Cpu,
    Processes,
    Gpu,
}

impl StreamKind {
    pub const ALL: [StreamKind; 7] = [
        StreamKind::Disks,
        StreamKind::Network,
        StreamKind::Connections,
        StreamKind::Memory,
        StreamKind::Cpu,
        StreamKind::Processes,
        StreamKind::Gpu,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamKind::Disks => "disks",
            StreamKind::Network => "network",
            StreamKind::Connections => "connections",
            StreamKind::Memory => "memory",
            StreamKind::Cpu => "cpu",
            StreamKind::Processes => "processes",
            StreamKind::Gpu => "gpu",
        }
    }

    /// Whether the stream reports deltas and needs a previous sample.
    pub fn is_rate_based(&self) -> bool {
        matches!(
            self,
            StreamKind::Disks | StreamKind::Network | StreamKind::Cpu | StreamKind::Processes
        )
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StreamKind::ALL
            .into_iter()
            .find(|k| k.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unknown stream '{}'", s))
    }
}

/// Identity and bookkeeping for one streaming session.
#[derive(Clone, Default)]
pub struct SessionContext {
    pub id: u64,
    pub stats: Option<Arc<SessionStats>>,
}

async fn run_with<S, K>(
    source: S,
    sink: K,
    interval: Duration,
    cancel: CancellationToken,
    ctx: SessionContext,
) -> SessionOutcome
where
    S: MetricSource,
    K: SnapshotSink,
{
    let session = PollingSession::new(source, sink, interval, cancel).with_id(ctx.id);
    match ctx.stats {
        Some(stats) => session.with_stats(stats).run().await,
        None => session.run().await,
    }
}

/// Runs a polling session of `kind` against `sink` until it ends.
pub async fn run_stream<K: SnapshotSink>(
    kind: StreamKind,
    settings: &SourceSettings,
    sink: K,
    interval: Duration,
    cancel: CancellationToken,
    ctx: SessionContext,
) -> SessionOutcome {
    match kind {
        StreamKind::Disks => {
            run_with(DiskSource::new(settings), sink, interval, cancel, ctx).await
        }
        StreamKind::Network => {
            run_with(NetworkSource::new(settings), sink, interval, cancel, ctx).await
        }
        StreamKind::Connections => {
            run_with(ConnectionsSource::new(settings), sink, interval, cancel, ctx).await
        }
        StreamKind::Memory => {
            run_with(MemorySource::new(settings), sink, interval, cancel, ctx).await
        }
        StreamKind::Cpu => run_with(CpuSource::new(settings), sink, interval, cancel, ctx).await,
        StreamKind::Processes => {
            run_with(ProcessSource::new(settings), sink, interval, cancel, ctx).await
        }
        StreamKind::Gpu => run_with(GpuSource::new(settings), sink, interval, cancel, ctx).await,
    }
}

async fn sample_once<S: MetricSource>(
    mut source: S,
    prime_delay: Option<Duration>,
) -> Result<serde_json::Value, SourceError> {
    if let Some(delay) = prime_delay {
        source.snapshot().await?;
        tokio::time::sleep(delay).await;
    }
    let snapshot = source.snapshot().await?;
    serde_json::to_value(&snapshot).map_err(|e| SourceError::Other(e.to_string()))
}

/// Takes a single snapshot of `kind` as JSON.
///
/// Rate-based streams are sampled twice, `prime_delay` apart, so the result
/// carries rates instead of an empty first tick.
pub async fn snapshot_once(
    kind: StreamKind,
    settings: &SourceSettings,
    prime_delay: Duration,
) -> Result<serde_json::Value, SourceError> {
    let delay = kind.is_rate_based().then_some(prime_delay);
    match kind {
        StreamKind::Disks => sample_once(DiskSource::new(settings), delay).await,
        StreamKind::Network => sample_once(NetworkSource::new(settings), delay).await,
        StreamKind::Connections => sample_once(ConnectionsSource::new(settings), delay).await,
        StreamKind::Memory => sample_once(MemorySource::new(settings), delay).await,
        StreamKind::Cpu => sample_once(CpuSource::new(settings), delay).await,
        StreamKind::Processes => sample_once(ProcessSource::new(settings), delay).await,
        StreamKind::Gpu => sample_once(GpuSource::new(settings), delay).await,
    }
}
