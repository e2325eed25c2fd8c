//! Herakles Live Monitor Library
//!
//! Live Linux telemetry engine: per-client polling sessions that push one
//! JSON snapshot per tick over any [`SnapshotSink`].
//!
//! # Building blocks
//!
//! - [`rate`]: turns monotonic kernel counters into per-second rates with
//!   optional exponential smoothing
//! - [`connections`]: parses `/proc/net/{tcp,tcp6,udp,udp6}` and attributes
//!   sockets to processes
//! - [`session`]: the [`PollingSession`] loop and its source/sink traits
//! - [`sources`]: disk, network, connection, memory, CPU, process and GPU streams
//!
//! # Usage
//!
//! ```no_run
//! use herakles_live_monitor::{ChannelSink, PollingSession, SourceSettings, MemorySource};
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn demo() {
//! let (sink, mut rx) = ChannelSink::channel(4);
//! let cancel = CancellationToken::new();
//! let source = MemorySource::new(&SourceSettings::default());
//! let session = PollingSession::new(source, sink, Duration::from_secs(1), cancel.clone());
//! tokio::spawn(session.run());
//!
//! if let Some(json) = rx.recv().await {
//!     println!("{}", json);
//! }
//! cancel.cancel();
//! # }
//! ```

pub mod collectors;
pub mod connections;
pub mod error;
pub mod process;
pub mod rate;
pub mod session;
pub mod session_stats;
pub mod sources;
pub mod system;

pub use connections::{ConnectionRecord, ConnectionTable, ConnectionTableBuilder, TcpState};
pub use error::{CollectorError, SinkError, SourceError};
pub use rate::{RateSample, RateState};
pub use session::{ChannelSink, MetricSource, PollingSession, SessionOutcome, SnapshotSink};
pub use session_stats::SessionStats;
pub use sources::{
    run_stream, snapshot_once, ConnectionsSource, CpuSource, DiskSource, GpuSource, HostPaths, MemorySource,
    NetworkSource, ProcessSource, SessionContext, SourceSettings, StreamKind,
};
