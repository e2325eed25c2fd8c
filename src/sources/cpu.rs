//! Per-core usage, frequency and temperature.

use super::{HostPaths, SourceSettings};
use crate::collectors::collect_temperatures;
use crate::error::SourceError;
use crate::session::MetricSource;
use crate::system::{read_cpu_frequencies, read_cpu_stats, CpuUsageTracker};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use tokio::task;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
pub struct CpuSnapshot {
    /// Busy percent per `cpu*` line; empty on the first tick.
    pub usage: BTreeMap<String, f64>,
    /// MHz keyed "Core N".
    pub freq: BTreeMap<String, f64>,
    /// Celsius per sensor.
    pub temp: BTreeMap<String, f64>,
}

pub struct CpuSource {
    paths: HostPaths,
    usage: CpuUsageTracker,
}

impl CpuSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            paths: settings.paths.clone(),
            usage: CpuUsageTracker::new(),
        }
    }
}

#[async_trait]
impl MetricSource for CpuSource {
    type Snapshot = CpuSnapshot;

    fn name(&self) -> &'static str {
        "cpu"
    }

    async fn snapshot(&mut self) -> Result<CpuSnapshot, SourceError> {
        let paths = self.paths.clone();
        let (stats, freq, temp) = task::spawn_blocking(move || {
            (
                read_cpu_stats(&paths.proc_root),
                read_cpu_frequencies(&paths.sys_root),
                collect_temperatures(&paths.sys_root),
            )
        })
        .await?;

        let usage = match stats {
            Ok(stats) => self.usage.update(stats).into_iter().collect(),
            Err(e) => {
                warn!("CPU counters unavailable: {}", e);
                BTreeMap::new()
            }
        };

        Ok(CpuSnapshot {
            usage,
            freq: freq.into_iter().collect(),
            temp: temp.into_iter().collect(),
        })
    }
}
