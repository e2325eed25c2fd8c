use super::SourceSettings;
use crate::error::SourceError;
use crate::session::MetricSource;
use crate::system::{read_memory_info, MemoryInfo};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::task;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RamUsage {
    pub total: u64,
    pub free: u64,
    pub available: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SwapUsage {
    pub total: u64,
    pub free: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryMetrics {
    pub memory: RamUsage,
    pub swap: SwapUsage,
}

/// All values in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemorySnapshot {
    pub metrics: MemoryMetrics,
}

impl From<MemoryInfo> for MemorySnapshot {
    fn from(info: MemoryInfo) -> Self {
        Self {
            metrics: MemoryMetrics {
                memory: RamUsage {
                    total: info.total_bytes,
                    free: info.free_bytes,
                    available: info.available_bytes,
                },
                swap: SwapUsage {
                    total: info.swap_total_bytes,
                    free: info.swap_free_bytes,
                },
            },
        }
    }
}

pub struct MemorySource {
    proc_root: PathBuf,
}

impl MemorySource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            proc_root: settings.paths.proc_root.clone(),
        }
    }
}

#[async_trait]
impl MetricSource for MemorySource {
    type Snapshot = MemorySnapshot;

    fn name(&self) -> &'static str {
        "memory"
    }

    async fn snapshot(&mut self) -> Result<MemorySnapshot, SourceError> {
        let root = self.proc_root.clone();
        let info = task::spawn_blocking(move || read_memory_info(&root)).await?;
        let info = info.unwrap_or_else(|e| {
            warn!("Memory info unavailable: {}", e);
            MemoryInfo::default()
        });
        Ok(info.into())
    }
}
