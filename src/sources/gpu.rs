//! NVIDIA GPU utilization via `nvidia-smi`.
//!
//! The helper is spawned once per tick. A host without the binary (or without
//! an NVIDIA card, where the tool exits non-zero) reports an empty table.

use super::SourceSettings;
use crate::error::SourceError;
use crate::session::MetricSource;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::process::Command;
use tracing::{debug, warn};

pub const DEFAULT_GPU_COMMAND: &str = "nvidia-smi";

const QUERY_FIELDS: [&str; 6] = [
    "index",
    "utilization.gpu",
    "utilization.memory",
    "memory.used",
    "power.draw",
    "temperature.gpu",
];

/// Current readings of one GPU. Unreported fields (`[N/A]`) read as 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GpuMetrics {
    /// Percent
    pub gpu_utilization: f64,
    /// Percent
    pub memory_utilization: f64,
    /// MiB
    pub memory_used: f64,
    /// Watts
    pub power_draw: f64,
    /// Celsius
    pub temperature: f64,
}

/// GPU readings keyed by device index.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GpuSnapshot {
    pub metrics: BTreeMap<String, GpuMetrics>,
}

fn field(value: &str) -> f64 {
    value.trim().parse().unwrap_or(0.0)
}

/// Parses `--format=csv,noheader,nounits` output of [`QUERY_FIELDS`].
pub fn parse_gpu_query(output: &str) -> BTreeMap<String, GpuMetrics> {
    let mut gpus = BTreeMap::new();

    for line in output.lines().filter(|l| !l.trim().is_empty()) {
        let cols: Vec<&str> = line.split(',').map(str::trim).collect();
        if cols.len() != QUERY_FIELDS.len() || cols[0].is_empty() {
            debug!("Skipping malformed nvidia-smi line: {}", line);
            continue;
        }
        gpus.insert(
            cols[0].to_string(),
            GpuMetrics {
                gpu_utilization: field(cols[1]),
                memory_utilization: field(cols[2]),
                memory_used: field(cols[3]),
                power_draw: field(cols[4]),
                temperature: field(cols[5]),
            },
        );
    }

    gpus
}

pub struct GpuSource {
    command: PathBuf,
}

impl GpuSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            command: settings.gpu_command.clone(),
        }
    }

    async fn query(&self) -> Option<String> {
        // The child is left to finish if the session stops mid-query
        let output = Command::new(&self.command)
            .arg(format!("--query-gpu={}", QUERY_FIELDS.join(",")))
            .arg("--format=csv,noheader,nounits")
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => Some(String::from_utf8_lossy(&out.stdout).into_owned()),
            Ok(out) => {
                warn!(
                    "{} exited with {}: {}",
                    self.command.display(),
                    out.status,
                    String::from_utf8_lossy(&out.stderr).trim()
                );
                None
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("{} not found, GPU metrics unavailable", self.command.display());
                None
            }
            Err(e) => {
                warn!("Failed to run {}: {}", self.command.display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl MetricSource for GpuSource {
    type Snapshot = GpuSnapshot;

    fn name(&self) -> &'static str {
        "gpu"
    }

    async fn snapshot(&mut self) -> Result<GpuSnapshot, SourceError> {
        let metrics = self
            .query()
            .await
            .map(|out| parse_gpu_query(&out))
            .unwrap_or_default();
        Ok(GpuSnapshot { metrics })
    }
}
