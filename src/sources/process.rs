//! Per-process command, owner, CPU, memory and elapsed time.

use super::SourceSettings;
use crate::error::SourceError;
use crate::process::{
    collect_proc_entries, format_elapsed, read_proc_stat, read_process_uid, resolve_command,
    resolve_user_name, ProcStat, ProcessCpuTracker,
};
use crate::session::MetricSource;
use crate::system::{read_memory_info, read_uptime};
use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use async_trait::async_trait;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::task;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub command: String,
    pub user: String,
    /// Percent of one core since the previous tick.
    pub cpu: f64,
    /// Resident memory as percent of MemTotal.
    pub memory: f64,
    /// `HH:MM:SS` since the process started.
    pub up_time: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcessSnapshot {
    pub metrics: BTreeMap<u32, ProcessInfo>,
}

struct ProcessReading {
    pid: u32,
    stat: ProcStat,
    command: String,
    uid: Option<u32>,
}

struct ScanResult {
    readings: Vec<ProcessReading>,
    mem_total: u64,
    uptime: f64,
    taken_at: Instant,
}

fn scan_processes(proc_root: &Path) -> ScanResult {
    let mem_total = match read_memory_info(proc_root) {
        Ok(info) => info.total_bytes,
        Err(e) => {
            warn!("Memory total unavailable, memory percent will be 0: {}", e);
            0
        }
    };
    let uptime = read_uptime(proc_root).unwrap_or_else(|e| {
        warn!("Uptime unavailable: {}", e);
        0.0
    });

    let entries = collect_proc_entries(proc_root, None);
    let readings = entries
        .par_iter()
        .filter_map(|entry| {
            let Some(stat) = read_proc_stat(&entry.proc_path) else {
                debug!("Skipping pid {}: stat unreadable", entry.pid);
                return None;
            };
            let command = resolve_command(proc_root, entry.pid)?;
            Some(ProcessReading {
                pid: entry.pid,
                stat,
                command,
                uid: read_process_uid(&entry.proc_path),
            })
        })
        .collect();

    ScanResult {
        readings,
        mem_total,
        uptime,
        taken_at: Instant::now(),
    }
}

pub struct ProcessSource {
    proc_root: PathBuf,
    cpu: ProcessCpuTracker,
    users: HashMap<u32, String>,
}

impl ProcessSource {
    pub fn new(settings: &SourceSettings) -> Self {
        Self {
            proc_root: settings.paths.proc_root.clone(),
            cpu: ProcessCpuTracker::new(),
            users: HashMap::new(),
        }
    }

    fn user_name(&mut self, uid: Option<u32>) -> String {
        match uid {
            Some(uid) => self
                .users
                .entry(uid)
                .or_insert_with(|| resolve_user_name(uid))
                .clone(),
            None => "Unknown".to_string(),
        }
    }
}

#[async_trait]
impl MetricSource for ProcessSource {
    type Snapshot = ProcessSnapshot;

    fn name(&self) -> &'static str {
        "processes"
    }

    async fn snapshot(&mut self) -> Result<ProcessSnapshot, SourceError> {
        let root = self.proc_root.clone();
        let scan = task::spawn_blocking(move || scan_processes(&root)).await?;

        let mut metrics = BTreeMap::new();
        for reading in scan.readings {
            let cpu = self
                .cpu
                .observe(reading.pid, reading.stat.cpu_time_seconds(), scan.taken_at);
            let memory = if scan.mem_total > 0 {
                reading.stat.rss_bytes() as f64 / scan.mem_total as f64 * 100.0
            } else {
                0.0
            };
            let info = ProcessInfo {
                command: reading.command,
                user: self.user_name(reading.uid),
                cpu,
                memory,
                up_time: format_elapsed(reading.stat.elapsed_seconds(scan.uptime)),
            };
            metrics.insert(reading.pid, info);
        }

        let alive: HashSet<u32> = metrics.keys().copied().collect();
        self.cpu.retain(&alive);

        Ok(ProcessSnapshot { metrics })
    }
}
