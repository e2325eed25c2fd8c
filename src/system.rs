//! System-wide readers for memory, CPU time, CPU frequency and uptime.
//!
//! `/proc` readers take the proc root, sysfs readers take the sys root.

use crate::error::{CollectorError, CollectorResult};
use ahash::AHashMap as HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Memory totals in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub free_bytes: u64,
    pub available_bytes: u64,
    pub swap_total_bytes: u64,
    pub swap_free_bytes: u64,
}

/// Cumulative CPU time counters (in clock ticks) for one `cpu*` line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CpuStat {
    pub user: u64,
    pub nice: u64,
    pub system: u64,
    pub idle: u64,
    pub iowait: u64,
    pub irq: u64,
    pub softirq: u64,
    pub steal: u64,
}

impl CpuStat {
    pub fn total(&self) -> u64 {
        self.user
            + self.nice
            + self.system
            + self.idle
            + self.iowait
            + self.irq
            + self.softirq
            + self.steal
    }

    /// Idle plus iowait.
    pub fn idle_total(&self) -> u64 {
        self.idle + self.iowait
    }
}

fn read_file(path: &Path) -> CollectorResult<String> {
    fs::read_to_string(path).map_err(|e| CollectorError::io(path, e))
}

/// Reads `<proc_root>/meminfo`. Values are reported in kB and returned in bytes.
///
/// Missing fields read as 0; a file without `MemTotal` is a parse error.
pub fn read_memory_info(proc_root: &Path) -> CollectorResult<MemoryInfo> {
    let content = read_file(&proc_root.join("meminfo"))?;
    parse_meminfo(&content)
}

pub fn parse_meminfo(content: &str) -> CollectorResult<MemoryInfo> {
    let mut info = MemoryInfo::default();
    let mut saw_total = false;

    for line in content.lines() {
        let mut parts = line.split_whitespace();
        let (Some(key), Some(value)) = (parts.next(), parts.next()) else {
            continue;
        };
        let Ok(kb) = value.parse::<u64>() else {
            continue;
        };
        let bytes = kb * 1024;

        match key {
            "MemTotal:" => {
                info.total_bytes = bytes;
                saw_total = true;
            }
            "MemFree:" => info.free_bytes = bytes,
            "MemAvailable:" => info.available_bytes = bytes,
            "SwapTotal:" => info.swap_total_bytes = bytes,
            "SwapFree:" => info.swap_free_bytes = bytes,
            _ => {}
        }
    }

    if !saw_total {
        return Err(CollectorError::parse("meminfo", "MemTotal not found"));
    }
    Ok(info)
}

/// Reads per-CPU time counters from `<proc_root>/stat`.
///
/// "cpu" is the aggregate across all cores, "cpu0", "cpu1", ... are cores.
pub fn read_cpu_stats(proc_root: &Path) -> CollectorResult<HashMap<String, CpuStat>> {
    let content = read_file(&proc_root.join("stat"))?;
    let stats = parse_cpu_stats(&content);
    if stats.is_empty() {
        return Err(CollectorError::parse("stat", "no cpu lines"));
    }
    Ok(stats)
}

pub fn parse_cpu_stats(content: &str) -> HashMap<String, CpuStat> {
    let mut stats = HashMap::new();

    for line in content.lines().filter(|l| l.starts_with("cpu")) {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 8 {
            continue;
        }

        let field = |i: usize| parts.get(i).and_then(|v| v.parse::<u64>().ok()).unwrap_or(0);
        stats.insert(
            parts[0].to_string(),
            CpuStat {
                user: field(1),
                nice: field(2),
                system: field(3),
                idle: field(4),
                iowait: field(5),
                irq: field(6),
                softirq: field(7),
                steal: field(8),
            },
        );
    }

    stats
}

/// Per-CPU usage between consecutive `/proc/stat` readings.
///
/// Owned by a single consumer; CPUs that disappear are dropped on the next update.
#[derive(Debug, Default)]
pub struct CpuUsageTracker {
    previous: HashMap<String, CpuStat>,
}

impl CpuUsageTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns busy percentage (0-100) per CPU. Empty on the first call.
    pub fn update(&mut self, current: HashMap<String, CpuStat>) -> HashMap<String, f64> {
        let mut usage = HashMap::new();

        for (cpu, now) in &current {
            let Some(before) = self.previous.get(cpu) else {
                continue;
            };
            let delta_total = now.total().saturating_sub(before.total());
            let delta_idle = now.idle_total().saturating_sub(before.idle_total());
            if delta_total > 0 {
                let busy = delta_total.saturating_sub(delta_idle) as f64 / delta_total as f64;
                usage.insert(cpu.clone(), busy * 100.0);
            }
        }

        self.previous = current;
        usage
    }
}

/// Reads system uptime in seconds from `<proc_root>/uptime`.
pub fn read_uptime(proc_root: &Path) -> CollectorResult<f64> {
    let content = read_file(&proc_root.join("uptime"))?;
    content
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<f64>().ok())
        .ok_or_else(|| CollectorError::parse("uptime", content.trim().to_string()))
}

/// Current frequency per core in MHz, keyed "Core N".
///
/// Reads `<sys_root>/devices/system/cpu/cpuN/cpufreq/scaling_cur_freq` (kHz).
/// Cores without cpufreq support are omitted.
pub fn read_cpu_frequencies(sys_root: &Path) -> HashMap<String, f64> {
    let mut freqs = HashMap::new();
    let base = sys_root.join("devices").join("system").join("cpu");
    let Ok(entries) = fs::read_dir(&base) else {
        debug!("No cpu directory under {}", base.display());
        return freqs;
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().to_string();
        let Some(index) = name
            .strip_prefix("cpu")
            .and_then(|n| n.parse::<u32>().ok())
        else {
            continue;
        };

        let path = entry.path().join("cpufreq").join("scaling_cur_freq");
        if let Some(khz) = fs::read_to_string(&path)
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            freqs.insert(format!("Core {}", index), khz as f64 / 1000.0);
        }
    }

    freqs
}
