//! CPU and memory accounting for individual processes.
//!
//! Parses `/proc/<pid>/stat` and keeps the per-PID CPU-time history needed
//! for delta-based CPU percentages.

use ahash::{AHashMap as HashMap, AHashSet as HashSet};
use once_cell::sync::Lazy;
use std::fs;
use std::path::Path;
use std::time::Instant;

/// Get system clock ticks per second (usually 100, but can vary).
fn get_clk_tck() -> f64 {
    // SAFETY: sysconf is safe to call with _SC_CLK_TCK
    let tck = unsafe { libc::sysconf(libc::_SC_CLK_TCK) };
    if tck > 0 {
        tck as f64
    } else {
        100.0
    }
}

fn get_page_size() -> u64 {
    // SAFETY: sysconf is safe to call with _SC_PAGESIZE
    let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if size > 0 {
        size as u64
    } else {
        4096
    }
}

/// System clock ticks per second (for CPU time calculation).
pub static CLK_TCK: Lazy<f64> = Lazy::new(get_clk_tck);

/// Memory page size in bytes (for RSS conversion).
pub static PAGE_SIZE: Lazy<u64> = Lazy::new(get_page_size);

/// Fields of `/proc/<pid>/stat` used by the process stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcStat {
    pub utime_ticks: u64,
    pub stime_ticks: u64,
    pub start_time_ticks: u64,
    pub rss_pages: u64,
}

impl ProcStat {
    pub fn cpu_time_seconds(&self) -> f64 {
        (self.utime_ticks + self.stime_ticks) as f64 / *CLK_TCK
    }

    /// Seconds since the process started given the current system uptime.
    pub fn elapsed_seconds(&self, system_uptime: f64) -> f64 {
        (system_uptime - self.start_time_ticks as f64 / *CLK_TCK).max(0.0)
    }

    pub fn rss_bytes(&self) -> u64 {
        self.rss_pages * *PAGE_SIZE
    }
}

/// Parses a stat line. Fields are counted after the closing paren of `comm`,
/// which may itself contain spaces.
pub fn parse_proc_stat(content: &str) -> Option<ProcStat> {
    let after_comm = &content[content.rfind(')')? + 1..];
    let fields: Vec<&str> = after_comm.split_whitespace().collect();
    if fields.len() <= 21 {
        return None;
    }

    let field = |i: usize| fields[i].parse::<u64>().ok();
    Some(ProcStat {
        utime_ticks: field(11)?,
        stime_ticks: field(12)?,
        start_time_ticks: field(19)?,
        rss_pages: field(21).unwrap_or(0),
    })
}

pub fn read_proc_stat(proc_path: &Path) -> Option<ProcStat> {
    let content = fs::read_to_string(proc_path.join("stat")).ok()?;
    parse_proc_stat(&content)
}

/// Previous CPU time per PID for computing CPU percentages between ticks.
#[derive(Debug, Default)]
pub struct ProcessCpuTracker {
    previous: HashMap<u32, (f64, Instant)>,
}

impl ProcessCpuTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// CPU percent of `pid` since its last observation; 0.0 on first sight.
    pub fn observe(&mut self, pid: u32, cpu_time_seconds: f64, now: Instant) -> f64 {
        let mut cpu_percent = 0.0;

        if let Some((before, at)) = self.previous.get(&pid) {
            let dt = now.saturating_duration_since(*at).as_secs_f64();
            let delta_cpu = cpu_time_seconds - before;
            if dt > 0.0 && delta_cpu > 0.0 {
                cpu_percent = (delta_cpu / dt) * 100.0;
            }
        }

        self.previous.insert(pid, (cpu_time_seconds, now));
        cpu_percent
    }

    /// Drops history for PIDs not in `alive`.
    pub fn retain(&mut self, alive: &HashSet<u32>) {
        self.previous.retain(|pid, _| alive.contains(pid));
    }

    pub fn len(&self) -> usize {
        self.previous.len()
    }

    pub fn is_empty(&self) -> bool {
        self.previous.is_empty()
    }
}

/// Formats whole seconds as `HH:MM:SS`; hours grow past 99 as needed.
pub fn format_elapsed(seconds: f64) -> String {
    let total = seconds.max(0.0) as u64;
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::tempdir;

    const STAT: &str = "1234 (test process) S 1 1234 1234 0 -1 4194304 100 0 0 0 1000 500 0 0 20 0 1 0 12345 12345678 1234 18446744073709551615 4194304 4238788 140736466511168 0 0 0 0 0 0 0 0 0 17 1 0 0 0 0 0";

    #[test]
    fn test_parse_proc_stat_fields() {
        let stat = parse_proc_stat(STAT).expect("valid stat");
        assert_eq!(stat.utime_ticks, 1000);
        assert_eq!(stat.stime_ticks, 500);
        assert_eq!(stat.start_time_ticks, 12345);
        assert_eq!(stat.rss_pages, 1234);

        let expected = 1500.0 / *CLK_TCK;
        assert!((stat.cpu_time_seconds() - expected).abs() < 0.001);
    }

    #[test]
    fn test_parse_proc_stat_invalid() {
        assert!(parse_proc_stat("1234 (test) S 1 2 3").is_none());
        assert!(parse_proc_stat("garbage").is_none());
    }

    #[test]
    fn test_read_proc_stat_missing_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(read_proc_stat(dir.path()).is_none());
    }

    #[test]
    fn test_cpu_tracker_percent_and_retain() {
        let mut tracker = ProcessCpuTracker::new();
        let t0 = Instant::now();

        assert_eq!(tracker.observe(7, 10.0, t0), 0.0);
        let pct = tracker.observe(7, 10.5, t0 + Duration::from_secs(1));
        assert!((pct - 50.0).abs() < 1e-9);

        tracker.retain(&HashSet::new());
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(0.0), "00:00:00");
        assert_eq!(format_elapsed(3723.9), "01:02:03");
        assert_eq!(format_elapsed(-5.0), "00:00:00");
    }
}
