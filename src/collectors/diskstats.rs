//! Disk I/O statistics collector.
//!
//! Reads cumulative sector counters from `<proc_root>/diskstats`.

use crate::error::{CollectorError, CollectorResult};
use ahash::AHashMap as HashMap;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Cumulative sector counters for a single block device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiskCounters {
    pub sectors_read: u64,
    pub sectors_written: u64,
}

/// Reads disk counters from `<proc_root>/diskstats`.
///
/// Format: major minor name read_ios read_merges read_sectors read_ticks
/// write_ios write_merges write_sectors ...
pub fn read_diskstats(proc_root: &Path) -> CollectorResult<HashMap<String, DiskCounters>> {
    let path = proc_root.join("diskstats");
    let content = fs::read_to_string(&path).map_err(|e| CollectorError::io(&path, e))?;
    Ok(parse_diskstats(&content))
}

/// Parses diskstats content. Short or non-numeric lines are skipped.
pub fn parse_diskstats(content: &str) -> HashMap<String, DiskCounters> {
    let mut stats = HashMap::new();

    for line in content.lines() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() < 14 {
            continue;
        }

        let device = parts[2];
        if device.starts_with("loop") || device.starts_with("ram") {
            continue;
        }

        match (parts[5].parse::<u64>(), parts[9].parse::<u64>()) {
            (Ok(sectors_read), Ok(sectors_written)) => {
                stats.insert(
                    device.to_string(),
                    DiskCounters {
                        sectors_read,
                        sectors_written,
                    },
                );
            }
            _ => debug!("Skipping malformed diskstats line for {}", device),
        }
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
   7       0 loop0 57 0 2194 14 0 0 0 0 0 44 14 0 0 0 0 0 0
   8       0 sda 195443 51233 12288000 94321 301290 290383 4096000 519384 0 401912 626004 0 0 0 0 0 0
   8       1 sda1 195000 51000 12000000 94000 301000 290000 4000000 519000 0 401000 626000 0 0 0 0 0 0
 259       0 nvme0n1 x 0 1 2 3 4 5 6 7 8 9 10
";

    #[test]
    fn test_parse_diskstats_fields() {
        let stats = parse_diskstats(SAMPLE);
        let sda = stats.get("sda").expect("sda present");
        assert_eq!(sda.sectors_read, 12288000);
        assert_eq!(sda.sectors_written, 4096000);
        assert!(stats.contains_key("sda1"));
    }

    #[test]
    fn test_parse_diskstats_skips_loop_and_malformed() {
        let stats = parse_diskstats(SAMPLE);
        assert!(!stats.contains_key("loop0"));
        assert!(!stats.contains_key("nvme0n1"));
        assert!(parse_diskstats("8 0 sda 1 2 3\n").is_empty());
    }

    #[test]
    fn test_read_diskstats_missing_file() {
        let dir = tempdir().expect("Failed to create temp dir");
        let err = read_diskstats(dir.path()).unwrap_err();
        assert!(err.is_not_found());
    }
}
