//! Network interface statistics collector.
//!
//! Byte and drop counters come from `<proc_root>/net/dev`; the set of
//! physical interfaces comes from `<sys_root>/class/net/*/device`.

use crate::error::{CollectorError, CollectorResult};
use ahash::AHashMap as HashMap;
use std::fs;
use std::path::Path;

/// Cumulative counters for one network interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetDevCounters {
    pub receive_bytes: u64,
    pub receive_drop: u64,
    pub transmit_bytes: u64,
    pub transmit_drop: u64,
}

/// Reads interface counters from `<proc_root>/net/dev`.
pub fn read_netdev_stats(proc_root: &Path) -> CollectorResult<HashMap<String, NetDevCounters>> {
    let path = proc_root.join("net").join("dev");
    let content = fs::read_to_string(&path).map_err(|e| CollectorError::io(&path, e))?;
    Ok(parse_netdev(&content))
}

pub fn parse_netdev(content: &str) -> HashMap<String, NetDevCounters> {
    let mut stats = HashMap::new();

    // The first two lines are column headers
    for line in content.lines().skip(2) {
        let Some((interface, rest)) = line.split_once(':') else {
            continue;
        };

        let values: Vec<u64> = match rest
            .split_whitespace()
            .map(str::parse::<u64>)
            .collect::<Result<_, _>>()
        {
            Ok(v) => v,
            Err(_) => continue,
        };
        if values.len() < 16 {
            continue;
        }

        stats.insert(
            interface.trim().to_string(),
            NetDevCounters {
                receive_bytes: values[0],
                receive_drop: values[3],
                transmit_bytes: values[8],
                transmit_drop: values[11],
            },
        );
    }

    stats
}

/// Lists interfaces backed by a device (skips lo, bridges, veths and other virtual links).
///
/// A missing `class/net` directory yields an empty list.
pub fn physical_interfaces(sys_root: &Path) -> Vec<String> {
    let base = sys_root.join("class").join("net");
    let Ok(entries) = fs::read_dir(&base) else {
        return Vec::new();
    };

    let mut out: Vec<String> = entries
        .flatten()
        .filter(|e| e.path().join("device").exists())
        .filter_map(|e| e.file_name().to_str().map(str::to_string))
        .collect();
    out.sort();
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo: 1000 10 0 0 0 0 0 0 1000 10 0 0 0 0 0 0
  eth0: 2097152 1500 0 7 0 0 0 0 1048576 900 0 3 0 0 0 0
 broken: 1 2 3
";

    #[test]
    fn test_parse_netdev_fields() {
        let stats = parse_netdev(SAMPLE);
        let eth0 = stats.get("eth0").expect("eth0 present");
        assert_eq!(eth0.receive_bytes, 2097152);
        assert_eq!(eth0.receive_drop, 7);
        assert_eq!(eth0.transmit_bytes, 1048576);
        assert_eq!(eth0.transmit_drop, 3);
        assert!(stats.contains_key("lo"));
        assert!(!stats.contains_key("broken"));
    }

    #[test]
    fn test_physical_interfaces_requires_device_link() {
        let dir = tempdir().expect("Failed to create temp dir");
        let net = dir.path().join("class/net");
        fs::create_dir_all(net.join("eth0/device")).unwrap();
        fs::create_dir_all(net.join("lo")).unwrap();
        fs::create_dir_all(net.join("wlan0/device")).unwrap();

        assert_eq!(physical_interfaces(dir.path()), vec!["eth0", "wlan0"]);
    }

    #[test]
    fn test_physical_interfaces_missing_dir() {
        let dir = tempdir().expect("Failed to create temp dir");
        assert!(physical_interfaces(dir.path()).is_empty());
    }
}
