//! Physical block device discovery from `<sys_root>/block`.

use serde::Serialize;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::rate::SECTOR_SIZE_BYTES;

/// A physical disk as listed in the disks stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiskInfo {
    pub name: String,
    pub size_bytes: u64,
    pub removable: bool,
    pub rotational: bool,
}

const VIRTUAL_PREFIXES: [&str; 3] = ["loop", "ram", "zram"];

/// Lists block devices that have a backing `device` link.
///
/// Loop, ram and zram devices are skipped even if they expose one. The
/// result is sorted by name.
pub fn list_disks(sys_root: &Path) -> Vec<DiskInfo> {
    let base = sys_root.join("block");
    let entries = match fs::read_dir(&base) {
        Ok(e) => e,
        Err(e) => {
            debug!("Cannot list {}: {}", base.display(), e);
            return Vec::new();
        }
    };

    let mut disks = Vec::new();
    for entry in entries.flatten() {
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p)) {
            continue;
        }

        let dev = entry.path();
        if !dev.join("device").exists() {
            continue;
        }

        disks.push(DiskInfo {
            size_bytes: read_u64(&dev.join("size")).unwrap_or(0) * SECTOR_SIZE_BYTES,
            removable: read_u64(&dev.join("removable")) == Some(1),
            rotational: read_u64(&dev.join("queue").join("rotational")) == Some(1),
            name,
        });
    }

    disks.sort_by(|a, b| a.name.cmp(&b.name));
    disks
}

fn read_u64(path: &Path) -> Option<u64> {
    fs::read_to_string(path).ok()?.trim().parse().ok()
}
