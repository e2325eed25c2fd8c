//! Process discovery and per-PID identity readers.
//!
//! All readers are best effort: a process can exit between listing and
//! reading, so failures become `None` rather than errors.

use nix::unistd::{Uid, User};
use std::fs;
use std::path::{Path, PathBuf};

/// Process entry representing a numeric directory under the proc root.
#[derive(Debug, Clone)]
pub struct ProcEntry {
    pub pid: u32,
    pub proc_path: PathBuf,
}

/// Scans `root` for numeric PID directories.
pub fn collect_proc_entries(root: &Path, max: Option<usize>) -> Vec<ProcEntry> {
    let mut out = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        for entry in entries.flatten() {
            let p = entry.path();
            let name = match p.file_name().and_then(|s| s.to_str()) {
                Some(v) => v,
                None => continue,
            };
            if !name.chars().all(|c| c.is_ascii_digit()) {
                continue;
            }
            let pid: u32 = match name.parse() {
                Ok(v) => v,
                Err(_) => continue,
            };
            out.push(ProcEntry { pid, proc_path: p });
            if let Some(maxp) = max {
                if out.len() >= maxp {
                    break;
                }
            }
        }
    }
    out
}

/// Reads the short process name from `comm`.
pub fn read_process_name(proc_path: &Path) -> Option<String> {
    let s = fs::read_to_string(proc_path.join("comm")).ok()?;
    let t = s.trim();
    (!t.is_empty()).then(|| t.to_string())
}

/// Full command line of `pid` with NUL separators turned into spaces.
///
/// Kernel threads have an empty `cmdline`; those fall back to `comm`.
pub fn resolve_command(proc_root: &Path, pid: u32) -> Option<String> {
    let proc_path = proc_root.join(pid.to_string());

    if let Ok(content) = fs::read(proc_path.join("cmdline")) {
        let command = String::from_utf8_lossy(&content)
            .replace('\0', " ")
            .trim()
            .to_string();
        if !command.is_empty() {
            return Some(command);
        }
    }

    read_process_name(&proc_path)
}

/// Target of the `exe` link.
pub fn read_process_exe(proc_path: &Path) -> Option<String> {
    fs::read_link(proc_path.join("exe"))
        .ok()
        .map(|p| p.to_string_lossy().to_string())
}

/// Real UID from the `Uid:` line of `status`.
pub fn read_process_uid(proc_path: &Path) -> Option<u32> {
    let status = fs::read_to_string(proc_path.join("status")).ok()?;
    status
        .lines()
        .find_map(|l| l.strip_prefix("Uid:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|uid| uid.parse().ok())
}

/// User name for `uid`, or the numeric uid when it has no passwd entry.
pub fn resolve_user_name(uid: u32) -> String {
    match User::from_uid(Uid::from_raw(uid)) {
        Ok(Some(user)) => user.name,
        _ => uid.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_collect_proc_entries_numeric_only() {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::create_dir_all(dir.path().join("1")).unwrap();
        fs::create_dir_all(dir.path().join("42")).unwrap();
        fs::create_dir_all(dir.path().join("self")).unwrap();
        fs::create_dir_all(dir.path().join("net")).unwrap();

        let mut pids: Vec<u32> = collect_proc_entries(dir.path(), None)
            .into_iter()
            .map(|e| e.pid)
            .collect();
        pids.sort();
        assert_eq!(pids, vec![1, 42]);
        assert_eq!(collect_proc_entries(dir.path(), Some(1)).len(), 1);
    }

    #[test]
    fn test_resolve_command_replaces_nul() {
        let dir = tempdir().expect("Failed to create temp dir");
        let p = dir.path().join("100");
        fs::create_dir_all(&p).unwrap();
        fs::write(p.join("cmdline"), b"/usr/bin/python3\0-m\0http.server\0").unwrap();
        fs::write(p.join("comm"), "python3\n").unwrap();

        assert_eq!(
            resolve_command(dir.path(), 100).as_deref(),
            Some("/usr/bin/python3 -m http.server")
        );
    }

    #[test]
    fn test_resolve_command_falls_back_to_comm() {
        let dir = tempdir().expect("Failed to create temp dir");
        let p = dir.path().join("2");
        fs::create_dir_all(&p).unwrap();
        fs::write(p.join("cmdline"), b"").unwrap();
        fs::write(p.join("comm"), "kthreadd\n").unwrap();

        assert_eq!(resolve_command(dir.path(), 2).as_deref(), Some("kthreadd"));
        assert_eq!(resolve_command(dir.path(), 3), None);
    }

    #[test]
    fn test_read_process_uid() {
        let dir = tempdir().expect("Failed to create temp dir");
        fs::write(
            dir.path().join("status"),
            "Name:\tsshd\nUid:\t1000\t1000\t1000\t1000\nGid:\t1000\n",
        )
        .unwrap();
        assert_eq!(read_process_uid(dir.path()), Some(1000));
    }

    #[test]
    fn test_resolve_user_name_root() {
        assert_eq!(resolve_user_name(0), "root");
    }
}
