//! Socket inode to process mapping built from `<proc_root>/<pid>/fd`.

use crate::process::{collect_proc_entries, read_process_name, ProcEntry};
use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use rayon::prelude::*;
use regex::Regex;
use std::fs;
use std::path::Path;
use tracing::debug;

static SOCKET_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^socket:\[(\d+)\]$").expect("socket link pattern is valid"));

/// Process holding a socket open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketOwner {
    pub pid: u32,
    pub name: String,
}

/// Socket inode to owning process, rebuilt on every query.
pub type SocketOwnership = HashMap<u64, SocketOwner>;

/// Extracts the inode from an fd link target like `socket:[12345]`.
pub fn socket_inode(link: &str) -> Option<u64> {
    SOCKET_LINK
        .captures(link)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn process_sockets(entry: &ProcEntry) -> Vec<(u64, SocketOwner)> {
    let fd_dir = entry.proc_path.join("fd");
    let fds = match fs::read_dir(&fd_dir) {
        Ok(fds) => fds,
        Err(e) => {
            debug!("Skipping pid {}: cannot list fds: {}", entry.pid, e);
            return Vec::new();
        }
    };

    let mut inodes = Vec::new();
    for fd in fds.flatten() {
        match fs::read_link(fd.path()) {
            Ok(target) => {
                if let Some(inode) = target.to_str().and_then(socket_inode) {
                    inodes.push(inode);
                }
            }
            Err(e) => debug!("Skipping fd of pid {}: {}", entry.pid, e),
        }
    }

    if inodes.is_empty() {
        return Vec::new();
    }

    let Some(name) = read_process_name(&entry.proc_path) else {
        debug!("Skipping pid {}: no comm", entry.pid);
        return Vec::new();
    };

    inodes
        .into_iter()
        .map(|inode| {
            (
                inode,
                SocketOwner {
                    pid: entry.pid,
                    name: name.clone(),
                },
            )
        })
        .collect()
}

/// Scans every process in parallel and maps its socket inodes to it.
///
/// A socket shared across processes (inherited fds) is attributed to the
/// lowest PID. Processes that vanish or deny access mid-scan are skipped.
pub fn build_socket_ownership(proc_root: &Path) -> SocketOwnership {
    let entries = collect_proc_entries(proc_root, None);

    let pairs: Vec<(u64, SocketOwner)> = entries.par_iter().flat_map_iter(process_sockets).collect();

    let mut ownership = SocketOwnership::with_capacity(pairs.len());
    for (inode, owner) in pairs {
        match ownership.get(&inode) {
            Some(existing) if existing.pid <= owner.pid => {}
            _ => {
                ownership.insert(inode, owner);
            }
        }
    }
    ownership
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    fn make_process(root: &Path, pid: u32, comm: &str, links: &[&str]) {
        let p = root.join(pid.to_string());
        fs::create_dir_all(p.join("fd")).unwrap();
        fs::write(p.join("comm"), format!("{}\n", comm)).unwrap();
        for (i, target) in links.iter().enumerate() {
            symlink(target, p.join("fd").join(i.to_string())).unwrap();
        }
    }

    #[test]
    fn test_socket_inode_pattern() {
        assert_eq!(socket_inode("socket:[12345]"), Some(12345));
        assert_eq!(socket_inode("pipe:[12345]"), None);
        assert_eq!(socket_inode("socket:[abc]"), None);
        assert_eq!(socket_inode("/dev/null"), None);
    }

    #[test]
    fn test_build_socket_ownership() {
        let dir = tempdir().expect("Failed to create temp dir");
        make_process(dir.path(), 100, "nginx", &["socket:[1000]", "/dev/null", "socket:[1001]"]);
        make_process(dir.path(), 200, "sshd", &["socket:[2000]", "pipe:[5]"]);
        fs::create_dir_all(dir.path().join("300")).unwrap();

        let map = build_socket_ownership(dir.path());
        assert_eq!(map.len(), 3);
        assert_eq!(map[&1000].pid, 100);
        assert_eq!(map[&1001].name, "nginx");
        assert_eq!(
            map[&2000],
            SocketOwner {
                pid: 200,
                name: "sshd".to_string()
            }
        );
    }

    #[test]
    fn test_shared_socket_goes_to_lowest_pid() {
        let dir = tempdir().expect("Failed to create temp dir");
        make_process(dir.path(), 900, "worker", &["socket:[7]"]);
        make_process(dir.path(), 10, "master", &["socket:[7]"]);

        let map = build_socket_ownership(dir.path());
        assert_eq!(map[&7].pid, 10);
    }
}
