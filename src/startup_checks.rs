//! Startup requirement validation for herakles-live-monitor.
//!
//! This module validates that the monitor can read the kernel interfaces
//! its streams depend on before the server starts.

use nix::unistd::geteuid;
use std::fs;
use std::path::Path;
use tracing::{debug, error, info, warn};

/// Validate all runtime requirements
pub fn validate_requirements(proc_root: &Path, sys_root: &Path) -> Result<(), ValidationError> {
    info!("🔍 Validating runtime requirements...");

    check_user_privileges();
    check_proc_root(proc_root)?;
    check_socket_tables(proc_root);
    check_fd_access(proc_root);
    check_sys_root(sys_root);

    info!("✅ All runtime requirements validated");
    Ok(())
}

/// Check if running with sufficient privileges
fn check_user_privileges() {
    if !geteuid().is_root() {
        warn!("⚠️  Not running as root - sockets of other users' processes stay unattributed");
        warn!("   Recommendation: Run as root or grant cap_sys_ptrace for full connection tables");
    } else {
        info!("✅ Running as root (uid=0)");
    }
}

/// The proc root must exist and contain the files every stream reads.
fn check_proc_root(proc_root: &Path) -> Result<(), ValidationError> {
    if !proc_root.is_dir() {
        error!("❌ {} is not a directory", proc_root.display());
        return Err(ValidationError::ProcRootMissing(
            proc_root.display().to_string(),
        ));
    }

    for file in ["meminfo", "stat", "diskstats", "net/dev"] {
        let path = proc_root.join(file);
        if let Err(e) = fs::metadata(&path) {
            error!("❌ Cannot access {}: {}", path.display(), e);
            return Err(ValidationError::Unreadable {
                path: path.display().to_string(),
                reason: e.to_string(),
            });
        }
    }

    info!("✅ {} is readable", proc_root.display());
    Ok(())
}

/// Missing socket tables only shrink the connection table.
fn check_socket_tables(proc_root: &Path) {
    for table in ["tcp", "tcp6", "udp", "udp6"] {
        let path = proc_root.join("net").join(table);
        if path.exists() {
            debug!("Socket table available: {}", path.display());
        } else {
            warn!("⚠️  {} not found - its connections will be omitted", path.display());
        }
    }
}

/// Socket ownership needs to read other processes' fd directories.
fn check_fd_access(proc_root: &Path) {
    let test_dir = proc_root.join("1").join("fd");
    match fs::read_dir(&test_dir) {
        Ok(_) => info!("✅ {} readable: sockets can be attributed", test_dir.display()),
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            warn!("⚠️  Cannot read {} - insufficient permissions", test_dir.display());
            warn!("   Connections owned by other users will show pid \"-\"");
            warn!("   Solution: setcap cap_dac_read_search,cap_sys_ptrace+ep /path/to/binary");
        }
        Err(e) => {
            debug!("Could not test fd access on {}: {}", test_dir.display(), e);
        }
    }
}

fn check_sys_root(sys_root: &Path) {
    if !sys_root.join("block").is_dir() {
        warn!(
            "⚠️  {} not found - disk list will be empty",
            sys_root.join("block").display()
        );
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("proc filesystem not found at {0}")]
    ProcRootMissing(String),

    #[error("Cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_proc_root_fails() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let err = validate_requirements(&missing, dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::ProcRootMissing(_)));
    }

    #[test]
    fn test_incomplete_proc_root_fails() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("meminfo"), "MemTotal: 1 kB\n").unwrap();
        let err = validate_requirements(dir.path(), dir.path()).unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { .. }));
    }

    #[test]
    fn test_complete_proc_root_passes() {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("net")).unwrap();
        for f in ["meminfo", "stat", "diskstats", "net/dev"] {
            fs::write(dir.path().join(f), "").unwrap();
        }
        assert!(validate_requirements(dir.path(), dir.path()).is_ok());
    }
}
