//! Per-process readers used by the process stream and the connection tracker.
//!
//! - `scanner`: PID discovery, names, command lines, owners
//! - `cpu`: stat parsing and CPU percent history

pub mod cpu;
pub mod scanner;

pub use cpu::{format_elapsed, read_proc_stat, ProcStat, ProcessCpuTracker, CLK_TCK};
pub use scanner::{
    collect_proc_entries, read_process_exe, read_process_name, read_process_uid,
    resolve_command, resolve_user_name, ProcEntry,
};
