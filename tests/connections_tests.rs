//! Integration tests for the process-annotated connection table.
//!
//! Each test builds a fake proc tree with socket tables and per-process fd
//! links, then checks what `ConnectionTableBuilder` makes of it.

use herakles_live_monitor::connections::{connection_key, Protocol};
use herakles_live_monitor::{ConnectionTableBuilder, TcpState};
use std::fs;
use std::os::unix::fs::symlink;
use std::path::Path;
use tempfile::{tempdir, TempDir};

const HEADER: &str =
    "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

fn socket_line(local: &str, remote: &str, state: &str, queues: &str, inode: u64) -> String {
    format!(
        "   0: {} {} {} {} 00:00000000 00000000  1000        0 {} 1 0000000000000000 100 0 0 10 0",
        local, remote, state, queues, inode
    )
}

fn write_table(root: &Path, name: &str, lines: &[String]) {
    let mut content = String::from(HEADER);
    content.push('\n');
    for line in lines {
        content.push_str(line);
        content.push('\n');
    }
    fs::write(root.join("net").join(name), content).unwrap();
}

fn make_process(root: &Path, pid: u32, comm: &str, exe: Option<&str>, inodes: &[u64]) {
    let dir = root.join(pid.to_string());
    fs::create_dir_all(dir.join("fd")).unwrap();
    fs::write(dir.join("comm"), format!("{}\n", comm)).unwrap();
    if let Some(exe) = exe {
        symlink(exe, dir.join("exe")).unwrap();
    }
    symlink("/dev/null", dir.join("fd").join("0")).unwrap();
    for (i, inode) in inodes.iter().enumerate() {
        symlink(format!("socket:[{}]", inode), dir.join("fd").join((i + 3).to_string())).unwrap();
    }
}

fn fixture() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("net")).unwrap();

    write_table(
        root,
        "tcp",
        &[
            socket_line("0100007F:1F90", "00000000:0000", "0A", "00000000:00000000", 1001),
            socket_line("0100007F:1F90", "0100007F:D431", "01", "0000000A:00000014", 1002),
        ],
    );
    write_table(
        root,
        "tcp6",
        &[socket_line(
            "00000000000000000000000000000001:1F90",
            "00000000000000000000000000000000:0000",
            "0A",
            "00000000:00000000",
            2001,
        )],
    );
    write_table(
        root,
        "udp",
        &[socket_line("00000000:0044", "00000000:0000", "07", "00000000:00000000", 3001)],
    );
    // udp6 deliberately missing

    make_process(root, 100, "nginx", Some("/usr/sbin/nginx"), &[1001, 1002, 2001]);
    make_process(root, 250, "nginx-worker", None, &[1002]);
    fs::create_dir_all(root.join("self")).unwrap();
    dir
}

#[test]
fn test_builds_one_record_per_tuple() {
    let dir = fixture();
    let table = ConnectionTableBuilder::new(dir.path()).build();

    assert_eq!(table.len(), 4);
    let protocols: Vec<Protocol> = table.values().map(|r| r.protocol).collect();
    assert_eq!(protocols.iter().filter(|p| **p == Protocol::Tcp).count(), 3);
    assert_eq!(protocols.iter().filter(|p| **p == Protocol::Udp).count(), 1);
}

#[test]
fn test_records_are_keyed_by_tuple_hash() {
    let dir = fixture();
    let table = ConnectionTableBuilder::new(dir.path()).build();

    for (key, record) in &table {
        assert_eq!(
            key,
            &connection_key(record.protocol, &record.local_address, &record.foreign_address)
        );
    }
}

#[test]
fn test_listener_is_attributed_to_owner() {
    let dir = fixture();
    let table = ConnectionTableBuilder::new(dir.path()).build();

    let listener = table
        .values()
        .find(|r| r.inode == 1001)
        .expect("listener present");
    assert_eq!(listener.local_address.to_string(), "127.0.0.1:8080");
    assert_eq!(listener.foreign_address.to_string(), "0.0.0.0:0");
    assert_eq!(listener.pid, Some(100));
    assert_eq!(listener.process.as_deref(), Some("nginx"));
    assert_eq!(listener.process_path.as_deref(), Some("/usr/sbin/nginx"));

    let json = serde_json::to_value(listener).unwrap();
    assert_eq!(json["state"], "LISTEN");
    assert_eq!(json["protocol"], "TCP");
}

#[test]
fn test_shared_socket_goes_to_lowest_pid() {
    let dir = fixture();
    let table = ConnectionTableBuilder::new(dir.path()).build();

    let established = table.values().find(|r| r.inode == 1002).unwrap();
    assert_eq!(established.pid, Some(100));
    assert_eq!(established.sent_bytes, 10);
    assert_eq!(established.received_bytes, 20);
    assert_eq!(established.foreign_address.port(), 54321);
}

#[test]
fn test_ipv6_and_unmapped_udp() {
    let dir = fixture();
    let table = ConnectionTableBuilder::new(dir.path()).build();

    let v6 = table.values().find(|r| r.inode == 2001).unwrap();
    assert_eq!(v6.local_address.to_string(), "[::1]:8080");

    let udp = table.values().find(|r| r.inode == 3001).unwrap();
    let json = serde_json::to_value(udp).unwrap();
    assert_eq!(json["pid"], "-");
    assert_eq!(json["process"], "-");
    assert_eq!(json["process_path"], "-");
    assert_eq!(json["state"], "N/A");
    assert_eq!(json["local_address"], "0.0.0.0:68");
}

#[test]
fn test_duplicate_tuple_last_row_wins() {
    let dir = fixture();
    write_table(
        dir.path(),
        "tcp",
        &[
            socket_line("0100007F:1F90", "00000000:0000", "0A", "00000000:00000000", 1001),
            socket_line("0100007F:1F90", "00000000:0000", "07", "00000000:00000000", 1003),
        ],
    );

    let table = ConnectionTableBuilder::new(dir.path()).build();
    let tcp4: Vec<_> = table
        .values()
        .filter(|r| r.local_address.to_string() == "127.0.0.1:8080")
        .collect();
    assert_eq!(tcp4.len(), 1);
    assert_eq!(tcp4[0].inode, 1003);
    assert_eq!(tcp4[0].pid, None);
}

#[test]
fn test_malformed_lines_are_skipped() {
    let dir = fixture();
    write_table(
        dir.path(),
        "udp",
        &[
            "   1: garbage".to_string(),
            socket_line("00000000:0044", "00000000:0000", "07", "00000000:00000000", 3001),
        ],
    );

    let table = ConnectionTableBuilder::new(dir.path()).build();
    assert!(table.values().any(|r| r.inode == 3001));
    assert_eq!(table.len(), 4);
}

#[test]
fn test_missing_proc_root_gives_empty_table() {
    let dir = tempdir().unwrap();
    let table = ConnectionTableBuilder::new(dir.path().join("absent")).build();
    assert!(table.is_empty());
}

#[test]
fn test_tcp_state_names() {
    assert_eq!(TcpState::from_hex("01").as_str(), "ESTABLISHED");
    assert_eq!(TcpState::from_hex("0A").as_str(), "LISTEN");
    assert_eq!(TcpState::from_hex("06").as_str(), "TIME_WAIT");
}
