//! Process-annotated TCP/UDP connection tables.
//!
//! A [`ConnectionTableBuilder`] reads the four kernel socket tables, maps
//! every socket inode to the process holding it and returns one record per
//! distinct 5-tuple. Nothing is cached between builds.

pub mod ownership;
pub mod proc_net;

pub use ownership::{build_socket_ownership, socket_inode, SocketOwner, SocketOwnership};
pub use proc_net::{
    decode_address, parse_socket_line, parse_socket_table, read_socket_table, ConnectionState,
    IpFamily, Protocol, SocketEntry, SocketTable, TcpState, SOCKET_TABLES,
};

use crate::process::read_process_exe;
use ahash::AHashMap as HashMap;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Connections keyed by [`connection_key`], ordered for stable output.
pub type ConnectionTable = BTreeMap<String, ConnectionRecord>;

/// One socket joined with its owning process.
///
/// `sent_bytes` and `received_bytes` are the kernel's current transmit and
/// receive *queue* sizes for the socket, not cumulative transfer totals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionRecord {
    #[serde(serialize_with = "dash_if_none")]
    pub pid: Option<u32>,
    #[serde(serialize_with = "dash_if_none")]
    pub process: Option<String>,
    pub protocol: Protocol,
    pub state: ConnectionState,
    #[serde(serialize_with = "display")]
    pub local_address: SocketAddr,
    #[serde(serialize_with = "display")]
    pub foreign_address: SocketAddr,
    pub sent_bytes: u64,
    pub received_bytes: u64,
    pub inode: u64,
    #[serde(serialize_with = "dash_if_none")]
    pub process_path: Option<String>,
}

fn dash_if_none<T: Serialize, S: Serializer>(value: &Option<T>, s: S) -> Result<S::Ok, S::Error> {
    match value {
        Some(v) => v.serialize(s),
        None => s.serialize_str("-"),
    }
}

fn display<S: Serializer>(addr: &SocketAddr, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(addr)
}

/// Stable identity of a connection: hex of the first 128 bits of the
/// SHA-256 over `protocol|local ip|local port|remote ip|remote port`.
pub fn connection_key(protocol: Protocol, local: &SocketAddr, remote: &SocketAddr) -> String {
    let tuple = format!(
        "{}|{}|{}|{}|{}",
        protocol,
        local.ip(),
        local.port(),
        remote.ip(),
        remote.port()
    );
    let digest = Sha256::digest(tuple.as_bytes());

    let mut key = String::with_capacity(32);
    for byte in &digest[..16] {
        let _ = write!(key, "{:02x}", byte);
    }
    key
}

/// Builds a fresh [`ConnectionTable`] from a proc root on every call.
#[derive(Debug, Clone)]
pub struct ConnectionTableBuilder {
    proc_root: PathBuf,
}

impl ConnectionTableBuilder {
    pub fn new(proc_root: impl Into<PathBuf>) -> Self {
        Self {
            proc_root: proc_root.into(),
        }
    }

    pub fn proc_root(&self) -> &Path {
        &self.proc_root
    }

    /// Reads, joins and deduplicates all socket tables.
    ///
    /// A table that cannot be read is logged and omitted; the others still
    /// contribute. Within one build the last row with a given 5-tuple wins.
    pub fn build(&self) -> ConnectionTable {
        let ownership = build_socket_ownership(&self.proc_root);
        let mut exe_paths: HashMap<u32, Option<String>> = HashMap::new();
        let mut table = ConnectionTable::new();

        for socket_table in &SOCKET_TABLES {
            let entries = match read_socket_table(&self.proc_root, socket_table) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!("Omitting {} connections: {}", socket_table.file_name, e);
                    continue;
                }
            };
            debug!("Parsed {} {} sockets", entries.len(), socket_table.file_name);

            for entry in entries {
                let owner = ownership.get(&entry.inode);
                let process_path = owner.and_then(|o| {
                    exe_paths
                        .entry(o.pid)
                        .or_insert_with(|| {
                            read_process_exe(&self.proc_root.join(o.pid.to_string()))
                        })
                        .clone()
                });

                let key = connection_key(entry.protocol, &entry.local, &entry.remote);
                table.insert(
                    key,
                    ConnectionRecord {
                        pid: owner.map(|o| o.pid),
                        process: owner.map(|o| o.name.clone()),
                        protocol: entry.protocol,
                        state: entry.state,
                        local_address: entry.local,
                        foreign_address: entry.remote,
                        sent_bytes: entry.tx_queue,
                        received_bytes: entry.rx_queue,
                        inode: entry.inode,
                        process_path,
                    },
                );
            }
        }

        table
    }
}
