//! Parser for the kernel socket tables under `<proc_root>/net`.
//!
//! Each data line looks like:
//!
//! ```text
//!   sl  local_address rem_address   st tx_queue:rx_queue tr:tm->when retrnsmt   uid  timeout inode
//!    0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 31337
//! ```

use crate::error::{CollectorError, CollectorResult};
use serde::{Serialize, Serializer};
use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Protocol {
    #[serde(rename = "TCP")]
    Tcp,
    #[serde(rename = "UDP")]
    Udp,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Tcp => "TCP",
            Protocol::Udp => "UDP",
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpFamily {
    V4,
    V6,
}

/// One of the four socket tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketTable {
    pub protocol: Protocol,
    pub family: IpFamily,
    pub file_name: &'static str,
}

pub const SOCKET_TABLES: [SocketTable; 4] = [
    SocketTable {
        protocol: Protocol::Tcp,
        family: IpFamily::V4,
        file_name: "tcp",
    },
    SocketTable {
        protocol: Protocol::Tcp,
        family: IpFamily::V6,
        file_name: "tcp6",
    },
    SocketTable {
        protocol: Protocol::Udp,
        family: IpFamily::V4,
        file_name: "udp",
    },
    SocketTable {
        protocol: Protocol::Udp,
        family: IpFamily::V6,
        file_name: "udp6",
    },
];

/// TCP connection state as encoded in the `st` column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
    /// Any code outside the table, kept verbatim.
    Raw(String),
}

impl TcpState {
    pub fn from_hex(code: &str) -> Self {
        match code.to_ascii_uppercase().as_str() {
            "01" => TcpState::Established,
            "02" => TcpState::SynSent,
            "03" => TcpState::SynRecv,
            "04" => TcpState::FinWait1,
            "05" => TcpState::FinWait2,
            "06" => TcpState::TimeWait,
            "07" => TcpState::Close,
            "08" => TcpState::CloseWait,
            "09" => TcpState::LastAck,
            "0A" => TcpState::Listen,
            "0B" => TcpState::Closing,
            _ => TcpState::Raw(code.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TcpState::Established => "ESTABLISHED",
            TcpState::SynSent => "SYN_SENT",
            TcpState::SynRecv => "SYN_RECV",
            TcpState::FinWait1 => "FIN_WAIT1",
            TcpState::FinWait2 => "FIN_WAIT2",
            TcpState::TimeWait => "TIME_WAIT",
            TcpState::Close => "CLOSE",
            TcpState::CloseWait => "CLOSE_WAIT",
            TcpState::LastAck => "LAST_ACK",
            TcpState::Listen => "LISTEN",
            TcpState::Closing => "CLOSING",
            TcpState::Raw(code) => code,
        }
    }
}

/// State column of a connection record. UDP sockets have no state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Tcp(TcpState),
    NotApplicable,
}

impl ConnectionState {
    pub fn as_str(&self) -> &str {
        match self {
            ConnectionState::Tcp(state) => state.as_str(),
            ConnectionState::NotApplicable => "N/A",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ConnectionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One parsed table row, before ownership is attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketEntry {
    pub protocol: Protocol,
    pub local: SocketAddr,
    pub remote: SocketAddr,
    pub state: ConnectionState,
    pub tx_queue: u64,
    pub rx_queue: u64,
    pub inode: u64,
}

/// Decodes a hex `ADDR:PORT` pair.
///
/// IPv4 addresses are a little-endian u32 in 8 hex chars. IPv6 addresses are
/// 32 hex chars taken as the 16 address bytes in order. Ports are plain hex.
pub fn decode_address(addr_hex: &str, port_hex: &str, family: IpFamily) -> CollectorResult<SocketAddr> {
    let ip = match family {
        IpFamily::V4 => {
            if addr_hex.len() != 8 {
                return Err(CollectorError::parse("IPv4 address", addr_hex));
            }
            let raw = u32::from_str_radix(addr_hex, 16)
                .map_err(|_| CollectorError::parse("IPv4 address", addr_hex))?;
            IpAddr::V4(Ipv4Addr::from(raw.to_le_bytes()))
        }
        IpFamily::V6 => {
            if addr_hex.len() != 32 || !addr_hex.is_ascii() {
                return Err(CollectorError::parse("IPv6 address", addr_hex));
            }
            let mut bytes = [0u8; 16];
            for (i, byte) in bytes.iter_mut().enumerate() {
                *byte = u8::from_str_radix(&addr_hex[i * 2..i * 2 + 2], 16)
                    .map_err(|_| CollectorError::parse("IPv6 address", addr_hex))?;
            }
            IpAddr::V6(Ipv6Addr::from(bytes))
        }
    };

    if port_hex.len() != 4 {
        return Err(CollectorError::parse("port", port_hex));
    }
    let port =
        u16::from_str_radix(port_hex, 16).map_err(|_| CollectorError::parse("port", port_hex))?;

    Ok(SocketAddr::new(ip, port))
}

fn decode_endpoint(field: &str, family: IpFamily) -> CollectorResult<SocketAddr> {
    let (addr, port) = field
        .split_once(':')
        .ok_or_else(|| CollectorError::parse("endpoint", field))?;
    decode_address(addr, port, family)
}

fn decode_queues(field: &str) -> CollectorResult<(u64, u64)> {
    let (tx, rx) = field
        .split_once(':')
        .ok_or_else(|| CollectorError::parse("queue column", field))?;
    let tx = u64::from_str_radix(tx, 16).map_err(|_| CollectorError::parse("tx_queue", tx))?;
    let rx = u64::from_str_radix(rx, 16).map_err(|_| CollectorError::parse("rx_queue", rx))?;
    Ok((tx, rx))
}

/// Parses one data line of `table`.
pub fn parse_socket_line(line: &str, table: &SocketTable) -> CollectorResult<SocketEntry> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 10 {
        return Err(CollectorError::parse(
            "socket line",
            format!("expected at least 10 fields, got {}", fields.len()),
        ));
    }

    let local = decode_endpoint(fields[1], table.family)?;
    let remote = decode_endpoint(fields[2], table.family)?;
    let state = match table.protocol {
        Protocol::Tcp => ConnectionState::Tcp(TcpState::from_hex(fields[3])),
        Protocol::Udp => ConnectionState::NotApplicable,
    };
    let (tx_queue, rx_queue) = decode_queues(fields[4])?;
    let inode = fields[9]
        .parse::<u64>()
        .map_err(|_| CollectorError::parse("inode", fields[9]))?;

    Ok(SocketEntry {
        protocol: table.protocol,
        local,
        remote,
        state,
        tx_queue,
        rx_queue,
        inode,
    })
}

/// Parses a whole table; the header line and malformed lines are skipped.
pub fn parse_socket_table(content: &str, table: &SocketTable) -> Vec<SocketEntry> {
    content
        .lines()
        .skip(1)
        .filter(|l| !l.trim().is_empty())
        .filter_map(|line| match parse_socket_line(line, table) {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!("Skipping {} line: {}", table.file_name, e);
                None
            }
        })
        .collect()
}

pub fn read_socket_table(proc_root: &Path, table: &SocketTable) -> CollectorResult<Vec<SocketEntry>> {
    let path = proc_root.join("net").join(table.file_name);
    let content = fs::read_to_string(&path).map_err(|e| CollectorError::io(&path, e))?;
    Ok(parse_socket_table(&content, table))
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "  sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode";

    #[test]
    fn test_decode_ipv4_loopback() {
        let addr = decode_address("0100007F", "1F90", IpFamily::V4).unwrap();
        assert_eq!(addr.to_string(), "127.0.0.1:8080");
    }

    #[test]
    fn test_decode_ipv6_loopback() {
        let addr =
            decode_address("00000000000000000000000000000001", "1F90", IpFamily::V6).unwrap();
        assert_eq!(addr.to_string(), "[::1]:8080");
    }

    #[test]
    fn test_decode_rejects_bad_lengths() {
        assert!(decode_address("0100007", "1F90", IpFamily::V4).is_err());
        assert!(decode_address("0100007F", "", IpFamily::V4).is_err());
        assert!(decode_address("0100007F", "XYZ", IpFamily::V4).is_err());
        assert!(decode_address("0001", "0050", IpFamily::V6).is_err());
    }

    #[test]
    fn test_decode_requires_four_digit_port() {
        assert!(decode_address("0100007F", "50", IpFamily::V4).is_err());
        assert!(decode_address("0100007F", "01F90", IpFamily::V4).is_err());
        assert_eq!(
            decode_address("0100007F", "0050", IpFamily::V4).unwrap().to_string(),
            "127.0.0.1:80"
        );

        let content = format!(
            "{}\n{}\n{}\n",
            HEADER,
            "   0: 0100007F:50 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 200 1",
            "   1: 0100007F:0050 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 201 1",
        );
        let entries = parse_socket_table(&content, &SOCKET_TABLES[0]);
        let inodes: Vec<u64> = entries.iter().map(|e| e.inode).collect();
        assert_eq!(inodes, vec![201]);
    }

    #[test]
    fn test_tcp_state_codes() {
        assert_eq!(TcpState::from_hex("01"), TcpState::Established);
        assert_eq!(TcpState::from_hex("0A").as_str(), "LISTEN");
        assert_eq!(TcpState::from_hex("0a").as_str(), "LISTEN");
        assert_eq!(TcpState::from_hex("0C"), TcpState::Raw("0C".to_string()));
    }

    #[test]
    fn test_parse_tcp_line() {
        let line = "   0: 0100007F:1F90 0100007F:C350 01 0000000A:00000014 00:00000000 00000000  1000        0 31337 1 0000000000000000 20 4 30 10 -1";
        let entry = parse_socket_line(line, &SOCKET_TABLES[0]).unwrap();
        assert_eq!(entry.protocol, Protocol::Tcp);
        assert_eq!(entry.local.to_string(), "127.0.0.1:8080");
        assert_eq!(entry.remote.to_string(), "127.0.0.1:50000");
        assert_eq!(entry.state.as_str(), "ESTABLISHED");
        assert_eq!(entry.tx_queue, 10);
        assert_eq!(entry.rx_queue, 20);
        assert_eq!(entry.inode, 31337);
    }

    #[test]
    fn test_udp_state_is_not_applicable() {
        let line = "  10: 00000000:0044 00000000:0000 07 00000000:00000000 00:00000000 00000000     0        0 1234 2 0000000000000000 0";
        let entry = parse_socket_line(line, &SOCKET_TABLES[2]).unwrap();
        assert_eq!(entry.state, ConnectionState::NotApplicable);
        assert_eq!(entry.state.to_string(), "N/A");
    }

    #[test]
    fn test_parse_table_skips_malformed_lines() {
        let content = format!(
            "{}\n{}\n{}\n{}\n",
            HEADER,
            "   0: 0100007F:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 100 1",
            "   1: 0100007:1F90 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 101 1",
            "   2: 0100007F:0016 00000000:0000 0A 00000000:00000000 00:00000000 00000000  1000        0 102 1",
        );
        let entries = parse_socket_table(&content, &SOCKET_TABLES[0]);
        let inodes: Vec<u64> = entries.iter().map(|e| e.inode).collect();
        assert_eq!(inodes, vec![100, 102]);
    }

    #[test]
    fn test_parse_table_short_line() {
        let content = format!("{}\n   0: 0100007F:1F90 00000000:0000 0A\n", HEADER);
        assert!(parse_socket_table(&content, &SOCKET_TABLES[0]).is_empty());
    }
}
