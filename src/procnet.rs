//! Kernel connection-table reading and parsing.
//!
//! This module reads the per-protocol socket snapshots the kernel exposes
//! under `/proc/net` and parses them into structured [`SocketEntry`] records.
//! Each table is one header line followed by one row per socket, with the
//! local address and port encoded as colon-joined hexadecimal and the
//! connection state as a hexadecimal byte.
//!
//! Rows that fail to parse are skipped rather than aborting the whole
//! parse, so a malformed trailing row cannot block allocation of unrelated
//! ports. Failure to read a table file is fatal for that table.

use std::fmt;
use std::fs;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// TCP state value for `TIME_WAIT` in the kernel tables.
pub const TCP_TIME_WAIT: u8 = 6;

/// TCP state value for `CLOSE_WAIT` in the kernel tables.
pub const TCP_CLOSE_WAIT: u8 = 8;

/// Transport protocol selector for an allocation request.
///
/// # Examples
///
/// ```
/// use hostport::Protocol;
///
/// let proto: Protocol = "tcp".parse().unwrap();
/// assert_eq!(proto, Protocol::Tcp);
/// assert!("sctp".parse::<Protocol>().is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Transmission Control Protocol.
    Tcp,
    /// User Datagram Protocol.
    Udp,
}

impl Protocol {
    /// The IPv4 kernel table for this protocol.
    #[must_use]
    pub const fn v4_table(self) -> ProcNetTable {
        match self {
            Self::Tcp => ProcNetTable::Tcp,
            Self::Udp => ProcNetTable::Udp,
        }
    }

    /// The IPv6 kernel table for this protocol.
    ///
    /// A listener bound to `0.0.0.0:<port>` may surface only here using the
    /// wildcard encoding `:::<port>`, so both tables must be consulted.
    #[must_use]
    pub const fn v6_table(self) -> ProcNetTable {
        match self {
            Self::Tcp => ProcNetTable::Tcp6,
            Self::Udp => ProcNetTable::Udp6,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(Error::InvalidProtocol { value: s.into() }),
        }
    }
}

/// One of the four kernel connection tables under `/proc/net`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcNetTable {
    /// `/proc/net/tcp`
    Tcp,
    /// `/proc/net/tcp6`
    Tcp6,
    /// `/proc/net/udp`
    Udp,
    /// `/proc/net/udp6`
    Udp6,
}

impl ProcNetTable {
    /// The file name of this table under the proc net root.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Tcp => "tcp",
            Self::Tcp6 => "tcp6",
            Self::Udp => "udp",
            Self::Udp6 => "udp6",
        }
    }
}

impl fmt::Display for ProcNetTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file_name())
    }
}

/// One row of a kernel connection-table snapshot.
///
/// Constructed fresh on every read; never mutated afterwards. Multiple
/// snapshots may report the same port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketEntry {
    /// The socket's local address.
    pub local_ip: IpAddr,
    /// The socket's local port.
    pub local_port: u16,
    /// The kernel's connection state value (e.g. 6 = `TIME_WAIT`).
    pub state: u8,
}

impl SocketEntry {
    /// Returns `true` if this entry is bound to the IPv6 wildcard address
    /// (`::`).
    ///
    /// A wildcard listener occupies its port on every interface and must
    /// satisfy any bind-IP filter.
    #[must_use]
    pub fn is_wildcard(&self) -> bool {
        matches!(self.local_ip, IpAddr::V6(v6) if v6.is_unspecified())
    }
}

/// Reader for the kernel connection tables.
///
/// The proc net root is configurable so tests can point the reader at a
/// directory of fixture files instead of the live `/proc/net`.
///
/// # Examples
///
/// ```no_run
/// use hostport::{ProcNetReader, ProcNetTable};
///
/// let reader = ProcNetReader::new();
/// let entries = reader.entries(ProcNetTable::Tcp).unwrap();
/// for entry in entries {
///     println!("{}:{} state {}", entry.local_ip, entry.local_port, entry.state);
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ProcNetReader {
    root: PathBuf,
}

impl Default for ProcNetReader {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcNetReader {
    /// Creates a reader over the live `/proc/net`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/proc/net"),
        }
    }

    /// Creates a reader over an alternate proc net root.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::ProcNetReader;
    ///
    /// let reader = ProcNetReader::with_root("/tmp/fake-proc-net");
    /// ```
    #[must_use]
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Reads and parses one table, returning its entries.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the table file cannot be read (missing
    /// file, permission, transient unavailability). Rows that do not parse
    /// cleanly are skipped, not reported.
    pub fn entries(&self, table: ProcNetTable) -> Result<Vec<SocketEntry>> {
        let data = fs::read_to_string(self.root.join(table.file_name()))?;
        Ok(parse(&data))
    }
}

/// Parses connection-table text into entries, skipping malformed rows.
///
/// The first line is the table header. Parsing is deterministic: the same
/// text always yields the same entry sequence.
///
/// # Examples
///
/// ```
/// use hostport::procnet::parse;
///
/// let data = "  sl  local_address rem_address   st\n\
///             0: 0100007F:0CEA 00000000:0000 0A 00000000:00000000 00:00000000\n";
/// let entries = parse(data);
/// assert_eq!(entries.len(), 1);
/// assert_eq!(entries[0].local_port, 0x0CEA);
/// ```
#[must_use]
pub fn parse(data: &str) -> Vec<SocketEntry> {
    data.lines().skip(1).filter_map(parse_row).collect()
}

/// Parses a single table row. Returns `None` for anything malformed so the
/// caller can filter rather than abort.
fn parse_row(line: &str) -> Option<SocketEntry> {
    let mut fields = line.split_whitespace();
    let _slot = fields.next()?;
    let local = fields.next()?;
    let _remote = fields.next()?;
    let state_hex = fields.next()?;

    let (addr_hex, port_hex) = local.split_once(':')?;
    let local_ip = parse_hex_addr(addr_hex)?;
    let local_port = u16::from_str_radix(port_hex, 16).ok()?;
    let state = u8::from_str_radix(state_hex, 16).ok()?;

    Some(SocketEntry {
        local_ip,
        local_port,
        state,
    })
}

/// Decodes a kernel-format hexadecimal address.
///
/// IPv4 addresses are a single little-endian u32 (8 hex chars); IPv6
/// addresses are four little-endian u32 words (32 hex chars). The IPv6
/// all-zeros form decodes to the wildcard `::`.
fn parse_hex_addr(hex: &str) -> Option<IpAddr> {
    match hex.len() {
        8 => {
            let word = u32::from_str_radix(hex, 16).ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(word.to_le_bytes())))
        }
        32 => {
            let mut octets = [0u8; 16];
            for (i, chunk) in hex.as_bytes().chunks(8).enumerate() {
                let chunk = std::str::from_utf8(chunk).ok()?;
                let word = u32::from_str_radix(chunk, 16).ok()?;
                octets[i * 4..(i + 1) * 4].copy_from_slice(&word.to_le_bytes());
            }
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}


#[cfg(all(test, feature = "property-tests"))]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        // Parsing the same table text twice yields identical sequences.
        #[test]
        fn parse_idempotent(rows in proptest::collection::vec("[ -~]{0,80}", 0..20)) {
            let data = format!("header\n{}", rows.join("\n"));
            prop_assert_eq!(parse(&data), parse(&data));
        }

        // A well-formed IPv4 row always parses to its encoded port and state.
        #[test]
        fn well_formed_row_parses(addr in any::<u32>(), port in any::<u16>(), state in any::<u8>()) {
            let data = format!(
                "header\n   0: {addr:08X}:{port:04X} 00000000:0000 {state:02X} 00000000:00000000\n"
            );
            let entries = parse(&data);
            prop_assert_eq!(entries.len(), 1);
            prop_assert_eq!(entries[0].local_port, port);
            prop_assert_eq!(entries[0].state, state);
        }
    }
}
