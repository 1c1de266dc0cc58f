//! Port-claim providers merged into the allocator's used-port set.
//!
//! Two independent and sometimes-stale sources of truth decide whether a
//! port is free: the kernel connection tables and the NAT rule table. Each
//! source implements [`PortClaimSource`], and the allocator composes an
//! arbitrary list of them. Tests inject [`StaticClaims`] instead of real
//! kernel or firewall access.

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};

use log::trace;

use crate::error::Result;
use crate::nat;
use crate::procnet::{ProcNetReader, Protocol, TCP_CLOSE_WAIT, TCP_TIME_WAIT};

/// A source of ports that must be treated as claimed.
///
/// Implementations return the set of ports they consider in use for the
/// given protocol, optionally filtered to a specific bind address.
pub trait PortClaimSource: Send + Sync {
    /// Returns the ports this source considers claimed.
    ///
    /// `bind_ip` of `None` means "no filter"; sources that claim ports
    /// host-wide may ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying kernel table or external tool
    /// cannot be consulted.
    fn claimed_ports(&self, protocol: Protocol, bind_ip: Option<IpAddr>) -> Result<HashSet<u16>>;
}

/// Claims derived from the kernel connection tables.
///
/// For the requested protocol both the IPv4 table and its IPv6 twin are
/// read and unioned: a listener bound to `0.0.0.0:<port>` may surface only
/// under the IPv6 table as `:::<port>`.
///
/// TCP entries in `TIME_WAIT` or `CLOSE_WAIT` are not counted. The
/// originating process has exited in those states (proxy processes
/// relaying traffic between network namespaces leave sockets there for
/// 10-20 seconds after the real consumer is gone) and the port is
/// practically available for immediate reuse. UDP has no such transitional
/// states and is never filtered by state.
#[derive(Debug, Clone, Default)]
pub struct ProcNetClaims {
    reader: ProcNetReader,
}

impl ProcNetClaims {
    /// Creates a claim source over the live `/proc/net`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            reader: ProcNetReader::new(),
        }
    }

    /// Creates a claim source over a custom reader, typically one rooted
    /// at a directory of fixture files.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::{ProcNetClaims, ProcNetReader};
    ///
    /// let claims = ProcNetClaims::with_reader(ProcNetReader::with_root("/tmp/fixtures"));
    /// ```
    #[must_use]
    pub fn with_reader(reader: ProcNetReader) -> Self {
        Self { reader }
    }
}

impl PortClaimSource for ProcNetClaims {
    fn claimed_ports(&self, protocol: Protocol, bind_ip: Option<IpAddr>) -> Result<HashSet<u16>> {
        let mut entries = self.reader.entries(protocol.v4_table())?;
        entries.extend(self.reader.entries(protocol.v6_table())?);

        let mut ports = HashSet::new();
        for entry in entries {
            // The IPv6 wildcard occupies the port on every interface, so it
            // matches any requested bind address.
            if let Some(ip) = bind_ip {
                if !entry.is_wildcard() && entry.local_ip != ip {
                    continue;
                }
            }
            if protocol == Protocol::Tcp
                && (entry.state == TCP_TIME_WAIT || entry.state == TCP_CLOSE_WAIT)
            {
                trace!(
                    "skipping port {} in transitional state {}",
                    entry.local_port,
                    entry.state
                );
                continue;
            }
            ports.insert(entry.local_port);
        }
        Ok(ports)
    }
}

/// Claims derived from DNAT/publish rules in the NAT table.
///
/// A forwarding rule claims its destination port host-wide, so neither the
/// protocol nor the bind-IP filter applies here.
#[derive(Debug, Clone, Copy, Default)]
pub struct NatRuleClaims;

impl PortClaimSource for NatRuleClaims {
    fn claimed_ports(&self, _protocol: Protocol, _bind_ip: Option<IpAddr>) -> Result<HashSet<u16>> {
        let rules = nat::list_nat_rules()?;
        Ok(nat::destination_ports(&rules).into_iter().collect())
    }
}

/// A claim source with a fixed port set, for tests and embedders.
///
/// Records how many times it was queried so callers can assert that
/// validation failures perform no lookups.
///
/// # Examples
///
/// ```
/// use std::collections::HashSet;
/// use hostport::{PortClaimSource, Protocol, StaticClaims};
///
/// let claims = StaticClaims::new(HashSet::from([49153, 49154]));
/// let ports = claims.claimed_ports(Protocol::Tcp, None).unwrap();
/// assert!(ports.contains(&49153));
/// assert_eq!(claims.call_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct StaticClaims {
    ports: HashSet<u16>,
    calls: AtomicUsize,
}

impl StaticClaims {
    /// Creates a source claiming exactly the given ports.
    #[must_use]
    pub fn new(ports: HashSet<u16>) -> Self {
        Self {
            ports,
            calls: AtomicUsize::new(0),
        }
    }

    /// Creates a source claiming no ports.
    #[must_use]
    pub fn empty() -> Self {
        Self::new(HashSet::new())
    }

    /// The number of times [`PortClaimSource::claimed_ports`] was invoked.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PortClaimSource for StaticClaims {
    fn claimed_ports(&self, _protocol: Protocol, _bind_ip: Option<IpAddr>) -> Result<HashSet<u16>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.ports.clone())
    }
}
