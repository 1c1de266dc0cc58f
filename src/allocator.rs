//! Contiguous port-range allocation over the composed claim sources.
//!
//! The allocator merges every [`PortClaimSource`] into a used-port set,
//! then scans the range from a persistent cursor for the first free
//! contiguous block of the requested size. The cursor advances past every
//! granted block and never resets within the allocator's lifetime, which
//! reduces the chance of immediately re-offering a just-freed port. It is
//! a soft-fairness mechanism, not a hard allocation guarantee: the design
//! accepts the race between "free at observation time" and "free at bind
//! time" (no bindability validation, no cross-process locking).

use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

use log::debug;

use crate::claims::{NatRuleClaims, PortClaimSource, ProcNetClaims};
use crate::error::{Error, Result};
use crate::procnet::Protocol;
use crate::range::PortRange;

/// First port of the default ephemeral range.
///
/// The range matches Docker's own ephemeral publish range so that two
/// tools sharing a host draw from the same numbering scheme instead of
/// colliding across disjoint ones.
pub const ALLOCATE_START: u16 = 49153;

/// Last port of the default ephemeral range.
pub const ALLOCATE_END: u16 = 60999;

/// Allocator for free, contiguous host port ranges.
///
/// Claim sources are queried per call; the only retained state is the
/// in-memory cursor, which does not survive the allocator. The cursor is
/// guarded by a mutex so concurrent callers on a shared allocator cannot
/// interleave the read-modify-write, and separate allocator instances
/// never share cursors.
///
/// # Examples
///
/// ```no_run
/// use hostport::{PortAllocator, Protocol};
///
/// let allocator = PortAllocator::system();
/// let range = allocator.allocate(Protocol::Tcp, None, 2).unwrap();
/// assert_eq!(range.end() - range.start() + 1, 2);
/// ```
pub struct PortAllocator {
    sources: Vec<Box<dyn PortClaimSource>>,
    range: PortRange,
    // u32 so the cursor can legally sit one past a range ending at 65535.
    cursor: Mutex<u32>,
}

impl PortAllocator {
    /// Creates an allocator over the default ephemeral range with the
    /// production claim sources (kernel connection tables and NAT rules).
    #[must_use]
    pub fn system() -> Self {
        Self::new(vec![Box::new(ProcNetClaims::new()), Box::new(NatRuleClaims)])
    }

    /// Creates an allocator over the default ephemeral range with custom
    /// claim sources.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::{PortAllocator, Protocol, StaticClaims};
    ///
    /// let allocator = PortAllocator::new(vec![Box::new(StaticClaims::empty())]);
    /// let range = allocator.allocate(Protocol::Tcp, None, 1).unwrap();
    /// assert_eq!(range.start(), 49153);
    /// ```
    #[must_use]
    pub fn new(sources: Vec<Box<dyn PortClaimSource>>) -> Self {
        Self::with_range(
            PortRange::from_bounds(ALLOCATE_START, ALLOCATE_END),
            sources,
        )
    }

    /// Creates an allocator over a custom range.
    ///
    /// The cursor starts at the range's first port.
    #[must_use]
    pub fn with_range(range: PortRange, sources: Vec<Box<dyn PortClaimSource>>) -> Self {
        Self {
            sources,
            range,
            cursor: Mutex::new(u32::from(range.start())),
        }
    }

    /// Returns the range this allocator draws from.
    #[must_use]
    pub fn range(&self) -> PortRange {
        self.range
    }

    /// Allocates a free, contiguous block of `count` ports.
    ///
    /// A port counts as used if any claim source reports it, subject to
    /// the optional bind-IP filter (sources claiming ports host-wide, such
    /// as NAT rules, ignore the filter). The scan starts at the cursor,
    /// not at the range's first port, and does not wrap around within a
    /// call; once the cursor nears the top a caller may need to retry.
    ///
    /// On success the cursor advances to just past the granted block. On
    /// failure the cursor is untouched.
    ///
    /// # Errors
    ///
    /// - [`Error::UnsatisfiableCount`] if `count` is zero or exceeds the
    ///   range capacity. No claim source is consulted in this case.
    /// - [`Error::Io`] / [`Error::RuleListing`] if a claim source fails.
    /// - [`Error::RangeExhausted`] if no free block of `count` ports
    ///   exists between the cursor and the range end.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::{PortAllocator, Protocol, StaticClaims};
    /// use std::collections::HashSet;
    ///
    /// let used = StaticClaims::new(HashSet::from([49153]));
    /// let allocator = PortAllocator::new(vec![Box::new(used)]);
    ///
    /// let range = allocator.allocate(Protocol::Tcp, None, 1).unwrap();
    /// assert_eq!((range.start(), range.end()), (49154, 49154));
    /// ```
    pub fn allocate(
        &self,
        protocol: Protocol,
        bind_ip: Option<IpAddr>,
        count: u16,
    ) -> Result<PortRange> {
        if count == 0 || u32::from(count) > self.range.len() {
            return Err(Error::UnsatisfiableCount { count });
        }

        // Both reads are independent and read-only; they happen before the
        // cursor lock is taken so slow I/O never serializes other callers.
        let mut used = HashSet::new();
        for source in &self.sources {
            used.extend(source.claimed_ports(protocol, bind_ip)?);
        }
        debug!(
            "allocating {count} {protocol} port(s), {} port(s) in use",
            used.len()
        );

        let count = u32::from(count);
        let end = u32::from(self.range.end());

        let mut cursor = self.cursor.lock().unwrap_or_else(PoisonError::into_inner);
        let mut start = *cursor;
        while start + count - 1 <= end {
            let free = (start..start + count).all(|port| !used.contains(&(port as u16)));
            if free {
                *cursor = start + count;
                let granted = PortRange::from_bounds(start as u16, (start + count - 1) as u16);
                debug!("granted {granted}");
                return Ok(granted);
            }
            start += 1;
        }

        Err(Error::RangeExhausted {
            count: count as u16,
        })
    }
}


#[cfg(all(test, feature = "property-tests"))]
mod proptests {
    use super::*;
    use crate::claims::StaticClaims;
    use proptest::prelude::*;

    proptest! {
        // Every successful allocation is correctly sized, in bounds, and
        // disjoint from the used set it was computed against.
        #[test]
        fn allocation_contract(
            used in proptest::collection::hash_set(49153u16..=49300, 0..64),
            count in 1u16..8,
        ) {
            let range = PortRange::new(49153, 49400).unwrap();
            let allocator = PortAllocator::with_range(
                range,
                vec![Box::new(StaticClaims::new(used.clone()))],
            );

            if let Ok(granted) = allocator.allocate(Protocol::Tcp, None, count) {
                prop_assert_eq!(granted.len(), u32::from(count));
                prop_assert!(granted.start() >= range.start());
                prop_assert!(granted.end() <= range.end());
                for port in granted {
                    prop_assert!(!used.contains(&port));
                }
            }
        }

        // Sequential grants are strictly increasing and non-overlapping.
        #[test]
        fn cursor_monotonic(counts in proptest::collection::vec(1u16..6, 1..10)) {
            let allocator = PortAllocator::new(vec![Box::new(StaticClaims::empty())]);
            let mut previous_end = None;

            for count in counts {
                let granted = allocator.allocate(Protocol::Udp, None, count).unwrap();
                if let Some(end) = previous_end {
                    prop_assert!(granted.start() > end);
                }
                previous_end = Some(granted.end());
            }
        }
    }
}
