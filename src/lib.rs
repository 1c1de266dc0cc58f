#![deny(missing_docs, unsafe_code)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! # hostport
//!
//! A library for allocating host TCP/UDP port ranges for container port
//! publishing.
//!
//! Allocation draws from a Docker-compatible ephemeral range and treats a
//! port as used if it appears in the kernel connection tables (excluding
//! transitional TCP states) or is claimed by a NAT forwarding rule that
//! has not yet produced a live socket. A persistent in-process cursor
//! spreads successive allocations forward instead of always probing from
//! the bottom of the range.
//!
//! ## Core Types
//!
//! - [`PortAllocator`]: the allocation entry point
//! - [`PortRange`]: validated inclusive port ranges
//! - [`PortClaimSource`]: pluggable used-port providers
//! - [`Error`] and [`Result`]: error handling types
//!
//! ## Examples
//!
//! ```no_run
//! use hostport::{PortAllocator, Protocol};
//!
//! let allocator = PortAllocator::system();
//! let range = allocator.allocate(Protocol::Tcp, None, 3)?;
//! println!("publish on {range}");
//! # Ok::<(), hostport::Error>(())
//! ```
//!
//! Tests and embedders can swap the kernel and firewall lookups for fixed
//! sets:
//!
//! ```
//! use std::collections::HashSet;
//! use hostport::{PortAllocator, Protocol, StaticClaims};
//!
//! let used = StaticClaims::new(HashSet::from([49153]));
//! let allocator = PortAllocator::new(vec![Box::new(used)]);
//! let range = allocator.allocate(Protocol::Udp, None, 1).unwrap();
//! assert_eq!(range.start(), 49154);
//! ```

pub mod allocator;
pub mod claims;
pub mod error;
pub mod nat;
pub mod procnet;
pub mod range;

// Re-export key types at crate root for convenience
pub use allocator::{PortAllocator, ALLOCATE_END, ALLOCATE_START};
pub use claims::{NatRuleClaims, PortClaimSource, ProcNetClaims, StaticClaims};
pub use error::{Error, Result};
pub use procnet::{ProcNetReader, ProcNetTable, Protocol, SocketEntry};
pub use range::PortRange;
