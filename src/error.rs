//! Error types for the hostport library.
//!
//! This module provides the error hierarchy for all operations in the
//! hostport library, using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Result type alias for operations that may fail with a hostport error.
///
/// # Examples
///
/// ```
/// use hostport::{Error, Result};
///
/// fn example_operation() -> Result<u16> {
///     Ok(49153)
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for the hostport library.
///
/// This enum encompasses all failure conditions that can occur while
/// reading the kernel connection tables, listing NAT rules, or searching
/// for a free port block.
#[derive(Debug, Error)]
pub enum Error {
    /// A kernel connection table could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The NAT rule listing could not be invoked or produced no usable output.
    #[error("rule table listing failed: {details}")]
    RuleListing {
        /// What went wrong invoking or reading the listing.
        details: String,
    },

    /// The requested port count can never be satisfied by the range.
    #[error("cannot allocate {count} port(s)")]
    UnsatisfiableCount {
        /// The requested number of contiguous ports.
        count: u16,
    },

    /// No free contiguous block of the requested size exists from the
    /// cursor to the top of the range.
    #[error("not enough free ports for {count} contiguous port(s)")]
    RangeExhausted {
        /// The requested number of contiguous ports.
        count: u16,
    },

    /// An unrecognized protocol selector was provided.
    #[error("invalid protocol '{value}': expected tcp or udp")]
    InvalidProtocol {
        /// The selector string that failed to parse.
        value: String,
    },

    /// An invalid port range was specified.
    #[error("invalid port range {start}-{end}: {reason}")]
    InvalidPortRange {
        /// The first port of the range.
        start: u16,
        /// The last port of the range.
        end: u16,
        /// The reason the range is invalid.
        reason: String,
    },
}

impl Error {
    /// Check if the error indicates a request that could never succeed,
    /// as opposed to a transient shortage or environment failure.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::Error;
    ///
    /// let err = Error::UnsatisfiableCount { count: 0 };
    /// assert!(err.is_unsatisfiable());
    ///
    /// let err = Error::RangeExhausted { count: 4 };
    /// assert!(!err.is_unsatisfiable());
    /// ```
    #[must_use]
    pub fn is_unsatisfiable(&self) -> bool {
        matches!(self, Self::UnsatisfiableCount { .. })
    }

    /// Check if the error indicates a (possibly transient) shortage of
    /// free ports rather than a malformed request.
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::RangeExhausted { .. })
    }
}
