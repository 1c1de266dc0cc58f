//! Inclusive port range type used for allocation results and bounds.
//!
//! This module provides the [`PortRange`] type with validation, iteration,
//! and display support.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// An inclusive range of ports.
///
/// Both ends are part of the range, so a range covering a single port has
/// `start == end` and length 1.
///
/// # Examples
///
/// ```
/// use hostport::PortRange;
///
/// let range = PortRange::new(49153, 60999).unwrap();
/// assert_eq!(range.len(), 11847);
/// assert!(range.contains(50000));
/// assert!(!range.contains(61000));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortRange {
    start: u16,
    end: u16,
}

impl PortRange {
    /// Creates a new inclusive port range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPortRange`] if `end` is less than `start`.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::PortRange;
    ///
    /// assert!(PortRange::new(49153, 60999).is_ok());
    /// assert!(PortRange::new(60999, 49153).is_err());
    /// ```
    pub fn new(start: u16, end: u16) -> Result<Self, Error> {
        if end < start {
            Err(Error::InvalidPortRange {
                start,
                end,
                reason: "end must be greater than or equal to start".into(),
            })
        } else {
            Ok(Self { start, end })
        }
    }

    /// Constructs a range from bounds known to be ordered.
    pub(crate) const fn from_bounds(start: u16, end: u16) -> Self {
        Self { start, end }
    }

    /// Returns the first port in the range.
    #[must_use]
    pub const fn start(&self) -> u16 {
        self.start
    }

    /// Returns the last port in the range.
    #[must_use]
    pub const fn end(&self) -> u16 {
        self.end
    }

    /// Returns `true` if the range contains the given port.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::PortRange;
    ///
    /// let range = PortRange::new(49153, 49155).unwrap();
    /// assert!(range.contains(49153));
    /// assert!(range.contains(49155));
    /// assert!(!range.contains(49156));
    /// ```
    #[must_use]
    pub const fn contains(&self, port: u16) -> bool {
        port >= self.start && port <= self.end
    }

    /// Returns the number of ports in the range (inclusive).
    ///
    /// The result is a `u32` because a range spanning all of `0..=65535`
    /// holds 65536 ports, one more than `u16` can represent.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::PortRange;
    ///
    /// let range = PortRange::new(49153, 49153).unwrap();
    /// assert_eq!(range.len(), 1);
    /// ```
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end as u32 - self.start as u32 + 1
    }

    /// Returns `true` if the range contains no ports.
    ///
    /// Note: this is never true for a validated `PortRange` since the
    /// constructor requires `end >= start`, but the method is provided for
    /// completeness.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Returns an iterator over all ports in this range.
    ///
    /// # Examples
    ///
    /// ```
    /// use hostport::PortRange;
    ///
    /// let range = PortRange::new(49153, 49155).unwrap();
    /// let ports: Vec<u16> = range.iter().collect();
    /// assert_eq!(ports, vec![49153, 49154, 49155]);
    /// ```
    #[must_use]
    pub fn iter(self) -> PortRangeIter {
        PortRangeIter {
            range: self,
            current: u32::from(self.start),
        }
    }
}

impl fmt::Display for PortRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl IntoIterator for PortRange {
    type Item = u16;
    type IntoIter = PortRangeIter;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over ports in a [`PortRange`].
#[derive(Debug)]
pub struct PortRangeIter {
    range: PortRange,
    // u32 so that a range ending at 65535 terminates without wrapping.
    current: u32,
}

impl Iterator for PortRangeIter {
    type Item = u16;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current <= u32::from(self.range.end) {
            let port = self.current as u16;
            self.current += 1;
            Some(port)
        } else {
            None
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.current <= u32::from(self.range.end) {
            let remaining = (u32::from(self.range.end) - self.current + 1) as usize;
            (remaining, Some(remaining))
        } else {
            (0, Some(0))
        }
    }
}

impl ExactSizeIterator for PortRangeIter {
    fn len(&self) -> usize {
        self.size_hint().0
    }
}
