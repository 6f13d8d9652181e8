//! Segment and extent model.
//!
//! A map partitions the namespace `[0, NAMESPACE_END)` into non-empty
//! half-open extents, each carrying an opaque 64-bit value.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest valid offset in the namespace.
pub const BINDEX_MAX: u64 = u64::MAX - 1;

/// End of the namespace. Never a valid offset; the last segment of every
/// map ends here.
pub const NAMESPACE_END: u64 = BINDEX_MAX + 1;

/// 128-bit map identifier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Prefix(pub u128);

impl Prefix {
    /// Build a prefix from its high and low halves.
    pub const fn from_parts(hi: u64, lo: u64) -> Self {
        Self(((hi as u128) << 64) | lo as u128)
    }

    /// High 64 bits.
    pub const fn hi(self) -> u64 {
        (self.0 >> 64) as u64
    }

    /// Low 64 bits.
    pub const fn lo(self) -> u64 {
        self.0 as u64
    }

    /// Following prefix in store order, if any.
    pub const fn succ(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }
}

impl From<u128> for Prefix {
    fn from(v: u128) -> Self {
        Self(v)
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}:{:016x}", self.hi(), self.lo())
    }
}

/// Half-open range `[start, end)` of the namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Extent {
    /// First offset (inclusive).
    pub start: u64,
    /// End offset (exclusive).
    pub end: u64,
}

impl Extent {
    /// The whole namespace.
    pub const FULL: Self = Self::new(0, NAMESPACE_END);

    /// Create an extent.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of offsets covered.
    pub const fn length(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// True if the extent covers nothing.
    pub const fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// True if `offset` lies in the extent.
    pub const fn contains(&self, offset: u64) -> bool {
        self.start <= offset && offset < self.end
    }

    /// Common part of two extents (empty if they do not overlap).
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        Self::new(start, end.max(start))
    }
}

impl fmt::Display for Extent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.start, self.end)
    }
}

/// One segment of a map.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Segment {
    /// Map the segment belongs to.
    pub prefix: Prefix,
    /// Covered range.
    pub ext: Extent,
    /// Opaque value.
    pub value: u64,
}

impl Segment {
    /// Create a segment.
    pub const fn new(prefix: Prefix, ext: Extent, value: u64) -> Self {
        Self { prefix, ext, value }
    }

    /// True if the segment starts at offset 0.
    pub const fn is_first(&self) -> bool {
        self.ext.start == 0
    }

    /// True if the segment ends at `NAMESPACE_END`.
    pub const fn is_last(&self) -> bool {
        self.ext.end == NAMESPACE_END
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} = {:#x}", self.prefix, self.ext, self.value)
    }
}

/// Check that `segs` partition the namespace: non-empty, contiguous, from
/// 0 to `NAMESPACE_END`. Returns a description of the first violation.
pub fn check_partition(segs: &[Segment]) -> Result<(), String> {
    let (Some(first), Some(last)) = (segs.first(), segs.last()) else {
        return Err("map has no segments".to_string());
    };
    if first.ext.start != 0 {
        return Err(format!("first segment {} does not start at 0", first.ext));
    }
    if last.ext.end != NAMESPACE_END {
        return Err(format!("last segment {} does not reach the end", last.ext));
    }
    for seg in segs {
        if seg.ext.is_empty() {
            return Err(format!("empty segment {}", seg.ext));
        }
    }
    for pair in segs.windows(2) {
        if pair[0].ext.end != pair[1].ext.start {
            return Err(format!("gap or overlap between {} and {}", pair[0].ext, pair[1].ext));
        }
    }
    Ok(())
}
