//! Transaction credit accounting.
//!
//! A credit is a pair `(records, bytes)`: the number of records a
//! transaction may touch and the number of bytes it may write. Callers
//! accumulate worst-case credits for the operations they intend to run,
//! prepare the transaction with the sum, and the store charges the actual
//! cost of every write against it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul};

/// Resource reservation for a transaction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TxCredit {
    /// Number of records.
    pub records: u64,
    /// Number of bytes.
    pub bytes: u64,
}

impl TxCredit {
    /// Empty credit.
    pub const ZERO: Self = Self::new(0, 0);

    /// Create a credit of `records` records and `bytes` bytes.
    pub const fn new(records: u64, bytes: u64) -> Self {
        Self { records, bytes }
    }

    /// Add `other` to this credit.
    pub fn accumulate(&mut self, other: &Self) {
        *self += *other;
    }

    /// Multiply-accumulate: add `other × nr` to this credit.
    pub fn mac(&mut self, other: &Self, nr: u64) {
        *self += *other * nr;
    }

    /// True if this credit fits into `capacity` on both axes.
    pub const fn fits_in(&self, capacity: &Self) -> bool {
        self.records <= capacity.records && self.bytes <= capacity.bytes
    }

    /// Component-wise saturating difference.
    #[must_use]
    pub const fn saturating_sub(&self, other: &Self) -> Self {
        Self {
            records: self.records.saturating_sub(other.records),
            bytes: self.bytes.saturating_sub(other.bytes),
        }
    }

    /// True if both components are zero.
    pub const fn is_zero(&self) -> bool {
        self.records == 0 && self.bytes == 0
    }
}

impl Add for TxCredit {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            records: self.records.saturating_add(rhs.records),
            bytes: self.bytes.saturating_add(rhs.bytes),
        }
    }
}

impl AddAssign for TxCredit {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Mul<u64> for TxCredit {
    type Output = Self;

    fn mul(self, nr: u64) -> Self {
        Self {
            records: self.records.saturating_mul(nr),
            bytes: self.bytes.saturating_mul(nr),
        }
    }
}

impl fmt::Display for TxCredit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.records, self.bytes)
    }
}
