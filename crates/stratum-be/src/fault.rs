//! Fault injection strategies.
//!
//! A [`MemStore`](crate::MemStore) consults its injector before every
//! primitive. Production code uses [`NoFaults`]; tests pass a strategy such
//! as [`FailAfter`] to make a write (or a read) fail with
//! [`BeError::ResourceExhausted`](crate::BeError::ResourceExhausted) at a
//! chosen point.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Store primitive about to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    /// Table creation.
    Create,
    /// Table destruction.
    Destroy,
    /// Record insertion.
    Insert,
    /// Record update.
    Update,
    /// Record deletion.
    Delete,
    /// Point or range lookup.
    Read,
}

impl FaultPoint {
    /// True for primitives that modify the table.
    pub const fn is_write(self) -> bool {
        !matches!(self, Self::Read)
    }
}

impl fmt::Display for FaultPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Read => "read",
        };
        f.write_str(name)
    }
}

/// Decides whether a primitive should fail.
pub trait FaultInjector: Send + Sync + fmt::Debug {
    /// Return true to make the primitive at `point` fail.
    fn should_fail(&self, point: FaultPoint) -> bool;
}

/// Injector that never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFaults;

impl FaultInjector for NoFaults {
    fn should_fail(&self, _point: FaultPoint) -> bool {
        false
    }
}

/// Primitives a [`FailAfter`] counts and fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultTarget {
    /// Create, destroy, insert, update and delete.
    Writes,
    /// Point and range lookups.
    Reads,
}

impl FaultTarget {
    const fn matches(self, point: FaultPoint) -> bool {
        match self {
            Self::Writes => point.is_write(),
            Self::Reads => !point.is_write(),
        }
    }
}

/// Let `n` targeted primitives succeed, then fail every following one.
///
/// Primitives outside the target are never failed.
#[derive(Debug)]
pub struct FailAfter {
    target: FaultTarget,
    remaining: AtomicU64,
}

impl FailAfter {
    /// Allow `writes` successful writes. Reads never fail.
    pub const fn new(writes: u64) -> Self {
        Self::targeting(FaultTarget::Writes, writes)
    }

    /// Allow `reads` successful reads. Writes never fail.
    pub const fn reads(reads: u64) -> Self {
        Self::targeting(FaultTarget::Reads, reads)
    }

    /// Allow `n` successful primitives of kind `target`.
    pub const fn targeting(target: FaultTarget, n: u64) -> Self {
        Self {
            target,
            remaining: AtomicU64::new(n),
        }
    }

    /// Primitives this injector fails.
    pub const fn target(&self) -> FaultTarget {
        self.target
    }

    /// Re-arm the injector with a new budget.
    pub fn reset(&self, n: u64) {
        self.remaining.store(n, Ordering::SeqCst);
    }
}

impl FaultInjector for FailAfter {
    fn should_fail(&self, point: FaultPoint) -> bool {
        if !self.target.matches(point) {
            return false;
        }
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
    }
}
