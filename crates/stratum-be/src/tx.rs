//! Transactions.
//!
//! A transaction goes through `Prepare → Active → Committed | Aborted`.
//! While preparing, the owner accumulates the credit of every operation it
//! intends to run ([`Tx::prep`]); the store then opens it, checking the
//! total against its capacity. Each write charges its actual cost against
//! the prepared credit and records an undo entry, so an aborted transaction
//! leaves the table exactly as it found it.
//!
//! Open, commit and abort are store operations (see
//! [`MemStore`](crate::MemStore)) because only the store knows how to apply
//! undo entries.

use crate::{BeError, Result, TxCredit};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TX_ID: AtomicU64 = AtomicU64::new(1);

/// Transaction state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// Credit is being accumulated.
    Prepare,
    /// Opened by the store; writes are allowed.
    Active,
    /// Changes are permanent.
    Committed,
    /// Changes were rolled back.
    Aborted,
}

/// Undo entry recorded by a write.
#[derive(Debug, Clone)]
pub(crate) enum Undo {
    /// Restore `key` to `prev` (`None` removes it).
    Record { key: Vec<u8>, prev: Option<Vec<u8>> },
    /// Undo a table creation.
    Created,
    /// Undo a table destruction by reinstating its contents.
    Destroyed(BTreeMap<Vec<u8>, Vec<u8>>),
}

/// Transaction handle.
#[derive(Debug)]
pub struct Tx {
    id: u64,
    state: TxState,
    prepared: TxCredit,
    used: TxCredit,
    undo: Vec<Undo>,
}

impl Tx {
    /// Create a transaction in the `Prepare` state with no credit.
    pub fn new() -> Self {
        Self {
            id: NEXT_TX_ID.fetch_add(1, Ordering::Relaxed),
            state: TxState::Prepare,
            prepared: TxCredit::ZERO,
            used: TxCredit::ZERO,
            undo: Vec::new(),
        }
    }

    /// Add `credit` to the reservation.
    ///
    /// # Panics
    ///
    /// Panics if the transaction is no longer being prepared.
    pub fn prep(&mut self, credit: &TxCredit) {
        assert_eq!(
            self.state,
            TxState::Prepare,
            "credit can only be added while preparing"
        );
        self.prepared.accumulate(credit);
    }

    /// Transaction identifier (unique within the process).
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Current state.
    pub const fn state(&self) -> TxState {
        self.state
    }

    /// Credit reserved while preparing.
    pub const fn prepared(&self) -> TxCredit {
        self.prepared
    }

    /// Credit consumed by writes so far.
    pub const fn used(&self) -> TxCredit {
        self.used
    }

    /// Credit still available.
    pub const fn remaining(&self) -> TxCredit {
        self.prepared.saturating_sub(&self.used)
    }

    pub(crate) fn expect_state(&self, expected: TxState) -> Result<()> {
        if self.state == expected {
            Ok(())
        } else {
            Err(BeError::TxState {
                id: self.id,
                state: self.state,
                expected,
            })
        }
    }

    pub(crate) fn set_state(&mut self, state: TxState) {
        self.state = state;
    }

    /// Charge `cost` against the remaining credit.
    pub(crate) fn charge(&mut self, cost: TxCredit) -> Result<()> {
        self.expect_state(TxState::Active)?;
        let remaining = self.remaining();
        if !cost.fits_in(&remaining) {
            tracing::warn!(
                tx = self.id,
                needed = %cost,
                remaining = %remaining,
                "transaction credit exceeded"
            );
            return Err(BeError::CreditExceeded {
                needed: cost,
                remaining,
            });
        }
        self.used += cost;
        Ok(())
    }

    pub(crate) fn log(&mut self, undo: Undo) {
        self.undo.push(undo);
    }

    pub(crate) fn take_undo(&mut self) -> Vec<Undo> {
        std::mem::take(&mut self.undo)
    }
}

impl Default for Tx {
    fn default() -> Self {
        Self::new()
    }
}
