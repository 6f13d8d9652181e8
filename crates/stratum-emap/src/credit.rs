//! Credit estimation.
//!
//! Before running a mutation the caller adds its worst-case cost to the
//! transaction. The estimates below are upper bounds on what the store
//! charges for the writes each mutation issues.

use crate::ExtMap;
use crate::codec::{KEY_SIZE, REC_SIZE};
use serde::{Deserialize, Serialize};
use std::fmt;
use stratum_be::{KvStore, TxCredit};

/// Kind of map operation to estimate credit for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpType {
    /// Table creation.
    Create,
    /// Table destruction.
    Destroy,
    /// Record insertion (one per `obj_insert`).
    Insert,
    /// Record deletion (one per `obj_delete`).
    Delete,
    /// Record rewrite (one per `extent_update`).
    Update,
    /// `merge`.
    Merge,
    /// `split` into `nr` pieces.
    Split,
    /// `paste` over `nr` existing segments.
    Paste,
}

impl OpType {
    /// Every operation type.
    pub const ALL: [Self; 8] = [
        Self::Create,
        Self::Destroy,
        Self::Insert,
        Self::Delete,
        Self::Update,
        Self::Merge,
        Self::Split,
        Self::Paste,
    ];
}

impl fmt::Display for OpType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Create => "create",
            Self::Destroy => "destroy",
            Self::Insert => "insert",
            Self::Delete => "delete",
            Self::Update => "update",
            Self::Merge => "merge",
            Self::Split => "split",
            Self::Paste => "paste",
        };
        f.write_str(name)
    }
}

impl<S: KvStore> ExtMap<S> {
    /// Add the credit of `nr` operations of kind `optype` to `accum`.
    pub fn credit(&self, optype: OpType, nr: u64, accum: &mut TxCredit) {
        let store = &self.store;
        match optype {
            OpType::Create => store.create_credit(nr, accum),
            OpType::Destroy => store.destroy_credit(nr, accum),
            OpType::Insert => store.insert_credit(nr, KEY_SIZE, REC_SIZE, accum),
            OpType::Delete => store.delete_credit(nr, KEY_SIZE, REC_SIZE, accum),
            OpType::Update => store.update_credit(nr, REC_SIZE, accum),
            // The shrunk segment is either deleted or reinserted.
            OpType::Merge => {
                self.credit(OpType::Delete, nr, accum);
                self.credit(OpType::Insert, nr, accum);
                self.credit(OpType::Update, nr, accum);
            }
            OpType::Split => {
                self.credit(OpType::Delete, 1, accum);
                self.credit(OpType::Insert, nr, accum);
            }
            // Up to two remainders on each side of the new segment.
            OpType::Paste => {
                let mut split = TxCredit::ZERO;
                self.credit(OpType::Split, nr, &mut split);
                accum.mac(&split, 4);
            }
        }
    }

    /// Credit of `nr` operations of kind `optype`.
    pub fn credit_for(&self, optype: OpType, nr: u64) -> TxCredit {
        let mut accum = TxCredit::ZERO;
        self.credit(optype, nr, &mut accum);
        accum
    }
}
