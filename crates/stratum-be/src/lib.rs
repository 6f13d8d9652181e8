//! Transactional key-value backend for the stratum object store.
//!
//! This crate provides the pieces the higher metadata layers build on:
//!
//! - **Transactions** ([`Tx`]): every mutation runs inside a transaction that
//!   was prepared with an upper bound of the resources it will consume and is
//!   either committed or aborted (rolled back) by its owner.
//! - **Credits** ([`TxCredit`]): `(records, bytes)` reservations that callers
//!   compute before a mutation and the store charges while executing it.
//! - **Operations** ([`Op`]): an operation object with explicit
//!   `Init → Active → Success | Failure` states wrapping any backend future,
//!   with [`Op::wait`] and [`wait`] as the blocking calling convention.
//! - **Ordered tables** ([`KvStore`], [`KvCursor`], [`MemStore`]): byte-keyed
//!   tables with range positioning (`first key >= X`) used by range-indexed
//!   metadata such as extent maps.
//!
//! # Example
//!
//! ```rust
//! use stratum_be::{KvStore, MemStore, Tx, TxCredit, wait};
//!
//! let store = MemStore::new();
//! let mut tx = Tx::new();
//! tx.prep(&TxCredit::new(8, 1024));
//! store.open(&mut tx).unwrap();
//! wait(store.create(&mut tx)).unwrap();
//! wait(store.insert(&mut tx, b"key", b"value")).unwrap();
//! store.commit(&mut tx).unwrap();
//!
//! assert_eq!(wait(store.get(b"key")).unwrap(), Some(b"value".to_vec()));
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use thiserror::Error;

// Configuration
pub mod config;

// Credit accounting
pub mod credit;

// Fault injection strategies
pub mod fault;

// Ordered table interface and range cursor
pub mod kv;

// In-memory ordered table
pub mod mem;

// Operation objects
pub mod op;

// Transactions
pub mod tx;

pub use config::StoreConfig;
pub use credit::TxCredit;
pub use fault::{FailAfter, FaultInjector, FaultPoint, FaultTarget, NoFaults};
pub use kv::{KvCursor, KvPair, KvStore};
pub use mem::MemStore;
pub use op::{Op, OpState, wait};
pub use tx::{Tx, TxState};

/// Result type for backend operations.
pub type Result<T> = std::result::Result<T, BeError>;

/// Errors that can occur in the backend.
#[derive(Debug, Error)]
pub enum BeError {
    /// The table has not been created yet (or was destroyed).
    #[error("table '{0}' does not exist")]
    NotCreated(String),

    /// The table already exists.
    #[error("table '{0}' already exists")]
    AlreadyCreated(String),

    /// Insert of a key that is already present.
    #[error("key already exists: {0}")]
    KeyExists(String),

    /// Update or delete of a key that is not present.
    #[error("key not found: {0}")]
    KeyNotFound(String),

    /// The transaction is not in the state the operation requires.
    #[error("transaction {id} is {state:?}, expected {expected:?}")]
    TxState {
        /// Transaction identifier.
        id: u64,
        /// Current state.
        state: TxState,
        /// Required state.
        expected: TxState,
    },

    /// A write needed more credit than the transaction has left.
    #[error("credit exceeded: needed {needed}, remaining {remaining}")]
    CreditExceeded {
        /// Credit the write needed.
        needed: TxCredit,
        /// Credit still available in the transaction.
        remaining: TxCredit,
    },

    /// Backend I/O or allocation failure.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Version information for the backend.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Render a raw key for log and error messages.
pub(crate) fn key_hex(key: &[u8]) -> String {
    hex::encode(key)
}
