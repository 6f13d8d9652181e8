//! Ordered key-value table interface.
//!
//! Keys and values are opaque byte strings; keys sort in byte-lexicographic
//! order. Besides point operations, a table supports range positioning:
//! [`KvStore::seek`] with `slant = true` finds the first key greater than or
//! equal to a probe, which is what range-indexed metadata uses to find the
//! record covering an offset.
//!
//! Writes take the enclosing transaction and charge it; reads run outside
//! any transaction and see the table as left by the latest write.

use crate::{Result, Tx, TxCredit};
use std::future::Future;

/// A key and its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KvPair {
    /// Key bytes.
    pub key: Vec<u8>,
    /// Value bytes.
    pub value: Vec<u8>,
}

impl KvPair {
    /// Create a pair.
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Transactional ordered table.
pub trait KvStore: Send + Sync {
    /// Create the table.
    fn create(&self, tx: &mut Tx) -> impl Future<Output = Result<()>> + Send;

    /// Destroy the table and everything in it.
    fn destroy(&self, tx: &mut Tx) -> impl Future<Output = Result<()>> + Send;

    /// Insert a new key. Fails with `KeyExists` if the key is present.
    fn insert(
        &self,
        tx: &mut Tx,
        key: &[u8],
        value: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Replace the value of an existing key.
    fn update(
        &self,
        tx: &mut Tx,
        key: &[u8],
        value: &[u8],
    ) -> impl Future<Output = Result<()>> + Send;

    /// Remove an existing key.
    fn delete(&self, tx: &mut Tx, key: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Point lookup.
    fn get(&self, key: &[u8]) -> impl Future<Output = Result<Option<Vec<u8>>>> + Send;

    /// Exact lookup (`slant = false`) or first key `>= key` (`slant = true`).
    fn seek(
        &self,
        key: &[u8],
        slant: bool,
    ) -> impl Future<Output = Result<Option<KvPair>>> + Send;

    /// First key strictly greater than `key`.
    fn seek_next(&self, key: &[u8]) -> impl Future<Output = Result<Option<KvPair>>> + Send;

    /// Last key strictly less than `key`.
    fn seek_prev(&self, key: &[u8]) -> impl Future<Output = Result<Option<KvPair>>> + Send;

    /// Bytes charged for creating or destroying the table descriptor.
    fn descriptor_size(&self) -> u64;

    /// Credit for `nr` table creations.
    fn create_credit(&self, nr: u64, accum: &mut TxCredit) {
        accum.mac(&TxCredit::new(1, self.descriptor_size()), nr);
    }

    /// Credit for `nr` table destructions.
    fn destroy_credit(&self, nr: u64, accum: &mut TxCredit) {
        accum.mac(&TxCredit::new(1, self.descriptor_size()), nr);
    }

    /// Credit for `nr` inserts of `ksize`-byte keys with `vsize`-byte values.
    fn insert_credit(&self, nr: u64, ksize: u64, vsize: u64, accum: &mut TxCredit) {
        accum.mac(&TxCredit::new(1, ksize + vsize), nr);
    }

    /// Credit for `nr` deletes of `ksize`-byte keys with `vsize`-byte values.
    fn delete_credit(&self, nr: u64, ksize: u64, vsize: u64, accum: &mut TxCredit) {
        accum.mac(&TxCredit::new(1, ksize + vsize), nr);
    }

    /// Credit for `nr` in-place rewrites of `vsize`-byte values.
    fn update_credit(&self, nr: u64, vsize: u64, accum: &mut TxCredit) {
        accum.mac(&TxCredit::new(1, vsize), nr);
    }
}

/// Range cursor over a table.
///
/// The cursor remembers the pair it is positioned on and repositions by key
/// on every move, so it stays valid across writes made by its owner in the
/// same transaction.
#[derive(Debug)]
pub struct KvCursor<'s, S: KvStore> {
    store: &'s S,
    current: Option<KvPair>,
}

impl<'s, S: KvStore> KvCursor<'s, S> {
    /// Create an unpositioned cursor.
    pub const fn new(store: &'s S) -> Self {
        Self {
            store,
            current: None,
        }
    }

    /// Position on `key` (exact) or on the first key `>= key` (slant).
    ///
    /// Returns false and leaves the cursor unpositioned if nothing matches.
    pub async fn get(&mut self, key: &[u8], slant: bool) -> Result<bool> {
        self.current = self.store.seek(key, slant).await?;
        Ok(self.current.is_some())
    }

    /// Move to the next key. Returns false at the end of the table.
    pub async fn next(&mut self) -> Result<bool> {
        let found = match &self.current {
            Some(pair) => self.store.seek_next(&pair.key).await?,
            None => None,
        };
        self.current = found;
        Ok(self.current.is_some())
    }

    /// Move to the previous key. Returns false at the start of the table.
    pub async fn prev(&mut self) -> Result<bool> {
        let found = match &self.current {
            Some(pair) => self.store.seek_prev(&pair.key).await?,
            None => None,
        };
        self.current = found;
        Ok(self.current.is_some())
    }

    /// Pair the cursor is positioned on.
    pub const fn pair(&self) -> Option<&KvPair> {
        self.current.as_ref()
    }

    /// Table the cursor walks.
    pub const fn store(&self) -> &'s S {
        self.store
    }
}
