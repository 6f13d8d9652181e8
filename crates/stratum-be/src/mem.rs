//! In-memory ordered table.
//!
//! [`MemStore`] keeps one table as a `BTreeMap` behind a `parking_lot`
//! read-write lock. `None` in the lock means the table has not been created
//! (or was destroyed). Every write goes through the same sequence: check the
//! transaction, consult the fault injector, validate, charge the credit,
//! apply, record an undo entry.

use crate::fault::{FaultInjector, FaultPoint, NoFaults};
use crate::kv::{KvPair, KvStore};
use crate::tx::Undo;
use crate::{BeError, Result, StoreConfig, Tx, TxCredit, TxState, key_hex};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

type Table = BTreeMap<Vec<u8>, Vec<u8>>;

/// In-memory transactional ordered table.
#[derive(Debug)]
pub struct MemStore {
    table: RwLock<Option<Table>>,
    config: StoreConfig,
    faults: Arc<dyn FaultInjector>,
}

impl MemStore {
    /// Create a store with the default configuration and no fault injection.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            table: RwLock::new(None),
            config,
            faults: Arc::new(NoFaults),
        }
    }

    /// Replace the fault injector.
    #[must_use]
    pub fn with_faults(mut self, faults: Arc<dyn FaultInjector>) -> Self {
        self.faults = faults;
        self
    }

    /// Store configuration.
    pub const fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// True if the table exists.
    pub fn is_created(&self) -> bool {
        self.table.read().is_some()
    }

    /// Number of records in the table (zero if it does not exist).
    pub fn len(&self) -> usize {
        self.table.read().as_ref().map_or(0, BTreeMap::len)
    }

    /// True if the table holds no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a prepared transaction.
    ///
    /// Fails with `ResourceExhausted` if the prepared credit exceeds what a
    /// single transaction may reserve.
    pub fn open(&self, tx: &mut Tx) -> Result<()> {
        tx.expect_state(TxState::Prepare)?;
        let prepared = tx.prepared();
        if !prepared.fits_in(&self.config.max_tx_credit) {
            warn!(
                table = %self.config.name,
                tx = tx.id(),
                prepared = %prepared,
                limit = %self.config.max_tx_credit,
                "transaction credit exceeds store capacity"
            );
            return Err(BeError::ResourceExhausted(format!(
                "transaction credit {prepared} exceeds limit {}",
                self.config.max_tx_credit
            )));
        }
        tx.set_state(TxState::Active);
        debug!(table = %self.config.name, tx = tx.id(), credit = %prepared, "opened transaction");
        Ok(())
    }

    /// Make the transaction's changes permanent.
    pub fn commit(&self, tx: &mut Tx) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        let undo = tx.take_undo();
        tx.set_state(TxState::Committed);
        debug!(
            table = %self.config.name,
            tx = tx.id(),
            writes = undo.len(),
            used = %tx.used(),
            "committed transaction"
        );
        Ok(())
    }

    /// Roll back every write made by the transaction.
    pub fn abort(&self, tx: &mut Tx) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        let undo = tx.take_undo();
        let writes = undo.len();
        {
            let mut table = self.table.write();
            for entry in undo.into_iter().rev() {
                match entry {
                    Undo::Record { key, prev } => {
                        if let Some(t) = table.as_mut() {
                            match prev {
                                Some(value) => {
                                    t.insert(key, value);
                                }
                                None => {
                                    t.remove(&key);
                                }
                            }
                        }
                    }
                    Undo::Created => *table = None,
                    Undo::Destroyed(contents) => *table = Some(contents),
                }
            }
        }
        tx.set_state(TxState::Aborted);
        info!(table = %self.config.name, tx = tx.id(), writes, "aborted transaction");
        Ok(())
    }

    fn inject(&self, point: FaultPoint) -> Result<()> {
        if self.faults.should_fail(point) {
            debug!(table = %self.config.name, %point, "injected failure");
            return Err(BeError::ResourceExhausted(format!(
                "{point} failed on table '{}'",
                self.config.name
            )));
        }
        Ok(())
    }

    fn not_created(&self) -> BeError {
        BeError::NotCreated(self.config.name.clone())
    }

    fn read_range(&self, range: (Bound<&[u8]>, Bound<&[u8]>), last: bool) -> Result<Option<KvPair>> {
        self.inject(FaultPoint::Read)?;
        let guard = self.table.read();
        let table = guard.as_ref().ok_or_else(|| self.not_created())?;
        let mut iter = table.range::<[u8], _>(range);
        let found = if last { iter.next_back() } else { iter.next() };
        Ok(found.map(|(k, v)| KvPair::new(k.clone(), v.clone())))
    }
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemStore {
    async fn create(&self, tx: &mut Tx) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        self.inject(FaultPoint::Create)?;
        let mut table = self.table.write();
        if table.is_some() {
            return Err(BeError::AlreadyCreated(self.config.name.clone()));
        }
        tx.charge(TxCredit::new(1, self.config.table_descriptor_size))?;
        *table = Some(Table::new());
        tx.log(Undo::Created);
        debug!(table = %self.config.name, tx = tx.id(), "created table");
        Ok(())
    }

    async fn destroy(&self, tx: &mut Tx) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        self.inject(FaultPoint::Destroy)?;
        let mut table = self.table.write();
        if table.is_none() {
            return Err(self.not_created());
        }
        tx.charge(TxCredit::new(1, self.config.table_descriptor_size))?;
        if let Some(contents) = table.take() {
            debug!(table = %self.config.name, tx = tx.id(), records = contents.len(), "destroyed table");
            tx.log(Undo::Destroyed(contents));
        }
        Ok(())
    }

    async fn insert(&self, tx: &mut Tx, key: &[u8], value: &[u8]) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        self.inject(FaultPoint::Insert)?;
        let mut guard = self.table.write();
        let table = guard.as_mut().ok_or_else(|| self.not_created())?;
        if table.contains_key(key) {
            return Err(BeError::KeyExists(key_hex(key)));
        }
        tx.charge(TxCredit::new(1, (key.len() + value.len()) as u64))?;
        table.insert(key.to_vec(), value.to_vec());
        tx.log(Undo::Record {
            key: key.to_vec(),
            prev: None,
        });
        trace!(tx = tx.id(), key = %key_hex(key), "insert");
        Ok(())
    }

    async fn update(&self, tx: &mut Tx, key: &[u8], value: &[u8]) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        self.inject(FaultPoint::Update)?;
        let mut guard = self.table.write();
        let table = guard.as_mut().ok_or_else(|| self.not_created())?;
        let Some(slot) = table.get_mut(key) else {
            return Err(BeError::KeyNotFound(key_hex(key)));
        };
        tx.charge(TxCredit::new(1, value.len() as u64))?;
        let prev = std::mem::replace(slot, value.to_vec());
        tx.log(Undo::Record {
            key: key.to_vec(),
            prev: Some(prev),
        });
        trace!(tx = tx.id(), key = %key_hex(key), "update");
        Ok(())
    }

    async fn delete(&self, tx: &mut Tx, key: &[u8]) -> Result<()> {
        tx.expect_state(TxState::Active)?;
        self.inject(FaultPoint::Delete)?;
        let mut guard = self.table.write();
        let table = guard.as_mut().ok_or_else(|| self.not_created())?;
        let Some(len) = table.get(key).map(Vec::len) else {
            return Err(BeError::KeyNotFound(key_hex(key)));
        };
        tx.charge(TxCredit::new(1, (key.len() + len) as u64))?;
        let prev = table.remove(key);
        tx.log(Undo::Record {
            key: key.to_vec(),
            prev,
        });
        trace!(tx = tx.id(), key = %key_hex(key), "delete");
        Ok(())
    }

    async fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.inject(FaultPoint::Read)?;
        let guard = self.table.read();
        let table = guard.as_ref().ok_or_else(|| self.not_created())?;
        Ok(table.get(key).cloned())
    }

    async fn seek(&self, key: &[u8], slant: bool) -> Result<Option<KvPair>> {
        if slant {
            self.read_range((Bound::Included(key), Bound::Unbounded), false)
        } else {
            Ok(self.get(key).await?.map(|value| KvPair::new(key, value)))
        }
    }

    async fn seek_next(&self, key: &[u8]) -> Result<Option<KvPair>> {
        self.read_range((Bound::Excluded(key), Bound::Unbounded), false)
    }

    async fn seek_prev(&self, key: &[u8]) -> Result<Option<KvPair>> {
        self.read_range((Bound::Unbounded, Bound::Excluded(key)), true)
    }

    fn descriptor_size(&self) -> u64 {
        self.config.table_descriptor_size
    }
}
