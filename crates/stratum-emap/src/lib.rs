//! Extent maps for the stratum object store.
//!
//! An extent map is a persistent, transactionally-updated mapping from the
//! 64-bit namespace `[0, NAMESPACE_END)` to opaque 64-bit values. Each map
//! is identified by a 128-bit [`Prefix`]; many maps share one ordered
//! [`KvStore`] table. At all times a map is a set of non-empty
//! [`Segment`]s partitioning the namespace.
//!
//! ## Components
//!
//! - **Segment model** ([`segment`]): prefixes, extents, segments.
//! - **Codec** ([`codec`]): the big-endian key/record layout. A segment is
//!   stored under its *end* offset so that "first key `>= offset + 1`"
//!   finds the segment covering `offset`.
//! - **Cursor** ([`Cursor`]): a position on one segment, obtained from
//!   [`ExtMap::lookup`].
//! - **Mutators**: [`Cursor::split`], [`Cursor::merge`], [`Cursor::paste`]
//!   and [`Cursor::extent_update`], each running inside a caller-owned
//!   [`Tx`](stratum_be::Tx).
//! - **Caret** ([`Caret`]): byte-granular walking across segments.
//! - **Credit** ([`ExtMap::credit`]): worst-case transaction credit per
//!   mutation kind.
//! - **Block mapping** ([`blockmap`]): logical-to-physical mapping built on
//!   paste and caret.
//!
//! The map never opens, commits or aborts a transaction. A mutation that
//! fails halfway leaves the map porous; the caller aborts the transaction.
//!
//! ## Example
//!
//! ```rust
//! use stratum_be::{MemStore, Tx, wait};
//! use stratum_emap::{ExtMap, OpType, Prefix, SplitPiece, NAMESPACE_END};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let map = ExtMap::new(MemStore::new());
//! let prefix = Prefix(1);
//!
//! let mut tx = Tx::new();
//! tx.prep(&map.credit_for(OpType::Create, 1));
//! tx.prep(&map.credit_for(OpType::Insert, 1));
//! tx.prep(&map.credit_for(OpType::Split, 2));
//! map.store().open(&mut tx)?;
//!
//! wait(async {
//!     map.create(&mut tx).await?;
//!     map.obj_insert(&mut tx, prefix, 0).await?;
//!     let mut cursor = map.lookup(prefix, 0).await?;
//!     cursor
//!         .split(&mut tx, &[SplitPiece::new(4096, 7), SplitPiece::new(NAMESPACE_END - 4096, 0)])
//!         .await?;
//!     cursor.close().await
//! })?;
//! map.store().commit(&mut tx)?;
//!
//! let cursor = wait(map.lookup(prefix, 100))?;
//! assert_eq!(cursor.segment().value, 7);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![allow(clippy::must_use_candidate)]

use stratum_be::{KvCursor, KvStore, Tx};
use tracing::{debug, info, warn};

// Segment and extent model
pub mod segment;

// Key/record codec
pub mod codec;

// Map cursor
pub mod cursor;

// Split, merge, paste and extent update
pub mod mutate;

// Value transformation during paste
pub mod policy;

// Byte-granular position
pub mod caret;

// Credit estimation
pub mod credit;

// Logical-to-physical block mapping
pub mod blockmap;

// Scripted map operations
pub mod script;

pub mod config;
pub mod error;

pub use caret::Caret;
pub use codec::{EmapKey, EmapRec, KEY_SIZE, REC_SIZE};
pub use config::ExtMapConfig;
pub use credit::OpType;
pub use cursor::Cursor;
pub use error::{EmapError, Result};
pub use mutate::SplitPiece;
pub use policy::{KeepValues, SegmentPolicy};
pub use segment::{BINDEX_MAX, Extent, NAMESPACE_END, Prefix, Segment};

/// Extent maps stored in one ordered table.
#[derive(Debug)]
pub struct ExtMap<S: KvStore> {
    pub(crate) store: S,
    config: ExtMapConfig,
}

impl<S: KvStore> ExtMap<S> {
    /// Attach to `store` with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, ExtMapConfig::default())
    }

    /// Attach to `store` with the given configuration.
    pub const fn with_config(store: S, config: ExtMapConfig) -> Self {
        Self { store, config }
    }

    /// Detach from the store and return it.
    pub fn into_store(self) -> S {
        self.store
    }

    /// Backing store.
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Configuration.
    pub const fn config(&self) -> &ExtMapConfig {
        &self.config
    }

    /// Create the backing table.
    pub async fn create(&self, tx: &mut Tx) -> Result<()> {
        self.store.create(tx).await?;
        info!("created extent map table");
        Ok(())
    }

    /// Destroy the backing table and every map in it.
    pub async fn destroy(&self, tx: &mut Tx) -> Result<()> {
        self.store.destroy(tx).await?;
        info!("destroyed extent map table");
        Ok(())
    }

    /// Create map `prefix` as a single segment covering the namespace.
    pub async fn obj_insert(&self, tx: &mut Tx, prefix: Prefix, value: u64) -> Result<()> {
        let seg = Segment::new(prefix, Extent::FULL, value);
        let (key, rec) = codec::pack(&seg);
        self.store
            .insert(tx, &key.to_bytes(), &rec.to_bytes())
            .await?;
        info!(%prefix, value, "created map");
        Ok(())
    }

    /// Delete map `prefix`.
    ///
    /// # Panics
    ///
    /// Panics unless the map consists of a single segment.
    pub async fn obj_delete(&self, tx: &mut Tx, prefix: Prefix) -> Result<()> {
        let cursor = self.lookup(prefix, 0).await?;
        assert!(
            cursor.is_first() && cursor.is_last(),
            "map {prefix} must be a single segment to be deleted, found {}",
            cursor.segment().ext
        );
        let key = *cursor.key();
        drop(cursor);
        self.store.delete(tx, &key.to_bytes()).await?;
        info!(%prefix, "deleted map");
        Ok(())
    }

    /// Position a cursor on the segment of `prefix` containing `offset`.
    ///
    /// Fails with [`EmapError::NotFound`] if map `prefix` does not exist but
    /// a later one does, and with [`EmapError::NoMoreMaps`] if no map exists
    /// at or after `prefix`.
    ///
    /// # Panics
    ///
    /// Panics if `offset` is greater than [`BINDEX_MAX`].
    pub async fn lookup(&self, prefix: Prefix, offset: u64) -> Result<Cursor<'_, S>> {
        Cursor::lookup(self, prefix, offset).await
    }

    /// Segments stored for `prefix`, in order, without checking that they
    /// partition the namespace.
    pub async fn segments(&self, prefix: Prefix) -> Result<Vec<Segment>> {
        let mut kv = KvCursor::new(&self.store);
        let mut segs = Vec::new();
        kv.get(&EmapKey::new(prefix, 0).to_bytes(), true).await?;
        while let Some(pair) = kv.pair() {
            let key = EmapKey::from_bytes(&pair.key)?;
            if key.prefix != prefix.0 {
                break;
            }
            let rec = EmapRec::from_bytes(&pair.value)?;
            segs.push(codec::open(&key, &rec)?);
            kv.next().await?;
        }
        Ok(segs)
    }

    /// Number of segments of `prefix` overlapping `ext`, the `nr` a paste
    /// over `ext` should be estimated with.
    pub async fn overlapped(&self, prefix: Prefix, ext: Extent) -> Result<u64> {
        let segs = self.segments(prefix).await?;
        Ok(segs
            .iter()
            .filter(|s| !s.ext.intersection(&ext).is_empty())
            .count() as u64)
    }

    /// Log every segment of `prefix` at debug level and return them.
    pub async fn dump(&self, prefix: Prefix) -> Result<Vec<Segment>> {
        let segs = self.segments(prefix).await?;
        debug!(%prefix, segments = segs.len(), "map dump");
        for (i, seg) in segs.iter().enumerate() {
            debug!(
                "\t{i:5} {:16x} .. {:16x}: {:16x} {:10x}",
                seg.ext.start,
                seg.ext.end,
                seg.ext.length(),
                seg.value
            );
        }
        Ok(segs)
    }

    /// Check that map `prefix` partitions the namespace.
    ///
    /// Returns [`EmapError::Invariant`] describing the first violation.
    pub async fn check_invariant(&self, prefix: Prefix) -> Result<()> {
        let segs = self.segments(prefix).await?;
        if let Err(reason) = segment::check_partition(&segs) {
            warn!(%prefix, %reason, "map invariant violated");
            if self.config.dump_on_violation {
                for seg in &segs {
                    warn!("\t{seg}");
                }
            }
            return Err(EmapError::Invariant(format!("map {prefix}: {reason}")));
        }
        Ok(())
    }

    /// Prefixes of every map in the table, in store order.
    pub async fn prefixes(&self) -> Result<Vec<Prefix>> {
        let mut found = Vec::new();
        let mut probe = Some(Prefix(0));
        while let Some(prefix) = probe {
            let next = match self.lookup(prefix, 0).await {
                Ok(_) => prefix,
                Err(EmapError::NotFound { next, .. }) => next.prefix,
                Err(EmapError::NoMoreMaps { .. }) => break,
                Err(e) => return Err(e),
            };
            found.push(next);
            probe = next.succ();
        }
        Ok(found)
    }
}

/// Version information for the extent map.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
