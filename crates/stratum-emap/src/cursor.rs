//! Map cursor.
//!
//! A [`Cursor`] is positioned on one segment of one map. It keeps two views
//! of that segment in step: the internal key and record as stored in the
//! table, and the external [`Segment`]. `open` derives the external view
//! after every read; `pack` derives the internal view before every write.

use crate::codec::{self, EmapKey, EmapRec};
use crate::segment::{BINDEX_MAX, Prefix, Segment};
use crate::{EmapError, ExtMap, Result};
use std::fmt;
use stratum_be::{KvCursor, KvStore};
use tracing::trace;

/// Position on one segment of a map.
pub struct Cursor<'m, S: KvStore> {
    pub(crate) map: &'m ExtMap<S>,
    kv: KvCursor<'m, S>,
    prefix: Prefix,
    key: EmapKey,
    rec: EmapRec,
    pub(crate) seg: Segment,
}

impl<'m, S: KvStore> Cursor<'m, S> {
    pub(crate) async fn lookup(map: &'m ExtMap<S>, prefix: Prefix, offset: u64) -> Result<Self> {
        assert!(
            offset <= BINDEX_MAX,
            "offset {offset:#x} is outside the namespace"
        );
        let mut cursor = Self {
            map,
            kv: KvCursor::new(&map.store),
            prefix,
            key: EmapKey::default(),
            rec: EmapRec::default(),
            seg: Segment::default(),
        };
        cursor.seek(offset + 1).await?;
        trace!(%prefix, offset, seg = %cursor.seg.ext, "lookup");
        Ok(cursor)
    }

    /// Position on the first segment of this map ending after `end - 1`.
    pub(crate) async fn seek(&mut self, end: u64) -> Result<()> {
        let probe = EmapKey::new(self.prefix, end);
        self.kv.get(&probe.to_bytes(), true).await?;
        self.open()
    }

    /// Re-read the current segment after a write repositioned the cursor.
    pub(crate) async fn reseek(&mut self, end: u64) -> Result<()> {
        let res = self.seek(end).await;
        self.expect_segment(res, "reposition")
    }

    fn open(&mut self) -> Result<()> {
        let Some(pair) = self.kv.pair() else {
            return Err(EmapError::NoMoreMaps {
                prefix: self.prefix,
            });
        };
        let key = EmapKey::from_bytes(&pair.key)?;
        let rec = EmapRec::from_bytes(&pair.value)?;
        let seg = codec::open(&key, &rec)?;
        if seg.prefix != self.prefix {
            return Err(EmapError::NotFound {
                prefix: self.prefix,
                next: seg,
            });
        }
        self.key = key;
        self.rec = rec;
        self.seg = seg;
        Ok(())
    }

    /// Refresh the internal view from the external segment and return the
    /// encoded key and record.
    pub(crate) fn pack(&mut self) -> (Vec<u8>, Vec<u8>) {
        let (key, rec) = codec::pack(&self.seg);
        self.key = key;
        self.rec = rec;
        (key.to_bytes(), rec.to_bytes())
    }

    fn expect_segment(&self, res: Result<()>, what: &str) -> Result<()> {
        match res {
            Err(e) if e.is_not_found() => Err(EmapError::Invalid(format!(
                "map {} has no segment after {what} from {}",
                self.prefix, self.seg.ext
            ))),
            other => other,
        }
    }

    /// Move to the following segment.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is on the last segment.
    pub async fn next(&mut self) -> Result<()> {
        assert!(
            !self.is_last(),
            "next past the last segment of map {}",
            self.prefix
        );
        self.kv.next().await?;
        let res = self.open();
        self.expect_segment(res, "next")?;
        trace!(prefix = %self.prefix, seg = %self.seg.ext, "next");
        Ok(())
    }

    /// Move to the preceding segment.
    ///
    /// # Panics
    ///
    /// Panics if the cursor is on the first segment.
    pub async fn prev(&mut self) -> Result<()> {
        assert!(
            !self.is_first(),
            "prev before the first segment of map {}",
            self.prefix
        );
        self.kv.prev().await?;
        let res = self.open();
        self.expect_segment(res, "prev")?;
        trace!(prefix = %self.prefix, seg = %self.seg.ext, "prev");
        Ok(())
    }

    /// Release the cursor, checking the map first when the map is
    /// configured to verify invariants.
    pub async fn close(self) -> Result<()> {
        if self.map.config().verify_invariants {
            self.map.check_invariant(self.prefix).await?;
        }
        trace!(prefix = %self.prefix, "close");
        Ok(())
    }

    /// Check that the cursor's map partitions the namespace.
    pub async fn check_invariant(&self) -> Result<()> {
        self.map.check_invariant(self.prefix).await
    }

    /// Current segment.
    pub const fn segment(&self) -> &Segment {
        &self.seg
    }

    /// Map the cursor walks.
    pub const fn prefix(&self) -> Prefix {
        self.prefix
    }

    /// Stored key of the current segment.
    pub const fn key(&self) -> &EmapKey {
        &self.key
    }

    /// Stored record of the current segment.
    pub const fn record(&self) -> &EmapRec {
        &self.rec
    }

    /// True on the segment starting at 0.
    pub const fn is_first(&self) -> bool {
        self.seg.is_first()
    }

    /// True on the segment ending at the end of the namespace.
    pub const fn is_last(&self) -> bool {
        self.seg.is_last()
    }

    /// Map the cursor belongs to.
    pub const fn map(&self) -> &'m ExtMap<S> {
        self.map
    }
}

impl<S: KvStore> fmt::Debug for Cursor<'_, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("prefix", &self.prefix)
            .field("key", &self.key)
            .field("rec", &self.rec)
            .field("seg", &self.seg)
            .finish_non_exhaustive()
    }
}
