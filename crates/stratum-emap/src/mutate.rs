//! Split, merge, paste and extent update.
//!
//! Every mutator is built from several table writes and leaves the map
//! porous while it runs. If one of them fails the map is left as the last
//! completed write left it and the caller must abort the transaction.

use crate::Result;
use crate::codec;
use crate::cursor::Cursor;
use crate::policy::SegmentPolicy;
use crate::segment::{Extent, NAMESPACE_END, Segment};
use stratum_be::{KvStore, Tx};
use tracing::debug;

/// One piece of a split: its length and the value it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SplitPiece {
    /// Number of offsets in the piece. Zero-length pieces are skipped.
    pub length: u64,
    /// Value stored for the piece.
    pub value: u64,
}

impl SplitPiece {
    /// Create a piece.
    pub const fn new(length: u64, value: u64) -> Self {
        Self { length, value }
    }
}

impl<S: KvStore> Cursor<'_, S> {
    /// Replace the current segment by `pieces`, laid out in order from its
    /// start. Zero-length pieces are skipped. The cursor ends up on the last
    /// piece.
    ///
    /// # Panics
    ///
    /// Panics unless the piece lengths add up to the segment length.
    pub async fn split(&mut self, tx: &mut Tx, pieces: &[SplitPiece]) -> Result<()> {
        let total = pieces
            .iter()
            .try_fold(0u64, |acc, p| acc.checked_add(p.length));
        assert_eq!(
            total,
            Some(self.seg.ext.length()),
            "split pieces must cover segment {}",
            self.seg.ext
        );
        debug!(seg = %self.seg, pieces = pieces.len(), "split");
        let start = self.seg.ext.start;
        self.split_at(tx, start, pieces).await?;
        Ok(())
    }

    /// Delete the current segment and insert the non-empty `pieces` from
    /// `scan` on, then reposition on the last written key. Returns whether
    /// anything was inserted; if not, the cursor lands on the following
    /// segment.
    pub(crate) async fn split_at(
        &mut self,
        tx: &mut Tx,
        scan: u64,
        pieces: &[SplitPiece],
    ) -> Result<bool> {
        let map = self.map;
        let store = &map.store;
        let (key, _) = self.pack();
        store.delete(tx, &key).await?;

        let mut last = self.seg.ext.end;
        let mut start = scan;
        let mut inserted = false;
        for piece in pieces.iter().filter(|p| p.length > 0) {
            let seg = Segment::new(
                self.seg.prefix,
                Extent::new(start, start + piece.length),
                piece.value,
            );
            let (k, r) = codec::pack(&seg);
            store.insert(tx, &k.to_bytes(), &r.to_bytes()).await?;
            last = seg.ext.end;
            start = seg.ext.end;
            inserted = true;
        }
        self.reseek(last).await?;
        Ok(inserted)
    }

    /// Move the last `delta` offsets of the current segment to the next
    /// one. A segment shrunk to nothing is deleted. The cursor ends up on
    /// the grown successor.
    ///
    /// # Panics
    ///
    /// Panics on the last segment or if `delta` exceeds the segment length.
    pub async fn merge(&mut self, tx: &mut Tx, delta: u64) -> Result<()> {
        assert!(
            !self.is_last(),
            "cannot merge the last segment of map {}",
            self.seg.prefix
        );
        assert!(
            delta <= self.seg.ext.length(),
            "merge delta {delta:#x} exceeds segment {}",
            self.seg.ext
        );
        debug!(seg = %self.seg, delta, "merge");
        let map = self.map;
        let store = &map.store;
        let (key, _) = self.pack();
        store.delete(tx, &key).await?;

        let inserted = delta < self.seg.ext.length();
        if inserted {
            self.seg.ext.end -= delta;
            let (k, r) = self.pack();
            store.insert(tx, &k, &r).await?;
        }
        let end = self.seg.ext.end;
        self.reseek(end).await?;
        if inserted {
            self.next().await?;
        }

        self.seg.ext.start -= delta;
        let (k, r) = self.pack();
        store.update(tx, &k, &r).await?;
        Ok(())
    }

    /// Overwrite `ext` with a single segment of value `value`.
    ///
    /// Every existing segment overlapping `ext` is rewritten: the parts
    /// outside `ext` survive with values chosen by `policy`, the parts
    /// inside are dropped. The new segment is written once, together with
    /// the last overlapped segment, so that it is the final insert of the
    /// operation. The cursor ends up on the last inserted piece.
    ///
    /// # Panics
    ///
    /// Panics unless `ext.start` lies in the current segment.
    pub async fn paste<P>(
        &mut self,
        tx: &mut Tx,
        ext: Extent,
        value: u64,
        policy: &mut P,
    ) -> Result<()>
    where
        P: SegmentPolicy + ?Sized,
    {
        assert!(
            self.seg.ext.contains(ext.start),
            "paste {ext} must start inside segment {}",
            self.seg.ext
        );
        assert!(ext.end <= NAMESPACE_END, "paste {ext} beyond the namespace");
        debug!(prefix = %self.seg.prefix, %ext, value, "paste");

        let ext0 = ext;
        let mut ext = ext;
        while !ext.is_empty() {
            let mut seg = self.seg;
            let chunk = seg.ext;
            let clip = ext.intersection(&chunk);
            let consumed = clip.length();
            debug_assert!(consumed > 0);

            let left = clip.start - chunk.start;
            let middle = if clip.end == ext.end { ext0.length() } else { 0 };
            let right = chunk.end - clip.end;

            let orig = seg.value;
            let mut left_value = orig;
            let mut right_value = orig;
            if left > 0 {
                policy.cut_left(&mut seg, &clip, orig);
                left_value = seg.value;
            }
            if right > 0 {
                policy.cut_right(&mut seg, &clip, orig);
                right_value = seg.value;
            }
            if left == 0 && right == 0 {
                policy.delete(&seg);
            }

            let pieces = [
                SplitPiece::new(left, left_value),
                SplitPiece::new(middle, value),
                SplitPiece::new(right, right_value),
            ];
            let scan = if left > 0 { chunk.start } else { ext0.start };
            let inserted = self.split_at(tx, scan, &pieces).await?;

            ext.start += consumed;
            debug!(left = ext.length(), "paste progress");
            if ext.is_empty() {
                break;
            }
            if inserted {
                self.next().await?;
            }
        }
        Ok(())
    }

    /// Rewrite the start and value of the current segment in place.
    ///
    /// # Panics
    ///
    /// Panics unless `seg` has the current segment's prefix and end and is
    /// not empty.
    pub async fn extent_update(&mut self, tx: &mut Tx, seg: &Segment) -> Result<()> {
        assert_eq!(seg.prefix, self.seg.prefix, "extent update across maps");
        assert_eq!(
            seg.ext.end, self.seg.ext.end,
            "extent update must keep the segment end"
        );
        assert!(!seg.ext.is_empty(), "extent update to empty {}", seg.ext);
        debug!(from = %self.seg, to = %seg, "extent update");
        self.seg = *seg;
        let (k, r) = self.pack();
        self.map.store.update(tx, &k, &r).await?;
        Ok(())
    }
}
