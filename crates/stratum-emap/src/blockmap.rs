//! Logical-to-physical block mapping.
//!
//! An object's allocation data is an extent map whose values are physical
//! start offsets: segment `([A, B), V)` says logical bytes `A..B` live at
//! physical bytes `V..V + (B - A)`. Values at or above
//! [`VALUE_SPECIAL_MIN`] are not addresses: [`UNALLOCATED`] marks space
//! never written and [`HOLE`] marks space explicitly punched out.

use crate::caret::Caret;
use crate::policy::SegmentPolicy;
use crate::segment::{BINDEX_MAX, Extent, NAMESPACE_END, Prefix, Segment};
use crate::{ExtMap, Result};
use stratum_be::{KvStore, Tx};
use tracing::debug;

/// Smallest value that is not a physical address.
pub const VALUE_SPECIAL_MIN: u64 = BINDEX_MAX - (1 << 32);

/// Logical space that was never written.
pub const UNALLOCATED: u64 = VALUE_SPECIAL_MIN + 1;

/// Logical space that reads as zeroes.
pub const HOLE: u64 = VALUE_SPECIAL_MIN + 2;

/// True if `value` is a physical address.
pub const fn is_physical(value: u64) -> bool {
    value < VALUE_SPECIAL_MIN
}

/// Where a logical fragment lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Physical start offset of the fragment.
    Physical(u64),
    /// Punched-out space.
    Hole,
    /// Space never written.
    Unallocated,
}

/// A logical range resolved to one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    /// Logical range.
    pub logical: Extent,
    /// Physical location.
    pub target: Target,
}

/// Paste policy for block maps.
///
/// A right remainder keeps mapping the same physical bytes, so its value
/// moves forward by the number of bytes cut from the segment's left.
/// Every physical range that stops being mapped is recorded in
/// [`released`](Self::released).
#[derive(Debug, Clone, Default)]
pub struct BlockMapPolicy {
    released: Vec<Extent>,
}

impl BlockMapPolicy {
    /// Create a policy with nothing released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Physical ranges no longer mapped.
    pub fn released(&self) -> &[Extent] {
        &self.released
    }

    /// Take the released ranges, leaving the list empty.
    pub fn take_released(&mut self) -> Vec<Extent> {
        std::mem::take(&mut self.released)
    }

    fn release(&mut self, seg: &Segment, clip: &Extent, orig: u64) {
        if is_physical(orig) {
            let start = orig + (clip.start - seg.ext.start);
            self.released.push(Extent::new(start, start + clip.length()));
        }
    }
}

impl SegmentPolicy for BlockMapPolicy {
    fn cut_left(&mut self, seg: &mut Segment, clip: &Extent, orig: u64) {
        self.release(seg, clip, orig);
        seg.value = orig;
    }

    fn cut_right(&mut self, seg: &mut Segment, clip: &Extent, orig: u64) {
        // The clip was already released by cut_left when a left part exists.
        if clip.start == seg.ext.start {
            self.release(seg, clip, orig);
        }
        seg.value = if is_physical(orig) {
            orig + (clip.end - seg.ext.start)
        } else {
            orig
        };
    }

    fn delete(&mut self, seg: &Segment) {
        self.release(seg, &seg.ext, seg.value);
    }
}

/// Block map of one object.
#[derive(Debug)]
pub struct BlockMap<'m, S: KvStore> {
    map: &'m ExtMap<S>,
    prefix: Prefix,
}

impl<'m, S: KvStore> BlockMap<'m, S> {
    /// Block map of object `prefix` stored in `map`.
    pub const fn new(map: &'m ExtMap<S>, prefix: Prefix) -> Self {
        Self { map, prefix }
    }

    /// Object identifier.
    pub const fn prefix(&self) -> Prefix {
        self.prefix
    }

    /// Create the object with all of its space unallocated.
    pub async fn create(&self, tx: &mut Tx) -> Result<()> {
        self.map.obj_insert(tx, self.prefix, UNALLOCATED).await
    }

    /// Map `logical` to physical bytes starting at `physical`.
    ///
    /// Physical ranges that were mapped to `logical` before are recorded in
    /// `policy`.
    pub async fn map(
        &self,
        tx: &mut Tx,
        logical: Extent,
        physical: u64,
        policy: &mut BlockMapPolicy,
    ) -> Result<()> {
        assert!(is_physical(physical), "{physical:#x} is not a physical address");
        self.paste(tx, logical, physical, policy).await
    }

    /// Punch a hole over `logical`.
    pub async fn punch(
        &self,
        tx: &mut Tx,
        logical: Extent,
        policy: &mut BlockMapPolicy,
    ) -> Result<()> {
        self.paste(tx, logical, HOLE, policy).await
    }

    async fn paste(
        &self,
        tx: &mut Tx,
        logical: Extent,
        value: u64,
        policy: &mut BlockMapPolicy,
    ) -> Result<()> {
        assert!(!logical.is_empty(), "empty logical range {logical}");
        let mut cursor = self.map.lookup(self.prefix, logical.start).await?;
        cursor.paste(tx, logical, value, policy).await?;
        debug!(
            prefix = %self.prefix,
            %logical,
            value,
            released = policy.released().len(),
            "block map updated"
        );
        cursor.close().await
    }

    /// Number of segments overlapping `logical`, for credit estimation.
    pub async fn overlapped(&self, logical: Extent) -> Result<u64> {
        self.map.overlapped(self.prefix, logical).await
    }

    /// Resolve `logical` into per-segment fragments.
    pub async fn fragments(&self, logical: Extent) -> Result<Vec<Fragment>> {
        assert!(
            !logical.is_empty() && logical.end <= NAMESPACE_END,
            "invalid logical range {logical}"
        );
        let mut cursor = self.map.lookup(self.prefix, logical.start).await?;
        let mut caret = Caret::new(&mut cursor, logical.start);
        let mut frags = Vec::new();
        let mut remaining = logical.length();
        while remaining > 0 {
            let seg = *caret.segment();
            let index = caret.index();
            let size = caret.step().min(remaining);
            let target = match seg.value {
                HOLE => Target::Hole,
                v if is_physical(v) => Target::Physical(v + (index - seg.ext.start)),
                _ => Target::Unallocated,
            };
            frags.push(Fragment {
                logical: Extent::new(index, index + size),
                target,
            });
            remaining -= size;
            if caret.advance(size).await? {
                break;
            }
        }
        Ok(frags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P: Prefix = Prefix(9);

    #[test]
    fn test_special_values() {
        assert!(is_physical(0));
        assert!(is_physical(VALUE_SPECIAL_MIN - 1));
        assert!(!is_physical(HOLE));
        assert!(!is_physical(UNALLOCATED));
        assert!(HOLE < NAMESPACE_END);
    }

    #[test]
    fn test_cut_right_shifts_physical() {
        let mut policy = BlockMapPolicy::new();
        let mut seg = Segment::new(P, Extent::new(100, 200), 5000);
        policy.cut_right(&mut seg, &Extent::new(100, 130), 5000);
        assert_eq!(seg.value, 5030);
        assert_eq!(policy.released(), &[Extent::new(5000, 5030)]);
    }

    #[test]
    fn test_cut_both_sides_releases_once() {
        let mut policy = BlockMapPolicy::new();
        let mut seg = Segment::new(P, Extent::new(0, 100), 1000);
        let clip = Extent::new(40, 60);
        policy.cut_left(&mut seg, &clip, 1000);
        assert_eq!(seg.value, 1000);
        policy.cut_right(&mut seg, &clip, 1000);
        assert_eq!(seg.value, 1060);
        assert_eq!(policy.take_released(), vec![Extent::new(1040, 1060)]);
        assert!(policy.released().is_empty());
    }

    #[test]
    fn test_special_values_are_kept() {
        let mut policy = BlockMapPolicy::new();
        let mut seg = Segment::new(P, Extent::new(0, 100), HOLE);
        policy.cut_right(&mut seg, &Extent::new(0, 10), HOLE);
        assert_eq!(seg.value, HOLE);
        policy.delete(&seg);
        assert!(policy.released().is_empty());
    }
}
