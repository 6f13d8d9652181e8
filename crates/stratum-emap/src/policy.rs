//! Value transformation during paste.
//!
//! When [`Cursor::paste`](crate::Cursor::paste) cuts an existing segment,
//! the surviving left or right remainder may need a different value than
//! the original (a physical block address, for example, moves with the
//! start of the range it maps). A [`SegmentPolicy`] decides.

use crate::segment::{Extent, Segment};

/// Callbacks invoked by paste for every overlapped segment.
///
/// `seg` is the existing segment, `clip` its intersection with the pasted
/// extent and `orig` its value before any callback ran. The value left in
/// `seg.value` after `cut_left` (`cut_right`) becomes the value of the left
/// (right) remainder. The default methods keep the original value.
pub trait SegmentPolicy {
    /// A non-empty part of `seg` survives left of `clip`.
    fn cut_left(&mut self, seg: &mut Segment, clip: &Extent, orig: u64) {
        let _ = (seg, clip, orig);
    }

    /// A non-empty part of `seg` survives right of `clip`.
    fn cut_right(&mut self, seg: &mut Segment, clip: &Extent, orig: u64) {
        let _ = (seg, clip, orig);
    }

    /// `seg` is entirely covered by the pasted extent.
    fn delete(&mut self, seg: &Segment) {
        let _ = seg;
    }
}

/// Keep the original value for every remainder.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepValues;

impl SegmentPolicy for KeepValues {}
