//! Byte-granular position in a map.
//!
//! A [`Caret`] is a cursor plus an offset inside the cursor's segment. It
//! walks the namespace by byte counts, moving the cursor across segment
//! boundaries as needed; callers use it to cut an I/O range into
//! per-segment fragments.

use crate::cursor::Cursor;
use crate::segment::NAMESPACE_END;
use crate::{Result, Segment};
use stratum_be::{KvStore, Op};
use tracing::trace;

/// Offset within a cursor's current segment.
///
/// `index` lies in the cursor's segment, or equals `NAMESPACE_END` once the
/// caret has walked off the end of the last segment.
pub struct Caret<'c, 'm, S: KvStore> {
    cursor: &'c mut Cursor<'m, S>,
    index: u64,
}

impl<'c, 'm, S: KvStore> Caret<'c, 'm, S> {
    /// Place a caret at `index` of the cursor's segment.
    ///
    /// # Panics
    ///
    /// Panics unless `index` lies in the cursor's current segment.
    pub fn new(cursor: &'c mut Cursor<'m, S>, index: u64) -> Self {
        assert!(
            cursor.segment().ext.contains(index),
            "caret index {index:#x} outside segment {}",
            cursor.segment().ext
        );
        Self { cursor, index }
    }

    /// Offsets left in the current segment.
    pub fn step(&self) -> u64 {
        self.cursor.segment().ext.end - self.index
    }

    /// Advance by `count` offsets, moving to following segments as needed.
    ///
    /// Returns true once the caret reaches the end of the namespace.
    pub async fn advance(&mut self, mut count: u64) -> Result<bool> {
        while count > 0 && self.index < NAMESPACE_END {
            let step = self.step();
            if count < step {
                self.index += count;
                break;
            }
            count -= step;
            if self.cursor.is_last() {
                self.index = NAMESPACE_END;
                break;
            }
            self.cursor.next().await?;
            self.index = self.cursor.segment().ext.start;
        }
        trace!(index = self.index, "caret");
        Ok(self.index == NAMESPACE_END)
    }

    /// Blocking form of [`advance`](Self::advance).
    pub fn advance_sync(&mut self, count: u64) -> Result<bool> {
        Op::new(self.advance(count)).wait()
    }

    /// Current offset.
    pub const fn index(&self) -> u64 {
        self.index
    }

    /// Segment the caret is in.
    pub fn segment(&self) -> &Segment {
        self.cursor.segment()
    }

    /// True once the caret has reached the end of the namespace.
    pub const fn is_done(&self) -> bool {
        self.index == NAMESPACE_END
    }
}
