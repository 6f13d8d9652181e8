//! Key and record layout in the backing table.
//!
//! Segment `([A, B), V)` of map `P` is stored under key `(P, B)` with record
//! `(A, V)`. The key carries the segment's *end*: a range lookup for offset
//! `X` seeks the first key `>= (P, X + 1)`, which is the segment whose end
//! lies past `X` and whose start is at or before it.
//!
//! Both structures are big-endian so that byte order of the encoded key
//! equals numeric `(prefix, offset)` order.
//!
//! ```text
//! key     | prefix (u128) | end (u64) |     24 bytes
//! record  | start (u64)   | value (u64) |   16 bytes
//! ```

use crate::segment::{Extent, Prefix, Segment};
use crate::{EmapError, Result};
use binrw::{BinRead, BinWrite};
use std::io::Cursor;

/// Encoded key size in bytes.
pub const KEY_SIZE: u64 = 24;

/// Encoded record size in bytes.
pub const REC_SIZE: u64 = 16;

/// Table key: map prefix and segment end offset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, BinRead, BinWrite)]
#[brw(big)]
pub struct EmapKey {
    /// Map identifier.
    pub prefix: u128,
    /// End offset of the segment (exclusive).
    pub offset: u64,
}

/// Table record: segment start offset and value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, BinRead, BinWrite)]
#[brw(big)]
pub struct EmapRec {
    /// Start offset of the segment (inclusive).
    pub start: u64,
    /// Segment value.
    pub value: u64,
}

impl EmapKey {
    /// Key probing `(prefix, offset)`.
    pub const fn new(prefix: Prefix, offset: u64) -> Self {
        Self {
            prefix: prefix.0,
            offset,
        }
    }

    /// Encode to table bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self, KEY_SIZE)
    }

    /// Decode from table bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        decode(data, KEY_SIZE, "key")
    }
}

impl EmapRec {
    /// Encode to table bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self, REC_SIZE)
    }

    /// Decode from table bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        decode(data, REC_SIZE, "record")
    }
}

/// Internal representation of `seg`.
pub const fn pack(seg: &Segment) -> (EmapKey, EmapRec) {
    (
        EmapKey::new(seg.prefix, seg.ext.end),
        EmapRec {
            start: seg.ext.start,
            value: seg.value,
        },
    )
}

/// External representation of a stored key and record.
///
/// Fails with `Invalid` when the record does not describe a non-empty
/// extent ending at the key's offset.
pub fn open(key: &EmapKey, rec: &EmapRec) -> Result<Segment> {
    if rec.start >= key.offset {
        return Err(EmapError::Invalid(format!(
            "record start {:#x} not below key offset {:#x} in map {}",
            rec.start,
            key.offset,
            Prefix(key.prefix)
        )));
    }
    Ok(Segment::new(
        Prefix(key.prefix),
        Extent::new(rec.start, key.offset),
        rec.value,
    ))
}

fn encode<T>(item: &T, size: u64) -> Vec<u8>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    let mut cursor = Cursor::new(Vec::with_capacity(size as usize));
    // Writing fixed-size integers into a Vec cannot fail.
    let _ = item.write_be(&mut cursor);
    cursor.into_inner()
}

fn decode<T>(data: &[u8], size: u64, what: &str) -> Result<T>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    if data.len() as u64 != size {
        return Err(EmapError::Invalid(format!(
            "{what} {} is {} bytes, expected {size}",
            hex::encode(data),
            data.len()
        )));
    }
    T::read_be(&mut Cursor::new(data))
        .map_err(|e| EmapError::Invalid(format!("failed to parse {what}: {e}")))
}
