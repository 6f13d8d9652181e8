//! Integration tests for lookup, split, merge and paste.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use pretty_assertions::assert_eq;
use stratum_be::{MemStore, Tx, TxCredit};
use stratum_emap::{
    BINDEX_MAX, EmapError, ExtMap, ExtMapConfig, Extent, KeepValues, NAMESPACE_END, OpType, Prefix,
    Segment, SplitPiece,
};

const P: Prefix = Prefix(0xabcd);

/// Open a transaction prepared with `credit`.
fn begin(map: &ExtMap<MemStore>, credit: TxCredit) -> Tx {
    let mut tx = Tx::new();
    tx.prep(&credit);
    map.store().open(&mut tx).expect("Failed to open transaction");
    tx
}

/// Table holding map `P` as a single segment of value 42.
async fn single_segment_map() -> ExtMap<MemStore> {
    let map = ExtMap::with_config(MemStore::new(), ExtMapConfig::paranoid());
    let mut tx = begin(
        &map,
        map.credit_for(OpType::Create, 1) + map.credit_for(OpType::Insert, 1),
    );
    map.create(&mut tx).await.expect("Failed to create table");
    map.obj_insert(&mut tx, P, 42).await.expect("Failed to insert map");
    map.store().commit(&mut tx).expect("Failed to commit");
    map
}

/// Split the single segment of `P` into pieces of the given lengths; the
/// last piece takes the rest of the namespace.
async fn split_map(lengths: &[(u64, u64)], last_value: u64) -> ExtMap<MemStore> {
    let map = single_segment_map().await;
    let used: u64 = lengths.iter().map(|(l, _)| l).sum();
    let mut pieces: Vec<SplitPiece> = lengths
        .iter()
        .map(|&(l, v)| SplitPiece::new(l, v))
        .collect();
    pieces.push(SplitPiece::new(NAMESPACE_END - used, last_value));

    let mut tx = begin(&map, map.credit_for(OpType::Split, pieces.len() as u64));
    let mut cursor = map.lookup(P, 0).await.unwrap();
    cursor.split(&mut tx, &pieces).await.unwrap();
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();
    map
}

fn triples(segs: &[Segment]) -> Vec<(u64, u64, u64)> {
    segs.iter()
        .map(|s| (s.ext.start, s.ext.end, s.value))
        .collect()
}

#[tokio::test]
async fn test_new_map_is_one_segment() {
    let map = single_segment_map().await;
    let cursor = map.lookup(P, 0).await.unwrap();

    assert_eq!(cursor.segment().ext, Extent::new(0, NAMESPACE_END));
    assert_eq!(cursor.segment().value, 42);
    assert!(cursor.is_first());
    assert!(cursor.is_last());
    cursor.close().await.unwrap();

    let cursor = map.lookup(P, BINDEX_MAX).await.unwrap();
    assert_eq!(cursor.segment().value, 42);
}

#[tokio::test]
async fn test_split_skips_zero_length_piece() {
    let map = single_segment_map().await;
    let mut tx = begin(&map, map.credit_for(OpType::Split, 4));
    let mut cursor = map.lookup(P, 0).await.unwrap();
    cursor
        .split(
            &mut tx,
            &[
                SplitPiece::new(100, 1),
                SplitPiece::new(2, 2),
                SplitPiece::new(0, 3),
                SplitPiece::new(NAMESPACE_END - 102, 4),
            ],
        )
        .await
        .unwrap();
    assert_eq!(cursor.segment().ext, Extent::new(102, NAMESPACE_END));
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(
        triples(&map.segments(P).await.unwrap()),
        vec![(0, 100, 1), (100, 102, 2), (102, NAMESPACE_END, 4)]
    );
}

#[tokio::test]
async fn test_paste_does_not_resurrect_overlapped_segment() {
    let map = split_map(&[(512, 1), (512, 2), (1024, 3)], 4).await;
    let mut tx = begin(&map, map.credit_for(OpType::Paste, 2));
    let mut cursor = map.lookup(P, 0).await.unwrap();
    cursor
        .paste(&mut tx, Extent::new(0, 1024), 9, &mut KeepValues)
        .await
        .unwrap();
    assert_eq!(cursor.segment().ext, Extent::new(0, 1024));
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(
        triples(&map.segments(P).await.unwrap()),
        vec![(0, 1024, 9), (1024, 2048, 3), (2048, NAMESPACE_END, 4)]
    );
}

#[tokio::test]
async fn test_paste_across_boundaries_keeps_remainders() {
    let map = split_map(&[(512, 1), (512, 2), (1024, 3)], 4).await;
    let nr = map.overlapped(P, Extent::new(100, 1500)).await.unwrap();
    assert_eq!(nr, 3);

    let mut tx = begin(&map, map.credit_for(OpType::Paste, nr));
    let mut cursor = map.lookup(P, 100).await.unwrap();
    cursor
        .paste(&mut tx, Extent::new(100, 1500), 7, &mut KeepValues)
        .await
        .unwrap();
    assert_eq!(cursor.segment().ext, Extent::new(1500, 2048));
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(
        triples(&map.segments(P).await.unwrap()),
        vec![
            (0, 100, 1),
            (100, 1500, 7),
            (1500, 2048, 3),
            (2048, NAMESPACE_END, 4)
        ]
    );
}

#[tokio::test]
async fn test_merge_by_full_length_removes_segment() {
    let map = split_map(&[(100, 1), (50, 2)], 3).await;
    let mut tx = begin(&map, map.credit_for(OpType::Merge, 1));
    let mut cursor = map.lookup(P, 120).await.unwrap();
    assert_eq!(cursor.segment().ext, Extent::new(100, 150));
    cursor.merge(&mut tx, 50).await.unwrap();

    assert_eq!(cursor.segment().ext, Extent::new(100, NAMESPACE_END));
    assert!(cursor.is_last());
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(
        triples(&map.segments(P).await.unwrap()),
        vec![(0, 100, 1), (100, NAMESPACE_END, 3)]
    );
}

#[tokio::test]
async fn test_partial_merge_moves_boundary() {
    let map = split_map(&[(100, 1), (50, 2)], 3).await;
    let mut tx = begin(&map, map.credit_for(OpType::Merge, 1));
    let mut cursor = map.lookup(P, 0).await.unwrap();
    cursor.merge(&mut tx, 30).await.unwrap();
    assert_eq!(cursor.segment().ext, Extent::new(70, 150));
    assert_eq!(cursor.segment().value, 2);
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(
        triples(&map.segments(P).await.unwrap()),
        vec![(0, 70, 1), (70, 150, 2), (150, NAMESPACE_END, 3)]
    );
}

#[tokio::test]
async fn test_split_then_merge_restores_boundaries() {
    let map = single_segment_map().await;
    let lengths = [10u64, 20, 30];
    let rest = NAMESPACE_END - 60;

    // Split [0, END) into [0,10) [10,30) [30,60) [60,END).
    let mut tx = begin(&map, map.credit_for(OpType::Split, 4));
    let mut cursor = map.lookup(P, 0).await.unwrap();
    let mut pieces: Vec<SplitPiece> = lengths.iter().map(|&l| SplitPiece::new(l, l)).collect();
    pieces.push(SplitPiece::new(rest, 0));
    cursor.split(&mut tx, &pieces).await.unwrap();
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();
    assert_eq!(map.segments(P).await.unwrap().len(), 4);

    // Merge each of the first three into its successor.
    let mut tx = begin(&map, map.credit_for(OpType::Merge, 3));
    for _ in 0..lengths.len() {
        let mut cursor = map.lookup(P, 0).await.unwrap();
        let len = cursor.segment().ext.length();
        cursor.merge(&mut tx, len).await.unwrap();
        cursor.close().await.unwrap();
    }
    map.store().commit(&mut tx).unwrap();

    let segs = map.segments(P).await.unwrap();
    assert_eq!(segs.len(), 1);
    assert_eq!(segs[0].ext, Extent::FULL);
}

#[tokio::test]
async fn test_self_paste_leaves_map_unchanged() {
    let map = split_map(&[(64, 1), (64, 2)], 3).await;
    let before = map.segments(P).await.unwrap();

    for seg in &before {
        let mut tx = begin(&map, map.credit_for(OpType::Paste, 1));
        let mut cursor = map.lookup(P, seg.ext.start).await.unwrap();
        cursor
            .paste(&mut tx, seg.ext, seg.value, &mut KeepValues)
            .await
            .unwrap();
        cursor.close().await.unwrap();
        map.store().commit(&mut tx).unwrap();
    }
    assert_eq!(map.segments(P).await.unwrap(), before);
}

#[tokio::test]
async fn test_lookup_covers_every_offset() {
    let map = split_map(&[(3, 1), (5, 2), (1, 3)], 4).await;
    for seg in map.segments(P).await.unwrap() {
        let last = if seg.is_last() {
            seg.ext.start + 16
        } else {
            seg.ext.end
        };
        for offset in seg.ext.start..last {
            let cursor = map.lookup(P, offset).await.unwrap();
            assert_eq!(*cursor.segment(), seg, "offset {offset}");
        }
    }
}

#[tokio::test]
async fn test_cursor_walks_both_ways() {
    let map = split_map(&[(10, 1), (10, 2)], 3).await;
    let mut cursor = map.lookup(P, 0).await.unwrap();
    let mut values = vec![cursor.segment().value];
    while !cursor.is_last() {
        cursor.next().await.unwrap();
        values.push(cursor.segment().value);
    }
    assert_eq!(values, vec![1, 2, 3]);

    cursor.prev().await.unwrap();
    cursor.prev().await.unwrap();
    assert!(cursor.is_first());
    assert_eq!(cursor.segment().value, 1);
}

#[tokio::test]
async fn test_lookup_missing_prefix() {
    let map = single_segment_map().await;

    match map.lookup(Prefix(1), 0).await {
        Err(EmapError::NotFound { prefix, next }) => {
            assert_eq!(prefix, Prefix(1));
            assert_eq!(next.prefix, P);
            assert!(next.is_first());
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert!(matches!(
        map.lookup(Prefix(P.0 + 1), 0).await,
        Err(EmapError::NoMoreMaps { .. })
    ));
}

#[tokio::test]
async fn test_prefixes_walks_all_maps() {
    let map = single_segment_map().await;
    let mut tx = begin(&map, map.credit_for(OpType::Insert, 2));
    map.obj_insert(&mut tx, Prefix(3), 0).await.unwrap();
    map.obj_insert(&mut tx, Prefix(u128::MAX), 0).await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(
        map.prefixes().await.unwrap(),
        vec![Prefix(3), P, Prefix(u128::MAX)]
    );
}

#[tokio::test]
async fn test_maps_do_not_interfere() {
    let map = single_segment_map().await;
    let other = Prefix(P.0 - 1);
    let mut tx = begin(
        &map,
        map.credit_for(OpType::Insert, 1) + map.credit_for(OpType::Paste, 1),
    );
    map.obj_insert(&mut tx, other, 5).await.unwrap();
    let mut cursor = map.lookup(other, 0).await.unwrap();
    cursor
        .paste(&mut tx, Extent::new(0, NAMESPACE_END), 6, &mut KeepValues)
        .await
        .unwrap();
    cursor.close().await.unwrap();
    map.store().commit(&mut tx).unwrap();

    assert_eq!(triples(&map.segments(other).await.unwrap()), vec![(0, NAMESPACE_END, 6)]);
    assert_eq!(triples(&map.segments(P).await.unwrap()), vec![(0, NAMESPACE_END, 42)]);
}

#[tokio::test]
async fn test_obj_delete() {
    let map = single_segment_map().await;
    let mut tx = begin(&map, map.credit_for(OpType::Delete, 1));
    map.obj_delete(&mut tx, P).await.unwrap();
    map.store().commit(&mut tx).unwrap();
    assert!(map.segments(P).await.unwrap().is_empty());
    assert!(map.store().is_empty());
}

#[tokio::test]
#[should_panic(expected = "must be a single segment")]
async fn test_obj_delete_requires_single_segment() {
    let map = split_map(&[(10, 1)], 2).await;
    let mut tx = begin(&map, map.credit_for(OpType::Delete, 1));
    let _ = map.obj_delete(&mut tx, P).await;
}

#[tokio::test]
async fn test_check_invariant_reports_gap() {
    let map = single_segment_map().await;
    // Replace the full segment with one that leaves [0, 10) uncovered.
    let mut tx = begin(&map, map.credit_for(OpType::Update, 1));
    let mut cursor = map.lookup(P, 0).await.unwrap();
    let seg = Segment::new(P, Extent::new(10, NAMESPACE_END), 42);
    cursor.extent_update(&mut tx, &seg).await.unwrap();
    assert!(matches!(
        cursor.check_invariant().await,
        Err(EmapError::Invariant(_))
    ));
    // Closing runs the same check on a map configured to verify.
    assert!(matches!(cursor.close().await, Err(EmapError::Invariant(_))));
    map.store().abort(&mut tx).unwrap();

    map.check_invariant(P).await.unwrap();
}
