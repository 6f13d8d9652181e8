//! Integration tests for transactions over the in-memory table.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::sync::Arc;
use stratum_be::{
    BeError, FailAfter, KvCursor, KvStore, MemStore, StoreConfig, Tx, TxCredit, TxState,
};

/// Open a transaction with generous credit.
fn open_tx(store: &MemStore) -> Tx {
    let mut tx = Tx::new();
    tx.prep(&TxCredit::new(64, 4096));
    store.open(&mut tx).expect("Failed to open transaction");
    tx
}

/// Create a table holding `keys`, each mapped to its own bytes.
async fn populated(keys: &[&[u8]]) -> MemStore {
    let store = MemStore::new();
    let mut tx = open_tx(&store);
    store.create(&mut tx).await.expect("Failed to create table");
    for key in keys {
        store.insert(&mut tx, key, key).await.expect("Failed to insert");
    }
    store.commit(&mut tx).expect("Failed to commit");
    store
}

#[tokio::test]
async fn test_commit_makes_writes_visible() {
    let store = populated(&[b"a", b"b"]).await;

    let mut tx = open_tx(&store);
    store.update(&mut tx, b"a", b"A").await.unwrap();
    store.delete(&mut tx, b"b").await.unwrap();
    store.commit(&mut tx).unwrap();

    assert_eq!(tx.state(), TxState::Committed);
    assert_eq!(store.get(b"a").await.unwrap(), Some(b"A".to_vec()));
    assert_eq!(store.get(b"b").await.unwrap(), None);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_abort_restores_table() {
    let store = populated(&[b"a", b"b", b"c"]).await;

    let mut tx = open_tx(&store);
    store.delete(&mut tx, b"a").await.unwrap();
    store.update(&mut tx, b"b", b"changed").await.unwrap();
    store.insert(&mut tx, b"d", b"d").await.unwrap();
    store.insert(&mut tx, b"a", b"again").await.unwrap();
    store.abort(&mut tx).unwrap();

    assert_eq!(tx.state(), TxState::Aborted);
    assert_eq!(store.get(b"a").await.unwrap(), Some(b"a".to_vec()));
    assert_eq!(store.get(b"b").await.unwrap(), Some(b"b".to_vec()));
    assert_eq!(store.get(b"d").await.unwrap(), None);
    assert_eq!(store.len(), 3);
}

#[tokio::test]
async fn test_abort_undoes_create_and_destroy() {
    let store = MemStore::new();
    let mut tx = open_tx(&store);
    store.create(&mut tx).await.unwrap();
    store.abort(&mut tx).unwrap();
    assert!(!store.is_created());

    let store = populated(&[b"x"]).await;
    let mut tx = open_tx(&store);
    store.destroy(&mut tx).await.unwrap();
    assert!(!store.is_created());
    store.abort(&mut tx).unwrap();
    assert_eq!(store.get(b"x").await.unwrap(), Some(b"x".to_vec()));
}

#[tokio::test]
async fn test_key_errors() {
    let store = populated(&[b"a"]).await;
    let mut tx = open_tx(&store);

    assert!(matches!(
        store.insert(&mut tx, b"a", b"dup").await,
        Err(BeError::KeyExists(_))
    ));
    assert!(matches!(
        store.update(&mut tx, b"zz", b"v").await,
        Err(BeError::KeyNotFound(_))
    ));
    assert!(matches!(
        store.delete(&mut tx, b"zz").await,
        Err(BeError::KeyNotFound(_))
    ));
    assert!(matches!(
        store.create(&mut tx).await,
        Err(BeError::AlreadyCreated(_))
    ));
}

#[tokio::test]
async fn test_credit_is_charged() {
    let store = populated(&[]).await;
    let mut tx = Tx::new();
    tx.prep(&TxCredit::new(2, 10));
    store.open(&mut tx).unwrap();

    store.insert(&mut tx, b"k1", b"v1").await.unwrap();
    assert_eq!(tx.used(), TxCredit::new(1, 4));
    store.update(&mut tx, b"k1", b"value").await.unwrap();
    assert_eq!(tx.used(), TxCredit::new(2, 9));

    assert!(matches!(
        store.insert(&mut tx, b"k2", b"v2").await,
        Err(BeError::CreditExceeded { .. })
    ));
    assert_eq!(store.get(b"k2").await.unwrap(), None);
}

#[tokio::test]
async fn test_writes_need_open_transaction() {
    let store = populated(&[]).await;
    let mut tx = Tx::new();
    assert!(matches!(
        store.insert(&mut tx, b"k", b"v").await,
        Err(BeError::TxState { .. })
    ));

    let mut tx = open_tx(&store);
    store.commit(&mut tx).unwrap();
    assert!(matches!(
        store.insert(&mut tx, b"k", b"v").await,
        Err(BeError::TxState { .. })
    ));
    assert!(store.commit(&mut tx).is_err());
}

#[tokio::test]
async fn test_injected_failure_then_abort() {
    let faults = Arc::new(FailAfter::new(u64::MAX));
    let store = MemStore::with_config(StoreConfig::new("faulty")).with_faults(faults.clone());
    let mut tx = open_tx(&store);
    store.create(&mut tx).await.unwrap();
    store.insert(&mut tx, b"a", b"1").await.unwrap();
    store.commit(&mut tx).unwrap();

    faults.reset(1);
    let mut tx = open_tx(&store);
    store.update(&mut tx, b"a", b"2").await.unwrap();
    let err = store.insert(&mut tx, b"b", b"3").await;
    assert!(matches!(err, Err(BeError::ResourceExhausted(_))));

    // Reads are not failed.
    assert_eq!(store.get(b"a").await.unwrap(), Some(b"2".to_vec()));
    store.abort(&mut tx).unwrap();
    assert_eq!(store.get(b"a").await.unwrap(), Some(b"1".to_vec()));
}

#[tokio::test]
async fn test_cursor_walks_in_order() {
    let store = populated(&[b"b", b"d", b"f", b"h"]).await;
    let mut cursor = KvCursor::new(&store);

    assert!(cursor.get(b"c", true).await.unwrap());
    assert_eq!(cursor.pair().map(|p| p.key.clone()), Some(b"d".to_vec()));

    let mut seen = Vec::new();
    while let Some(pair) = cursor.pair() {
        seen.push(pair.key.clone());
        cursor.next().await.unwrap();
    }
    assert_eq!(seen, vec![b"d".to_vec(), b"f".to_vec(), b"h".to_vec()]);

    assert!(cursor.get(b"f", false).await.unwrap());
    assert!(cursor.prev().await.unwrap());
    assert!(cursor.prev().await.unwrap());
    assert_eq!(cursor.pair().map(|p| p.key.clone()), Some(b"b".to_vec()));
    assert!(!cursor.prev().await.unwrap());
    assert!(!cursor.get(b"z", true).await.unwrap());
}
