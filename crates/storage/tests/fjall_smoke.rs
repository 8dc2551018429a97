#![cfg(feature = "fjall")]

use bczd_storage::fjall::FjallStore;
use bczd_storage::{Column, KeyValueStore, WriteBatch};

#[test]
fn sporks_survive_a_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");

    {
        let store = FjallStore::open(dir.path()).expect("open fjall");
        store.put(Column::Spork, &10_001i32.to_le_bytes(), b"first").expect("put");
        store.put(Column::Spork, &10_002i32.to_le_bytes(), b"second").expect("put");

        let mut batch = WriteBatch::new();
        batch.put(Column::Utxo, b"coin-a", b"1");
        batch.delete(Column::Spork, 10_002i32.to_le_bytes());
        store.write_batch(&batch).expect("batch commit");
        store.persist().expect("persist");
    }

    let store = FjallStore::open(dir.path()).expect("reopen fjall");
    assert_eq!(
        store.get(Column::Spork, &10_001i32.to_le_bytes()).expect("get"),
        Some(b"first".to_vec())
    );
    assert!(store.get(Column::Spork, &10_002i32.to_le_bytes()).expect("get").is_none());
    let rows = store.scan_prefix(Column::Utxo, b"coin").expect("scan");
    assert_eq!(rows, vec![(b"coin-a".to_vec(), b"1".to_vec())]);
    assert_eq!(store.scan_prefix(Column::Spork, b"").expect("scan").len(), 1);
}
