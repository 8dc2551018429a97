use bczd_primitives::encoding::decode;
use bczd_storage::{Column, KeyValueStore, StoreError};

use crate::ids::SporkId;
use crate::manager::SporkError;
use crate::message::SporkMessage;

/// Latest accepted message per spork, keyed by the raw id.
pub struct SporkDb<S> {
    store: S,
}

fn spork_key(id: SporkId) -> [u8; 4] {
    id.as_i32().to_le_bytes()
}

impl<S: KeyValueStore> SporkDb<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn write(&self, msg: &SporkMessage) -> Result<(), StoreError> {
        let Some(id) = msg.id() else {
            return Ok(());
        };
        self.store.put(Column::Spork, &spork_key(id), &msg.to_bytes())
    }

    pub fn read(&self, id: SporkId) -> Result<Option<SporkMessage>, SporkError> {
        let Some(bytes) = self.store.get(Column::Spork, &spork_key(id))? else {
            return Ok(None);
        };
        Ok(Some(decode(&bytes)?))
    }

    /// Every stored message, in key order.
    pub fn read_all(&self) -> Result<Vec<SporkMessage>, SporkError> {
        self.store
            .scan_prefix(Column::Spork, &[])?
            .into_iter()
            .map(|(_, bytes)| decode(&bytes).map_err(SporkError::from))
            .collect()
    }

    pub fn erase(&self, id: SporkId) -> Result<(), StoreError> {
        self.store.delete(Column::Spork, &spork_key(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bczd_storage::memory::MemoryStore;

    #[test]
    fn read_back_and_erase() {
        let db = SporkDb::new(MemoryStore::new());
        let msg = SporkMessage::new(SporkId::MasternodePayment, 10, 20);
        assert!(db.read(SporkId::MasternodePayment).expect("read").is_none());
        db.write(&msg).expect("write");
        assert_eq!(db.read(SporkId::MasternodePayment).expect("read"), Some(msg));
        let other = SporkMessage::new(SporkId::SwiftTx, 1, 30);
        db.write(&other).expect("write");
        assert_eq!(db.read_all().expect("all").len(), 2);
        db.erase(SporkId::MasternodePayment).expect("erase");
        assert_eq!(db.read_all().expect("all"), vec![other]);
        assert!(db.read(SporkId::MasternodePayment).expect("read").is_none());
    }

    #[test]
    fn corrupt_record_is_a_decode_error() {
        let store = MemoryStore::new();
        store
            .put(Column::Spork, &spork_key(SporkId::SwiftTx), &[1, 2])
            .expect("put");
        let db = SporkDb::new(store);
        assert!(matches!(
            db.read(SporkId::SwiftTx),
            Err(SporkError::Decode(_))
        ));
    }
}
