//! Collateral lookups: the UTXO view consulted when validating masternode
//! broadcasts.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use bczd_primitives::encoding::{DecodeError, Decoder, Encoder};
use bczd_primitives::outpoint::OutPoint;
use bczd_storage::{Column, KeyValueStore, StoreError, WriteBatch};

pub const OUTPOINT_KEY_LEN: usize = 36;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UtxoEntry {
    pub value: i64,
    pub script_pubkey: Vec<u8>,
    pub height: u32,
    pub is_coinbase: bool,
}

impl UtxoEntry {
    pub fn encode(&self) -> Vec<u8> {
        let mut encoder = Encoder::new();
        encoder.write_i64_le(self.value);
        encoder.write_var_bytes(&self.script_pubkey);
        encoder.write_u32_le(self.height);
        encoder.write_bool(self.is_coinbase);
        encoder.into_inner()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut decoder = Decoder::new(bytes);
        let value = decoder.read_i64_le()?;
        let script_pubkey = decoder.read_var_bytes()?;
        let height = decoder.read_u32_le()?;
        let is_coinbase = decoder.read_bool()?;
        if !decoder.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(Self {
            value,
            script_pubkey,
            height,
            is_coinbase,
        })
    }
}

pub fn outpoint_key(outpoint: &OutPoint) -> [u8; OUTPOINT_KEY_LEN] {
    let mut bytes = [0u8; OUTPOINT_KEY_LEN];
    bytes[..32].copy_from_slice(&outpoint.hash);
    bytes[32..].copy_from_slice(&outpoint.index.to_le_bytes());
    bytes
}

/// Unspent-output lookup. `Ok(None)` means spent or never created.
pub trait CoinsView: Send + Sync {
    fn coin(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, StoreError>;
}

pub struct UtxoSet<S> {
    store: S,
}

impl<S> UtxoSet<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

impl<S: KeyValueStore> UtxoSet<S> {
    pub fn get(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, StoreError> {
        match self.store.get(Column::Utxo, &outpoint_key(outpoint))? {
            Some(bytes) => UtxoEntry::decode(&bytes)
                .map(Some)
                .map_err(|err| StoreError::Backend(err.to_string())),
            None => Ok(None),
        }
    }

    pub fn put(&self, batch: &mut WriteBatch, outpoint: &OutPoint, entry: &UtxoEntry) {
        batch.put(Column::Utxo, outpoint_key(outpoint), entry.encode());
    }

    pub fn delete(&self, batch: &mut WriteBatch, outpoint: &OutPoint) {
        batch.delete(Column::Utxo, outpoint_key(outpoint));
    }

    pub fn commit(&self, batch: &WriteBatch) -> Result<(), StoreError> {
        self.store.write_batch(batch)
    }
}

impl<S: KeyValueStore> CoinsView for UtxoSet<S> {
    fn coin(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, StoreError> {
        self.get(outpoint)
    }
}

/// Coins held in memory; handy for tools and tests.
#[derive(Default)]
pub struct MemoryCoins {
    coins: RwLock<HashMap<OutPoint, UtxoEntry>>,
}

impl MemoryCoins {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, outpoint: OutPoint, entry: UtxoEntry) {
        self.coins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(outpoint, entry);
    }

    pub fn spend(&self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.coins
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(outpoint)
    }
}

impl CoinsView for MemoryCoins {
    fn coin(&self, outpoint: &OutPoint) -> Result<Option<UtxoEntry>, StoreError> {
        Ok(self
            .coins
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(outpoint)
            .cloned())
    }
}
