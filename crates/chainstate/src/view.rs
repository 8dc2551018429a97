//! Read-only view of the active chain used by the tier-two subsystems.

use std::sync::{PoisonError, RwLock};

use bczd_consensus::Hash256;

use crate::index::ChainIndex;

pub trait ChainView: Send + Sync {
    /// Height of the active tip; -1 when no block is connected.
    fn best_height(&self) -> i32;
    fn hash_at_height(&self, height: i32) -> Option<Hash256>;
    fn block_time_at_height(&self, height: i32) -> Option<i64>;
    fn best_block_time(&self) -> Option<i64>;

    fn best_hash(&self) -> Option<Hash256> {
        self.hash_at_height(self.best_height())
    }
}

impl ChainView for RwLock<ChainIndex> {
    fn best_height(&self) -> i32 {
        self.read().unwrap_or_else(PoisonError::into_inner).height()
    }

    fn hash_at_height(&self, height: i32) -> Option<Hash256> {
        let index = self.read().unwrap_or_else(PoisonError::into_inner);
        let id = index.at_height(height)?;
        index.node(id).map(|node| node.hash)
    }

    fn block_time_at_height(&self, height: i32) -> Option<i64> {
        let index = self.read().unwrap_or_else(PoisonError::into_inner);
        let id = index.at_height(height)?;
        index.node(id).map(|node| node.time)
    }

    fn best_block_time(&self) -> Option<i64> {
        let index = self.read().unwrap_or_else(PoisonError::into_inner);
        let id = index.tip()?;
        index.node(id).map(|node| node.time)
    }
}
