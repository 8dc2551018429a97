//! Payee vote records consulted by the last-paid lookback.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

pub trait PaymentVotes: Send + Sync {
    /// Whether `script` collected at least `min_votes` votes as payee of the
    /// block at `height`.
    fn has_payee_with_votes(&self, height: i32, script: &[u8], min_votes: usize) -> bool;
}

/// Used when no payment votes are tracked.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPaymentVotes;

impl PaymentVotes for NoPaymentVotes {
    fn has_payee_with_votes(&self, _height: i32, _script: &[u8], _min_votes: usize) -> bool {
        false
    }
}

/// In-memory vote tally per block height.
#[derive(Debug, Default)]
pub struct BlockPayees {
    blocks: Mutex<BTreeMap<i32, HashMap<Vec<u8>, usize>>>,
}

impl BlockPayees {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_vote(&self, height: i32, script: &[u8]) {
        let mut blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        *blocks
            .entry(height)
            .or_default()
            .entry(script.to_vec())
            .or_insert(0) += 1;
    }

    /// Drops tallies below `min_height`.
    pub fn prune_below(&self, min_height: i32) {
        let mut blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        *blocks = blocks.split_off(&min_height);
    }

    pub fn len(&self) -> usize {
        self.blocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PaymentVotes for BlockPayees {
    fn has_payee_with_votes(&self, height: i32, script: &[u8], min_votes: usize) -> bool {
        let blocks = self.blocks.lock().unwrap_or_else(PoisonError::into_inner);
        blocks
            .get(&height)
            .and_then(|payees| payees.get(script))
            .is_some_and(|votes| *votes >= min_votes)
    }
}
