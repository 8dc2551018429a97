//! Shared tier-two sync flags, read by the message handlers and written by
//! the sync state machine.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use bczd_consensus::Hash256;
use serde::Serialize;

/// Peers asked per phase before moving on.
pub const SYNC_THRESHOLD: u32 = 2;
/// Base timeout of a sync phase, in seconds.
pub const SYNC_TIMEOUT: i64 = 5;
/// Minimum interval between two chain-sync re-evaluations.
pub const CHAIN_SYNC_UPDATE_SECS: i64 = 30;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize)]
pub enum SyncPhase {
    Initial,
    Sporks,
    MasternodeList,
    MasternodeWinners,
    Failed,
    Finished,
}

impl SyncPhase {
    pub fn id(self) -> i32 {
        match self {
            SyncPhase::Initial => 0,
            SyncPhase::Sporks => 1,
            SyncPhase::MasternodeList => 2,
            SyncPhase::MasternodeWinners => 3,
            SyncPhase::Failed => 998,
            SyncPhase::Finished => 999,
        }
    }

    pub fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(SyncPhase::Initial),
            1 => Some(SyncPhase::Sporks),
            2 => Some(SyncPhase::MasternodeList),
            3 => Some(SyncPhase::MasternodeWinners),
            998 => Some(SyncPhase::Failed),
            999 => Some(SyncPhase::Finished),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            SyncPhase::Initial | SyncPhase::Failed => SyncPhase::Sporks,
            SyncPhase::Sporks => SyncPhase::MasternodeList,
            SyncPhase::MasternodeList => SyncPhase::MasternodeWinners,
            SyncPhase::MasternodeWinners | SyncPhase::Finished => SyncPhase::Finished,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SyncPhase::Initial => "initial",
            SyncPhase::Sporks => "sporks",
            SyncPhase::MasternodeList => "masternode-list",
            SyncPhase::MasternodeWinners => "masternode-winners",
            SyncPhase::Failed => "failed",
            SyncPhase::Finished => "finished",
        }
    }
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Default)]
struct SeenItems {
    broadcasts: HashMap<Hash256, u32>,
    last_masternode_list: i64,
}

pub struct TierTwoSyncState {
    blockchain_synced: AtomicBool,
    last_chain_sync_update: AtomicI64,
    phase: AtomicI32,
    seen: Mutex<SeenItems>,
}

impl Default for TierTwoSyncState {
    fn default() -> Self {
        Self::new()
    }
}

impl TierTwoSyncState {
    pub fn new() -> Self {
        Self {
            blockchain_synced: AtomicBool::new(false),
            last_chain_sync_update: AtomicI64::new(0),
            phase: AtomicI32::new(SyncPhase::Initial.id()),
            seen: Mutex::new(SeenItems::default()),
        }
    }

    fn seen(&self) -> MutexGuard<'_, SeenItems> {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_blockchain_synced(&self) -> bool {
        self.blockchain_synced.load(Ordering::Acquire)
    }

    pub fn set_blockchain_synced(&self, synced: bool, now: i64) {
        self.blockchain_synced.store(synced, Ordering::Release);
        self.last_chain_sync_update.store(now, Ordering::Release);
    }

    /// True once the chain-sync flag is older than the update window.
    pub fn can_update_chain_sync(&self, now: i64) -> bool {
        now > self.last_chain_sync_update.load(Ordering::Acquire) + CHAIN_SYNC_UPDATE_SECS
    }

    pub fn phase(&self) -> SyncPhase {
        SyncPhase::from_id(self.phase.load(Ordering::Acquire)).unwrap_or(SyncPhase::Initial)
    }

    pub fn set_phase(&self, phase: SyncPhase) {
        self.phase.store(phase.id(), Ordering::Release);
    }

    pub fn is_synced(&self) -> bool {
        self.phase() == SyncPhase::Finished
    }

    pub fn is_spork_list_synced(&self) -> bool {
        self.phase().id() > SyncPhase::Sporks.id()
    }

    pub fn is_masternode_list_synced(&self) -> bool {
        self.phase().id() > SyncPhase::MasternodeList.id()
    }

    /// Marks a broadcast as received during sync. Each hash refreshes the
    /// list timestamp at most `SYNC_THRESHOLD` times.
    pub fn added_masternode_list(&self, hash: Hash256, now: i64) {
        let mut seen = self.seen();
        let count = seen.broadcasts.entry(hash).or_insert(0);
        if *count < SYNC_THRESHOLD {
            *count += 1;
            seen.last_masternode_list = now;
        }
    }

    pub fn erase_seen_mnb(&self, hash: &Hash256) {
        self.seen().broadcasts.remove(hash);
    }

    pub fn last_masternode_list(&self) -> i64 {
        self.seen().last_masternode_list
    }

    pub fn reset_data(&self) {
        *self.seen() = SeenItems::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_ids_round_trip_and_advance() {
        for phase in [
            SyncPhase::Initial,
            SyncPhase::Sporks,
            SyncPhase::MasternodeList,
            SyncPhase::MasternodeWinners,
            SyncPhase::Failed,
            SyncPhase::Finished,
        ] {
            assert_eq!(SyncPhase::from_id(phase.id()), Some(phase));
        }
        assert_eq!(SyncPhase::from_id(4), None);
        assert_eq!(SyncPhase::Failed.next(), SyncPhase::Sporks);
        assert_eq!(SyncPhase::MasternodeWinners.next(), SyncPhase::Finished);
    }

    #[test]
    fn seen_broadcasts_refresh_the_list_time_twice() {
        let state = TierTwoSyncState::new();
        let hash = [7u8; 32];
        state.added_masternode_list(hash, 10);
        state.added_masternode_list(hash, 20);
        state.added_masternode_list(hash, 30);
        assert_eq!(state.last_masternode_list(), 20);

        state.erase_seen_mnb(&hash);
        state.added_masternode_list(hash, 40);
        assert_eq!(state.last_masternode_list(), 40);

        state.reset_data();
        assert_eq!(state.last_masternode_list(), 0);
    }

    #[test]
    fn chain_sync_window() {
        let state = TierTwoSyncState::new();
        assert!(state.can_update_chain_sync(1));
        state.set_blockchain_synced(true, 100);
        assert!(state.is_blockchain_synced());
        assert!(!state.can_update_chain_sync(130));
        assert!(state.can_update_chain_sync(131));
    }

    #[test]
    fn synced_flags_follow_the_phase() {
        let state = TierTwoSyncState::new();
        assert!(!state.is_spork_list_synced());
        state.set_phase(SyncPhase::MasternodeList);
        assert!(state.is_spork_list_synced());
        assert!(!state.is_masternode_list_synced());
        state.set_phase(SyncPhase::Finished);
        assert!(state.is_synced());
        assert!(state.is_masternode_list_synced());
    }
}
