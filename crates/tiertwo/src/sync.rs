//! Tier-two sync state machine: sporks, then the masternode list, then
//! winners, driven by a periodic tick over the connected peers.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bczd_chainstate::ChainView;
use bczd_consensus::Network;
use bczd_log::{log_category, log_info, log_warn, Category};
use bczd_masternode::MasternodeManager;
use bczd_spork::{SporkId, SporkManager};
use rand::seq::SliceRandom;
use serde::Serialize;

use crate::fulfilled::{NetFulfilledRequestManager, GETSPORK_REQUEST, MNSYNC_REQUEST};
use crate::peer::{OutboundMessage, Peer, PeerSet};
use crate::state::{SyncPhase, TierTwoSyncState, SYNC_THRESHOLD, SYNC_TIMEOUT};

/// A tick further apart than this from the previous one means the host
/// slept; every timer is stale and sync restarts.
const SLEEP_RESET_SECS: i64 = 60 * 60;
/// The chain counts as synced while its tip is younger than this.
const CHAIN_SYNC_MAX_AGE_SECS: i64 = 60 * 60;
const FAILED_COOLDOWN_SECS: i64 = 60;

#[derive(Default)]
struct Progress {
    last_process: i64,
    last_failure: i64,
    failures: u32,
    attempt: u32,
    phase_started: i64,
    sum_masternode_list: i64,
    count_masternode_list: u32,
    sum_masternode_winner: i64,
    count_masternode_winner: u32,
}

#[derive(Clone, Debug, Serialize)]
pub struct SyncStatus {
    pub phase: SyncPhase,
    pub phase_id: i32,
    pub attempt: u32,
    pub failures: u32,
    pub blockchain_synced: bool,
    pub sum_masternode_list: i64,
    pub count_masternode_list: u32,
    pub sum_masternode_winner: i64,
    pub count_masternode_winner: u32,
}

enum Step {
    /// Try the next peer.
    NextPeer,
    /// Done for this tick.
    Stop,
    Request(OutboundMessage),
}

pub struct MasternodeSync {
    network: Network,
    state: Arc<TierTwoSyncState>,
    chain: Arc<dyn ChainView>,
    sporks: Arc<SporkManager>,
    masternodes: Arc<MasternodeManager>,
    fulfilled: Arc<NetFulfilledRequestManager>,
    progress: Mutex<Progress>,
}

impl MasternodeSync {
    pub fn new(
        network: Network,
        state: Arc<TierTwoSyncState>,
        chain: Arc<dyn ChainView>,
        sporks: Arc<SporkManager>,
        masternodes: Arc<MasternodeManager>,
        fulfilled: Arc<NetFulfilledRequestManager>,
    ) -> Self {
        Self {
            network,
            state,
            chain,
            sporks,
            masternodes,
            fulfilled,
            progress: Mutex::new(Progress::default()),
        }
    }

    fn progress(&self) -> MutexGuard<'_, Progress> {
        self.progress.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> &Arc<TierTwoSyncState> {
        &self.state
    }

    pub fn reset(&self, now: i64) {
        self.state.set_blockchain_synced(false, 0);
        self.state.reset_data();
        *self.progress() = Progress {
            phase_started: now,
            ..Progress::default()
        };
        self.state.set_phase(SyncPhase::Initial);
    }

    /// Sync still blocks payment-related work: sporks are not in yet, or
    /// payment enforcement is on and the list is incomplete.
    pub fn not_completed(&self, now: i64) -> bool {
        !self.state.is_synced()
            && (!self.state.is_spork_list_synced()
                || self
                    .sporks
                    .is_active_at(SporkId::MasternodePaymentEnforcement, now))
    }

    pub fn status_string(&self) -> &'static str {
        match self.state.phase() {
            SyncPhase::Initial => "MNs synchronization pending...",
            SyncPhase::Sporks => "Synchronizing sporks...",
            SyncPhase::MasternodeList => "Synchronizing masternodes...",
            SyncPhase::MasternodeWinners => "Synchronizing masternode winners...",
            SyncPhase::Failed => "Synchronization failed",
            SyncPhase::Finished => "Synchronization finished",
        }
    }

    pub fn status(&self) -> SyncStatus {
        let phase = self.state.phase();
        let progress = self.progress();
        SyncStatus {
            phase,
            phase_id: phase.id(),
            attempt: progress.attempt,
            failures: progress.failures,
            blockchain_synced: self.state.is_blockchain_synced(),
            sum_masternode_list: progress.sum_masternode_list,
            count_masternode_list: progress.count_masternode_list,
            sum_masternode_winner: progress.sum_masternode_winner,
            count_masternode_winner: progress.count_masternode_winner,
        }
    }

    /// Item count a peer reported after answering one of our requests.
    /// Only counts for the phase currently running.
    pub fn process_sync_status_count(&self, item: i32, count: i32) {
        let phase = self.state.phase();
        if phase == SyncPhase::Finished {
            return;
        }
        let mut progress = self.progress();
        match SyncPhase::from_id(item) {
            Some(SyncPhase::MasternodeList) if phase == SyncPhase::MasternodeList => {
                progress.sum_masternode_list += i64::from(count);
                progress.count_masternode_list += 1;
            }
            Some(SyncPhase::MasternodeWinners) if phase == SyncPhase::MasternodeWinners => {
                progress.sum_masternode_winner += i64::from(count);
                progress.count_masternode_winner += 1;
            }
            _ => {}
        }
        drop(progress);
        log_category!(Category::Sync, "ssc - got inventory count {item} {count}");
    }

    fn switch_to_next_phase(&self, progress: &mut Progress, now: i64) {
        let current = self.state.phase();
        if matches!(current, SyncPhase::Initial | SyncPhase::Failed) {
            self.fulfilled.clear();
        }
        let next = current.next();
        if next == SyncPhase::Finished {
            log_info!("tier-two sync has finished");
        } else {
            log_category!(Category::Sync, "sync phase {current} -> {next}");
        }
        self.state.set_phase(next);
        progress.attempt = 0;
        progress.phase_started = now;
    }

    fn sync_timeout(&self, progress: &mut Progress, reason: &str, now: i64) {
        log_warn!("tier-two sync has failed on {reason}, will retry later");
        self.state.set_phase(SyncPhase::Failed);
        progress.attempt = 0;
        progress.last_failure = now;
        progress.failures += 1;
    }

    fn update_blockchain_synced(&self, now: i64) {
        if !self.network.is_regtest() && !self.state.can_update_chain_sync(now) {
            return;
        }
        let block_time = self.chain.best_block_time().unwrap_or(0);
        self.state
            .set_blockchain_synced(block_time + CHAIN_SYNC_MAX_AGE_SECS > now, now);
    }

    /// One sync tick.
    pub fn process(&self, now: i64, peers: &dyn PeerSet) {
        let last_process = self.progress().last_process;
        if last_process != 0 && now > last_process + SLEEP_RESET_SECS {
            log_info!("tier-two sync idle for over an hour, restarting");
            self.reset(now);
        }
        self.progress().last_process = now;

        self.update_blockchain_synced(now);

        if self.state.is_synced() {
            return;
        }

        if self.state.phase() == SyncPhase::Failed {
            let last_failure = self.progress().last_failure;
            if last_failure + FAILED_COOLDOWN_SECS >= now {
                return;
            }
            self.reset(now);
        }

        if self.state.phase() == SyncPhase::Initial {
            let mut progress = self.progress();
            self.switch_to_next_phase(&mut progress, now);
        }

        if !self.state.is_blockchain_synced() && self.state.phase().id() > SyncPhase::Sporks.id() {
            return;
        }

        let mut connected = peers.connected_peers();
        connected.shuffle(&mut rand::thread_rng());
        for peer in connected {
            if !self.sync_with_peer(peer.as_ref(), now) {
                break;
            }
        }
    }

    /// Returns false to stop iterating peers for this tick.
    fn sync_with_peer(&self, peer: &dyn Peer, now: i64) -> bool {
        match self.step(peer, now) {
            Step::NextPeer => true,
            Step::Stop => false,
            Step::Request(msg) => {
                log_category!(Category::Sync, "sync request to peer {}", peer.id());
                peer.send(msg);
                false
            }
        }
    }

    fn step(&self, peer: &dyn Peer, now: i64) -> Step {
        let addr = peer.addr();
        let mut progress = self.progress();
        let phase = self.state.phase();

        if phase == SyncPhase::Sporks {
            if progress.attempt >= SYNC_THRESHOLD {
                self.switch_to_next_phase(&mut progress, now);
                return Step::Stop;
            }
            if self.fulfilled.has(&addr, GETSPORK_REQUEST, now) {
                return Step::NextPeer;
            }
            self.fulfilled.add(&addr, GETSPORK_REQUEST, now);
            progress.attempt += 1;
            return Step::Request(OutboundMessage::GetSporks);
        }

        if peer.version() < self.masternodes.min_protocol(now) || !peer.can_relay() {
            return Step::NextPeer;
        }

        match phase {
            SyncPhase::MasternodeList => self.list_step(&mut progress, peer, now),
            SyncPhase::MasternodeWinners => {
                self.switch_to_next_phase(&mut progress, now);
                Step::Stop
            }
            _ => Step::NextPeer,
        }
    }

    fn list_step(&self, progress: &mut Progress, peer: &dyn Peer, now: i64) -> Step {
        if progress.count_masternode_list > 0 {
            log_category!(
                Category::Sync,
                "masternode list confirmed by {} peers ({} entries)",
                progress.count_masternode_list,
                progress.sum_masternode_list
            );
            self.switch_to_next_phase(progress, now);
            return Step::Stop;
        }

        let last_list = self.state.last_masternode_list();
        if last_list > 0
            && last_list < now - SYNC_TIMEOUT * 8
            && progress.attempt >= SYNC_THRESHOLD
        {
            self.switch_to_next_phase(progress, now);
            return Step::Stop;
        }

        if last_list == 0
            && (progress.attempt >= SYNC_THRESHOLD * 3
                || now - progress.phase_started > SYNC_TIMEOUT * 5)
        {
            if self
                .sporks
                .is_active_at(SporkId::MasternodePaymentEnforcement, now)
            {
                self.sync_timeout(progress, "masternode list", now);
            } else {
                self.switch_to_next_phase(progress, now);
            }
            return Step::Stop;
        }

        if progress.attempt >= SYNC_THRESHOLD * 4 {
            return Step::Stop;
        }

        let addr = peer.addr();
        if self.fulfilled.has(&addr, MNSYNC_REQUEST, now) {
            return Step::NextPeer;
        }
        if !self.masternodes.request_mn_list(&addr, now) {
            return Step::NextPeer;
        }
        self.fulfilled.add(&addr, MNSYNC_REQUEST, now);
        progress.attempt += 1;
        Step::Request(OutboundMessage::GetMasternodeList(None))
    }
}
