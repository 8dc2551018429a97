use std::sync::Arc;

use bczd_chainstate::{ChainView, CoinsView};
use bczd_consensus::ChainParams;
use bczd_masternode::{DeterministicList, MasternodeManager};
use bczd_spork::SporkManager;

use crate::fulfilled::NetFulfilledRequestManager;
use crate::state::TierTwoSyncState;
use crate::sync::MasternodeSync;

/// Process-scoped tier-two state, shared by the message handlers and the
/// sync worker.
pub struct TierTwoContext {
    pub params: ChainParams,
    pub chain: Arc<dyn ChainView>,
    pub coins: Arc<dyn CoinsView>,
    pub sporks: Arc<SporkManager>,
    pub masternodes: Arc<MasternodeManager>,
    pub sync_state: Arc<TierTwoSyncState>,
    pub fulfilled: Arc<NetFulfilledRequestManager>,
    pub sync: Arc<MasternodeSync>,
}

impl TierTwoContext {
    pub fn new(
        params: ChainParams,
        chain: Arc<dyn ChainView>,
        coins: Arc<dyn CoinsView>,
        sporks: Arc<SporkManager>,
        masternodes: Arc<MasternodeManager>,
    ) -> Self {
        let sync_state = Arc::new(TierTwoSyncState::new());
        let fulfilled = Arc::new(NetFulfilledRequestManager::new(
            params.tier_two.fulfilled_request_expire_secs,
        ));
        let sync = Arc::new(MasternodeSync::new(
            params.network,
            Arc::clone(&sync_state),
            Arc::clone(&chain),
            Arc::clone(&sporks),
            Arc::clone(&masternodes),
            Arc::clone(&fulfilled),
        ));
        Self {
            params,
            chain,
            coins,
            sporks,
            masternodes,
            sync_state,
            fulfilled,
            sync,
        }
    }

    /// Builds the masternode registry over `chain` and wires everything up.
    pub fn with_registry(
        params: ChainParams,
        chain: Arc<dyn ChainView>,
        coins: Arc<dyn CoinsView>,
        sporks: Arc<SporkManager>,
        deterministic: Arc<dyn DeterministicList>,
    ) -> Self {
        let masternodes = Arc::new(MasternodeManager::new(
            &params,
            Arc::clone(&chain),
            Arc::clone(&sporks),
            deterministic,
        ));
        Self::new(params, chain, coins, sporks, masternodes)
    }

    /// Periodic cleanup of expired requests and stale masternodes. Returns
    /// the number of removed masternodes.
    pub fn maintenance(&self, now: i64) -> usize {
        self.fulfilled.check_and_remove(now);
        self.masternodes.check_and_remove(now, self.coins.as_ref())
    }
}
