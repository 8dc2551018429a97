//! Legacy masternode table plus the deterministic list view: admission of
//! broadcasts and pings, scoring, ranking and payment ordering.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::net::IpAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use bczd_chainstate::{ChainView, CoinsView};
use bczd_consensus::constants::{
    active_protocol, DOS_BAD_PING_SIGNATURE, DOS_INVALID_COLLATERAL, DOS_REPEATED_LIST_REQUEST,
    LAST_PAID_OFFSET_WINDOW, LONG_UNPAID_SECS, MASTERNODE_EXPIRATION_SECONDS,
    MASTERNODE_MIN_MNP_SECONDS, MASTERNODE_PING_MAX_DEPTH, MASTERNODE_REMOVAL_SECONDS,
    MNPAYMENTS_SIGNATURES_REQUIRED, MN_WINNER_MINIMUM_AGE, PROTOCOL_VERSION,
};
use bczd_consensus::{ChainParams, Hash256, Network, Rejection, TierTwoParams};
use bczd_log::{log_category, log_warn, Category};
use bczd_primitives::arith::compact_from_hash;
use bczd_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;
use bczd_script::standard::pays_to_pubkey;
use bczd_spork::{SporkId, SporkManager};
use serde::Serialize;

use crate::active::ActiveMasternode;
use crate::broadcast::MasternodeBroadcast;
use crate::deterministic::DeterministicList;
use crate::entry::MasternodeEntry;
use crate::hashes::BlockHashCache;
use crate::masternode::Masternode;
use crate::payments::PaymentVotes;
use crate::ping::MasternodePing;
use crate::score::{identity_hash, WORST_SCORE};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BroadcastOutcome {
    /// Already processed; nothing changed.
    Seen,
    /// An enabled entry already holds this collateral.
    Known,
    /// Collateral not mature yet, or the broadcast was signed before it
    /// matured. Dropped from the seen map so a later copy is re-evaluated.
    Deferred,
    /// New entry stored. `relay` is false for private or local addresses.
    Added { relay: bool },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PingOutcome {
    Seen,
    Accepted,
    /// Valid, but the previous ping is too recent.
    TooEarly,
    /// No entry for the collateral; the caller may ask the peer for it.
    UnknownMasternode,
}

enum InputCheck {
    Valid,
    Known,
    Deferred,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize)]
pub struct MasternodesInfo {
    pub total: usize,
    pub enabled: usize,
    /// Enabled and old enough to be paid.
    pub stable: usize,
    pub ipv4: usize,
    pub ipv6: usize,
}

#[derive(Default)]
struct Registry {
    entries: BTreeMap<OutPoint, Arc<MasternodeEntry>>,
    asked_us_for_list: HashMap<IpAddr, i64>,
    we_asked_for_list: HashMap<IpAddr, i64>,
    we_asked_for_entry: HashMap<OutPoint, HashMap<IpAddr, i64>>,
    seen_broadcasts: HashMap<Hash256, MasternodeBroadcast>,
    seen_pings: HashMap<Hash256, MasternodePing>,
}

pub struct MasternodeManager {
    network: Network,
    tier_two: TierTwoParams,
    chain: Arc<dyn ChainView>,
    sporks: Arc<SporkManager>,
    deterministic: Arc<dyn DeterministicList>,
    active: Option<Arc<ActiveMasternode>>,
    registry: Mutex<Registry>,
    block_hashes: RwLock<BlockHashCache>,
}

impl MasternodeManager {
    pub fn new(
        params: &ChainParams,
        chain: Arc<dyn ChainView>,
        sporks: Arc<SporkManager>,
        deterministic: Arc<dyn DeterministicList>,
    ) -> Self {
        Self {
            network: params.network,
            tier_two: params.tier_two,
            chain,
            sporks,
            deterministic,
            active: None,
            registry: Mutex::new(Registry::default()),
            block_hashes: RwLock::new(BlockHashCache::new()),
        }
    }

    pub fn with_active(mut self, active: Arc<ActiveMasternode>) -> Self {
        self.active = Some(active);
        self
    }

    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn best_height(&self) -> i32 {
        self.chain.best_height()
    }

    pub fn min_protocol(&self, now: i64) -> i32 {
        active_protocol(
            self.sporks
                .is_active_at(SporkId::NewProtocolEnforcement, now),
        )
    }

    fn winner_age_enforced(&self, now: i64) -> bool {
        self.sporks
            .is_active_at(SporkId::MasternodePaymentEnforcement, now)
    }

    // Block hash window

    pub fn cache_block_hash(&self, height: i32, hash: Hash256) {
        self.block_hashes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set(height, hash);
    }

    pub fn uncache_block_hash(&self, height: i32) {
        self.block_hashes
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unset(height);
    }

    /// Hash of the active-chain block at `height`; `None` outside
    /// `0..=best_height`.
    pub fn hash_at_height(&self, height: i32) -> Option<Hash256> {
        if height < 0 {
            log_category!(Category::Masternode, "hash_at_height: negative height {height}");
            return None;
        }
        let current = self.chain.best_height();
        if height > current {
            log_category!(
                Category::Masternode,
                "hash_at_height: height {height} over current height {current}"
            );
            return None;
        }
        let cached = {
            let hashes = self
                .block_hashes
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            if height > current - hashes.capacity() as i32 {
                hashes.get(height)
            } else {
                None
            }
        };
        if cached.is_some() {
            return cached;
        }
        self.chain.hash_at_height(height)
    }

    /// Whether `hash` is one of the last `depth + 1` active blocks.
    pub fn is_within_depth(&self, hash: &Hash256, depth: i32) -> bool {
        if *hash == [0u8; 32] {
            log_warn!("is_within_depth called with null hash");
            return false;
        }
        let window = self
            .block_hashes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity() as i32;
        if depth < 0 || depth >= window {
            log_warn!("is_within_depth: invalid depth {depth}, cached block hashes {window}");
            return false;
        }
        let current = self.chain.best_height();
        let stop = (current - depth).max(0);
        (stop..=current)
            .rev()
            .any(|height| self.hash_at_height(height).as_ref() == Some(hash))
    }

    // Admission

    pub fn process_broadcast(
        &self,
        mnb: &MasternodeBroadcast,
        now: i64,
        coins: &dyn CoinsView,
    ) -> Result<BroadcastOutcome, Rejection> {
        let hash = mnb.hash();
        if self.registry().seen_broadcasts.contains_key(&hash) {
            return Ok(BroadcastOutcome::Seen);
        }

        mnb.check(now, self.min_protocol(now))?;

        let chain_height = self.chain.best_height();
        match self.check_inputs(mnb, &hash, chain_height, now, coins)? {
            InputCheck::Deferred => return Ok(BroadcastOutcome::Deferred),
            InputCheck::Known => {
                self.registry().seen_broadcasts.insert(hash, mnb.clone());
                return Ok(BroadcastOutcome::Known);
            }
            InputCheck::Valid => {}
        }

        {
            let mut registry = self.registry();
            registry.seen_broadcasts.insert(hash, mnb.clone());
            registry
                .seen_pings
                .insert(mnb.last_ping.hash(), mnb.last_ping.clone());
            registry.entries.insert(
                mnb.collateral.clone(),
                Arc::new(MasternodeEntry::from_broadcast(mnb.clone())),
            );
        }
        log_category!(
            Category::Masternode,
            "got new masternode entry {} sig time {}",
            mnb.collateral.to_short_string(),
            mnb.sig_time
        );

        if let Some(active) = &self.active {
            if active.matches_operator(&mnb.pubkey_operator)
                && mnb.protocol_version == PROTOCOL_VERSION
            {
                active.enable_hot_cold(mnb.collateral.clone(), mnb.addr);
            }
        }

        let is_local = (mnb.addr.is_rfc1918() || mnb.addr.is_local()) && !self.network.is_regtest();
        Ok(BroadcastOutcome::Added { relay: !is_local })
    }

    fn check_inputs(
        &self,
        mnb: &MasternodeBroadcast,
        hash: &Hash256,
        chain_height: i32,
        now: i64,
        coins: &dyn CoinsView,
    ) -> Result<InputCheck, Rejection> {
        mnb.check_embedded_ping(now)?;

        {
            let mut registry = self.registry();
            if let Some(existing) = registry.entries.get(&mnb.collateral) {
                if existing.is_enabled() {
                    return Ok(InputCheck::Known);
                }
                registry.entries.remove(&mnb.collateral);
            }
        }

        let coin = match coins.coin(&mnb.collateral) {
            Ok(Some(coin)) => coin,
            Ok(None) => {
                log_category!(
                    Category::Masternode,
                    "mnb - collateral {} spent",
                    mnb.collateral.to_short_string()
                );
                return Err(Rejection::silent("collateral spent"));
            }
            Err(err) => {
                log_warn!(
                    "mnb - collateral lookup for {} failed: {err}",
                    mnb.collateral.to_short_string()
                );
                return Err(Rejection::silent("collateral lookup failed"));
            }
        };

        if !self.tier_two.is_valid_collateral(coin.value) {
            return Err(Rejection::penalize(
                "invalid collateral amount",
                DOS_INVALID_COLLATERAL,
            ));
        }
        if !pays_to_pubkey(&coin.script_pubkey, &mnb.pubkey_collateral) {
            return Err(Rejection::penalize(
                "collateral not associated with broadcast key",
                DOS_INVALID_COLLATERAL,
            ));
        }

        let min_conf = self.tier_two.collateral_min_conf;
        let utxo_height = coin.height as i32;
        let depth = chain_height - utxo_height + 1;
        if depth < min_conf {
            log_category!(
                Category::Masternode,
                "mnb - collateral {} needs {min_conf} confirmations, has {depth}",
                mnb.collateral.to_short_string()
            );
            self.registry().seen_broadcasts.remove(hash);
            return Ok(InputCheck::Deferred);
        }

        let conf_height = utxo_height + min_conf - 1;
        match self.chain.block_time_at_height(conf_height) {
            Some(conf_time) if conf_time <= mnb.sig_time => Ok(InputCheck::Valid),
            Some(conf_time) => {
                log_category!(
                    Category::Masternode,
                    "mnb - bad sig time {} for {} ({min_conf} conf block is at {conf_time})",
                    mnb.sig_time,
                    mnb.collateral.to_short_string()
                );
                Ok(InputCheck::Deferred)
            }
            None => Ok(InputCheck::Deferred),
        }
    }

    pub fn process_ping(&self, ping: &MasternodePing, now: i64) -> Result<PingOutcome, Rejection> {
        let hash = ping.hash();
        if self.registry().seen_pings.contains_key(&hash) {
            return Ok(PingOutcome::Seen);
        }

        ping.check_sig_time(now)?;

        let Some(entry) = self.find(&ping.collateral) else {
            return Ok(PingOutcome::UnknownMasternode);
        };
        if entry.protocol_version() < self.min_protocol(now) {
            return Err(Rejection::silent("ping for obsolete masternode"));
        }
        if !self.is_within_depth(&ping.block_hash, MASTERNODE_PING_MAX_DEPTH) {
            log_category!(
                Category::Masternode,
                "mnp - block hash for {} too old or unknown",
                ping.collateral.to_short_string()
            );
            return Err(Rejection::silent("ping block hash too old"));
        }
        let last = entry.last_ping();
        if !last.is_null() && ping.sig_time < last.sig_time + MASTERNODE_MIN_MNP_SECONDS {
            return Ok(PingOutcome::TooEarly);
        }
        if ping.check_signature(entry.pubkey_operator()).is_err() {
            return Err(Rejection::penalize(
                "bad ping signature",
                DOS_BAD_PING_SIGNATURE,
            ));
        }

        let mut registry = self.registry();
        let Some(current) = registry.entries.get_mut(&ping.collateral) else {
            return Ok(PingOutcome::UnknownMasternode);
        };
        // Another ping for this collateral may have landed since the check
        // above.
        let stored = current.last_ping();
        if !stored.is_null() && ping.sig_time < stored.sig_time + MASTERNODE_MIN_MNP_SECONDS {
            return Ok(PingOutcome::TooEarly);
        }
        let updated = Arc::make_mut(current);
        updated.broadcast.last_ping = ping.clone();
        updated.enabled = true;
        let mnb_hash = updated.broadcast.hash();
        if let Some(seen) = registry.seen_broadcasts.get_mut(&mnb_hash) {
            seen.last_ping = ping.clone();
        }
        registry.seen_pings.insert(hash, ping.clone());
        Ok(PingOutcome::Accepted)
    }

    // List requests

    /// Throttle for answering a full-list request. Local peers are never
    /// throttled.
    pub fn check_get_list_request(&self, peer: &NetAddr, now: i64) -> Result<(), Rejection> {
        if peer.is_rfc1918() || peer.is_local() {
            return Ok(());
        }
        let mut registry = self.registry();
        if let Some(ask_again) = registry.asked_us_for_list.get(&peer.ip) {
            if now < *ask_again {
                log_warn!("dseg - peer {} already asked for the masternode list", peer);
                return Err(Rejection::penalize(
                    "masternode list requested again",
                    DOS_REPEATED_LIST_REQUEST,
                ));
            }
        }
        registry
            .asked_us_for_list
            .insert(peer.ip, now + self.tier_two.masternodes_request_secs);
        Ok(())
    }

    /// Inventory hashes for every enabled, publicly reachable entry. Each
    /// is kept in the seen map so a following getdata can be answered.
    pub fn enabled_broadcasts(&self) -> Vec<Hash256> {
        let mut registry = self.registry();
        let broadcasts: Vec<MasternodeBroadcast> = registry
            .entries
            .values()
            .filter(|entry| entry.is_enabled() && !entry.addr().is_rfc1918())
            .map(|entry| entry.broadcast.clone())
            .collect();
        broadcasts
            .into_iter()
            .map(|mnb| {
                let hash = mnb.hash();
                registry.seen_broadcasts.entry(hash).or_insert(mnb);
                hash
            })
            .collect()
    }

    /// Inventory hash for a single enabled entry.
    pub fn entry_broadcast(&self, collateral: &OutPoint) -> Option<Hash256> {
        let mut registry = self.registry();
        let entry = registry.entries.get(collateral)?;
        if !entry.is_enabled() {
            return None;
        }
        let mnb = entry.broadcast.clone();
        let hash = mnb.hash();
        registry.seen_broadcasts.entry(hash).or_insert(mnb);
        Some(hash)
    }

    pub fn broadcast_by_hash(&self, hash: &Hash256) -> Option<MasternodeBroadcast> {
        self.registry().seen_broadcasts.get(hash).cloned()
    }

    pub fn ping_by_hash(&self, hash: &Hash256) -> Option<MasternodePing> {
        self.registry().seen_pings.get(hash).cloned()
    }

    /// Records a full-list request to `peer`. False while a previous request
    /// to the same mainnet peer is still fresh.
    pub fn request_mn_list(&self, peer: &NetAddr, now: i64) -> bool {
        let mut registry = self.registry();
        if self.network == Network::Mainnet && !(peer.is_rfc1918() || peer.is_local()) {
            if let Some(ask_again) = registry.we_asked_for_list.get(&peer.ip) {
                if now < *ask_again {
                    log_category!(
                        Category::Masternode,
                        "dseg - already asked {} for the list, skipping",
                        peer
                    );
                    return false;
                }
            }
        }
        registry
            .we_asked_for_list
            .insert(peer.ip, now + self.tier_two.masternodes_request_secs);
        true
    }

    /// Records a single-entry request. False if `peer` was asked for this
    /// collateral recently.
    pub fn ask_for_mn(&self, peer: &NetAddr, collateral: &OutPoint, now: i64) -> bool {
        let mut registry = self.registry();
        let asked = registry
            .we_asked_for_entry
            .entry(collateral.clone())
            .or_default();
        if let Some(ask_again) = asked.get(&peer.ip) {
            if now < *ask_again {
                return false;
            }
        }
        log_category!(
            Category::Masternode,
            "asking {} for missing masternode entry {}",
            peer,
            collateral.to_short_string()
        );
        asked.insert(peer.ip, now + MASTERNODE_MIN_MNP_SECONDS);
        true
    }

    // Queries

    pub fn find(&self, collateral: &OutPoint) -> Option<Arc<MasternodeEntry>> {
        self.registry().entries.get(collateral).cloned()
    }

    pub fn find_by_operator(&self, pubkey: &[u8]) -> Option<Arc<MasternodeEntry>> {
        self.registry()
            .entries
            .values()
            .find(|entry| entry.pubkey_operator() == pubkey)
            .cloned()
    }

    pub fn remove(&self, collateral: &OutPoint) -> bool {
        self.registry().entries.remove(collateral).is_some()
    }

    pub fn clear(&self) {
        *self.registry() = Registry::default();
    }

    pub fn len(&self) -> usize {
        self.registry().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().entries.is_empty()
    }

    fn legacy_entries(&self) -> Vec<Arc<MasternodeEntry>> {
        self.registry().entries.values().cloned().collect()
    }

    pub fn count_enabled(&self, now: i64) -> usize {
        let min_protocol = self.min_protocol(now);
        let legacy = self
            .legacy_entries()
            .iter()
            .filter(|entry| entry.is_enabled() && entry.protocol_version() >= min_protocol)
            .count();
        legacy + self.deterministic.valid_count()
    }

    pub fn info(&self, now: i64) -> MasternodesInfo {
        let min_protocol = self.min_protocol(now);
        let age_enforced = self.winner_age_enforced(now);
        let mut info = MasternodesInfo::default();

        for entry in self.legacy_entries() {
            info.total += 1;
            count_network(&mut info, entry.addr());
            if entry.protocol_version() < min_protocol || !entry.is_enabled() {
                continue;
            }
            info.enabled += 1;
            if age_enforced && now - entry.sig_time() < MN_WINNER_MINIMUM_AGE {
                continue;
            }
            info.stable += 1;
        }
        self.deterministic.for_each(false, &mut |dmn| {
            info.total += 1;
            count_network(&mut info, &dmn.addr);
            if !dmn.is_pose_banned() {
                info.enabled += 1;
                info.stable += 1;
            }
        });
        info
    }

    // Scoring and ranking

    fn sort_by_score(scores: &mut [(u32, Masternode)]) {
        scores.sort_by(|a, b| {
            b.0.cmp(&a.0)
                .then_with(|| a.1.collateral().cmp(b.1.collateral()))
        });
    }

    /// 1-based rank of `collateral` for the block at `height`, scored on the
    /// hash of `height - 1`. -1 when that hash is unknown or the collateral
    /// is not a candidate.
    pub fn get_masternode_rank(&self, collateral: &OutPoint, height: i32, now: i64) -> i32 {
        let Some(hash) = self.hash_at_height(height - 1) else {
            return -1;
        };
        let min_protocol = self.min_protocol(now);
        let age_enforced = self.winner_age_enforced(now);

        let mut scores: Vec<(u32, Masternode)> = Vec::new();
        for entry in self.legacy_entries() {
            let eligible = entry.is_enabled()
                && entry.protocol_version() >= min_protocol
                && !(age_enforced && now - entry.sig_time() < MN_WINNER_MINIMUM_AGE);
            let mn = Masternode::Legacy(entry);
            let score = if eligible { mn.score(&hash) } else { WORST_SCORE };
            scores.push((score, mn));
        }
        self.push_deterministic(&mut scores, &hash);
        Self::sort_by_score(&mut scores);

        scores
            .iter()
            .position(|(_, mn)| mn.collateral() == collateral)
            .map(|pos| pos as i32 + 1)
            .unwrap_or(-1)
    }

    /// Every candidate with its score for the block at `height`, best first.
    /// Disabled entries and PoSe-banned members sort last with the worst
    /// score.
    pub fn get_masternode_ranks(&self, height: i32) -> Vec<(u32, Masternode)> {
        let Some(hash) = self.hash_at_height(height - 1) else {
            return Vec::new();
        };
        let mut scores: Vec<(u32, Masternode)> = self
            .legacy_entries()
            .into_iter()
            .map(|entry| {
                let mn = Masternode::Legacy(entry);
                let score = if mn.is_enabled() { mn.score(&hash) } else { WORST_SCORE };
                (score, mn)
            })
            .collect();
        self.push_deterministic(&mut scores, &hash);
        Self::sort_by_score(&mut scores);
        scores
    }

    fn push_deterministic(&self, scores: &mut Vec<(u32, Masternode)>, hash: &Hash256) {
        self.deterministic.for_each(false, &mut |dmn| {
            let mn = Masternode::Deterministic(Arc::clone(dmn));
            let score = if dmn.is_pose_banned() { WORST_SCORE } else { mn.score(hash) };
            scores.push((score, mn));
        });
    }

    /// Highest-scoring eligible candidate for `block_hash`.
    pub fn get_current_masternode(&self, block_hash: &Hash256, now: i64) -> Option<Masternode> {
        let min_protocol = self.min_protocol(now);
        let mut best: Option<(u32, Masternode)> = None;
        let mut consider = |mn: Masternode| {
            let score = mn.score(block_hash);
            if best.as_ref().map_or(score > WORST_SCORE, |(top, _)| score > *top) {
                best = Some((score, mn));
            }
        };

        for entry in self.legacy_entries() {
            if entry.protocol_version() < min_protocol || !entry.is_enabled() {
                continue;
            }
            consider(Masternode::Legacy(entry));
        }
        self.deterministic.for_each(true, &mut |dmn| {
            consider(Masternode::Deterministic(Arc::clone(dmn)));
        });
        best.map(|(_, mn)| mn)
    }

    /// Expected winners from `last` blocks back to 20 blocks ahead, each
    /// scored on the hash 101 blocks before it.
    pub fn get_mn_scores(&self, last: i32, now: i64) -> Vec<(Masternode, i32)> {
        let chain_height = self.chain.best_height();
        if chain_height < 0 {
            return Vec::new();
        }
        let mut winners = Vec::new();
        for height in (chain_height - last)..(chain_height + 20) {
            let Some(hash) = self.hash_at_height(height - 101) else {
                continue;
            };
            if let Some(winner) = self.get_current_masternode(&hash, now) {
                winners.push((winner, height));
            }
        }
        winners
    }

    // Payments

    /// Time of the most recent corroborated payment to `mn`, searching back
    /// from `from_height` over `count_enabled * 1.25` blocks, plus an offset
    /// below 150 s derived from the entry's identity. 0 when none is found.
    pub fn get_last_paid(
        &self,
        mn: &Masternode,
        count_enabled: usize,
        from_height: i32,
        votes: &dyn PaymentVotes,
    ) -> i64 {
        if from_height < 0 {
            return 0;
        }
        let script = mn.payee_script();
        let identity = identity_hash(mn.collateral(), mn.sig_time());
        let offset = i64::from(compact_from_hash(&identity)) % LAST_PAID_OFFSET_WINDOW;

        let max_depth = count_enabled * 5 / 4;
        let mut height = from_height;
        for _ in 0..max_depth {
            if votes.has_payee_with_votes(height, &script, MNPAYMENTS_SIGNATURES_REQUIRED) {
                if let Some(time) = self.chain.block_time_at_height(height) {
                    return time + offset;
                }
            }
            height -= 1;
            if height <= 0 {
                break;
            }
        }
        0
    }

    /// Seconds since the last corroborated payment. Entries never paid
    /// inside the lookback, or unpaid for 30 days or more, report
    /// `30 days + compact(identity hash)` so they never tie.
    pub fn seconds_since_payment(
        &self,
        mn: &Masternode,
        count_enabled: usize,
        from_height: i32,
        votes: &dyn PaymentVotes,
        now: i64,
    ) -> i64 {
        let last_paid = self.get_last_paid(mn, count_enabled, from_height, votes);
        if last_paid != 0 {
            let sec = now - last_paid;
            if sec < LONG_UNPAID_SECS {
                return sec;
            }
        }
        let identity = identity_hash(mn.collateral(), mn.sig_time());
        LONG_UNPAID_SECS + i64::from(compact_from_hash(&identity))
    }

    // Maintenance

    /// Re-validates every entry: spent collateral or a ping older than the
    /// removal window removes it, one older than the expiration window
    /// disables it. Also expires request bookkeeping. Returns the number of
    /// removed entries.
    pub fn check_and_remove(&self, now: i64, coins: &dyn CoinsView) -> usize {
        let mut remove = HashSet::new();
        let mut disable = HashSet::new();
        for entry in self.legacy_entries() {
            let spent = matches!(coins.coin(entry.collateral()), Ok(None));
            let last_seen = entry.last_seen();
            if spent || last_seen < now - MASTERNODE_REMOVAL_SECONDS {
                remove.insert(entry.collateral().clone());
            } else if last_seen < now - MASTERNODE_EXPIRATION_SECONDS {
                disable.insert(entry.collateral().clone());
            }
        }

        let mut registry = self.registry();
        for collateral in &remove {
            if registry.entries.remove(collateral).is_some() {
                log_category!(
                    Category::Masternode,
                    "removing inactive masternode {}",
                    collateral.to_short_string()
                );
            }
            registry.we_asked_for_entry.remove(collateral);
        }
        for collateral in &disable {
            if let Some(entry) = registry.entries.get_mut(collateral) {
                if entry.enabled {
                    Arc::make_mut(entry).enabled = false;
                }
            }
        }

        registry.asked_us_for_list.retain(|_, t| *t > now);
        registry.we_asked_for_list.retain(|_, t| *t > now);
        registry.we_asked_for_entry.retain(|_, peers| {
            peers.retain(|_, t| *t > now);
            !peers.is_empty()
        });
        let horizon = now - MASTERNODE_REMOVAL_SECONDS;
        registry.seen_broadcasts.retain(|_, mnb| {
            !remove.contains(&mnb.collateral)
                && mnb.last_ping.sig_time.max(mnb.sig_time) >= horizon
        });
        registry.seen_pings.retain(|_, ping| ping.sig_time >= horizon);
        remove.len()
    }

    // Persistence

    pub(crate) fn encode_registry(&self, encoder: &mut Encoder) {
        let registry = self.registry();

        encoder.write_varint(registry.entries.len() as u64);
        for entry in registry.entries.values() {
            entry.consensus_encode(encoder);
        }
        encode_ip_times(encoder, &registry.asked_us_for_list);
        encode_ip_times(encoder, &registry.we_asked_for_list);

        let mut asked: Vec<_> = registry.we_asked_for_entry.iter().collect();
        asked.sort_by(|a, b| a.0.cmp(b.0));
        encoder.write_varint(asked.len() as u64);
        for (collateral, peers) in asked {
            collateral.consensus_encode(encoder);
            encode_ip_times(encoder, peers);
        }

        let mut broadcasts: Vec<_> = registry.seen_broadcasts.iter().collect();
        broadcasts.sort_by(|a, b| a.0.cmp(b.0));
        encoder.write_varint(broadcasts.len() as u64);
        for (hash, mnb) in broadcasts {
            encoder.write_hash_le(hash);
            mnb.consensus_encode(encoder);
        }

        let mut pings: Vec<_> = registry.seen_pings.iter().collect();
        pings.sort_by(|a, b| a.0.cmp(b.0));
        encoder.write_varint(pings.len() as u64);
        for (hash, ping) in pings {
            encoder.write_hash_le(hash);
            ping.consensus_encode(encoder);
        }
    }

    /// Replaces the registry with the decoded one. On error nothing changes.
    pub(crate) fn decode_registry(&self, decoder: &mut Decoder) -> Result<usize, DecodeError> {
        let mut registry = Registry::default();

        let count = read_count(decoder)?;
        for _ in 0..count {
            let entry = MasternodeEntry::consensus_decode(decoder)?;
            registry
                .entries
                .insert(entry.collateral().clone(), Arc::new(entry));
        }
        registry.asked_us_for_list = decode_ip_times(decoder)?;
        registry.we_asked_for_list = decode_ip_times(decoder)?;

        let count = read_count(decoder)?;
        for _ in 0..count {
            let collateral = OutPoint::consensus_decode(decoder)?;
            let peers = decode_ip_times(decoder)?;
            registry.we_asked_for_entry.insert(collateral, peers);
        }

        let count = read_count(decoder)?;
        for _ in 0..count {
            let hash = decoder.read_hash_le()?;
            let mnb = MasternodeBroadcast::consensus_decode(decoder)?;
            registry.seen_broadcasts.insert(hash, mnb);
        }

        let count = read_count(decoder)?;
        for _ in 0..count {
            let hash = decoder.read_hash_le()?;
            let ping = MasternodePing::consensus_decode(decoder)?;
            registry.seen_pings.insert(hash, ping);
        }

        let loaded = registry.entries.len();
        *self.registry() = registry;
        Ok(loaded)
    }
}

fn count_network(info: &mut MasternodesInfo, addr: &NetAddr) {
    if addr.is_ipv4() {
        info.ipv4 += 1;
    } else {
        info.ipv6 += 1;
    }
}

fn read_count(decoder: &mut Decoder) -> Result<usize, DecodeError> {
    let count = decoder.read_varint()?;
    if count > decoder.remaining() as u64 {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(count as usize)
}

fn encode_ip_times(encoder: &mut Encoder, map: &HashMap<IpAddr, i64>) {
    let mut items: Vec<_> = map.iter().collect();
    items.sort();
    encoder.write_varint(items.len() as u64);
    for (ip, time) in items {
        NetAddr::new(*ip, 0).consensus_encode(encoder);
        encoder.write_i64_le(*time);
    }
}

fn decode_ip_times(decoder: &mut Decoder) -> Result<HashMap<IpAddr, i64>, DecodeError> {
    let count = read_count(decoder)?;
    let mut map = HashMap::with_capacity(count);
    for _ in 0..count {
        let addr = NetAddr::consensus_decode(decoder)?;
        map.insert(addr.ip, decoder.read_i64_le()?);
    }
    Ok(map)
}

impl fmt::Display for MasternodeManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry();
        write!(
            f,
            "Masternodes: {}, peers who asked us for Masternode list: {}, peers we asked for Masternode list: {}, entries in Masternode list we asked for: {}",
            registry.entries.len(),
            registry.asked_us_for_list.len(),
            registry.we_asked_for_list.len(),
            registry.we_asked_for_entry.len()
        )
    }
}
