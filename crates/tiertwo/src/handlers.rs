//! Dispatch of inbound tier-two messages. Every handler returns the DoS
//! score for the sending peer; nothing here holds a registry lock while
//! talking to peers.

use std::sync::Arc;

use bczd_log::{log_category, Category};
use bczd_masternode::{BroadcastOutcome, MasternodeBroadcast, MasternodePing, PingOutcome};
use bczd_primitives::outpoint::OutPoint;
use bczd_spork::{SporkMessage, SporkSource};

use crate::context::TierTwoContext;
use crate::peer::{InboundMessage, Inventory, InventoryKind, OutboundMessage, Peer, PeerSet};
use crate::state::SyncPhase;

pub struct TierTwoHandlers {
    ctx: Arc<TierTwoContext>,
    peers: Arc<dyn PeerSet>,
}

impl TierTwoHandlers {
    pub fn new(ctx: Arc<TierTwoContext>, peers: Arc<dyn PeerSet>) -> Self {
        Self { ctx, peers }
    }

    /// Handles one message from `peer`. A non-zero score has already been
    /// reported to the peer set.
    pub fn handle(&self, peer: &dyn Peer, msg: InboundMessage, now: i64) -> u32 {
        let command = msg.command();
        let (dos, reason) = match msg {
            InboundMessage::Spork(spork) => self.handle_spork(&spork, now),
            InboundMessage::GetSporks => {
                self.handle_get_sporks(peer);
                (0, "")
            }
            InboundMessage::SyncStatusCount { item, count } => {
                self.ctx.sync.process_sync_status_count(item, count);
                (0, "")
            }
            InboundMessage::GetData(items) => {
                self.handle_get_data(peer, &items);
                (0, "")
            }
            msg if !self.ctx.sync_state.is_blockchain_synced() => {
                log_category!(
                    Category::Masternode,
                    "ignoring {} from peer {} until the chain is synced",
                    msg.command(),
                    peer.id()
                );
                (0, "")
            }
            InboundMessage::MasternodeBroadcast(mnb) => self.handle_broadcast(&mnb, now),
            InboundMessage::MasternodePing(ping) => self.handle_ping(peer, &ping, now),
            InboundMessage::GetMasternodeList(collateral) => {
                self.handle_get_list(peer, collateral.as_ref(), now)
            }
        };
        if dos > 0 {
            log_category!(
                Category::Net,
                "peer {} misbehaving on {command}: {reason} (dos {dos})",
                peer.id()
            );
            self.peers.misbehaving(peer.id(), dos, reason);
        }
        dos
    }

    fn handle_spork(&self, spork: &SporkMessage, now: i64) -> (u32, &'static str) {
        match self
            .ctx
            .sporks
            .process_message(spork, now, SporkSource::Network)
        {
            Ok(outcome) => {
                if outcome.should_relay() {
                    self.peers
                        .relay_inventory(Inventory::new(InventoryKind::Spork, spork.hash()));
                }
                (0, "")
            }
            Err(rejection) => (rejection.dos, rejection.reason),
        }
    }

    fn handle_get_sporks(&self, peer: &dyn Peer) {
        for spork in self.ctx.sporks.active_messages() {
            peer.send(OutboundMessage::Spork(spork));
        }
        if self.ctx.params.network.is_regtest() {
            peer.send(OutboundMessage::Spork(SporkMessage::end_marker()));
        }
    }

    fn handle_broadcast(&self, mnb: &MasternodeBroadcast, now: i64) -> (u32, &'static str) {
        let hash = mnb.hash();
        let outcome = self
            .ctx
            .masternodes
            .process_broadcast(mnb, now, self.ctx.coins.as_ref());
        match outcome {
            Ok(BroadcastOutcome::Seen) | Ok(BroadcastOutcome::Known) => {
                self.ctx.sync_state.added_masternode_list(hash, now);
                (0, "")
            }
            Ok(BroadcastOutcome::Deferred) => {
                self.ctx.sync_state.erase_seen_mnb(&hash);
                (0, "")
            }
            Ok(BroadcastOutcome::Added { relay }) => {
                if relay && self.ctx.sync_state.is_synced() {
                    self.peers
                        .relay_inventory(Inventory::new(InventoryKind::MasternodeAnnounce, hash));
                }
                self.ctx.sync_state.added_masternode_list(hash, now);
                (0, "")
            }
            Err(rejection) => {
                log_category!(
                    Category::Masternode,
                    "mnb {} rejected: {rejection}",
                    mnb.collateral.to_short_string()
                );
                (rejection.dos, rejection.reason)
            }
        }
    }

    fn handle_ping(&self, peer: &dyn Peer, ping: &MasternodePing, now: i64) -> (u32, &'static str) {
        match self.ctx.masternodes.process_ping(ping, now) {
            Ok(PingOutcome::Accepted) => {
                self.peers
                    .relay_inventory(Inventory::new(InventoryKind::MasternodePing, ping.hash()));
                (0, "")
            }
            Ok(PingOutcome::Seen) | Ok(PingOutcome::TooEarly) => (0, ""),
            Ok(PingOutcome::UnknownMasternode) => {
                if self.ctx.sync_state.is_synced()
                    && self
                        .ctx
                        .masternodes
                        .ask_for_mn(&peer.addr(), &ping.collateral, now)
                {
                    peer.send(OutboundMessage::GetMasternodeList(Some(
                        ping.collateral.clone(),
                    )));
                }
                (0, "")
            }
            Err(rejection) => (rejection.dos, rejection.reason),
        }
    }

    fn handle_get_list(
        &self,
        peer: &dyn Peer,
        collateral: Option<&OutPoint>,
        now: i64,
    ) -> (u32, &'static str) {
        let masternodes = &self.ctx.masternodes;
        if let Some(collateral) = collateral {
            if let Some(hash) = masternodes.entry_broadcast(collateral) {
                peer.send(OutboundMessage::Inventory(vec![Inventory::new(
                    InventoryKind::MasternodeAnnounce,
                    hash,
                )]));
                log_category!(
                    Category::Masternode,
                    "dseg - sent 1 masternode entry to peer {}",
                    peer.id()
                );
            }
            return (0, "");
        }

        if let Err(rejection) = masternodes.check_get_list_request(&peer.addr(), now) {
            return (rejection.dos, rejection.reason);
        }
        let inventory: Vec<Inventory> = masternodes
            .enabled_broadcasts()
            .into_iter()
            .map(|hash| Inventory::new(InventoryKind::MasternodeAnnounce, hash))
            .collect();
        let count = inventory.len();
        if !inventory.is_empty() {
            peer.send(OutboundMessage::Inventory(inventory));
        }
        peer.send(OutboundMessage::SyncStatusCount {
            item: SyncPhase::MasternodeList.id(),
            count: count as i32,
        });
        log_category!(
            Category::Masternode,
            "dseg - sent {count} masternode entries to peer {}",
            peer.id()
        );
        (0, "")
    }

    fn handle_get_data(&self, peer: &dyn Peer, items: &[Inventory]) {
        for item in items {
            let msg = match item.kind {
                InventoryKind::Spork => self
                    .ctx
                    .sporks
                    .message_by_hash(&item.hash)
                    .map(OutboundMessage::Spork),
                InventoryKind::MasternodeAnnounce => self
                    .ctx
                    .masternodes
                    .broadcast_by_hash(&item.hash)
                    .map(OutboundMessage::MasternodeBroadcast),
                InventoryKind::MasternodePing => self
                    .ctx
                    .masternodes
                    .ping_by_hash(&item.hash)
                    .map(OutboundMessage::MasternodePing),
            };
            if let Some(msg) = msg {
                peer.send(msg);
            }
        }
    }
}
