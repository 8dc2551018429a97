use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex, RwLock};

use bczd_chainstate::{ChainIndex, CoinsView, MemoryCoins, UtxoEntry};
use bczd_consensus::constants::{DOS_REPEATED_LIST_REQUEST, DOS_SPORK, PROTOCOL_VERSION};
use bczd_consensus::{chain_params, Hash256, Network};
use bczd_masternode::{EmptyDeterministicList, MasternodeBroadcast, MasternodePing};
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;
use bczd_script::message::pubkey_from_secret;
use bczd_script::standard::p2pkh_for_pubkey;
use bczd_spork::{SporkId, SporkManager, SporkMessage};
use bczd_tiertwo::{
    InboundMessage, Inventory, InventoryKind, OutboundMessage, Peer, PeerId, PeerSet, SyncPhase,
    TierTwoContext, TierTwoHandlers,
};

const NOW: i64 = 1_700_000_000;
const TIP: i32 = 60;

fn block_hash(height: i32) -> Hash256 {
    let mut hash = [0u8; 32];
    hash[..4].copy_from_slice(&height.to_le_bytes());
    hash[31] = 0xd7;
    hash
}

fn block_time(height: i32) -> i64 {
    NOW - 30 - i64::from(TIP - height) * 60
}

fn build_chain() -> Arc<RwLock<ChainIndex>> {
    let mut index = ChainIndex::new();
    let mut last = index
        .insert_genesis(block_hash(0), block_time(0))
        .expect("genesis");
    for height in 1..=TIP {
        last = index
            .insert(block_hash(height), &block_hash(height - 1), block_time(height))
            .expect("insert");
    }
    index.set_tip(Some(last));
    Arc::new(RwLock::new(index))
}

struct MockPeer {
    id: PeerId,
    addr: NetAddr,
    sent: Mutex<Vec<OutboundMessage>>,
}

impl MockPeer {
    fn new(id: PeerId) -> Self {
        Self {
            id,
            addr: NetAddr::new(IpAddr::V4(Ipv4Addr::new(9, 9, 9, id as u8)), 29_500),
            sent: Mutex::new(Vec::new()),
        }
    }

    fn take(&self) -> Vec<OutboundMessage> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Peer for MockPeer {
    fn id(&self) -> PeerId {
        self.id
    }

    fn addr(&self) -> NetAddr {
        self.addr
    }

    fn version(&self) -> i32 {
        PROTOCOL_VERSION
    }

    fn can_relay(&self) -> bool {
        true
    }

    fn send(&self, msg: OutboundMessage) {
        self.sent.lock().unwrap().push(msg);
    }
}

#[derive(Default)]
struct RecordingPeers {
    relayed: Mutex<Vec<Inventory>>,
    misbehaving: Mutex<Vec<(PeerId, u32)>>,
}

impl PeerSet for RecordingPeers {
    fn connected_peers(&self) -> Vec<Arc<dyn Peer>> {
        Vec::new()
    }

    fn relay_inventory(&self, inv: Inventory) {
        self.relayed.lock().unwrap().push(inv);
    }

    fn misbehaving(&self, peer: PeerId, score: u32, _reason: &str) {
        self.misbehaving.lock().unwrap().push((peer, score));
    }
}

struct Harness {
    ctx: Arc<TierTwoContext>,
    coins: Arc<MemoryCoins>,
    peers: Arc<RecordingPeers>,
    handlers: TierTwoHandlers,
}

impl Harness {
    fn new(network: Network) -> Self {
        let params = chain_params(network);
        let sporks = Arc::new(SporkManager::new(&params, None));
        let coins = Arc::new(MemoryCoins::new());
        let ctx = Arc::new(TierTwoContext::with_registry(
            params,
            build_chain(),
            Arc::clone(&coins) as Arc<dyn CoinsView>,
            sporks,
            Arc::new(EmptyDeterministicList),
        ));
        let peers = Arc::new(RecordingPeers::default());
        let handlers =
            TierTwoHandlers::new(Arc::clone(&ctx), Arc::clone(&peers) as Arc<dyn PeerSet>);
        Self {
            ctx,
            coins,
            peers,
            handlers,
        }
    }

    fn relayed(&self) -> Vec<Inventory> {
        self.peers.relayed.lock().unwrap().clone()
    }

    fn fund(&self, mnb: &MasternodeBroadcast) {
        self.coins.add(
            mnb.collateral.clone(),
            UtxoEntry {
                value: self.ctx.params.tier_two.collateral_amount,
                script_pubkey: p2pkh_for_pubkey(&mnb.pubkey_collateral),
                height: (TIP - 20) as u32,
                is_coinbase: false,
            },
        );
    }
}

fn secret(fill: u8, tag: u8) -> [u8; 32] {
    let mut secret = [fill; 32];
    secret[0] = tag;
    secret
}

fn ping(tag: u8) -> MasternodePing {
    let mut ping = MasternodePing::new(OutPoint::new([tag; 32], 0), block_hash(TIP - 2), NOW - 60);
    ping.sign(&secret(0x22, tag)).expect("ping");
    ping
}

fn broadcast(tag: u8) -> MasternodeBroadcast {
    let mut mnb = MasternodeBroadcast {
        collateral: OutPoint::new([tag; 32], 0),
        addr: NetAddr::new(IpAddr::V4(Ipv4Addr::new(8, 8, 8, tag)), 29_500),
        pubkey_collateral: pubkey_from_secret(&secret(0x11, tag)).expect("key"),
        pubkey_operator: pubkey_from_secret(&secret(0x22, tag)).expect("key"),
        signature: Vec::new(),
        sig_time: NOW - 120,
        protocol_version: PROTOCOL_VERSION,
        last_ping: ping(tag),
        mess_version: 1,
    };
    mnb.sign(&secret(0x11, tag)).expect("sign");
    mnb
}

fn signed_spork(id: SporkId, value: i64, time_signed: i64) -> SporkMessage {
    let mut key = [0u8; 32];
    key[31] = 1;
    let mut msg = SporkMessage::new(id, value, time_signed);
    msg.sign(&key).expect("sign");
    msg
}

#[test]
fn sporks_are_relayed_once_and_served() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(1);
    let spork = signed_spork(SporkId::SwiftTx, 1, NOW - 100);

    let dos = harness
        .handlers
        .handle(&peer, InboundMessage::Spork(spork.clone()), NOW);
    assert_eq!(dos, 0);
    assert_eq!(
        harness.relayed(),
        vec![Inventory::new(InventoryKind::Spork, spork.hash())]
    );
    harness
        .handlers
        .handle(&peer, InboundMessage::Spork(spork.clone()), NOW);
    assert_eq!(harness.relayed().len(), 1);

    harness.handlers.handle(&peer, InboundMessage::GetSporks, NOW);
    assert_eq!(
        peer.take(),
        vec![
            OutboundMessage::Spork(spork.clone()),
            OutboundMessage::Spork(SporkMessage::end_marker()),
        ]
    );

    let inv = Inventory::new(InventoryKind::Spork, spork.hash());
    harness
        .handlers
        .handle(&peer, InboundMessage::GetData(vec![inv]), NOW);
    assert_eq!(peer.take(), vec![OutboundMessage::Spork(spork)]);
}

#[test]
fn end_marker_is_regtest_only() {
    let harness = Harness::new(Network::Testnet);
    let peer = MockPeer::new(1);
    harness.handlers.handle(&peer, InboundMessage::GetSporks, NOW);
    assert!(peer.take().is_empty());
}

#[test]
fn future_spork_is_reported_as_misbehaviour() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(4);
    let spork = signed_spork(SporkId::SwiftTx, 1, NOW + 3 * 60 * 60);

    let dos = harness.handlers.handle(&peer, InboundMessage::Spork(spork), NOW);
    assert_eq!(dos, DOS_SPORK);
    assert_eq!(*harness.peers.misbehaving.lock().unwrap(), vec![(4, DOS_SPORK)]);
    assert!(harness.relayed().is_empty());
}

#[test]
fn masternode_messages_wait_for_the_chain() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(1);
    let mnb = broadcast(1);
    harness.fund(&mnb);

    harness
        .handlers
        .handle(&peer, InboundMessage::MasternodeBroadcast(mnb.clone()), NOW);
    assert!(harness.ctx.masternodes.is_empty());

    harness.ctx.sync_state.set_blockchain_synced(true, NOW);
    harness
        .handlers
        .handle(&peer, InboundMessage::MasternodeBroadcast(mnb.clone()), NOW);
    assert_eq!(harness.ctx.masternodes.len(), 1);
    assert_eq!(harness.ctx.sync_state.last_masternode_list(), NOW);
    // Not relayed while tier-two sync is still running.
    assert!(harness.relayed().is_empty());
}

#[test]
fn new_broadcast_is_relayed_once_synced() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(1);
    harness.ctx.sync_state.set_blockchain_synced(true, NOW);
    harness.ctx.sync_state.set_phase(SyncPhase::Finished);

    let mnb = broadcast(2);
    harness.fund(&mnb);
    harness
        .handlers
        .handle(&peer, InboundMessage::MasternodeBroadcast(mnb.clone()), NOW);
    assert_eq!(
        harness.relayed(),
        vec![Inventory::new(InventoryKind::MasternodeAnnounce, mnb.hash())]
    );

    let inv = Inventory::new(InventoryKind::MasternodeAnnounce, mnb.hash());
    harness
        .handlers
        .handle(&peer, InboundMessage::GetData(vec![inv]), NOW);
    assert_eq!(peer.take(), vec![OutboundMessage::MasternodeBroadcast(mnb)]);
}

#[test]
fn full_list_request_is_answered_then_throttled() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(3);
    harness.ctx.sync_state.set_blockchain_synced(true, NOW);
    let mnb = broadcast(3);
    harness.fund(&mnb);
    harness
        .handlers
        .handle(&peer, InboundMessage::MasternodeBroadcast(mnb.clone()), NOW);

    let dos = harness
        .handlers
        .handle(&peer, InboundMessage::GetMasternodeList(None), NOW);
    assert_eq!(dos, 0);
    assert_eq!(
        peer.take(),
        vec![
            OutboundMessage::Inventory(vec![Inventory::new(
                InventoryKind::MasternodeAnnounce,
                mnb.hash()
            )]),
            OutboundMessage::SyncStatusCount {
                item: SyncPhase::MasternodeList.id(),
                count: 1,
            },
        ]
    );

    let dos = harness
        .handlers
        .handle(&peer, InboundMessage::GetMasternodeList(None), NOW + 10);
    assert_eq!(dos, DOS_REPEATED_LIST_REQUEST);
    assert!(peer.take().is_empty());

    // Single-entry requests are never throttled.
    harness.handlers.handle(
        &peer,
        InboundMessage::GetMasternodeList(Some(mnb.collateral.clone())),
        NOW + 20,
    );
    assert_eq!(
        peer.take(),
        vec![OutboundMessage::Inventory(vec![Inventory::new(
            InventoryKind::MasternodeAnnounce,
            mnb.hash()
        )])]
    );
}

#[test]
fn ping_for_unknown_masternode_asks_the_sender() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(5);
    harness.ctx.sync_state.set_blockchain_synced(true, NOW);
    harness.ctx.sync_state.set_phase(SyncPhase::Finished);

    let unknown = ping(7);
    harness
        .handlers
        .handle(&peer, InboundMessage::MasternodePing(unknown.clone()), NOW);
    assert_eq!(
        peer.take(),
        vec![OutboundMessage::GetMasternodeList(Some(unknown.collateral.clone()))]
    );

    harness
        .handlers
        .handle(&peer, InboundMessage::MasternodePing(unknown), NOW + 5);
    assert!(peer.take().is_empty());
}

#[test]
fn status_counts_feed_the_running_phase() {
    let harness = Harness::new(Network::Regtest);
    let peer = MockPeer::new(6);
    harness.ctx.sync_state.set_phase(SyncPhase::MasternodeList);

    harness.handlers.handle(
        &peer,
        InboundMessage::SyncStatusCount {
            item: SyncPhase::MasternodeList.id(),
            count: 12,
        },
        NOW,
    );
    let status = harness.ctx.sync.status();
    assert_eq!(status.count_masternode_list, 1);
    assert_eq!(status.sum_masternode_list, 12);
}
