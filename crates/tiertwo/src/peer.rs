//! Boundary to the p2p layer: the tier-two code only sees peers through
//! these traits and exchanges already-decoded messages.

use std::sync::Arc;

use bczd_consensus::Hash256;
use bczd_masternode::{MasternodeBroadcast, MasternodePing};
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;
use bczd_spork::SporkMessage;

pub type PeerId = u64;

pub const MSG_SPORK: u32 = 6;
pub const MSG_MASTERNODE_ANNOUNCE: u32 = 14;
pub const MSG_MASTERNODE_PING: u32 = 15;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum InventoryKind {
    Spork,
    MasternodeAnnounce,
    MasternodePing,
}

impl InventoryKind {
    pub fn type_id(self) -> u32 {
        match self {
            InventoryKind::Spork => MSG_SPORK,
            InventoryKind::MasternodeAnnounce => MSG_MASTERNODE_ANNOUNCE,
            InventoryKind::MasternodePing => MSG_MASTERNODE_PING,
        }
    }

    pub fn from_type_id(type_id: u32) -> Option<Self> {
        match type_id {
            MSG_SPORK => Some(InventoryKind::Spork),
            MSG_MASTERNODE_ANNOUNCE => Some(InventoryKind::MasternodeAnnounce),
            MSG_MASTERNODE_PING => Some(InventoryKind::MasternodePing),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Inventory {
    pub kind: InventoryKind,
    pub hash: Hash256,
}

impl Inventory {
    pub fn new(kind: InventoryKind, hash: Hash256) -> Self {
        Self { kind, hash }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum InboundMessage {
    MasternodeBroadcast(MasternodeBroadcast),
    MasternodePing(MasternodePing),
    /// `None` asks for the whole list.
    GetMasternodeList(Option<OutPoint>),
    Spork(SporkMessage),
    GetSporks,
    SyncStatusCount { item: i32, count: i32 },
    GetData(Vec<Inventory>),
}

impl InboundMessage {
    pub fn command(&self) -> &'static str {
        match self {
            InboundMessage::MasternodeBroadcast(_) => "mnb",
            InboundMessage::MasternodePing(_) => "mnp",
            InboundMessage::GetMasternodeList(_) => "dseg",
            InboundMessage::Spork(_) => "spork",
            InboundMessage::GetSporks => "getsporks",
            InboundMessage::SyncStatusCount { .. } => "ssc",
            InboundMessage::GetData(_) => "getdata",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum OutboundMessage {
    GetSporks,
    GetMasternodeList(Option<OutPoint>),
    Spork(SporkMessage),
    MasternodeBroadcast(MasternodeBroadcast),
    MasternodePing(MasternodePing),
    Inventory(Vec<Inventory>),
    SyncStatusCount { item: i32, count: i32 },
}

pub trait Peer: Send + Sync {
    fn id(&self) -> PeerId;
    fn addr(&self) -> NetAddr;
    /// Negotiated protocol version.
    fn version(&self) -> i32;
    fn can_relay(&self) -> bool;
    /// Queues a message; must not block on the socket.
    fn send(&self, msg: OutboundMessage);
}

pub trait PeerSet: Send + Sync {
    fn connected_peers(&self) -> Vec<Arc<dyn Peer>>;
    fn relay_inventory(&self, inv: Inventory);
    fn misbehaving(&self, peer: PeerId, score: u32, reason: &str);
}
