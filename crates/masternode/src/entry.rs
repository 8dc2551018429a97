use bczd_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;
use bczd_script::standard::p2pkh_for_pubkey;

use crate::broadcast::MasternodeBroadcast;
use crate::ping::MasternodePing;

/// Legacy masternode accepted from a broadcast. The broadcast is kept so the
/// entry can be announced again; its `last_ping` tracks the newest ping.
///
/// `enabled` is not persisted: a reloaded entry starts enabled and the next
/// maintenance pass re-derives it from the ping age.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MasternodeEntry {
    pub broadcast: MasternodeBroadcast,
    pub enabled: bool,
    pub banned: bool,
}

impl MasternodeEntry {
    pub fn from_broadcast(broadcast: MasternodeBroadcast) -> Self {
        Self {
            broadcast,
            enabled: true,
            banned: false,
        }
    }

    pub fn collateral(&self) -> &OutPoint {
        &self.broadcast.collateral
    }

    pub fn addr(&self) -> &NetAddr {
        &self.broadcast.addr
    }

    pub fn pubkey_operator(&self) -> &[u8] {
        &self.broadcast.pubkey_operator
    }

    pub fn sig_time(&self) -> i64 {
        self.broadcast.sig_time
    }

    pub fn protocol_version(&self) -> i32 {
        self.broadcast.protocol_version
    }

    pub fn last_ping(&self) -> &MasternodePing {
        &self.broadcast.last_ping
    }

    /// Time of the newest liveness proof: last ping, or the announcement.
    pub fn last_seen(&self) -> i64 {
        if self.broadcast.last_ping.is_null() {
            self.broadcast.sig_time
        } else {
            self.broadcast.last_ping.sig_time
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled && !self.banned
    }

    /// P2PKH of the collateral key.
    pub fn payee_script(&self) -> Vec<u8> {
        p2pkh_for_pubkey(&self.broadcast.pubkey_collateral)
    }
}

impl Encodable for MasternodeEntry {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.broadcast.consensus_encode(encoder);
        encoder.write_bool(self.banned);
    }
}

impl Decodable for MasternodeEntry {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        let broadcast = MasternodeBroadcast::consensus_decode(decoder)?;
        let banned = decoder.read_bool()?;
        Ok(Self {
            broadcast,
            enabled: true,
            banned,
        })
    }
}
