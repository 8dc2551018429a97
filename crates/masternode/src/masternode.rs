use std::sync::Arc;

use bczd_consensus::constants::PROTOCOL_VERSION;
use bczd_consensus::Hash256;
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;

use crate::deterministic::DeterministicMasternode;
use crate::entry::MasternodeEntry;
use crate::score::calculate_score;

/// A ranking candidate from either source.
#[derive(Clone, Debug)]
pub enum Masternode {
    Legacy(Arc<MasternodeEntry>),
    Deterministic(Arc<DeterministicMasternode>),
}

impl Masternode {
    pub fn collateral(&self) -> &OutPoint {
        match self {
            Masternode::Legacy(entry) => entry.collateral(),
            Masternode::Deterministic(dmn) => &dmn.collateral,
        }
    }

    pub fn score(&self, block_hash: &Hash256) -> u32 {
        calculate_score(self.collateral(), block_hash)
    }

    pub fn payee_script(&self) -> Vec<u8> {
        match self {
            Masternode::Legacy(entry) => entry.payee_script(),
            Masternode::Deterministic(dmn) => dmn.payout_script.clone(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            Masternode::Legacy(entry) => entry.is_enabled(),
            Masternode::Deterministic(dmn) => !dmn.is_pose_banned(),
        }
    }

    pub fn is_banned(&self) -> bool {
        match self {
            Masternode::Legacy(entry) => entry.banned,
            Masternode::Deterministic(dmn) => dmn.is_pose_banned(),
        }
    }

    /// Deterministic members have no announcement time.
    pub fn sig_time(&self) -> i64 {
        match self {
            Masternode::Legacy(entry) => entry.sig_time(),
            Masternode::Deterministic(_) => 0,
        }
    }

    pub fn protocol_version(&self) -> i32 {
        match self {
            Masternode::Legacy(entry) => entry.protocol_version(),
            Masternode::Deterministic(_) => PROTOCOL_VERSION,
        }
    }

    pub fn addr(&self) -> &NetAddr {
        match self {
            Masternode::Legacy(entry) => entry.addr(),
            Masternode::Deterministic(dmn) => &dmn.addr,
        }
    }

    pub fn is_deterministic(&self) -> bool {
        matches!(self, Masternode::Deterministic(_))
    }
}
