//! Read-only view of the chain-derived deterministic masternode list.
//!
//! The list is maintained elsewhere (from registration transactions); the
//! registry only iterates it when scoring and counting.

use std::sync::Arc;

use bczd_consensus::Hash256;
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DeterministicMasternode {
    pub pro_tx_hash: Hash256,
    pub collateral: OutPoint,
    pub addr: NetAddr,
    pub pubkey_operator: Vec<u8>,
    pub payout_script: Vec<u8>,
    pub registered_height: i32,
    pub pose_banned: bool,
}

impl DeterministicMasternode {
    pub fn is_pose_banned(&self) -> bool {
        self.pose_banned
    }
}

pub trait DeterministicList: Send + Sync {
    /// Visits list members; `only_valid` skips PoSe-banned ones.
    fn for_each(&self, only_valid: bool, f: &mut dyn FnMut(&Arc<DeterministicMasternode>));

    fn valid_count(&self) -> usize {
        let mut count = 0;
        self.for_each(true, &mut |_| count += 1);
        count
    }
}

/// Used until deterministic masternodes are enabled on the network.
#[derive(Clone, Copy, Debug, Default)]
pub struct EmptyDeterministicList;

impl DeterministicList for EmptyDeterministicList {
    fn for_each(&self, _only_valid: bool, _f: &mut dyn FnMut(&Arc<DeterministicMasternode>)) {}

    fn valid_count(&self) -> usize {
        0
    }
}

/// Fixed snapshot of the list, e.g. as of the current tip.
#[derive(Clone, Debug, Default)]
pub struct DeterministicSnapshot {
    members: Vec<Arc<DeterministicMasternode>>,
}

impl DeterministicSnapshot {
    pub fn new(members: Vec<DeterministicMasternode>) -> Self {
        Self {
            members: members.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl DeterministicList for DeterministicSnapshot {
    fn for_each(&self, only_valid: bool, f: &mut dyn FnMut(&Arc<DeterministicMasternode>)) {
        for member in &self.members {
            if only_valid && member.is_pose_banned() {
                continue;
            }
            f(member);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(tag: u8, banned: bool) -> DeterministicMasternode {
        DeterministicMasternode {
            pro_tx_hash: [tag; 32],
            collateral: OutPoint::new([tag; 32], 0),
            addr: NetAddr::default(),
            pubkey_operator: vec![2; 33],
            payout_script: vec![0x51],
            registered_height: 1,
            pose_banned: banned,
        }
    }

    #[test]
    fn valid_count_skips_banned() {
        let list = DeterministicSnapshot::new(vec![member(1, false), member(2, true)]);
        assert_eq!(list.len(), 2);
        assert_eq!(list.valid_count(), 1);
        let mut all = 0;
        list.for_each(false, &mut |_| all += 1);
        assert_eq!(all, 2);
        assert_eq!(EmptyDeterministicList.valid_count(), 0);
    }
}
