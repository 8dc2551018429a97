use bczd_consensus::constants::SPORK_SENTINEL_OFF;
use serde::Serialize;

/// Wire id used for "no spork" (end-of-list marker on regtest).
pub const SPORK_INVALID: i32 = -1;

/// Spork ids are part of the protocol and are never reused.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize)]
pub enum SporkId {
    SwiftTx,
    SwiftTxBlockFiltering,
    BanMisbehaving,
    SaplingMaintenance,
    LlmqDkgMaintenance,
    NewProtocolEnforcement,
    MasternodePaymentEnforcement,
    MasternodePayment,
    ColdStakingMaintenance,
}

impl SporkId {
    pub fn as_i32(self) -> i32 {
        spork_def(self).raw_id
    }

    pub fn from_i32(raw: i32) -> Option<Self> {
        SPORK_DEFS
            .iter()
            .find(|def| def.raw_id == raw)
            .map(|def| def.id)
    }

    pub fn name(self) -> &'static str {
        spork_def(self).name
    }
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct SporkDef {
    pub id: SporkId,
    pub raw_id: i32,
    pub name: &'static str,
    pub default_value: i64,
}

const fn def(id: SporkId, raw_id: i32, name: &'static str, default_value: i64) -> SporkDef {
    SporkDef {
        id,
        raw_id,
        name,
        default_value,
    }
}

pub const SPORK_DEFS: [SporkDef; 9] = [
    def(SporkId::SwiftTx, 10002, "SPORK_2_SWIFTTX", 0),
    def(
        SporkId::SwiftTxBlockFiltering,
        10003,
        "SPORK_3_SWIFTTX_BLOCK_FILTERING",
        0,
    ),
    def(
        SporkId::BanMisbehaving,
        10004,
        "SPORK_4_BAN_MISBEHAVING",
        SPORK_SENTINEL_OFF,
    ),
    def(
        SporkId::SaplingMaintenance,
        10007,
        "SPORK_7_SAPLING_MAINTENANCE",
        0,
    ),
    def(
        SporkId::LlmqDkgMaintenance,
        10009,
        "SPORK_9_LLMQ_DKG_MAINTENANCE",
        0,
    ),
    def(
        SporkId::NewProtocolEnforcement,
        10014,
        "SPORK_14_NEW_PROTOCOL_ENFORCEMENT",
        SPORK_SENTINEL_OFF,
    ),
    def(
        SporkId::MasternodePaymentEnforcement,
        10021,
        "SPORK_21_MASTERNODE_PAYMENT_ENFORCEMENT",
        SPORK_SENTINEL_OFF,
    ),
    def(
        SporkId::MasternodePayment,
        10022,
        "SPORK_22_MASTERNODE_PAYMENT",
        SPORK_SENTINEL_OFF,
    ),
    def(
        SporkId::ColdStakingMaintenance,
        10026,
        "SPORK_26_COLDSTAKING_MAINTENANCE",
        SPORK_SENTINEL_OFF,
    ),
];

pub fn spork_def(id: SporkId) -> &'static SporkDef {
    // SPORK_DEFS lists every variant exactly once.
    SPORK_DEFS
        .iter()
        .find(|def| def.id == id)
        .unwrap_or(&SPORK_DEFS[0])
}

pub fn spork_def_by_name(name: &str) -> Option<&'static SporkDef> {
    SPORK_DEFS.iter().find(|def| def.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_round_trip_and_are_unique() {
        for def in SPORK_DEFS.iter() {
            assert_eq!(SporkId::from_i32(def.raw_id), Some(def.id));
            assert_eq!(def.id.as_i32(), def.raw_id);
            assert_eq!(spork_def_by_name(def.name).map(|found| found.id), Some(def.id));
        }
        let mut raw: Vec<i32> = SPORK_DEFS.iter().map(|def| def.raw_id).collect();
        raw.dedup();
        assert_eq!(raw.len(), SPORK_DEFS.len());
        assert_eq!(SporkId::from_i32(SPORK_INVALID), None);
        assert_eq!(SporkId::from_i32(10001), None);
        assert!(spork_def_by_name("SPORK_1_UNKNOWN").is_none());
    }

    #[test]
    fn defaults() {
        assert_eq!(spork_def(SporkId::SwiftTx).default_value, 0);
        assert_eq!(
            spork_def(SporkId::MasternodePaymentEnforcement).default_value,
            SPORK_SENTINEL_OFF
        );
        assert_eq!(SporkId::NewProtocolEnforcement.as_i32(), 10014);
    }
}
