use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, RwLock};

use bczd_chainstate::{ChainIndex, MemoryCoins, UtxoEntry};
use bczd_consensus::constants::PROTOCOL_VERSION;
use bczd_consensus::{chain_params, Hash256, Network};
use bczd_masternode::{
    BroadcastOutcome, CacheError, EmptyDeterministicList, MasternodeBroadcast, MasternodeCache,
    MasternodeManager, MasternodePing, CACHE_FILE_NAME,
};
use bczd_primitives::encoding::Encoder;
use bczd_primitives::hash::sha256d;
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;
use bczd_script::message::pubkey_from_secret;
use bczd_script::standard::p2pkh_for_pubkey;
use bczd_spork::SporkManager;

const NOW: i64 = 1_700_000_000;
const TIP: i32 = 50;
const MAGIC: [u8; 4] = [0xfa, 0xbf, 0xb5, 0xda];

fn block_hash(height: i32) -> Hash256 {
    let mut hash = [0u8; 32];
    hash[..4].copy_from_slice(&height.to_le_bytes());
    hash[31] = 0xc4;
    hash
}

fn manager() -> MasternodeManager {
    let params = chain_params(Network::Regtest);
    let mut index = ChainIndex::new();
    let mut last = index
        .insert_genesis(block_hash(0), NOW - 10_000)
        .expect("genesis");
    for height in 1..=TIP {
        last = index
            .insert(
                block_hash(height),
                &block_hash(height - 1),
                NOW - 10_000 + i64::from(height) * 60,
            )
            .expect("insert");
    }
    index.set_tip(Some(last));
    let sporks = Arc::new(SporkManager::new(&params, None));
    MasternodeManager::new(
        &params,
        Arc::new(RwLock::new(index)),
        sporks,
        Arc::new(EmptyDeterministicList),
    )
}

fn announce(manager: &MasternodeManager, coins: &MemoryCoins, tag: u8) -> MasternodeBroadcast {
    let collateral_secret = [tag; 32];
    let mut operator_secret = [0x5a; 32];
    operator_secret[0] = tag;

    let collateral = OutPoint::new([tag; 32], 0);
    let mut ping = MasternodePing::new(collateral.clone(), block_hash(TIP - 1), NOW - 30);
    ping.sign(&operator_secret).expect("ping");
    let mut mnb = MasternodeBroadcast {
        collateral,
        addr: NetAddr::new(IpAddr::V4(Ipv4Addr::new(51, 15, 0, tag)), 29_500),
        pubkey_collateral: pubkey_from_secret(&collateral_secret).expect("key"),
        pubkey_operator: pubkey_from_secret(&operator_secret).expect("key"),
        signature: Vec::new(),
        sig_time: NOW - 90,
        protocol_version: PROTOCOL_VERSION,
        last_ping: ping,
        mess_version: 1,
    };
    mnb.sign(&collateral_secret).expect("sign");

    coins.add(
        mnb.collateral.clone(),
        UtxoEntry {
            value: chain_params(Network::Regtest).tier_two.collateral_amount,
            script_pubkey: p2pkh_for_pubkey(&mnb.pubkey_collateral),
            height: 5,
            is_coinbase: false,
        },
    );
    let outcome = manager
        .process_broadcast(&mnb, NOW, coins)
        .expect("admitted");
    assert!(matches!(outcome, BroadcastOutcome::Added { .. }));
    mnb
}

fn with_checksum(mut payload: Vec<u8>) -> Vec<u8> {
    let checksum = sha256d(&payload);
    payload.extend_from_slice(&checksum);
    payload
}

fn header(version: i32, message: &str, magic: [u8; 4]) -> Encoder {
    let mut encoder = Encoder::new();
    encoder.write_i32_le(version);
    encoder.write_var_str(message);
    encoder.write_bytes(&magic);
    encoder
}

#[test]
fn registry_survives_a_restart() {
    let dir = tempfile::tempdir().expect("tempdir");
    let coins = MemoryCoins::new();
    let source = manager();
    let first = announce(&source, &coins, 1);
    let second = announce(&source, &coins, 2);
    source.request_mn_list(&NetAddr::new(IpAddr::V4(Ipv4Addr::new(1, 1, 1, 1)), 1), NOW);

    let cache = MasternodeCache::new(dir.path(), MAGIC);
    cache.write(&source).expect("write");
    assert!(dir.path().join(CACHE_FILE_NAME).exists());

    let restored = manager();
    assert_eq!(cache.read(&restored).expect("read"), 2);
    assert_eq!(restored.len(), 2);
    assert_eq!(
        restored.find(&first.collateral).map(|entry| entry.broadcast.clone()),
        Some(first.clone())
    );
    assert!(restored.broadcast_by_hash(&second.hash()).is_some());
    assert!(restored.ping_by_hash(&first.last_ping.hash()).is_some());
    assert_eq!(restored.to_string(), source.to_string());
    assert_eq!(cache.to_bytes(&restored), cache.to_bytes(&source));
}

#[test]
fn reloaded_entries_start_enabled() {
    let coins = MemoryCoins::new();
    let source = manager();
    let mnb = announce(&source, &coins, 3);
    source.check_and_remove(NOW + 7_300, &coins);
    assert!(!source.find(&mnb.collateral).expect("entry").is_enabled());

    let cache = MasternodeCache::new(std::path::Path::new("."), MAGIC);
    let bytes = cache.to_bytes(&source);
    let restored = manager();
    cache.load_bytes(&bytes, &restored).expect("load");
    assert!(restored.find(&mnb.collateral).expect("entry").is_enabled());
}

#[test]
fn missing_file_is_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cache = MasternodeCache::new(dir.path(), MAGIC);
    assert!(matches!(
        cache.read(&manager()),
        Err(CacheError::FileOpen(_))
    ));
}

#[test]
fn checksum_is_verified_first() {
    let coins = MemoryCoins::new();
    let source = manager();
    announce(&source, &coins, 1);
    let cache = MasternodeCache::new(std::path::Path::new("."), MAGIC);

    let target = manager();
    assert!(matches!(
        cache.load_bytes(&[0u8; 31], &target),
        Err(CacheError::HashRead)
    ));

    let mut bytes = cache.to_bytes(&source);
    let middle = bytes.len() / 2;
    bytes[middle] ^= 0x01;
    assert!(matches!(
        cache.load_bytes(&bytes, &target),
        Err(CacheError::IncorrectHash)
    ));
    assert!(target.is_empty());
}

#[test]
fn header_mismatches() {
    let cache = MasternodeCache::new(std::path::Path::new("."), MAGIC);
    let target = manager();

    let other_network = MasternodeCache::new(std::path::Path::new("."), [1, 2, 3, 4]);
    let bytes = other_network.to_bytes(&target);
    assert!(matches!(
        cache.load_bytes(&bytes, &target),
        Err(CacheError::IncorrectMagicNumber)
    ));

    let bytes = with_checksum(header(2, "GovernanceCache", MAGIC).into_inner());
    assert!(matches!(
        cache.load_bytes(&bytes, &target),
        Err(CacheError::IncorrectMagicMessage)
    ));
}

#[test]
fn format_errors_leave_the_registry_empty() {
    let coins = MemoryCoins::new();
    let target = manager();
    announce(&target, &coins, 7);
    let cache = MasternodeCache::new(std::path::Path::new("."), MAGIC);

    let mut truncated = header(2, "MasternodeCache", MAGIC);
    truncated.write_bytes(&[0xff]);
    let bytes = with_checksum(truncated.into_inner());
    assert!(matches!(
        cache.load_bytes(&bytes, &target),
        Err(CacheError::IncorrectFormat(_))
    ));
    assert!(target.is_empty());

    announce(&target, &coins, 8);
    let mut newer = header(3, "MasternodeCache", MAGIC).into_inner();
    let body = cache.to_bytes(&target);
    let valid_header_len = header(2, "MasternodeCache", MAGIC).into_inner().len();
    newer.extend_from_slice(&body[valid_header_len..body.len() - 32]);
    assert!(matches!(
        cache.load_bytes(&with_checksum(newer), &target),
        Err(CacheError::IncorrectFormat(_))
    ));
    assert!(target.is_empty());
}
