//! Pay-to-pubkey-hash scripts for collateral and payee checks.

use bczd_primitives::hash::hash160;

const OP_DUP: u8 = 0x76;
const OP_HASH160: u8 = 0xa9;
const OP_EQUALVERIFY: u8 = 0x88;
const OP_CHECKSIG: u8 = 0xac;
const PUSH_20: u8 = 0x14;

const P2PKH_LEN: usize = 25;

/// `OP_DUP OP_HASH160 <pubkey_hash> OP_EQUALVERIFY OP_CHECKSIG`.
pub fn p2pkh_script(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(P2PKH_LEN);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

pub fn p2pkh_for_pubkey(pubkey: &[u8]) -> Vec<u8> {
    p2pkh_script(&hash160(pubkey))
}

/// Key hash of a P2PKH script, `None` for any other shape.
pub fn p2pkh_hash(script: &[u8]) -> Option<[u8; 20]> {
    match script {
        [OP_DUP, OP_HASH160, PUSH_20, hash @ .., OP_EQUALVERIFY, OP_CHECKSIG]
            if hash.len() == 20 =>
        {
            hash.try_into().ok()
        }
        _ => None,
    }
}

/// True when `script` is the P2PKH script of `pubkey`.
pub fn pays_to_pubkey(script: &[u8], pubkey: &[u8]) -> bool {
    p2pkh_hash(script).is_some_and(|hash| hash == hash160(pubkey))
}
