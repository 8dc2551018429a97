//! Deterministic masternode scoring.
//!
//! `score = compact(|H(block_hash || aux) - H(block_hash)|)` with
//! `aux = uint256(collateral.hash) + collateral.index` and `H = sha256d`.
//! Every node must reproduce it bit for bit: it is the only input to ranking.

use bczd_consensus::Hash256;
use bczd_primitives::arith::{abs_diff, hash_to_u256, u256_to_compact, u256_to_hash};
use bczd_primitives::encoding::{Encodable, Encoder};
use bczd_primitives::hash::sha256d;
use bczd_primitives::outpoint::OutPoint;
use primitive_types::U256;

/// Score assigned to candidates that may not win.
pub const WORST_SCORE: u32 = 0;

pub fn calculate_score(collateral: &OutPoint, block_hash: &Hash256) -> u32 {
    let (aux, _) = hash_to_u256(&collateral.hash).overflowing_add(U256::from(collateral.index));
    let aux = u256_to_hash(aux);

    let plain = sha256d(block_hash);
    let mut buf = Vec::with_capacity(64);
    buf.extend_from_slice(block_hash);
    buf.extend_from_slice(&aux);
    let mixed = sha256d(&buf);

    u256_to_compact(abs_diff(hash_to_u256(&mixed), hash_to_u256(&plain)))
}

/// Identity hash `H(collateral, sig_time)` used for payment tie-breaks.
pub fn identity_hash(collateral: &OutPoint, sig_time: i64) -> Hash256 {
    let mut encoder = Encoder::new();
    collateral.consensus_encode(&mut encoder);
    encoder.write_i64_le(sig_time);
    sha256d(&encoder.into_inner())
}
