//! Network parameters and tier-two constants shared across the node.

pub mod constants;
pub mod misbehavior;
pub mod money;
pub mod params;

pub use misbehavior::Rejection;
pub use params::{
    bytes_from_hex, chain_params, hash256_from_hex, hash256_to_hex, ChainParams, Network,
    TierTwoParams,
};

pub type Hash256 = [u8; 32];

/// Current UNIX time in seconds.
pub fn unix_time() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as i64)
        .unwrap_or(0)
}
