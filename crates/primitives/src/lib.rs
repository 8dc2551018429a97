//! Consensus serialization, hashing and small wire types used by tier two.

pub mod arith;
pub mod encoding;
pub mod hash;
pub mod netaddr;
pub mod outpoint;

pub use arith::{compact_from_hash, hash_to_u256, u256_to_compact};
pub use hash::{hash160, sha256, sha256d};
pub use netaddr::NetAddr;
pub use outpoint::OutPoint;
