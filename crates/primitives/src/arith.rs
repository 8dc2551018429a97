//! 256-bit arithmetic over hashes and the compact ("nBits") encoding.

use bczd_consensus::Hash256;
use primitive_types::U256;

/// Interprets a hash (internal little-endian byte order) as an integer.
pub fn hash_to_u256(hash: &Hash256) -> U256 {
    U256::from_little_endian(hash)
}

pub fn u256_to_hash(value: U256) -> Hash256 {
    value.to_little_endian()
}

pub fn u256_to_compact(value: U256) -> u32 {
    if value.is_zero() {
        return 0;
    }

    let mut size = value.bits().div_ceil(8) as u32;
    let mut compact: u32;

    if size <= 3 {
        compact = value.low_u32() << (8 * (3 - size));
    } else {
        let shift = 8 * (size - 3);
        compact = (value >> shift).low_u32();
    }

    if (compact & 0x0080_0000) != 0 {
        compact >>= 8;
        size += 1;
    }

    (size << 24) | (compact & 0x007f_ffff)
}

pub fn compact_from_hash(hash: &Hash256) -> u32 {
    u256_to_compact(hash_to_u256(hash))
}

/// `|a - b|` over 256-bit integers.
pub fn abs_diff(a: U256, b: U256) -> U256 {
    if a >= b {
        a - b
    } else {
        b - a
    }
}
