//! Network parameter definitions.

use crate::money::{Amount, COIN};
use crate::Hash256;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Network {
    Mainnet,
    Testnet,
    Regtest,
}

impl Network {
    pub fn as_str(self) -> &'static str {
        match self {
            Network::Mainnet => "main",
            Network::Testnet => "test",
            Network::Regtest => "regtest",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "main" | "mainnet" => Some(Network::Mainnet),
            "test" | "testnet" => Some(Network::Testnet),
            "regtest" => Some(Network::Regtest),
            _ => None,
        }
    }

    pub fn is_regtest(self) -> bool {
        self == Network::Regtest
    }
}

/// Tier-two (masternode) rules for a network.
#[derive(Clone, Copy, Debug)]
pub struct TierTwoParams {
    pub collateral_amount: Amount,
    pub collateral_min_conf: i32,
    pub fulfilled_request_expire_secs: i64,
    pub masternodes_request_secs: i64,
    pub masternodes_dseg_secs: i64,
}

impl TierTwoParams {
    pub fn is_valid_collateral(&self, value: Amount) -> bool {
        value == self.collateral_amount
    }
}

#[derive(Clone, Debug)]
pub struct ChainParams {
    pub network: Network,
    pub message_start: [u8; 4],
    pub default_port: u16,
    pub tier_two: TierTwoParams,
    /// Hex-encoded secp256k1 public key that signs sporks.
    pub spork_pubkey_hex: &'static str,
}

impl ChainParams {
    /// Decoded spork key; `None` when the network has no usable key.
    pub fn spork_pubkey(&self) -> Option<Vec<u8>> {
        let bytes = bytes_from_hex(self.spork_pubkey_hex).ok()?;
        match bytes.len() {
            33 | 65 => Some(bytes),
            _ => None,
        }
    }
}

#[derive(Debug, Eq, PartialEq)]
pub enum HexError {
    InvalidLength,
    InvalidHex,
}

impl std::fmt::Display for HexError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HexError::InvalidLength => write!(f, "invalid hex length"),
            HexError::InvalidHex => write!(f, "invalid hex character"),
        }
    }
}

impl std::error::Error for HexError {}

/// Parses a display-order (big-endian) hex hash into internal byte order.
pub fn hash256_from_hex(input: &str) -> Result<Hash256, HexError> {
    let mut hex = input.trim();
    if let Some(stripped) = hex.strip_prefix("0x").or_else(|| hex.strip_prefix("0X")) {
        hex = stripped;
    }
    if hex.is_empty() || hex.len() > 64 {
        return Err(HexError::InvalidLength);
    }
    let padded = format!("{hex:0>64}");
    let mut bytes = [0u8; 32];
    for (i, byte_out) in bytes.iter_mut().enumerate() {
        let start = i * 2;
        *byte_out = u8::from_str_radix(&padded[start..start + 2], 16)
            .map_err(|_| HexError::InvalidHex)?;
    }
    bytes.reverse();
    Ok(bytes)
}

/// Plain hex decoding, no byte-order reversal.
pub fn bytes_from_hex(input: &str) -> Result<Vec<u8>, HexError> {
    let hex = input.trim();
    if hex.len() % 2 != 0 {
        return Err(HexError::InvalidLength);
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            hex.get(i..i + 2)
                .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                .ok_or(HexError::InvalidHex)
        })
        .collect()
}

pub fn hash256_to_hex(hash: &Hash256) -> String {
    hash.iter().rev().map(|byte| format!("{byte:02x}")).collect()
}

pub fn chain_params(network: Network) -> ChainParams {
    match network {
        Network::Mainnet => mainnet_chain_params(),
        Network::Testnet => testnet_chain_params(),
        Network::Regtest => regtest_chain_params(),
    }
}

fn mainnet_tier_two() -> TierTwoParams {
    TierTwoParams {
        collateral_amount: 10_000 * COIN,
        collateral_min_conf: 15,
        fulfilled_request_expire_secs: 60 * 60,
        masternodes_request_secs: 3 * 60 * 60,
        masternodes_dseg_secs: 3 * 60 * 60,
    }
}

fn mainnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Mainnet,
        message_start: [0x90, 0xc4, 0xfd, 0xe9],
        default_port: 29_500,
        tier_two: mainnet_tier_two(),
        // No spork key has been published for mainnet yet.
        spork_pubkey_hex: "0",
    }
}

fn testnet_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Testnet,
        message_start: [0x45, 0x76, 0x65, 0xba],
        default_port: 39_500,
        tier_two: mainnet_tier_two(),
        spork_pubkey_hex: "02c6047f9441ed7d6d3045406e95c07cd85c778e4b8cef3ca7abac09b95c709ee5",
    }
}

fn regtest_chain_params() -> ChainParams {
    ChainParams {
        network: Network::Regtest,
        message_start: [0xa1, 0xcf, 0x7e, 0xac],
        default_port: 49_500,
        tier_two: TierTwoParams {
            collateral_min_conf: 1,
            fulfilled_request_expire_secs: 5 * 60,
            ..mainnet_tier_two()
        },
        // Secret key 0x00..01; regtest sporks are signed by test harnesses.
        spork_pubkey_hex: "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mainnet_tier_two_params() {
        let params = chain_params(Network::Mainnet);
        assert_eq!(params.message_start, [0x90, 0xc4, 0xfd, 0xe9]);
        assert_eq!(params.default_port, 29_500);
        assert_eq!(params.tier_two.collateral_amount, 10_000 * COIN);
        assert_eq!(params.tier_two.collateral_min_conf, 15);
        assert_eq!(params.tier_two.fulfilled_request_expire_secs, 3600);
        assert!(params.spork_pubkey().is_none());
    }

    #[test]
    fn regtest_spork_key_decodes() {
        let params = chain_params(Network::Regtest);
        let key = params.spork_pubkey().expect("regtest spork key");
        assert_eq!(key.len(), 33);
        assert_eq!(key[0], 0x02);
        assert_eq!(params.tier_two.collateral_min_conf, 1);
    }

    #[test]
    fn networks_have_distinct_magic() {
        let main = chain_params(Network::Mainnet).message_start;
        let test = chain_params(Network::Testnet).message_start;
        let reg = chain_params(Network::Regtest).message_start;
        assert_ne!(main, test);
        assert_ne!(main, reg);
        assert_ne!(test, reg);
    }

    #[test]
    fn hash_hex_round_trips_in_display_order() {
        let text = "00052461a5006c2e3b74ce48992a08695607912d5604c3eb8da25749b0900444";
        let hash = hash256_from_hex(text).expect("hash");
        assert_eq!(hash[31], 0x00);
        assert_eq!(hash[0], 0x44);
        assert_eq!(hash256_to_hex(&hash), text);
        assert_eq!(hash256_from_hex("zz"), Err(HexError::InvalidHex));
        assert_eq!(bytes_from_hex("0a0b").expect("bytes"), vec![0x0a, 0x0b]);
        assert_eq!(bytes_from_hex("abc"), Err(HexError::InvalidLength));
    }

    #[test]
    fn network_names_parse() {
        assert_eq!(Network::parse("main"), Some(Network::Mainnet));
        assert_eq!(Network::parse("TestNet"), Some(Network::Testnet));
        assert_eq!(Network::parse("regtest"), Some(Network::Regtest));
        assert_eq!(Network::parse("signet"), None);
    }
}
