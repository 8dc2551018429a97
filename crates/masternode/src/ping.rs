//! Masternode liveness ping.

use bczd_consensus::constants::{DOS_FUTURE_TIME, MASTERNODE_MAX_FUTURE_SECS, MESS_VER_HASH};
use bczd_consensus::{Hash256, Rejection};
use bczd_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use bczd_primitives::hash::sha256d;
use bczd_primitives::outpoint::OutPoint;
use bczd_script::message::{sign_hash, verify_hash, SignError};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MasternodePing {
    pub collateral: OutPoint,
    /// Recent block hash, proves the operator follows the chain.
    pub block_hash: Hash256,
    pub sig_time: i64,
    pub signature: Vec<u8>,
    pub mess_version: i32,
}

impl MasternodePing {
    pub fn new(collateral: OutPoint, block_hash: Hash256, sig_time: i64) -> Self {
        Self {
            collateral,
            block_hash,
            sig_time,
            signature: Vec::new(),
            mess_version: MESS_VER_HASH,
        }
    }

    pub fn null() -> Self {
        Self::new(OutPoint::null(), [0u8; 32], 0)
    }

    pub fn is_null(&self) -> bool {
        self.sig_time == 0 || self.collateral.is_null()
    }

    /// Seen-map key.
    pub fn hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        self.collateral.consensus_encode(&mut encoder);
        encoder.write_hash_le(&self.block_hash);
        encoder.write_i64_le(self.sig_time);
        sha256d(&encoder.into_inner())
    }

    pub fn signature_hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.mess_version);
        self.collateral.consensus_encode(&mut encoder);
        encoder.write_hash_le(&self.block_hash);
        encoder.write_i64_le(self.sig_time);
        sha256d(&encoder.into_inner())
    }

    /// Signs with the operator key.
    pub fn sign(&mut self, operator_secret: &[u8; 32]) -> Result<(), SignError> {
        self.mess_version = MESS_VER_HASH;
        self.signature = sign_hash(operator_secret, &self.signature_hash())?;
        Ok(())
    }

    pub fn check_signature(&self, operator_pubkey: &[u8]) -> Result<(), SignError> {
        verify_hash(operator_pubkey, &self.signature, &self.signature_hash())
    }

    pub fn check_sig_time(&self, now: i64) -> Result<(), Rejection> {
        if self.sig_time > now + MASTERNODE_MAX_FUTURE_SECS {
            return Err(Rejection::penalize(
                "ping signature time too far into the future",
                DOS_FUTURE_TIME,
            ));
        }
        if self.sig_time <= now - MASTERNODE_MAX_FUTURE_SECS {
            return Err(Rejection::silent("ping signature time too far into the past"));
        }
        Ok(())
    }
}

impl Encodable for MasternodePing {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.collateral.consensus_encode(encoder);
        encoder.write_hash_le(&self.block_hash);
        encoder.write_i64_le(self.sig_time);
        encoder.write_var_bytes(&self.signature);
        encoder.write_i32_le(self.mess_version);
    }
}

impl Decodable for MasternodePing {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            collateral: OutPoint::consensus_decode(decoder)?,
            block_hash: decoder.read_hash_le()?,
            sig_time: decoder.read_i64_le()?,
            signature: decoder.read_var_bytes()?,
            mess_version: decoder.read_i32_le()?,
        })
    }
}
