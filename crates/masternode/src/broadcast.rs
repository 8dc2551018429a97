//! Masternode announcement signed by the collateral key.

use bczd_consensus::constants::{
    DOS_FUTURE_TIME, DOS_INVALID_SIGNATURE, MASTERNODE_MAX_FUTURE_SECS, MESS_VER_HASH,
};
use bczd_consensus::{Hash256, Rejection};
use bczd_primitives::encoding::{Decodable, DecodeError, Decoder, Encodable, Encoder};
use bczd_primitives::hash::sha256d;
use bczd_primitives::netaddr::NetAddr;
use bczd_primitives::outpoint::OutPoint;
use bczd_script::message::{is_valid_pubkey, sign_hash, verify_hash, SignError};

use crate::ping::MasternodePing;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MasternodeBroadcast {
    pub collateral: OutPoint,
    pub addr: NetAddr,
    pub pubkey_collateral: Vec<u8>,
    pub pubkey_operator: Vec<u8>,
    pub signature: Vec<u8>,
    pub sig_time: i64,
    pub protocol_version: i32,
    pub last_ping: MasternodePing,
    pub mess_version: i32,
}

impl MasternodeBroadcast {
    /// Seen-map and inventory key. Pings do not change it.
    pub fn hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        self.collateral.consensus_encode(&mut encoder);
        encoder.write_i64_le(self.sig_time);
        encoder.write_var_bytes(&self.pubkey_collateral);
        sha256d(&encoder.into_inner())
    }

    pub fn signature_hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.mess_version);
        self.collateral.consensus_encode(&mut encoder);
        self.addr.consensus_encode(&mut encoder);
        encoder.write_i64_le(self.sig_time);
        encoder.write_var_bytes(&self.pubkey_collateral);
        encoder.write_var_bytes(&self.pubkey_operator);
        encoder.write_i32_le(self.protocol_version);
        sha256d(&encoder.into_inner())
    }

    pub fn sign(&mut self, collateral_secret: &[u8; 32]) -> Result<(), SignError> {
        self.mess_version = MESS_VER_HASH;
        self.signature = sign_hash(collateral_secret, &self.signature_hash())?;
        Ok(())
    }

    pub fn check_signature(&self) -> Result<(), SignError> {
        verify_hash(
            &self.pubkey_collateral,
            &self.signature,
            &self.signature_hash(),
        )
    }

    /// Stateless checks run before the registry lock is taken.
    pub fn check(&self, now: i64, min_protocol: i32) -> Result<(), Rejection> {
        if self.sig_time > now + MASTERNODE_MAX_FUTURE_SECS {
            return Err(Rejection::penalize(
                "broadcast signature time too far into the future",
                DOS_FUTURE_TIME,
            ));
        }
        if self.protocol_version < min_protocol {
            return Err(Rejection::silent("broadcast with obsolete protocol version"));
        }
        if self.collateral.is_null() {
            return Err(Rejection::silent("broadcast without collateral"));
        }
        if !is_valid_pubkey(&self.pubkey_collateral) {
            return Err(Rejection::penalize(
                "invalid collateral public key",
                DOS_INVALID_SIGNATURE,
            ));
        }
        if !is_valid_pubkey(&self.pubkey_operator) {
            return Err(Rejection::penalize(
                "invalid operator public key",
                DOS_INVALID_SIGNATURE,
            ));
        }
        if self.check_signature().is_err() {
            return Err(Rejection::penalize(
                "bad broadcast signature",
                DOS_INVALID_SIGNATURE,
            ));
        }
        Ok(())
    }

    /// The embedded ping must belong to this broadcast and carry a valid
    /// operator signature. Failures are never penalized.
    pub fn check_embedded_ping(&self, now: i64) -> Result<(), Rejection> {
        let ping = &self.last_ping;
        if ping.is_null() {
            return Err(Rejection::silent("broadcast without ping"));
        }
        if ping.collateral != self.collateral {
            return Err(Rejection::silent("ping does not match broadcast collateral"));
        }
        if let Err(rejection) = ping.check_sig_time(now) {
            return Err(Rejection::silent(rejection.reason));
        }
        if ping.check_signature(&self.pubkey_operator).is_err() {
            return Err(Rejection::silent("bad ping signature in broadcast"));
        }
        Ok(())
    }
}

impl Encodable for MasternodeBroadcast {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        self.collateral.consensus_encode(encoder);
        self.addr.consensus_encode(encoder);
        encoder.write_var_bytes(&self.pubkey_collateral);
        encoder.write_var_bytes(&self.pubkey_operator);
        encoder.write_var_bytes(&self.signature);
        encoder.write_i64_le(self.sig_time);
        encoder.write_i32_le(self.protocol_version);
        self.last_ping.consensus_encode(encoder);
        encoder.write_i32_le(self.mess_version);
    }
}

impl Decodable for MasternodeBroadcast {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            collateral: OutPoint::consensus_decode(decoder)?,
            addr: NetAddr::consensus_decode(decoder)?,
            pubkey_collateral: decoder.read_var_bytes()?,
            pubkey_operator: decoder.read_var_bytes()?,
            signature: decoder.read_var_bytes()?,
            sig_time: decoder.read_i64_le()?,
            protocol_version: decoder.read_i32_le()?,
            last_ping: MasternodePing::consensus_decode(decoder)?,
            mess_version: decoder.read_i32_le()?,
        })
    }
}
