use bczd_consensus::constants::{MESS_VER_HASH, MESS_VER_STRMESS};
use bczd_consensus::Hash256;
use bczd_primitives::encoding::{encode, Decodable, DecodeError, Decoder, Encodable, Encoder};
use bczd_primitives::hash::sha256d;
use bczd_script::message::{sign_hash, sign_message, verify_hash, verify_message, SignError};

use crate::ids::{SporkId, SPORK_INVALID};

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SporkMessage {
    /// Raw wire id; may name a spork this node does not know.
    pub spork_id: i32,
    pub value: i64,
    pub time_signed: i64,
    pub signature: Vec<u8>,
    pub mess_version: i32,
}

impl SporkMessage {
    pub fn new(id: SporkId, value: i64, time_signed: i64) -> Self {
        Self {
            spork_id: id.as_i32(),
            value,
            time_signed,
            signature: Vec::new(),
            mess_version: MESS_VER_HASH,
        }
    }

    /// Empty message sent after the spork list on regtest.
    pub fn end_marker() -> Self {
        Self {
            spork_id: SPORK_INVALID,
            value: 0,
            time_signed: 0,
            signature: Vec::new(),
            mess_version: MESS_VER_HASH,
        }
    }

    pub fn id(&self) -> Option<SporkId> {
        SporkId::from_i32(self.spork_id)
    }

    /// Inventory hash: covers id, value and signing time.
    pub fn hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.spork_id);
        encoder.write_i64_le(self.value);
        encoder.write_i64_le(self.time_signed);
        sha256d(&encoder.into_inner())
    }

    pub fn signature_hash(&self) -> Hash256 {
        let mut encoder = Encoder::new();
        encoder.write_i32_le(self.mess_version);
        encoder.write_i32_le(self.spork_id);
        encoder.write_i64_le(self.value);
        encoder.write_i64_le(self.time_signed);
        sha256d(&encoder.into_inner())
    }

    fn str_message(&self) -> String {
        format!("{}{}{}", self.spork_id, self.value, self.time_signed)
    }

    pub fn sign(&mut self, secret: &[u8; 32]) -> Result<(), SignError> {
        self.signature = match self.mess_version {
            MESS_VER_STRMESS => sign_message(secret, self.str_message().as_bytes())?,
            _ => sign_hash(secret, &self.signature_hash())?,
        };
        Ok(())
    }

    pub fn check_signature(&self, pubkey: &[u8]) -> Result<(), SignError> {
        match self.mess_version {
            MESS_VER_STRMESS => {
                verify_message(pubkey, &self.signature, self.str_message().as_bytes())
            }
            _ => verify_hash(pubkey, &self.signature, &self.signature_hash()),
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        encode(self)
    }
}

impl Encodable for SporkMessage {
    fn consensus_encode(&self, encoder: &mut Encoder) {
        encoder.write_i32_le(self.spork_id);
        encoder.write_i64_le(self.value);
        encoder.write_i64_le(self.time_signed);
        encoder.write_var_bytes(&self.signature);
        encoder.write_i32_le(self.mess_version);
    }
}

impl Decodable for SporkMessage {
    fn consensus_decode(decoder: &mut Decoder) -> Result<Self, DecodeError> {
        Ok(Self {
            spork_id: decoder.read_i32_le()?,
            value: decoder.read_i64_le()?,
            time_signed: decoder.read_i64_le()?,
            signature: decoder.read_var_bytes()?,
            mess_version: decoder.read_i32_le()?,
        })
    }
}
