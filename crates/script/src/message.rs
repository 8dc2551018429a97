//! Compact (65-byte, recoverable) signatures over hashes and legacy string
//! messages, as used by sporks, masternode broadcasts and pings.

use bczd_consensus::constants::SIGNED_MESSAGE_MAGIC;
use bczd_consensus::Hash256;
use bczd_primitives::encoding::Encoder;
use bczd_primitives::hash::sha256d;
use secp256k1::ecdsa::{RecoverableSignature, RecoveryId};
use secp256k1::{Message, PublicKey, SecretKey};

use crate::secp::secp256k1;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum SignError {
    InvalidSecret,
    InvalidPubkey,
    InvalidSignature,
    InvalidRecoveryId,
    RecoverFailed,
    PubkeyMismatch,
}

impl std::fmt::Display for SignError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignError::InvalidSecret => write!(f, "invalid secret key"),
            SignError::InvalidPubkey => write!(f, "invalid pubkey"),
            SignError::InvalidSignature => write!(f, "invalid signature"),
            SignError::InvalidRecoveryId => write!(f, "invalid recovery id"),
            SignError::RecoverFailed => write!(f, "failed to recover pubkey"),
            SignError::PubkeyMismatch => write!(f, "pubkey mismatch"),
        }
    }
}

impl std::error::Error for SignError {}

/// Compressed public key for a 32-byte secret.
pub fn pubkey_from_secret(secret: &[u8; 32]) -> Result<Vec<u8>, SignError> {
    let secret = SecretKey::from_slice(secret).map_err(|_| SignError::InvalidSecret)?;
    Ok(PublicKey::from_secret_key(secp256k1(), &secret)
        .serialize()
        .to_vec())
}

pub fn is_valid_pubkey(pubkey: &[u8]) -> bool {
    PublicKey::from_slice(pubkey).is_ok()
}

pub fn signed_message_hash(message: &[u8]) -> Hash256 {
    let mut encoder = Encoder::new();
    encoder.write_var_str(SIGNED_MESSAGE_MAGIC);
    encoder.write_var_bytes(message);
    sha256d(&encoder.into_inner())
}

/// Signs `hash` with a compressed-key compact signature.
pub fn sign_hash(secret: &[u8; 32], hash: &Hash256) -> Result<Vec<u8>, SignError> {
    let secret = SecretKey::from_slice(secret).map_err(|_| SignError::InvalidSecret)?;
    let msg = Message::from_digest(*hash);
    let sig = secp256k1().sign_ecdsa_recoverable(&msg, &secret);
    Ok(encode_compact(&sig, true).to_vec())
}

/// Accepts when the key recovered from `signature` is exactly `expected_pubkey`.
pub fn verify_hash(
    expected_pubkey: &[u8],
    signature: &[u8],
    hash: &Hash256,
) -> Result<(), SignError> {
    if PublicKey::from_slice(expected_pubkey).is_err() {
        return Err(SignError::InvalidPubkey);
    }
    let recovered = recover_pubkey(signature, hash)?;
    if recovered != expected_pubkey {
        return Err(SignError::PubkeyMismatch);
    }
    Ok(())
}

pub fn sign_message(secret: &[u8; 32], message: &[u8]) -> Result<Vec<u8>, SignError> {
    sign_hash(secret, &signed_message_hash(message))
}

pub fn verify_message(
    expected_pubkey: &[u8],
    signature: &[u8],
    message: &[u8],
) -> Result<(), SignError> {
    verify_hash(expected_pubkey, signature, &signed_message_hash(message))
}

pub fn recover_pubkey(signature: &[u8], hash: &Hash256) -> Result<Vec<u8>, SignError> {
    let (recoverable, compressed) = decode_compact_signature(signature)?;
    let msg = Message::from_digest(*hash);
    let pubkey = secp256k1()
        .recover_ecdsa(&msg, &recoverable)
        .map_err(|_| SignError::RecoverFailed)?;
    if compressed {
        Ok(pubkey.serialize().to_vec())
    } else {
        Ok(pubkey.serialize_uncompressed().to_vec())
    }
}

fn encode_compact(sig: &RecoverableSignature, compressed: bool) -> [u8; 65] {
    let (rec_id, bytes) = sig.serialize_compact();
    let mut out = [0u8; 65];
    out[0] = 27u8 + (rec_id.to_i32() as u8) + if compressed { 4 } else { 0 };
    out[1..].copy_from_slice(&bytes);
    out
}

fn decode_compact_signature(signature: &[u8]) -> Result<(RecoverableSignature, bool), SignError> {
    if signature.len() != 65 {
        return Err(SignError::InvalidSignature);
    }
    let header = signature[0];
    if !(27..=34).contains(&header) {
        return Err(SignError::InvalidSignature);
    }
    let compressed = header >= 31;
    let recovery = if compressed { header - 31 } else { header - 27 };
    let rec_id =
        RecoveryId::from_i32(recovery as i32).map_err(|_| SignError::InvalidRecoveryId)?;
    let sig = RecoverableSignature::from_compact(&signature[1..65], rec_id)
        .map_err(|_| SignError::InvalidSignature)?;
    Ok((sig, compressed))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: [u8; 32] = [1u8; 32];

    #[test]
    fn hash_signature_verifies_against_signer_key() {
        let pubkey = pubkey_from_secret(&SECRET).expect("pubkey");
        let hash = sha256d(b"spork");
        let sig = sign_hash(&SECRET, &hash).expect("sign");
        assert_eq!(sig.len(), 65);
        assert!(sig[0] >= 31);
        verify_hash(&pubkey, &sig, &hash).expect("verify ok");

        let other = pubkey_from_secret(&[2u8; 32]).expect("pubkey");
        assert_eq!(
            verify_hash(&other, &sig, &hash),
            Err(SignError::PubkeyMismatch)
        );
        assert_eq!(
            verify_hash(&pubkey, &sig, &sha256d(b"other")),
            Err(SignError::PubkeyMismatch)
        );
    }

    #[test]
    fn string_message_signature() {
        let pubkey = pubkey_from_secret(&SECRET).expect("pubkey");
        let sig = sign_message(&SECRET, b"hello").expect("sign");
        verify_message(&pubkey, &sig, b"hello").expect("verify ok");
        assert!(verify_message(&pubkey, &sig, b"hellO").is_err());
    }

    #[test]
    fn malformed_inputs_are_rejected() {
        let pubkey = pubkey_from_secret(&SECRET).expect("pubkey");
        let hash = sha256d(b"x");
        assert_eq!(
            verify_hash(&pubkey, &[0u8; 64], &hash),
            Err(SignError::InvalidSignature)
        );
        let mut sig = sign_hash(&SECRET, &hash).expect("sign");
        sig[0] = 40;
        assert_eq!(
            verify_hash(&pubkey, &sig, &hash),
            Err(SignError::InvalidSignature)
        );
        assert_eq!(
            verify_hash(&[0x05; 33], &sig, &hash),
            Err(SignError::InvalidPubkey)
        );
        assert_eq!(pubkey_from_secret(&[0u8; 32]), Err(SignError::InvalidSecret));
        assert!(is_valid_pubkey(&pubkey));
    }

    #[test]
    fn secret_one_is_the_generator() {
        let mut one = [0u8; 32];
        one[31] = 1;
        let pubkey = pubkey_from_secret(&one).expect("pubkey");
        assert_eq!(
            bczd_consensus::bytes_from_hex(
                "0279be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
            )
            .expect("hex"),
            pubkey
        );
    }
}
