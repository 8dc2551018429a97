//! Payee scripts and compact-signature signing for tier-two messages.

pub mod message;
mod secp;
pub mod standard;

pub use message::{
    pubkey_from_secret, sign_hash, sign_message, verify_hash, verify_message, SignError,
};
