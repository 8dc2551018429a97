//! Spork table: validation of incoming spork messages, the active value per
//! spork and persistence of accepted updates.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use bczd_consensus::constants::{DOS_SPORK, MESS_VER_HASH, SPORK_MAX_FUTURE_SECS};
use bczd_consensus::{unix_time, ChainParams, Hash256, Rejection};
use bczd_log::{log_category, log_info, log_warn, Category};
use bczd_primitives::encoding::DecodeError;
use bczd_script::message::{pubkey_from_secret, SignError};
use bczd_storage::{KeyValueStore, StoreError};
use serde::Serialize;

use crate::db::SporkDb;
use crate::ids::{spork_def, SporkId, SPORK_DEFS};
use crate::message::SporkMessage;

#[derive(Debug)]
pub enum SporkError {
    NoPrivateKey,
    KeyMismatch,
    /// A message signed at the same time or later is already active.
    Superseded,
    Sign(SignError),
    Store(StoreError),
    Decode(DecodeError),
}

impl fmt::Display for SporkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SporkError::NoPrivateKey => write!(f, "spork signing key not set"),
            SporkError::KeyMismatch => write!(f, "key does not match the network spork key"),
            SporkError::Superseded => write!(f, "a newer spork message is already active"),
            SporkError::Sign(err) => write!(f, "{err}"),
            SporkError::Store(err) => write!(f, "{err}"),
            SporkError::Decode(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for SporkError {}

impl From<SignError> for SporkError {
    fn from(err: SignError) -> Self {
        SporkError::Sign(err)
    }
}

impl From<StoreError> for SporkError {
    fn from(err: StoreError) -> Self {
        SporkError::Store(err)
    }
}

impl From<DecodeError> for SporkError {
    fn from(err: DecodeError) -> Self {
        SporkError::Decode(err)
    }
}

/// Where a spork message came from.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SporkSource {
    Network,
    /// Replayed from the spork database at startup: no future-time check and
    /// no write-back.
    Database,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SporkOutcome {
    /// Unknown spork, old message version or not newer than the stored one.
    Ignored,
    New,
    Updated,
}

impl SporkOutcome {
    pub fn should_relay(self) -> bool {
        matches!(self, SporkOutcome::New | SporkOutcome::Updated)
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct SporkStatus {
    pub name: &'static str,
    pub id: i32,
    pub value: i64,
    pub active: bool,
    pub time_signed: Option<i64>,
}

#[derive(Default)]
struct SporkTable {
    active: BTreeMap<SporkId, SporkMessage>,
    by_hash: HashMap<Hash256, SporkMessage>,
    private_key: Option<[u8; 32]>,
}

pub struct SporkManager {
    spork_pubkey: Option<Vec<u8>>,
    db: Option<SporkDb<Arc<dyn KeyValueStore>>>,
    table: Mutex<SporkTable>,
}

impl SporkManager {
    pub fn new(params: &ChainParams, store: Option<Arc<dyn KeyValueStore>>) -> Self {
        Self {
            spork_pubkey: params.spork_pubkey(),
            db: store.map(SporkDb::new),
            table: Mutex::new(SporkTable::default()),
        }
    }

    fn table(&self) -> MutexGuard<'_, SporkTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validates and applies a spork message. `Err` carries the misbehavior
    /// score for the sending peer.
    pub fn process_message(
        &self,
        msg: &SporkMessage,
        now: i64,
        source: SporkSource,
    ) -> Result<SporkOutcome, Rejection> {
        let Some(id) = msg.id() else {
            log_category!(Category::Sporks, "ignoring unknown spork id {}", msg.spork_id);
            return Ok(SporkOutcome::Ignored);
        };

        if source == SporkSource::Network && msg.time_signed > now + SPORK_MAX_FUTURE_SECS {
            log_category!(Category::Sporks, "spork {} signed too far into the future", id.name());
            return Err(Rejection::penalize("spork-time-too-new", DOS_SPORK));
        }

        if msg.mess_version != MESS_VER_HASH {
            log_category!(
                Category::Sporks,
                "spork {} message version {} not accepted anymore",
                id.name(),
                msg.mess_version
            );
            return Ok(SporkOutcome::Ignored);
        }

        let outcome = match self.table().active.get(&id) {
            Some(current) if current.time_signed >= msg.time_signed => {
                log_category!(
                    Category::Sporks,
                    "spork {} in memory is more recent: {} >= {}",
                    id.name(),
                    current.time_signed,
                    msg.time_signed
                );
                return Ok(SporkOutcome::Ignored);
            }
            Some(_) => SporkOutcome::Updated,
            None => SporkOutcome::New,
        };

        let valid = self
            .spork_pubkey
            .as_deref()
            .map(|pubkey| msg.check_signature(pubkey).is_ok())
            .unwrap_or(false);
        if !valid {
            log_category!(Category::Sporks, "invalid signature on spork {}", id.name());
            return Err(Rejection::penalize("spork-bad-signature", DOS_SPORK));
        }

        if !self.add_or_update(id, msg, source == SporkSource::Network) {
            log_category!(
                Category::Sporks,
                "spork {} superseded while its signature was checked",
                id.name()
            );
            return Ok(SporkOutcome::Ignored);
        }
        log_info!(
            "got {} spork {} ({}) with value {} (signed at {})",
            if outcome == SporkOutcome::New { "new" } else { "updated" },
            msg.spork_id,
            id.name(),
            msg.value,
            msg.time_signed
        );
        Ok(outcome)
    }

    /// Stores `msg` unless the active message for `id` was signed at the same
    /// time or later. The table lock is held through the write so memory and
    /// the database agree on the winner.
    fn add_or_update(&self, id: SporkId, msg: &SporkMessage, persist: bool) -> bool {
        let mut table = self.table();
        if let Some(current) = table.active.get(&id) {
            if current.time_signed >= msg.time_signed {
                return false;
            }
        }
        table.by_hash.insert(msg.hash(), msg.clone());
        table.active.insert(id, msg.clone());
        if persist {
            if let Some(db) = &self.db {
                if let Err(err) = db.write(msg) {
                    log_warn!("failed to persist spork {}: {err}", id.name());
                }
            }
        }
        true
    }

    /// Replays every stored spork message. Records for ids this build does
    /// not know are skipped by `process_message`.
    pub fn load_from_db(&self, now: i64) -> Result<usize, SporkError> {
        let Some(db) = &self.db else {
            return Ok(0);
        };
        let stored = db.read_all()?;
        if stored.is_empty() {
            log_category!(Category::Sporks, "no stored sporks found");
        }
        let mut loaded = 0;
        for msg in stored {
            let name = msg.id().map(SporkId::name).unwrap_or("unknown");
            match self.process_message(&msg, now, SporkSource::Database) {
                Ok(outcome) if outcome.should_relay() => {
                    loaded += 1;
                    log_info!("loaded spork {name} with value {}", msg.value);
                }
                Ok(_) => {}
                Err(rejection) => {
                    log_warn!("stored spork {name} rejected: {rejection}");
                }
            }
        }
        Ok(loaded)
    }

    /// Network value of a spork, or its compiled-in default.
    pub fn value(&self, id: SporkId) -> i64 {
        self.table()
            .active
            .get(&id)
            .map(|msg| msg.value)
            .unwrap_or(spork_def(id).default_value)
    }

    /// A spork whose value is a past timestamp is on.
    pub fn is_active_at(&self, id: SporkId, now: i64) -> bool {
        self.value(id) < now
    }

    pub fn is_active(&self, id: SporkId) -> bool {
        self.is_active_at(id, unix_time())
    }

    pub fn active_messages(&self) -> Vec<SporkMessage> {
        self.table().active.values().cloned().collect()
    }

    pub fn message_by_hash(&self, hash: &Hash256) -> Option<SporkMessage> {
        self.table().by_hash.get(hash).cloned()
    }

    pub fn status(&self, now: i64) -> Vec<SporkStatus> {
        let table = self.table();
        SPORK_DEFS
            .iter()
            .map(|def| {
                let stored = table.active.get(&def.id);
                let value = stored.map(|msg| msg.value).unwrap_or(def.default_value);
                SporkStatus {
                    name: def.name,
                    id: def.raw_id,
                    value,
                    active: value < now,
                    time_signed: stored.map(|msg| msg.time_signed),
                }
            })
            .collect()
    }

    /// Installs the signing key after checking it against the network spork key.
    pub fn set_private_key(&self, secret: [u8; 32]) -> Result<(), SporkError> {
        let derived = pubkey_from_secret(&secret)?;
        if self.spork_pubkey.as_deref() != Some(derived.as_slice()) {
            return Err(SporkError::KeyMismatch);
        }
        self.table().private_key = Some(secret);
        log_info!("initialized as spork signer");
        Ok(())
    }

    /// Signs and applies a new value. The returned message is to be relayed.
    pub fn update_spork(
        &self,
        id: SporkId,
        value: i64,
        now: i64,
    ) -> Result<SporkMessage, SporkError> {
        let secret = self.table().private_key.ok_or(SporkError::NoPrivateKey)?;
        let mut msg = SporkMessage::new(id, value, now);
        msg.sign(&secret)?;
        if !self.add_or_update(id, &msg, true) {
            return Err(SporkError::Superseded);
        }
        Ok(msg)
    }

    pub fn clear(&self) {
        let mut table = self.table();
        table.active.clear();
        table.by_hash.clear();
        table.private_key = None;
    }

    pub fn len(&self) -> usize {
        self.table().active.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for SporkManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sporks: {}", self.len())
    }
}
