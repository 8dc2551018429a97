//! Masternode registry: legacy entries announced over the network, the
//! deterministic list view, scoring, ranking and the on-disk cache.

pub mod active;
pub mod broadcast;
pub mod cache;
pub mod deterministic;
pub mod entry;
pub mod hashes;
pub mod manager;
pub mod masternode;
pub mod payments;
pub mod ping;
pub mod score;

pub use active::{ActiveMasternode, ActiveStatus};
pub use broadcast::MasternodeBroadcast;
pub use cache::{CacheError, MasternodeCache, CACHE_FILE_NAME};
pub use deterministic::{
    DeterministicList, DeterministicMasternode, DeterministicSnapshot, EmptyDeterministicList,
};
pub use entry::MasternodeEntry;
pub use hashes::BlockHashCache;
pub use manager::{BroadcastOutcome, MasternodeManager, MasternodesInfo, PingOutcome};
pub use masternode::Masternode;
pub use payments::{BlockPayees, NoPaymentVotes, PaymentVotes};
pub use ping::MasternodePing;
pub use score::{calculate_score, WORST_SCORE};
