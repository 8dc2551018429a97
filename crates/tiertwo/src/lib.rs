//! Tier-two network layer: message dispatch, the sync state machine, the
//! fulfilled-request tracker and the background sync worker.

pub mod config;
pub mod context;
pub mod fulfilled;
pub mod handlers;
pub mod peer;
pub mod state;
pub mod sync;
pub mod worker;

pub use config::{
    load_conf_file, parse_conf, parse_conf_bool, ConfMap, ConfigError, StorageBackend,
    TierTwoConfig, CONF_FILE_NAME,
};
pub use context::TierTwoContext;
pub use fulfilled::NetFulfilledRequestManager;
pub use handlers::TierTwoHandlers;
pub use peer::{
    InboundMessage, Inventory, InventoryKind, OutboundMessage, Peer, PeerId, PeerSet,
};
pub use state::{SyncPhase, TierTwoSyncState};
pub use sync::{MasternodeSync, SyncStatus};
pub use worker::spawn_sync_worker;
