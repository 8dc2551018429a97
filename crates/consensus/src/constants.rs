//! Tier-two constants shared by the masternode, spork and sync subsystems.

/// Current network protocol version for P2P messages.
pub const PROTOCOL_VERSION: i32 = 70_926;
/// Minimum peer protocol version while SPORK_14 is inactive.
pub const MIN_PEER_PROTO_VERSION_BEFORE_ENFORCEMENT: i32 = 70_925;
/// Minimum peer protocol version once SPORK_14 is active.
pub const MIN_PEER_PROTO_VERSION_AFTER_ENFORCEMENT: i32 = 70_926;

pub fn active_protocol(new_protocol_enforced: bool) -> i32 {
    if new_protocol_enforced {
        MIN_PEER_PROTO_VERSION_AFTER_ENFORCEMENT
    } else {
        MIN_PEER_PROTO_VERSION_BEFORE_ENFORCEMENT
    }
}

/// Signed-message version: legacy string message with magic prefix.
pub const MESS_VER_STRMESS: i32 = 0;
/// Signed-message version: compact signature over the serialized hash.
pub const MESS_VER_HASH: i32 = 1;

/// Message magic used for string-message signatures.
pub const SIGNED_MESSAGE_MAGIC: &str = "DarkNet Signed Message:\n";

/// Spork value used as "disabled" (Mon, 01 Jan 2099 00:00:00 GMT).
pub const SPORK_SENTINEL_OFF: i64 = 4_070_908_800;
/// Sporks signed further than this into the future are rejected.
pub const SPORK_MAX_FUTURE_SECS: i64 = 2 * 60 * 60;

/// Masternode list sync threshold (distinct peers per phase).
pub const MASTERNODE_SYNC_THRESHOLD: i32 = 2;
/// Base per-phase timeout, in seconds.
pub const MASTERNODE_SYNC_TIMEOUT: i64 = 5;
/// Seconds between chain-synced re-evaluations.
pub const CHAIN_SYNC_UPDATE_TIME: i64 = 30;
/// Cooldown before a failed sync restarts.
pub const MASTERNODE_SYNC_FAILED_COOLDOWN: i64 = 60;
/// A gap longer than this between ticks forces a sync reset.
pub const MASTERNODE_SYNC_SLEEP_RESET: i64 = 60 * 60;
/// The chain counts as synced when the best block is younger than this.
pub const CHAIN_SYNC_MAX_TIP_AGE: i64 = 60 * 60;

/// Masternodes younger than this are not eligible for rewards (when SPORK_21 is active).
pub const MN_WINNER_MINIMUM_AGE: i64 = 8_000;
/// Number of recent block hashes kept in the masternode manager's cache.
pub const CACHED_BLOCK_HASHES: usize = 200;
/// Blocks a ping's referenced hash may trail the tip.
pub const MASTERNODE_PING_MAX_DEPTH: i32 = 24;
/// Minimum interval between accepted pings for the same masternode.
pub const MASTERNODE_MIN_MNP_SECONDS: i64 = 10 * 60;
/// Without a ping for this long an entry is disabled.
pub const MASTERNODE_EXPIRATION_SECONDS: i64 = 120 * 60;
/// Without a ping for this long an entry is removed.
pub const MASTERNODE_REMOVAL_SECONDS: i64 = 130 * 60;
/// Broadcast and ping signatures may not be dated later than this ahead of local time.
pub const MASTERNODE_MAX_FUTURE_SECS: i64 = 60 * 60;
/// Votes required to count a payee as paid in a block.
pub const MNPAYMENTS_SIGNATURES_REQUIRED: usize = 2;
/// Tie-break window (seconds) for entries paid in the same block.
pub const LAST_PAID_OFFSET_WINDOW: i64 = 150;
/// Unpaid entries are reported as at least this many seconds since payment.
pub const LONG_UNPAID_SECS: i64 = 60 * 60 * 24 * 30;

/// Misbehavior scores handed to the peer-reputation layer.
pub const DOS_INVALID_COLLATERAL: u32 = 33;
pub const DOS_INVALID_SIGNATURE: u32 = 100;
pub const DOS_BAD_PING_SIGNATURE: u32 = 33;
pub const DOS_FUTURE_TIME: u32 = 1;
pub const DOS_REPEATED_LIST_REQUEST: u32 = 20;
pub const DOS_SPORK: u32 = 100;
