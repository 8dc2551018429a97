//! Network-wide feature switches ("sporks") signed by the spork key.

mod db;
mod ids;
mod manager;
mod message;

pub use db::SporkDb;
pub use ids::{spork_def, spork_def_by_name, SporkDef, SporkId, SPORK_DEFS, SPORK_INVALID};
pub use manager::{SporkError, SporkManager, SporkOutcome, SporkSource, SporkStatus};
pub use message::SporkMessage;
