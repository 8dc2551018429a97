//! Block index and chain/UTXO views consumed by the tier-two layer.

pub mod index;
pub mod utxo;
pub mod view;

pub use index::{get_skip_height, BlockNode, ChainIndex, ChainIndexError, NodeId};
pub use utxo::{CoinsView, MemoryCoins, UtxoEntry, UtxoSet};
pub use view::ChainView;
