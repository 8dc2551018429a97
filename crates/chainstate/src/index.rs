//! In-memory block index: an arena of block nodes linked by `prev` and a
//! skip reference, plus the active chain as a height-indexed vector.

use std::collections::HashMap;
use std::fmt;

use bczd_consensus::{hash256_to_hex, Hash256};

pub type NodeId = u32;

pub const STATUS_VALID_HEADER: u32 = 1 << 0;
pub const STATUS_HAVE_DATA: u32 = 1 << 1;
pub const STATUS_FAILED: u32 = 1 << 2;

/// Number of timestamps in the median-time-past window.
pub const MEDIAN_TIME_SPAN: usize = 11;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainIndexError {
    UnknownParent(Hash256),
    Duplicate(Hash256),
    GenesisExists,
}

impl fmt::Display for ChainIndexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainIndexError::UnknownParent(hash) => {
                write!(f, "unknown parent block {}", hash256_to_hex(hash))
            }
            ChainIndexError::Duplicate(hash) => {
                write!(f, "block {} already indexed", hash256_to_hex(hash))
            }
            ChainIndexError::GenesisExists => write!(f, "genesis block already indexed"),
        }
    }
}

impl std::error::Error for ChainIndexError {}

#[derive(Clone, Debug)]
pub struct BlockNode {
    pub hash: Hash256,
    pub prev: Option<NodeId>,
    pub skip: Option<NodeId>,
    pub height: i32,
    pub time: i64,
    /// Maximum `time` over this node and all of its ancestors.
    pub time_max: i64,
    pub status: u32,
}

fn invert_lowest_one(value: i32) -> i32 {
    value & value.saturating_sub(1)
}

/// Height the skip reference of a node at `height` points to.
pub fn get_skip_height(height: i32) -> i32 {
    if height < 2 {
        0
    } else if (height & 1) != 0 {
        invert_lowest_one(invert_lowest_one(height - 1)) + 1
    } else {
        invert_lowest_one(height)
    }
}

#[derive(Default)]
pub struct ChainIndex {
    nodes: Vec<BlockNode>,
    by_hash: HashMap<Hash256, NodeId>,
    active: Vec<NodeId>,
}

impl ChainIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&BlockNode> {
        self.nodes.get(id as usize)
    }

    pub fn lookup(&self, hash: &Hash256) -> Option<NodeId> {
        self.by_hash.get(hash).copied()
    }

    fn entry(&self, id: NodeId) -> &BlockNode {
        &self.nodes[id as usize]
    }

    pub fn insert_genesis(&mut self, hash: Hash256, time: i64) -> Result<NodeId, ChainIndexError> {
        if !self.nodes.is_empty() {
            return Err(ChainIndexError::GenesisExists);
        }
        Ok(self.push(BlockNode {
            hash,
            prev: None,
            skip: None,
            height: 0,
            time,
            time_max: time,
            status: STATUS_VALID_HEADER,
        }))
    }

    /// Adds a block whose parent is already indexed and builds its skip
    /// reference.
    pub fn insert(
        &mut self,
        hash: Hash256,
        prev_hash: &Hash256,
        time: i64,
    ) -> Result<NodeId, ChainIndexError> {
        if self.by_hash.contains_key(&hash) {
            return Err(ChainIndexError::Duplicate(hash));
        }
        let prev = self
            .lookup(prev_hash)
            .ok_or(ChainIndexError::UnknownParent(*prev_hash))?;
        let parent = self.entry(prev);
        let height = parent.height + 1;
        let time_max = parent.time_max.max(time);
        let skip = self.get_ancestor(prev, get_skip_height(height));
        Ok(self.push(BlockNode {
            hash,
            prev: Some(prev),
            skip,
            height,
            time,
            time_max,
            status: STATUS_VALID_HEADER,
        }))
    }

    fn push(&mut self, node: BlockNode) -> NodeId {
        let id = self.nodes.len() as NodeId;
        self.by_hash.insert(node.hash, id);
        self.nodes.push(node);
        id
    }

    /// Ancestor of `id` at `height`, following skip references where they do
    /// not overshoot.
    pub fn get_ancestor(&self, id: NodeId, height: i32) -> Option<NodeId> {
        self.ancestor_with_steps(id, height).map(|(ancestor, _)| ancestor)
    }

    /// Same lookup as [`get_ancestor`](Self::get_ancestor), also returning
    /// the number of references followed.
    pub fn ancestor_with_steps(&self, id: NodeId, height: i32) -> Option<(NodeId, usize)> {
        let start = self.node(id)?;
        if height > start.height || height < 0 {
            return None;
        }

        let mut walk = id;
        let mut height_walk = start.height;
        let mut steps = 0;
        while height_walk > height {
            let node = self.entry(walk);
            let height_skip = get_skip_height(height_walk);
            let height_skip_prev = get_skip_height(height_walk - 1);
            let take_skip = height_skip == height
                || (height_skip > height
                    && !(height_skip_prev < height_skip - 2 && height_skip_prev >= height));
            match node.skip {
                Some(skip) if take_skip => {
                    walk = skip;
                    height_walk = height_skip;
                }
                _ => {
                    walk = node
                        .prev
                        .expect("block index node above genesis without a parent");
                    height_walk -= 1;
                }
            }
            steps += 1;
        }
        Some((walk, steps))
    }

    pub fn last_common_ancestor(&self, a: NodeId, b: NodeId) -> NodeId {
        let height_a = self.entry(a).height;
        let height_b = self.entry(b).height;
        let mut a = if height_a > height_b {
            self.get_ancestor(a, height_b).unwrap_or(a)
        } else {
            a
        };
        let mut b = if height_b > height_a {
            self.get_ancestor(b, height_a).unwrap_or(b)
        } else {
            b
        };
        while a != b {
            match (self.entry(a).prev, self.entry(b).prev) {
                (Some(prev_a), Some(prev_b)) => {
                    a = prev_a;
                    b = prev_b;
                }
                _ => panic!("block index nodes without a common ancestor"),
            }
        }
        a
    }

    pub fn median_time_past(&self, id: NodeId) -> i64 {
        let mut times = Vec::with_capacity(MEDIAN_TIME_SPAN);
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if times.len() == MEDIAN_TIME_SPAN {
                break;
            }
            let node = self.entry(current);
            times.push(node.time);
            cursor = node.prev;
        }
        times.sort_unstable();
        times[times.len() / 2]
    }

    pub fn set_status(&mut self, id: NodeId, bits: u32) {
        if let Some(node) = self.nodes.get_mut(id as usize) {
            node.status |= bits;
        }
    }

    pub fn has_status(&self, id: NodeId, bits: u32) -> bool {
        self.node(id)
            .map(|node| node.status & bits == bits)
            .unwrap_or(false)
    }

    /// Makes `tip` the end of the active chain, rewriting only the part that
    /// differs from the current one.
    pub fn set_tip(&mut self, tip: Option<NodeId>) {
        let Some(tip) = tip else {
            self.active.clear();
            return;
        };
        let height = self.entry(tip).height as usize;
        self.active.resize(height + 1, tip);
        let mut cursor = Some(tip);
        while let Some(id) = cursor {
            let (slot, prev) = {
                let node = self.entry(id);
                (node.height as usize, node.prev)
            };
            if self.active[slot] == id && slot != height {
                break;
            }
            self.active[slot] = id;
            cursor = prev;
        }
    }

    pub fn tip(&self) -> Option<NodeId> {
        self.active.last().copied()
    }

    pub fn genesis(&self) -> Option<NodeId> {
        self.active.first().copied()
    }

    /// Active chain height; -1 when empty.
    pub fn height(&self) -> i32 {
        self.active.len() as i32 - 1
    }

    pub fn at_height(&self, height: i32) -> Option<NodeId> {
        if height < 0 {
            return None;
        }
        self.active.get(height as usize).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        let Some(node) = self.node(id) else {
            return false;
        };
        self.at_height(node.height) == Some(id)
    }

    pub fn next(&self, id: NodeId) -> Option<NodeId> {
        if !self.contains(id) {
            return None;
        }
        self.at_height(self.entry(id).height + 1)
    }

    /// Last active-chain block that is an ancestor of (or equal to) `id`.
    pub fn find_fork(&self, id: NodeId) -> Option<NodeId> {
        let height = self.height();
        let mut cursor = if self.entry(id).height > height {
            self.get_ancestor(id, height)
        } else {
            Some(id)
        };
        while let Some(current) = cursor {
            if self.contains(current) {
                return Some(current);
            }
            cursor = self.entry(current).prev;
        }
        None
    }

    /// First active-chain block whose `time_max` is at least `time`.
    pub fn find_earliest_at_least(&self, time: i64) -> Option<NodeId> {
        let idx = self
            .active
            .partition_point(|id| self.entry(*id).time_max < time);
        self.active.get(idx).copied()
    }

    /// Block locator for `from` (the tip when `None`): dense for the first
    /// ten entries, then exponentially sparser, always ending at genesis.
    pub fn locator(&self, from: Option<NodeId>) -> Vec<Hash256> {
        let mut have = Vec::with_capacity(32);
        let mut step = 1;
        let mut cursor = from.or_else(|| self.tip());
        while let Some(id) = cursor {
            let node = self.entry(id);
            have.push(node.hash);
            if node.height == 0 {
                break;
            }
            let height = (node.height - step).max(0);
            cursor = if self.contains(id) {
                self.at_height(height)
            } else {
                self.get_ancestor(id, height)
            };
            if have.len() > 10 {
                step *= 2;
            }
        }
        have
    }
}
