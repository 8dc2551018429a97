use bczd_consensus::constants::CACHED_BLOCK_HASHES;
use bczd_consensus::Hash256;

/// Ring of the most recent block hashes, indexed by height.
#[derive(Clone, Debug)]
pub struct BlockHashCache {
    slots: Vec<Option<(i32, Hash256)>>,
}

impl BlockHashCache {
    pub fn new() -> Self {
        Self::with_capacity(CACHED_BLOCK_HASHES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity.max(1)],
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, height: i32) -> usize {
        height.rem_euclid(self.slots.len() as i32) as usize
    }

    pub fn set(&mut self, height: i32, hash: Hash256) {
        if height < 0 {
            return;
        }
        let slot = self.slot(height);
        self.slots[slot] = Some((height, hash));
    }

    /// Forgets `height` (block disconnected).
    pub fn unset(&mut self, height: i32) {
        if height < 0 {
            return;
        }
        let slot = self.slot(height);
        if matches!(self.slots[slot], Some((cached, _)) if cached == height) {
            self.slots[slot] = None;
        }
    }

    /// A slot reused by a later height does not answer for the older one.
    pub fn get(&self, height: i32) -> Option<Hash256> {
        if height < 0 {
            return None;
        }
        match self.slots[self.slot(height)] {
            Some((cached, hash)) if cached == height => Some(hash),
            _ => None,
        }
    }

    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = None);
    }
}

impl Default for BlockHashCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_height_tagged() {
        let mut cache = BlockHashCache::with_capacity(4);
        cache.set(1, [1; 32]);
        cache.set(5, [5; 32]);
        assert_eq!(cache.get(5), Some([5; 32]));
        assert_eq!(cache.get(1), None);

        cache.unset(1);
        assert_eq!(cache.get(5), Some([5; 32]));
        cache.unset(5);
        assert_eq!(cache.get(5), None);
        assert_eq!(cache.get(-1), None);
    }
}
