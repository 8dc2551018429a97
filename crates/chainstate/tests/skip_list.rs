use bczd_chainstate::index::{ChainIndex, NodeId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn tagged_hash(id: u32) -> [u8; 32] {
    let mut hash = [0x5au8; 32];
    hash[..4].copy_from_slice(&id.to_le_bytes());
    hash
}

fn naive_ancestor(index: &ChainIndex, mut id: NodeId, height: i32) -> NodeId {
    loop {
        let node = index.node(id).expect("node");
        if node.height == height {
            return id;
        }
        id = node.prev.expect("prev");
    }
}

/// Random tree: each block extends a uniformly chosen earlier block, biased
/// towards recent ones so branches get deep.
fn random_tree(rng: &mut StdRng, size: u32) -> (ChainIndex, Vec<NodeId>) {
    let mut index = ChainIndex::new();
    let mut ids = vec![index.insert_genesis(tagged_hash(0), 0).expect("genesis")];
    for tag in 1..size {
        let parent_pos = if rng.gen_bool(0.9) {
            ids.len() - 1
        } else {
            rng.gen_range(0..ids.len())
        };
        let parent_hash = index.node(ids[parent_pos]).expect("parent").hash;
        let id = index
            .insert(tagged_hash(tag), &parent_hash, i64::from(tag))
            .expect("insert");
        ids.push(id);
    }
    (index, ids)
}

#[test]
fn ancestor_lookup_agrees_with_parent_walk() {
    let mut rng = StdRng::seed_from_u64(7);
    let (index, ids) = random_tree(&mut rng, 4_000);
    for _ in 0..2_000 {
        let id = ids[rng.gen_range(0..ids.len())];
        let height = index.node(id).expect("node").height;
        let target = rng.gen_range(0..=height);
        assert_eq!(
            index.get_ancestor(id, target),
            Some(naive_ancestor(&index, id, target))
        );
    }
}

#[test]
fn common_ancestor_is_an_ancestor_of_both() {
    let mut rng = StdRng::seed_from_u64(11);
    let (index, ids) = random_tree(&mut rng, 2_000);
    for _ in 0..500 {
        let a = ids[rng.gen_range(0..ids.len())];
        let b = ids[rng.gen_range(0..ids.len())];
        let fork = index.last_common_ancestor(a, b);
        let fork_height = index.node(fork).expect("fork").height;
        assert_eq!(index.get_ancestor(a, fork_height), Some(fork));
        assert_eq!(index.get_ancestor(b, fork_height), Some(fork));
        // One step higher the two branches differ (unless one contains the other).
        let height_a = index.node(a).expect("a").height;
        let height_b = index.node(b).expect("b").height;
        if fork_height < height_a && fork_height < height_b {
            assert_ne!(
                index.get_ancestor(a, fork_height + 1),
                index.get_ancestor(b, fork_height + 1)
            );
        }
    }
}

#[test]
fn locator_off_the_active_chain_reaches_genesis() {
    let mut rng = StdRng::seed_from_u64(3);
    let (mut index, ids) = random_tree(&mut rng, 1_500);
    index.set_tip(Some(ids[ids.len() / 2]));
    for _ in 0..50 {
        let id = ids[rng.gen_range(0..ids.len())];
        let locator = index.locator(Some(id));
        assert_eq!(locator.first(), Some(&index.node(id).expect("node").hash));
        assert_eq!(locator.last(), Some(&tagged_hash(0)));
        let heights: Vec<i32> = locator
            .iter()
            .map(|hash| {
                let id = index.lookup(hash).expect("indexed");
                index.node(id).expect("node").height
            })
            .collect();
        assert!(heights.windows(2).all(|pair| pair[0] > pair[1]));
    }
}

#[test]
fn long_jumps_take_few_steps() {
    const CHAIN_LEN: u32 = 1 << 18;
    let mut index = ChainIndex::new();
    let mut ids = Vec::with_capacity(CHAIN_LEN as usize);
    ids.push(index.insert_genesis(tagged_hash(0), 0).expect("genesis"));
    for tag in 1..CHAIN_LEN {
        let parent_hash = tagged_hash(tag - 1);
        ids.push(
            index
                .insert(tagged_hash(tag), &parent_hash, i64::from(tag))
                .expect("insert"),
        );
    }
    let tip = *ids.last().expect("tip");
    let tip_height = (CHAIN_LEN - 1) as i32;

    for target in [0, 1, 2, 1_000, 65_536, 131_071, tip_height - 1] {
        let (found, steps) = index.ancestor_with_steps(tip, target).expect("ancestor");
        assert_eq!(found, ids[target as usize]);
        assert!(steps <= 110, "{steps} steps from the tip to {target}");
    }

    let mut rng = StdRng::seed_from_u64(18);
    for _ in 0..1_000 {
        let from = rng.gen_range(0..CHAIN_LEN) as usize;
        let target = rng.gen_range(0..=from) as i32;
        let (found, steps) = index
            .ancestor_with_steps(ids[from], target)
            .expect("ancestor");
        assert_eq!(found, ids[target as usize]);
        assert!(steps <= 110, "{steps} steps from {from} to {target}");
    }
}
