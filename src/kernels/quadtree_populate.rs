//! Quadtree populate stage
//!
//! One invocation per particle slot. An active particle walks from its grid
//! cell down through subdivided nodes to a leaf and claims a slot there with
//! a compare-and-swap on the leaf's count. No lock is taken for that.
//!
//! A walker that finds its leaf full takes the leaf's crude mutex and splits
//! it. Four child nodes are reserved from the nodes-in-use counter, the count
//! is sealed so no further slot can be claimed, and every slot word is
//! exchanged for [`MOVED_SLOT`] while its index moves into a child. A walker
//! that claimed a slot just before the seal either wrote it first, and its
//! index moves with the rest, or finds `MOVED_SLOT` on its own exchange and
//! retries at the node. The `is_subdivided` word is published last with
//! release ordering.
//!
//! Every failure drops the particle for this frame: it is outside the grid,
//! its full leaf stayed locked for `max_lock_spins` attempts, the node arena
//! is exhausted, or the walk ran out of steps.

use std::sync::atomic::Ordering;

use super::quadtree_reset::TreeUniforms;
use crate::device::{CounterBlock, CrudeMutex, DeviceArray};
use crate::particle::Particle;
use crate::quadtree::counters::tree;
use crate::quadtree::node::word;
use crate::quadtree::{
    sibling_neighbours, NodeBounds, NodeIndex, Quadrant, QuadTreeNode, EMPTY_SLOT, MOVED_SLOT,
    NODE_SLOT_CAPACITY, SEALED_COUNT,
};

/// Descent and retry steps one walk may take
pub const MAX_WALK_STEPS: u32 = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DropReason {
    OutsideTree,
    LockContention,
    NodeCapacity,
    StepLimit,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InsertOutcome {
    Inactive,
    Inserted(NodeIndex),
    Dropped(DropReason),
}

fn load_bounds(nodes: &DeviceArray<QuadTreeNode>, node: usize) -> NodeBounds {
    let w = |i: usize| f32::from_bits(nodes.word(node, word::BOUNDS + i).load(Ordering::Relaxed));
    NodeBounds::new(w(0), w(1), w(2), w(3))
}

fn load_child(nodes: &DeviceArray<QuadTreeNode>, node: usize, quadrant: Quadrant) -> usize {
    nodes
        .word(node, word::CHILDREN + quadrant.index())
        .load(Ordering::Relaxed) as usize
}

/// Claim the next free slot of a leaf, or `None` once it is full or sealed
fn claim_slot(
    nodes: &DeviceArray<QuadTreeNode>,
    node: usize,
    max_per_node: u32,
) -> Option<usize> {
    nodes
        .word(node, word::COUNT)
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
            (count < max_per_node).then_some(count + 1)
        })
        .ok()
        .map(|slot| slot as usize)
}

/// Reserve four consecutive nodes. The counter only moves when the whole
/// block fits, so it never passes `max_nodes`.
fn reserve_block(counters: &CounterBlock, max_nodes: u32) -> Option<u32> {
    counters
        .at(tree::NODES_IN_USE)
        .fetch_update(Ordering::AcqRel, Ordering::Relaxed, |first| {
            first.checked_add(4).filter(|end| *end <= max_nodes)
        })
        .ok()
}

/// One invocation of the populate stage
pub fn populate_particle(
    id: u32,
    particles: &DeviceArray<Particle>,
    nodes: &DeviceArray<QuadTreeNode>,
    counters: &CounterBlock,
    uniforms: &TreeUniforms,
) -> InsertOutcome {
    if id >= uniforms.max_particles {
        return InsertOutcome::Inactive;
    }
    let particle = particles.load(id as usize);
    if !particle.is_active() {
        return InsertOutcome::Inactive;
    }
    let position = particle.position_2d();

    let Some(start) = uniforms.grid().locate(position) else {
        return InsertOutcome::Dropped(DropReason::OutsideTree);
    };
    let mut node = start.as_usize();
    let max_per_node = uniforms
        .max_particles_per_node
        .min(NODE_SLOT_CAPACITY as u32);

    for _ in 0..MAX_WALK_STEPS {
        if node >= uniforms.max_nodes as usize {
            return InsertOutcome::Dropped(DropReason::NodeCapacity);
        }
        let bounds = load_bounds(nodes, node);
        if !bounds.contains(position) {
            return InsertOutcome::Dropped(DropReason::OutsideTree);
        }

        if nodes.word(node, word::IS_SUBDIVIDED).load(Ordering::Acquire) != 0 {
            node = load_child(nodes, node, bounds.quadrant_of(position));
            continue;
        }

        if let Some(slot) = claim_slot(nodes, node, max_per_node) {
            let previous = nodes
                .word(node, word::PARTICLE_INDICES + slot)
                .swap(id, Ordering::AcqRel);
            if previous == EMPTY_SLOT {
                counters
                    .at(tree::PARTICLES_IN_TREE)
                    .fetch_add(1, Ordering::Relaxed);
                return InsertOutcome::Inserted(NodeIndex(node as u32));
            }
            // sealed by a split before the write landed
            continue;
        }

        let mutex = CrudeMutex::new(counters.at(tree::node_mutex(node as u32)));
        let Some(_guard) = mutex.lock_bounded(uniforms.max_lock_spins) else {
            return InsertOutcome::Dropped(DropReason::LockContention);
        };

        // split by another walker while we waited
        if nodes.word(node, word::IS_SUBDIVIDED).load(Ordering::Acquire) != 0 {
            continue;
        }

        if subdivide(node, bounds, particles, nodes, counters, uniforms).is_none() {
            return InsertOutcome::Dropped(DropReason::NodeCapacity);
        }
    }
    InsertOutcome::Dropped(DropReason::StepLimit)
}

/// Split a full leaf into four children. Must be called with the leaf's
/// mutex held. Returns `None` when the node arena has no room left, in
/// which case the leaf is left untouched.
pub fn subdivide(
    node: usize,
    bounds: NodeBounds,
    particles: &DeviceArray<Particle>,
    nodes: &DeviceArray<QuadTreeNode>,
    counters: &CounterBlock,
    uniforms: &TreeUniforms,
) -> Option<[u32; 4]> {
    let Some(first) = reserve_block(counters, uniforms.max_nodes) else {
        log::trace!("node arena exhausted while splitting node {}", node);
        return None;
    };
    let children = [first, first + 1, first + 2, first + 3];

    for quadrant in Quadrant::ALL {
        let child = QuadTreeNode::leaf(
            bounds.child(quadrant),
            sibling_neighbours(children, quadrant),
        );
        nodes.store(children[quadrant.index()] as usize, child);
    }

    let sealed = nodes
        .word(node, word::COUNT)
        .swap(SEALED_COUNT, Ordering::AcqRel)
        .min(NODE_SLOT_CAPACITY as u32) as usize;
    let mut child_counts = [0usize; 4];
    for slot in 0..sealed {
        let index = nodes
            .word(node, word::PARTICLE_INDICES + slot)
            .swap(MOVED_SLOT, Ordering::AcqRel);
        if index == EMPTY_SLOT || index == MOVED_SLOT {
            continue;
        }
        let position = particles.load(index as usize).position_2d();
        let quadrant = bounds.quadrant_of(position).index();
        let child = children[quadrant] as usize;
        nodes
            .word(child, word::PARTICLE_INDICES + child_counts[quadrant])
            .store(index, Ordering::Relaxed);
        child_counts[quadrant] += 1;
    }
    for (quadrant, &child) in children.iter().enumerate() {
        nodes
            .word(child as usize, word::COUNT)
            .store(child_counts[quadrant] as u32, Ordering::Relaxed);
        nodes
            .word(node, word::CHILDREN + quadrant)
            .store(child, Ordering::Relaxed);
    }
    nodes
        .word(node, word::IS_SUBDIVIDED)
        .store(1, Ordering::Release);
    Some(children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::quadtree_reset::reset_node;
    use crate::quadtree::QuadTreeSnapshot;

    const LIMIT: u64 = 1 << 24;

    struct Fixture {
        particles: DeviceArray<Particle>,
        nodes: DeviceArray<QuadTreeNode>,
        counters: CounterBlock,
        uniforms: TreeUniforms,
    }

    fn fixture(positions: &[[f32; 2]], max_per_node: u32, max_nodes: u32) -> Fixture {
        let particles =
            DeviceArray::<Particle>::zeroed("particles", positions.len(), LIMIT).unwrap();
        for (i, p) in positions.iter().enumerate() {
            particles.store(i, Particle::active(*p, [0.0, 0.0]));
        }
        let uniforms = TreeUniforms {
            max_particles: positions.len() as u32,
            max_nodes,
            max_particles_per_node: max_per_node,
            columns: 1,
            rows: 1,
            initial_nodes: 1,
            max_faces: max_nodes * 4,
            max_lock_spins: 8,
            left: 0.0,
            top: 1.0,
            right: 1.0,
            bottom: 0.0,
        };
        let nodes = DeviceArray::zeroed("nodes", max_nodes as usize, LIMIT).unwrap();
        let counters = CounterBlock::new("tree", tree::block_size(max_nodes), LIMIT).unwrap();
        for id in 0..max_nodes {
            reset_node(id, &nodes, &counters, &uniforms);
        }
        counters.reset(&tree::header(1));
        Fixture {
            particles,
            nodes,
            counters,
            uniforms,
        }
    }

    impl Fixture {
        fn insert(&self, id: u32) -> InsertOutcome {
            populate_particle(id, &self.particles, &self.nodes, &self.counters, &self.uniforms)
        }

        fn snapshot(&self) -> QuadTreeSnapshot {
            QuadTreeSnapshot::new(
                self.nodes.snapshot(),
                self.counters.load(tree::NODES_IN_USE),
            )
        }
    }

    #[test]
    fn test_fills_root_until_capacity() {
        let f = fixture(&[[0.1, 0.1], [0.2, 0.2]], 2, 16);
        assert_eq!(f.insert(0), InsertOutcome::Inserted(NodeIndex::ROOT));
        assert_eq!(f.insert(1), InsertOutcome::Inserted(NodeIndex::ROOT));
        assert_eq!(f.counters.load(tree::PARTICLES_IN_TREE), 2);
        assert_eq!(f.counters.load(tree::NODES_IN_USE), 1);
    }

    #[test]
    fn test_overflow_splits_and_redistributes() {
        let f = fixture(&[[0.25, 0.75], [0.75, 0.25], [0.75, 0.75]], 2, 16);
        for id in 0..3 {
            assert!(matches!(f.insert(id), InsertOutcome::Inserted(_)));
        }

        let snapshot = f.snapshot();
        let root = snapshot.node(NodeIndex::ROOT).unwrap();
        assert!(root.is_subdivided());
        assert_eq!(root.count, SEALED_COUNT);
        assert!(root.particles().is_empty());
        assert_eq!(snapshot.nodes_in_use, 5);
        assert_eq!(snapshot.subdivided_count(), 1);
        assert_eq!(snapshot.stored_particles(), 3);
        assert_eq!(
            root.child(Quadrant::TopLeft).map(|c| snapshot.find(0).contains(&c)),
            Some(true)
        );
        assert!(snapshot.check(&f.particles.snapshot()).is_complete());
    }

    #[test]
    fn test_split_preserves_parent_count() {
        let f = fixture(&[[0.1, 0.9], [0.9, 0.9], [0.9, 0.1], [0.1, 0.1]], 4, 16);
        for id in 0..4 {
            f.insert(id);
        }
        let bounds = NodeBounds::new(0.0, 1.0, 1.0, 0.0);
        let children = subdivide(0, bounds, &f.particles, &f.nodes, &f.counters, &f.uniforms)
            .unwrap();
        let sum: u32 = children
            .iter()
            .map(|c| f.nodes.load(*c as usize).count)
            .sum();
        assert_eq!(sum, 4);
    }

    #[test]
    fn test_exhausted_arena_drops_particle() {
        let f = fixture(&[[0.1, 0.1], [0.2, 0.2], [0.3, 0.3]], 2, 4);
        f.insert(0);
        f.insert(1);
        assert_eq!(f.insert(2), InsertOutcome::Dropped(DropReason::NodeCapacity));
        assert_eq!(f.counters.load(tree::PARTICLES_IN_TREE), 2);
        assert_eq!(f.counters.load(tree::NODES_IN_USE), 1);
        assert!(!f.nodes.load(0).is_subdivided());
    }

    #[test]
    fn test_partial_block_is_never_reserved() {
        // room for one split, then three spare nodes
        let f = fixture(&[[0.1, 0.1], [0.2, 0.2], [0.15, 0.15]], 2, 8);
        f.insert(0);
        f.insert(1);
        assert_eq!(f.insert(2), InsertOutcome::Dropped(DropReason::NodeCapacity));
        assert_eq!(f.counters.load(tree::NODES_IN_USE), 5);
        assert_eq!(f.snapshot().in_use_count(), 5);
    }

    #[test]
    fn test_held_lock_does_not_block_free_slot() {
        let f = fixture(&[[0.5, 0.5]], NODE_SLOT_CAPACITY as u32, 16);
        let mutex = CrudeMutex::new(f.counters.at(tree::node_mutex(0)));
        let _held = mutex.try_lock().unwrap();
        assert_eq!(f.insert(0), InsertOutcome::Inserted(NodeIndex::ROOT));
        assert_eq!(f.counters.load(tree::PARTICLES_IN_TREE), 1);
    }

    #[test]
    fn test_held_lock_on_full_leaf_drops_particle() {
        let f = fixture(&[[0.2, 0.2], [0.7, 0.7]], 1, 16);
        assert_eq!(f.insert(0), InsertOutcome::Inserted(NodeIndex::ROOT));
        let mutex = CrudeMutex::new(f.counters.at(tree::node_mutex(0)));
        let _held = mutex.try_lock().unwrap();
        assert_eq!(f.insert(1), InsertOutcome::Dropped(DropReason::LockContention));
        assert!(!f.nodes.load(0).is_subdivided());
    }

    #[test]
    fn test_slot_sealed_by_split_retries_in_child() {
        let f = fixture(&[[0.25, 0.75], [0.75, 0.25]], 2, 16);
        f.insert(0);
        // particle 1 claims the last slot but a split lands before its write
        let slot = claim_slot(&f.nodes, 0, 2).unwrap();
        assert_eq!(slot, 1);
        let bounds = NodeBounds::new(0.0, 1.0, 1.0, 0.0);
        subdivide(0, bounds, &f.particles, &f.nodes, &f.counters, &f.uniforms).unwrap();
        let late = f.nodes.word(0, word::PARTICLE_INDICES + slot).swap(1, Ordering::AcqRel);
        assert_eq!(late, MOVED_SLOT);
        assert_eq!(claim_slot(&f.nodes, 0, 2), None);

        assert!(matches!(f.insert(1), InsertOutcome::Inserted(n) if n != NodeIndex::ROOT));
        let check = f.snapshot().check(&f.particles.snapshot());
        assert!(check.is_complete(), "{:?}", check);
        assert_eq!(check.stored, 2);
        assert_eq!(f.counters.load(tree::PARTICLES_IN_TREE), 2);
    }

    #[test]
    fn test_coincident_particles_hit_step_limit() {
        let f = fixture(&[[0.3, 0.3]; 3], 2, 4096);
        f.insert(0);
        f.insert(1);
        assert_eq!(f.insert(2), InsertOutcome::Dropped(DropReason::StepLimit));
    }

    #[test]
    fn test_outside_grid_and_inactive() {
        let f = fixture(&[[2.0, 0.5]], 2, 16);
        assert_eq!(f.insert(0), InsertOutcome::Dropped(DropReason::OutsideTree));
        assert_eq!(f.insert(5), InsertOutcome::Inactive);
    }
}
