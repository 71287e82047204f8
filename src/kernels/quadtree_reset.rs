//! Quadtree reset stage
//!
//! Lays the initial grid into the front of the node arena, marks every other
//! node unused and clears every per-node mutex. The host writes the counter
//! header separately.

use bytemuck::{Pod, Zeroable};
use std::sync::atomic::Ordering;

use crate::config::SimulationConfig;
use crate::device::mutex::UNLOCKED;
use crate::device::{CounterBlock, DeviceArray};
use crate::quadtree::counters::tree;
use crate::quadtree::{InitialGrid, NodeBounds, NodeIndex, QuadTreeNode};

/// Uniforms shared by the reset, populate and geometry stages
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct TreeUniforms {
    pub max_particles: u32,
    pub max_nodes: u32,
    pub max_particles_per_node: u32,
    pub columns: u32,
    pub rows: u32,
    pub initial_nodes: u32,
    pub max_faces: u32,
    pub max_lock_spins: u32,
    pub left: f32,
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
}

impl TreeUniforms {
    pub fn from_config(config: &SimulationConfig, bounds: NodeBounds) -> Self {
        let mut uniforms = Self {
            max_particles: config.max_particles,
            max_nodes: config.max_nodes,
            max_particles_per_node: config.max_particles_per_node,
            columns: config.initial_columns,
            rows: config.initial_rows,
            initial_nodes: config.initial_node_count(),
            max_faces: config.max_geometry_faces(),
            max_lock_spins: config.max_lock_spins,
            ..Default::default()
        };
        uniforms.set_bounds(bounds);
        uniforms
    }

    pub fn bounds(&self) -> NodeBounds {
        NodeBounds::new(self.left, self.top, self.right, self.bottom)
    }

    pub fn grid(&self) -> InitialGrid {
        InitialGrid::new(self.columns, self.rows, self.bounds())
    }

    pub fn set_bounds(&mut self, bounds: NodeBounds) {
        self.left = bounds.left;
        self.top = bounds.top;
        self.right = bounds.right;
        self.bottom = bounds.bottom;
    }
}

/// One invocation of the quadtree reset stage
pub fn reset_node(
    id: u32,
    nodes: &DeviceArray<QuadTreeNode>,
    counters: &CounterBlock,
    uniforms: &TreeUniforms,
) {
    if id >= uniforms.max_nodes {
        return;
    }
    nodes.store(id as usize, uniforms.grid().node(NodeIndex(id)));
    counters
        .at(tree::node_mutex(id))
        .store(UNLOCKED, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: u64 = 1 << 20;

    #[test]
    fn test_reset_lays_grid_and_clears_rest() {
        let uniforms = TreeUniforms {
            max_nodes: 8,
            columns: 2,
            rows: 2,
            initial_nodes: 4,
            left: -1.0,
            top: 1.0,
            right: 1.0,
            bottom: -1.0,
            ..Default::default()
        };
        let nodes = DeviceArray::<QuadTreeNode>::zeroed("nodes", 8, LIMIT).unwrap();
        let counters = CounterBlock::new("tree", tree::block_size(8), LIMIT).unwrap();
        nodes.store(6, QuadTreeNode { in_use: 1, is_subdivided: 1, ..QuadTreeNode::unused() });
        counters.at(tree::node_mutex(5)).store(1, Ordering::Relaxed);

        for id in 0..8 {
            reset_node(id, &nodes, &counters, &uniforms);
        }

        let snapshot = nodes.snapshot();
        assert!(snapshot[..4].iter().all(|n| n.is_leaf() && n.count == 0));
        assert!(snapshot[4..].iter().all(|n| !n.is_in_use()));
        assert_eq!(snapshot[3].node_bounds(), NodeBounds::new(0.0, 0.0, 1.0, -1.0));
        assert_eq!(counters.load(tree::node_mutex(5)), UNLOCKED);
    }
}
