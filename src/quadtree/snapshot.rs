//! Host-side copy of the node arena for inspection

use std::collections::HashMap;

use super::node::{NodeIndex, QuadTreeNode};
use crate::particle::Particle;

/// Result of checking a tree against the particle array
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TreeCheck {
    /// Particle indices stored across all leaves.
    pub stored: usize,
    /// Indices stored in more than one leaf, or twice in one.
    pub duplicates: Vec<u32>,
    /// Indices stored in a leaf whose bounds do not contain the particle.
    pub misplaced: Vec<u32>,
    /// Indices that are stored but refer to an inactive or missing particle.
    pub stale: Vec<u32>,
    /// Active particles that no leaf holds.
    pub missing: Vec<u32>,
}

impl TreeCheck {
    /// No duplicates, no misplaced or stale entries
    pub fn is_consistent(&self) -> bool {
        self.duplicates.is_empty() && self.misplaced.is_empty() && self.stale.is_empty()
    }

    /// Consistent and every active particle is present
    pub fn is_complete(&self) -> bool {
        self.is_consistent() && self.missing.is_empty()
    }
}

/// Node arena read back after a populate pass
#[derive(Clone, Debug)]
pub struct QuadTreeSnapshot {
    pub nodes: Vec<QuadTreeNode>,
    pub nodes_in_use: u32,
}

impl QuadTreeSnapshot {
    pub fn new(nodes: Vec<QuadTreeNode>, nodes_in_use: u32) -> Self {
        Self {
            nodes,
            nodes_in_use,
        }
    }

    pub fn node(&self, index: NodeIndex) -> Option<&QuadTreeNode> {
        self.nodes.get(index.as_usize())
    }

    pub fn leaves(&self) -> impl Iterator<Item = (NodeIndex, &QuadTreeNode)> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, node)| node.is_leaf())
            .map(|(i, node)| (NodeIndex(i as u32), node))
    }

    pub fn subdivided_count(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| node.is_in_use() && node.is_subdivided())
            .count()
    }

    pub fn in_use_count(&self) -> usize {
        self.nodes.iter().filter(|node| node.is_in_use()).count()
    }

    /// Sum of leaf particle counts
    pub fn stored_particles(&self) -> u32 {
        self.leaves().map(|(_, node)| node.particles().len() as u32).sum()
    }

    /// Leaves holding `particle`
    pub fn find(&self, particle: u32) -> Vec<NodeIndex> {
        self.leaves()
            .filter(|(_, node)| node.particles().contains(&particle))
            .map(|(index, _)| index)
            .collect()
    }

    /// Cross-check every stored index against the particle array
    pub fn check(&self, particles: &[Particle]) -> TreeCheck {
        let mut report = TreeCheck::default();
        let mut seen: HashMap<u32, NodeIndex> = HashMap::new();

        for (index, node) in self.leaves() {
            let bounds = node.node_bounds();
            for &slot in node.particles() {
                report.stored += 1;
                if seen.insert(slot, index).is_some() {
                    report.duplicates.push(slot);
                }
                match particles.get(slot as usize) {
                    Some(p) if p.is_active() => {
                        if !bounds.contains(p.position_2d()) {
                            report.misplaced.push(slot);
                        }
                    }
                    _ => report.stale.push(slot),
                }
            }
        }

        report.missing = particles
            .iter()
            .enumerate()
            .filter(|(i, p)| p.is_active() && !seen.contains_key(&(*i as u32)))
            .map(|(i, _)| i as u32)
            .collect();
        report
    }
}
