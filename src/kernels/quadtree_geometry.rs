//! Quadtree geometry stage
//!
//! Each in-use leaf appends its four boundary edges to the geometry face
//! buffer so a line renderer can draw the tree. Space is claimed four faces
//! at a time through the faces-in-use counter; claims past capacity are
//! dropped.

use std::sync::atomic::Ordering;

use super::quadtree_reset::TreeUniforms;
use crate::device::{CounterBlock, DeviceArray};
use crate::polygon::PolygonFace;
use crate::quadtree::counters::geometry;
use crate::quadtree::{NodeBounds, QuadTreeNode};

/// Counter-clockwise edges of a node's bounds
pub fn node_faces(bounds: NodeBounds) -> [PolygonFace; 4] {
    let tl = [bounds.left, bounds.top];
    let tr = [bounds.right, bounds.top];
    let br = [bounds.right, bounds.bottom];
    let bl = [bounds.left, bounds.bottom];
    [
        PolygonFace::from_edge(tl, bl),
        PolygonFace::from_edge(bl, br),
        PolygonFace::from_edge(br, tr),
        PolygonFace::from_edge(tr, tl),
    ]
}

/// One invocation of the geometry stage
pub fn emit_node_faces(
    id: u32,
    nodes: &DeviceArray<QuadTreeNode>,
    faces: &DeviceArray<PolygonFace>,
    counters: &CounterBlock,
    uniforms: &TreeUniforms,
) {
    if id >= uniforms.max_nodes {
        return;
    }
    let node = nodes.load(id as usize);
    if !node.is_leaf() {
        return;
    }

    let base = counters
        .at(geometry::FACES_IN_USE)
        .fetch_add(4, Ordering::Relaxed);
    let capacity = uniforms.max_faces.min(faces.len() as u32);
    if base.saturating_add(4) > capacity {
        return;
    }
    for (i, face) in node_faces(node.node_bounds()).into_iter().enumerate() {
        faces.store(base as usize + i, face);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quadtree::NO_NODE;

    #[test]
    fn test_edges_have_outward_normals() {
        let faces = node_faces(NodeBounds::new(0.0, 1.0, 1.0, 0.0));
        let normals: Vec<[f32; 2]> = faces
            .iter()
            .map(|f| [f.start.normal[0], f.start.normal[1]])
            .collect();
        assert_eq!(normals[0], [-1.0, 0.0]);
        assert_eq!(normals[1], [0.0, -1.0]);
        assert_eq!(normals[2], [1.0, 0.0]);
        assert_eq!(normals[3], [0.0, 1.0]);
    }

    #[test]
    fn test_only_leaves_emit_and_overflow_is_dropped() {
        const LIMIT: u64 = 1 << 20;
        let nodes = DeviceArray::<QuadTreeNode>::zeroed("nodes", 4, LIMIT).unwrap();
        let bounds = NodeBounds::new(0.0, 1.0, 1.0, 0.0);
        nodes.store(0, QuadTreeNode::leaf(bounds, [NO_NODE; 8]));
        nodes.store(1, QuadTreeNode { is_subdivided: 1, ..QuadTreeNode::leaf(bounds, [NO_NODE; 8]) });
        nodes.store(2, QuadTreeNode::leaf(bounds, [NO_NODE; 8]));
        let faces = DeviceArray::<PolygonFace>::zeroed("faces", 4, LIMIT).unwrap();
        let counters = CounterBlock::new("geometry", geometry::BLOCK_SIZE, LIMIT).unwrap();
        let uniforms = TreeUniforms {
            max_nodes: 4,
            max_faces: 4,
            ..Default::default()
        };

        for id in 0..4 {
            emit_node_faces(id, &nodes, &faces, &counters, &uniforms);
        }
        assert_eq!(counters.load(geometry::FACES_IN_USE), 8);
        assert_eq!(faces.load(3).end.position[0], 0.0);
    }
}
