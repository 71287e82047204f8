//! Quadtree data model
//!
//! The tree lives in a fixed-capacity arena of [`QuadTreeNode`] records that
//! is rebuilt from the initial grid every frame.

pub mod bounds;
pub mod counters;
pub mod grid;
pub mod node;
pub mod snapshot;

pub use bounds::{NodeBounds, Quadrant};
pub use grid::InitialGrid;
pub use node::{
    sibling_neighbours, Direction, NodeIndex, QuadTreeNode, EMPTY_SLOT, MOVED_SLOT,
    NODE_SLOT_CAPACITY, NO_NODE, SEALED_COUNT,
};
pub use snapshot::{QuadTreeSnapshot, TreeCheck};
