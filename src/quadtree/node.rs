//! Quadtree node record and its word layout

use bytemuck::{Pod, Zeroable};

use super::bounds::{NodeBounds, Quadrant};

/// Maximum particle indices one node record can hold.
pub const NODE_SLOT_CAPACITY: usize = 25;

/// Device-side sentinel for "no child" and "no neighbour".
pub const NO_NODE: u32 = u32::MAX;

/// Particle slot that no walker has written yet.
pub const EMPTY_SLOT: u32 = u32::MAX;

/// Particle slot taken over by a subdivision before its walker wrote it.
/// The walker sees this on its exchange and retries from the node.
pub const MOVED_SLOT: u32 = u32::MAX - 1;

/// Count of a node being or already split. Above every slot capacity, so
/// no walker can claim a slot in it.
pub const SEALED_COUNT: u32 = u32::MAX;

/// Index of a node in the fixed-capacity node arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    pub const ROOT: NodeIndex = NodeIndex(0);

    /// Decode a device word, mapping the sentinel to `None`
    pub fn from_raw(raw: u32) -> Option<Self> {
        (raw != NO_NODE).then_some(NodeIndex(raw))
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Order of the eight neighbour slots
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u32)]
pub enum Direction {
    North = 0,
    South = 1,
    East = 2,
    West = 3,
    NorthEast = 4,
    NorthWest = 5,
    SouthEast = 6,
    SouthWest = 7,
}

impl Direction {
    pub const ALL: [Direction; 8] = [
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
        Direction::NorthEast,
        Direction::NorthWest,
        Direction::SouthEast,
        Direction::SouthWest,
    ];

    /// Grid step as (column delta, row delta), rows counted downwards
    pub fn offset(self) -> (i64, i64) {
        match self {
            Direction::North => (0, -1),
            Direction::South => (0, 1),
            Direction::East => (1, 0),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::NorthWest => (-1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
        }
    }
}

/// One node of the arena, 192 bytes.
///
/// Every field is a 32-bit word so the populate stage can address the record
/// as an array of atomics. Bounds are stored as `f32` bits.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct QuadTreeNode {
    pub particle_indices: [u32; NODE_SLOT_CAPACITY],
    pub count: u32,
    pub starting_index: u32,
    pub in_use: u32,
    pub is_subdivided: u32,
    pub children: [u32; 4],
    pub bounds: [f32; 4],
    pub neighbours: [u32; 8],
    pub _padding: [u32; 3],
}

/// Word offsets inside a [`QuadTreeNode`]
pub mod word {
    use super::QuadTreeNode;
    use std::mem::offset_of;

    pub const PARTICLE_INDICES: usize = offset_of!(QuadTreeNode, particle_indices) / 4;
    pub const COUNT: usize = offset_of!(QuadTreeNode, count) / 4;
    pub const STARTING_INDEX: usize = offset_of!(QuadTreeNode, starting_index) / 4;
    pub const IN_USE: usize = offset_of!(QuadTreeNode, in_use) / 4;
    pub const IS_SUBDIVIDED: usize = offset_of!(QuadTreeNode, is_subdivided) / 4;
    pub const CHILDREN: usize = offset_of!(QuadTreeNode, children) / 4;
    pub const BOUNDS: usize = offset_of!(QuadTreeNode, bounds) / 4;
    pub const NEIGHBOURS: usize = offset_of!(QuadTreeNode, neighbours) / 4;
}

impl QuadTreeNode {
    /// A node that is not part of the tree this frame
    pub fn unused() -> Self {
        Self {
            particle_indices: [EMPTY_SLOT; NODE_SLOT_CAPACITY],
            count: 0,
            starting_index: 0,
            in_use: 0,
            is_subdivided: 0,
            children: [NO_NODE; 4],
            bounds: [0.0; 4],
            neighbours: [NO_NODE; 8],
            _padding: [0; 3],
        }
    }

    /// An empty in-use leaf
    pub fn leaf(bounds: NodeBounds, neighbours: [u32; 8]) -> Self {
        Self {
            in_use: 1,
            bounds: bounds.to_array(),
            neighbours,
            ..Self::unused()
        }
    }

    pub fn is_in_use(&self) -> bool {
        self.in_use != 0
    }

    pub fn is_subdivided(&self) -> bool {
        self.is_subdivided != 0
    }

    pub fn is_leaf(&self) -> bool {
        self.is_in_use() && !self.is_subdivided()
    }

    pub fn node_bounds(&self) -> NodeBounds {
        NodeBounds::from_array(self.bounds)
    }

    pub fn child(&self, quadrant: Quadrant) -> Option<NodeIndex> {
        NodeIndex::from_raw(self.children[quadrant.index()])
    }

    pub fn children(&self) -> [Option<NodeIndex>; 4] {
        self.children.map(NodeIndex::from_raw)
    }

    pub fn neighbour(&self, direction: Direction) -> Option<NodeIndex> {
        NodeIndex::from_raw(self.neighbours[direction as usize])
    }

    /// Stored particle indices, clamped to the record capacity. Empty for a
    /// subdivided node, whose count stays sealed.
    pub fn particles(&self) -> &[u32] {
        if self.is_subdivided() {
            return &[];
        }
        let count = (self.count as usize).min(NODE_SLOT_CAPACITY);
        &self.particle_indices[..count]
    }
}

impl Default for QuadTreeNode {
    fn default() -> Self {
        Self::unused()
    }
}

/// Neighbour slots for the children of one subdivision. Each child only
/// knows its three siblings; the rest stay unset.
pub fn sibling_neighbours(children: [u32; 4], quadrant: Quadrant) -> [u32; 8] {
    let [tl, tr, br, bl] = children;
    let mut neighbours = [NO_NODE; 8];
    let mut set = |direction: Direction, node: u32| neighbours[direction as usize] = node;
    match quadrant {
        Quadrant::TopLeft => {
            set(Direction::East, tr);
            set(Direction::South, bl);
            set(Direction::SouthEast, br);
        }
        Quadrant::TopRight => {
            set(Direction::West, tl);
            set(Direction::South, br);
            set(Direction::SouthWest, bl);
        }
        Quadrant::BottomRight => {
            set(Direction::North, tr);
            set(Direction::West, bl);
            set(Direction::NorthWest, tl);
        }
        Quadrant::BottomLeft => {
            set(Direction::North, tl);
            set(Direction::East, br);
            set(Direction::NorthEast, tr);
        }
    }
    neighbours
}
