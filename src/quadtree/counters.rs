//! Byte offsets of the atomic counter blocks
//!
//! These offsets are shared by the host, the WGSL programs and the CPU
//! emulation. A mismatch silently corrupts unrelated counters.

/// Quadtree counter block
pub mod tree {
    pub const NODES_IN_USE: u64 = 0;
    pub const PARTICLES_IN_TREE: u64 = 4;
    /// Reserved for a global subdivision section.
    pub const SUBDIVISION_MUTEX: u64 = 8;
    /// Reserved for guarding the geometry face buffer.
    pub const FACES_MUTEX: u64 = 12;
    pub const NODE_MUTEX_BASE: u64 = 16;

    /// Header words the host writes before each populate pass
    pub const HEADER_WORDS: usize = (NODE_MUTEX_BASE / 4) as usize;

    pub const fn node_mutex(node: u32) -> u64 {
        NODE_MUTEX_BASE + 4 * node as u64
    }

    pub const fn block_size(max_nodes: u32) -> u64 {
        NODE_MUTEX_BASE + 4 * max_nodes as u64
    }

    /// Header contents at the start of a populate pass
    pub fn header(initial_nodes: u32) -> [u32; HEADER_WORDS] {
        [initial_nodes, 0, 0, 0]
    }
}

/// Particle update counter block
pub mod update {
    pub const ACTIVE_PARTICLES: u64 = 0;
    pub const BLOCK_SIZE: u64 = 4;
}

/// Particle reset counter block
pub mod reset {
    pub const EMITTED_THIS_FRAME: u64 = 0;
    pub const BLOCK_SIZE: u64 = 4;
}

/// Quadtree geometry counter block
pub mod geometry {
    pub const FACES_IN_USE: u64 = 0;
    pub const BLOCK_SIZE: u64 = 4;
}

/// Word index of a byte offset
pub const fn word_index(byte_offset: u64) -> usize {
    (byte_offset / 4) as usize
}
