//! Compute kernels as run by the CPU device
//!
//! Each function is one invocation of a stage and mirrors the WGSL entry
//! point of the same stage in `src/shaders`. The uniform records defined
//! here are uploaded unchanged by the GPU backend.

pub mod particle_reset;
pub mod particle_update;
pub mod quadtree_geometry;
pub mod quadtree_populate;
pub mod quadtree_reset;

pub use particle_reset::{reset_particle, ResetUniforms};
pub use particle_update::{update_particle, UpdateUniforms};
pub use quadtree_geometry::{emit_node_faces, node_faces};
pub use quadtree_populate::{populate_particle, subdivide, DropReason, InsertOutcome, MAX_WALK_STEPS};
pub use quadtree_reset::{reset_node, TreeUniforms};
