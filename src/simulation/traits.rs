//! Backend seam for the compute pipeline
//!
//! A backend owns every device array and counter block and runs the stages
//! in the order the host asks for. The end of each stage is a memory barrier:
//! the next stage sees all of its writes.

use crate::buffers::{BufferConfig, SharedBuffer};
use crate::config::SimulationConfig;
use crate::emitter::EmitterDescriptor;
use crate::error::Result;
use crate::particle::Particle;
use crate::polygon::PolygonFace;
use crate::quadtree::{NodeBounds, QuadTreeSnapshot};

/// Per-frame host data for [`ComputeBackend::run_frame`]
#[derive(Clone, Copy, Debug)]
pub struct FrameInputs<'a> {
    pub faces: &'a [PolygonFace],
    pub emitters: &'a [EmitterDescriptor],
    pub quota: u32,
    pub frame_seed: u32,
    pub delta_time_sec: f32,
    pub tree_bounds: NodeBounds,
}

/// Counters produced by the populate stage
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TreeCounts {
    pub nodes_in_use: u32,
    pub particles_in_tree: u32,
}

impl TreeCounts {
    /// Counts from the raw counter words. Node blocks are only reserved when
    /// all four nodes fit, so the node counter is exact and never passes
    /// `max_nodes`.
    pub fn from_raw(nodes_in_use: u32, particles_in_tree: u32, max_nodes: u32) -> Self {
        if max_nodes.saturating_sub(nodes_in_use) < 4 {
            log::warn!(
                "quadtree node arena full ({} of {} nodes), further splits are dropped",
                nodes_in_use,
                max_nodes
            );
        }
        Self {
            nodes_in_use,
            particles_in_tree,
        }
    }
}

/// Everything the host learns about one frame
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameCounts {
    pub active_particles: u32,
    pub tree: TreeCounts,
    pub geometry_faces: u32,
}

pub trait ComputeBackend {
    fn name(&self) -> &str;

    fn config(&self) -> &SimulationConfig;

    /// Overwrite the front of the particle array
    fn upload_particles(&mut self, particles: &[Particle]);

    /// Replace the transformed region faces used by the update stage
    fn upload_faces(&mut self, faces: &[PolygonFace]);

    /// Replace the emitter records used by the reset stage
    fn upload_emitters(&mut self, emitters: &[EmitterDescriptor]);

    /// Activate up to `quota` inactive slots
    fn reset_particles(&mut self, quota: u32, frame_seed: u32);

    /// Move every active particle and return the active count
    fn update_particles(&mut self, delta_time_sec: f32) -> Result<u32>;

    /// Lay the initial grid over `bounds`
    fn reset_quadtree(&mut self, bounds: NodeBounds);

    /// Insert every active particle into the tree
    fn populate_quadtree(&mut self) -> Result<TreeCounts>;

    /// Write leaf edges into the geometry buffer and return the face count
    fn generate_geometry(&mut self) -> Result<u32>;

    fn read_particles(&mut self) -> Result<Vec<Particle>>;

    fn read_quadtree(&mut self) -> Result<QuadTreeSnapshot>;

    fn read_geometry(&mut self) -> Result<Vec<PolygonFace>>;

    /// Draw configuration for a render consumer
    fn buffer_config(&self, buffer: SharedBuffer) -> Option<BufferConfig>;

    /// Run every stage of one frame in order. Populate is skipped when no
    /// particle is active.
    fn run_frame(&mut self, inputs: &FrameInputs) -> Result<FrameCounts> {
        self.upload_faces(inputs.faces);
        self.upload_emitters(inputs.emitters);
        self.reset_particles(inputs.quota, inputs.frame_seed);
        let active_particles = self.update_particles(inputs.delta_time_sec)?;

        self.reset_quadtree(inputs.tree_bounds);
        let tree = if active_particles > 0 {
            self.populate_quadtree()?
        } else {
            TreeCounts {
                nodes_in_use: self.config().initial_node_count(),
                particles_in_tree: 0,
            }
        };
        let geometry_faces = self.generate_geometry()?;

        Ok(FrameCounts {
            active_particles,
            tree,
            geometry_faces,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_counts_pass_through_at_capacity() {
        let full = TreeCounts::from_raw(29, 40, 32);
        assert_eq!(full.nodes_in_use, 29);
        assert_eq!(full.particles_in_tree, 40);
        assert_eq!(TreeCounts::from_raw(5, 3, 1024).nodes_in_use, 5);
    }
}
