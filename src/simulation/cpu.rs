//! CPU backend
//!
//! Runs the compute kernels over the emulated device memory on a rayon pool.
//! Counter values are read straight from the counter blocks once a dispatch
//! has returned, since the dispatch itself is the barrier.

use std::sync::Arc;

use super::traits::{ComputeBackend, TreeCounts};
use crate::buffers::{BufferConfig, BufferSlot, DrawStyle, SharedBuffer};
use crate::config::SimulationConfig;
use crate::device::{CounterBlock, DeviceArray, Dispatcher};
use crate::emitter::EmitterDescriptor;
use crate::error::Result;
use crate::kernels::{self, ResetUniforms, TreeUniforms, UpdateUniforms};
use crate::particle::Particle;
use crate::polygon::PolygonFace;
use crate::quadtree::counters::{self, tree};
use crate::quadtree::{NodeBounds, QuadTreeNode, QuadTreeSnapshot};

/// Largest single array the emulated device will allocate.
pub const MAX_ARRAY_BYTES: u64 = 1 << 30;

pub struct CpuBackend {
    config: SimulationConfig,
    dispatcher: Dispatcher,

    particles: Arc<DeviceArray<Particle>>,
    faces: Arc<DeviceArray<PolygonFace>>,
    nodes: Arc<DeviceArray<QuadTreeNode>>,
    geometry: Option<Arc<DeviceArray<PolygonFace>>>,
    emitters: DeviceArray<EmitterDescriptor>,

    particle_slot: BufferSlot<Arc<DeviceArray<Particle>>>,
    face_slot: BufferSlot<Arc<DeviceArray<PolygonFace>>>,
    node_slot: BufferSlot<Arc<DeviceArray<QuadTreeNode>>>,
    geometry_slot: BufferSlot<Arc<DeviceArray<PolygonFace>>>,

    reset_counters: CounterBlock,
    update_counters: CounterBlock,
    tree_counters: CounterBlock,
    geometry_counters: CounterBlock,

    face_count: u32,
    emitter_count: u32,
    tree_uniforms: TreeUniforms,
    frames: u64,
}

impl CpuBackend {
    pub fn new(config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        let dispatcher = Dispatcher::new(config.cpu_threads)?;

        let particles = Arc::new(DeviceArray::zeroed(
            "particles",
            config.max_particles as usize,
            MAX_ARRAY_BYTES,
        )?);
        let faces = Arc::new(DeviceArray::zeroed(
            "region faces",
            config.max_region_faces as usize,
            MAX_ARRAY_BYTES,
        )?);
        let nodes = Arc::new(DeviceArray::zeroed(
            "quadtree nodes",
            config.max_nodes as usize,
            MAX_ARRAY_BYTES,
        )?);
        let emitters = DeviceArray::zeroed(
            "emitters",
            config.max_emitters as usize,
            MAX_ARRAY_BYTES,
        )?;

        let block = |label, size| CounterBlock::new(label, size, MAX_ARRAY_BYTES);
        let reset_counters = block("reset counters", counters::reset::BLOCK_SIZE)?;
        let update_counters = block("update counters", counters::update::BLOCK_SIZE)?;
        let tree_counters = block("tree counters", tree::block_size(config.max_nodes))?;
        let geometry_counters = block("geometry counters", counters::geometry::BLOCK_SIZE)?;

        log::info!(
            "cpu backend: {} particles, {} nodes, {} workers",
            config.max_particles,
            config.max_nodes,
            dispatcher.threads()
        );

        let tree_uniforms = TreeUniforms::from_config(&config, NodeBounds::default());
        Ok(Self {
            particle_slot: BufferSlot::with_handle(
                "particles",
                DrawStyle::Points,
                particles.clone(),
                config.max_particles,
            ),
            face_slot: BufferSlot::with_handle("region faces", DrawStyle::Lines, faces.clone(), 0),
            node_slot: BufferSlot::with_handle("quadtree nodes", DrawStyle::Points, nodes.clone(), 0),
            geometry_slot: BufferSlot::new("quadtree geometry", DrawStyle::Lines),
            particles,
            faces,
            nodes,
            geometry: None,
            emitters,
            reset_counters,
            update_counters,
            tree_counters,
            geometry_counters,
            face_count: 0,
            emitter_count: 0,
            tree_uniforms,
            frames: 0,
            dispatcher,
            config,
        })
    }

    pub fn particle_slot(&self) -> &BufferSlot<Arc<DeviceArray<Particle>>> {
        &self.particle_slot
    }

    pub fn node_slot(&self) -> &BufferSlot<Arc<DeviceArray<QuadTreeNode>>> {
        &self.node_slot
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// The geometry buffer is allocated on first use
    fn geometry_array(&mut self) -> Result<Arc<DeviceArray<PolygonFace>>> {
        if let Some(array) = &self.geometry {
            return Ok(array.clone());
        }
        let capacity = self.config.max_geometry_faces();
        let array = Arc::new(DeviceArray::zeroed(
            "quadtree geometry",
            capacity as usize,
            MAX_ARRAY_BYTES,
        )?);
        log::debug!("allocated quadtree geometry buffer for {} faces", capacity);
        self.geometry_slot.init(array.clone(), 0);
        self.geometry = Some(array.clone());
        Ok(array)
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn upload_particles(&mut self, particles: &[Particle]) {
        let written = self.particles.write(particles);
        if written < particles.len() {
            log::warn!("particle upload truncated to {} of {}", written, particles.len());
        }
    }

    fn upload_faces(&mut self, faces: &[PolygonFace]) {
        let written = self.faces.write(faces);
        if written < faces.len() {
            log::warn!("region face upload truncated to {} of {}", written, faces.len());
        }
        self.face_count = written as u32;
        self.face_slot.set_vertex_count(self.face_count * 2);
    }

    fn upload_emitters(&mut self, emitters: &[EmitterDescriptor]) {
        let written = self.emitters.write(emitters);
        if written < emitters.len() {
            log::warn!("emitter upload truncated to {} of {}", written, emitters.len());
        }
        self.emitter_count = written as u32;
    }

    fn reset_particles(&mut self, quota: u32, frame_seed: u32) {
        let particles = &self.particles;
        let emitters: Vec<EmitterDescriptor> = (0..self.emitter_count as usize)
            .map(|i| self.emitters.load(i))
            .collect();
        let uniforms = ResetUniforms {
            max_particles: self.config.max_particles,
            quota,
            emitter_count: self.emitter_count,
            frame_seed,
        };
        self.reset_counters.clear();
        let counters = &self.reset_counters;
        self.dispatcher.dispatch("particle reset", uniforms.max_particles, |id| {
            kernels::reset_particle(id, particles, &emitters, counters, &uniforms)
        });
    }

    fn update_particles(&mut self, delta_time_sec: f32) -> Result<u32> {
        let particles = &self.particles;
        let faces: Vec<PolygonFace> = (0..self.face_count as usize)
            .map(|i| self.faces.load(i))
            .collect();
        let uniforms = UpdateUniforms {
            max_particles: self.config.max_particles,
            face_count: self.face_count,
            delta_time_sec,
            _padding: 0,
        };
        self.update_counters.clear();
        let counters = &self.update_counters;
        self.dispatcher.dispatch("particle update", uniforms.max_particles, |id| {
            kernels::update_particle(id, particles, &faces, counters, &uniforms)
        });
        self.frames += 1;
        Ok(self.update_counters.load(counters::update::ACTIVE_PARTICLES))
    }

    fn reset_quadtree(&mut self, bounds: NodeBounds) {
        self.tree_uniforms = TreeUniforms::from_config(&self.config, bounds);
        let nodes = &self.nodes;
        self.tree_counters.reset(&tree::header(self.tree_uniforms.initial_nodes));
        let counters = &self.tree_counters;
        let uniforms = self.tree_uniforms;
        self.dispatcher.dispatch("quadtree reset", uniforms.max_nodes, |id| {
            kernels::reset_node(id, nodes, counters, &uniforms)
        });
        self.node_slot.set_vertex_count(uniforms.initial_nodes);
    }

    fn populate_quadtree(&mut self) -> Result<TreeCounts> {
        let particles = &self.particles;
        let nodes = &self.nodes;
        let counters = &self.tree_counters;
        let uniforms = self.tree_uniforms;
        self.dispatcher.dispatch("quadtree populate", uniforms.max_particles, |id| {
            kernels::populate_particle(id, particles, nodes, counters, &uniforms);
        });

        let counts = TreeCounts::from_raw(
            self.tree_counters.load(tree::NODES_IN_USE),
            self.tree_counters.load(tree::PARTICLES_IN_TREE),
            uniforms.max_nodes,
        );
        self.node_slot.set_vertex_count(counts.nodes_in_use);
        Ok(counts)
    }

    fn generate_geometry(&mut self) -> Result<u32> {
        let geometry = self.geometry_array()?;
        let nodes = &self.nodes;
        self.geometry_counters.clear();
        let counters = &self.geometry_counters;
        let uniforms = self.tree_uniforms;
        self.dispatcher.dispatch("quadtree geometry", uniforms.max_nodes, |id| {
            kernels::emit_node_faces(id, nodes, &geometry, counters, &uniforms)
        });
        let faces = self
            .geometry_counters
            .load(counters::geometry::FACES_IN_USE)
            .min(uniforms.max_faces);
        self.geometry_slot.set_vertex_count(faces * 2);
        Ok(faces)
    }

    fn read_particles(&mut self) -> Result<Vec<Particle>> {
        Ok(self.particles.snapshot())
    }

    fn read_quadtree(&mut self) -> Result<QuadTreeSnapshot> {
        let nodes_in_use = self
            .tree_counters
            .load(tree::NODES_IN_USE)
            .min(self.config.max_nodes);
        Ok(QuadTreeSnapshot::new(self.nodes.snapshot(), nodes_in_use))
    }

    fn read_geometry(&mut self) -> Result<Vec<PolygonFace>> {
        let count = self
            .geometry_counters
            .load(counters::geometry::FACES_IN_USE)
            .min(self.config.max_geometry_faces()) as usize;
        Ok(match &self.geometry {
            Some(array) => (0..count).map(|i| array.load(i)).collect(),
            None => Vec::new(),
        })
    }

    fn buffer_config(&self, buffer: SharedBuffer) -> Option<BufferConfig> {
        match buffer {
            SharedBuffer::Particles => self.particle_slot.configure(),
            SharedBuffer::RegionFaces => self.face_slot.configure(),
            SharedBuffer::QuadTreeNodes => self.node_slot.configure(),
            SharedBuffer::QuadTreeGeometry => self.geometry_slot.configure(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{ParticleEmitter, PointEmitter};
    use crate::polygon::PolygonRegion;

    fn small_config() -> SimulationConfig {
        SimulationConfig::new()
            .with_max_particles(64)
            .with_max_nodes(256)
            .with_cpu_threads(1)
    }

    #[test]
    fn test_zero_active_frame_keeps_grid() {
        let mut backend = CpuBackend::new(small_config()).unwrap();
        let region = PolygonRegion::demo();
        backend.upload_faces(region.faces());
        backend.reset_quadtree(region.bounds().unwrap());
        let counts = backend.populate_quadtree().unwrap();
        assert_eq!(
            counts,
            TreeCounts {
                nodes_in_use: 16,
                particles_in_tree: 0
            }
        );
        assert_eq!(backend.update_particles(0.01).unwrap(), 0);
    }

    #[test]
    fn test_geometry_slot_unconfigured_until_generated() {
        let mut backend = CpuBackend::new(small_config()).unwrap();
        assert_eq!(backend.buffer_config(SharedBuffer::QuadTreeGeometry), None);
        backend.reset_quadtree(NodeBounds::new(-1.0, 1.0, 1.0, -1.0));
        assert_eq!(backend.generate_geometry().unwrap(), 64);
        let config = backend.buffer_config(SharedBuffer::QuadTreeGeometry).unwrap();
        assert_eq!(config.vertex_count, 128);
        assert_eq!(config.draw_style, DrawStyle::Lines);
        assert_eq!(backend.read_geometry().unwrap().len(), 64);
    }

    #[test]
    fn test_reset_then_update_counts_emitted() {
        let mut backend = CpuBackend::new(small_config()).unwrap();
        let region = PolygonRegion::demo();
        backend.upload_faces(region.faces());
        backend.upload_emitters(&[PointEmitter::new([0.0, 0.0], 0.0, 0.0).descriptor()]);
        backend.reset_particles(10, 0);
        assert_eq!(backend.update_particles(0.01).unwrap(), 10);
        backend.reset_particles(10, 1);
        assert_eq!(backend.update_particles(0.01).unwrap(), 20);
        assert_eq!(backend.frames(), 2);
    }

    #[test]
    fn test_oversized_config_fails_allocation() {
        let config = SimulationConfig::new().with_max_particles(u32::MAX);
        assert!(matches!(
            CpuBackend::new(config),
            Err(crate::error::Error::Allocation { label: "particles", .. })
        ));
    }
}
