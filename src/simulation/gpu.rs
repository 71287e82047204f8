//! GPU backend
//!
//! Runs the WGSL programs on a wgpu device. Every stage gets its own compute
//! pass; wgpu inserts the storage barrier between passes. Counter values are
//! copied into small read-back buffers right after the stage that wrote them.

use std::mem::size_of;

use futures::channel::oneshot;

use super::shaders::{ShaderKey, ShaderRegistry};
use super::traits::{ComputeBackend, FrameCounts, FrameInputs, TreeCounts};
use crate::buffers::{BufferConfig, BufferSlot, DrawStyle, SharedBuffer};
use crate::config::{ReadbackMode, SimulationConfig, WORKGROUP_SIZE};
use crate::emitter::EmitterDescriptor;
use crate::error::{Error, Result};
use crate::kernels::{ResetUniforms, TreeUniforms, UpdateUniforms};
use crate::particle::Particle;
use crate::polygon::PolygonFace;
use crate::quadtree::counters::{self, tree, word_index};
use crate::quadtree::{NodeBounds, QuadTreeNode, QuadTreeSnapshot};
use crate::wgpu_utils::binding_types::bind_group;
use crate::wgpu_utils::{ArrayBuffer, CounterReadback, GpuContext, UniformBuffer};

pub struct GpuBackend {
    config: SimulationConfig,
    context: GpuContext,
    programs: ShaderRegistry,

    particles: ArrayBuffer<Particle>,
    faces: ArrayBuffer<PolygonFace>,
    emitters: ArrayBuffer<EmitterDescriptor>,
    nodes: ArrayBuffer<QuadTreeNode>,
    geometry: Option<ArrayBuffer<PolygonFace>>,

    reset_counters: ArrayBuffer<u32>,
    update_counters: ArrayBuffer<u32>,
    tree_counters: ArrayBuffer<u32>,
    geometry_counters: ArrayBuffer<u32>,

    reset_uniforms: UniformBuffer<ResetUniforms>,
    update_uniforms: UniformBuffer<UpdateUniforms>,
    tree_uniforms: UniformBuffer<TreeUniforms>,
    tree_state: TreeUniforms,

    reset_bind_group: wgpu::BindGroup,
    update_bind_group: wgpu::BindGroup,
    tree_reset_bind_group: wgpu::BindGroup,
    populate_bind_group: wgpu::BindGroup,
    geometry_bind_group: Option<wgpu::BindGroup>,

    active_readback: CounterReadback,
    tree_readback: CounterReadback,
    geometry_readback: CounterReadback,

    particle_slot: BufferSlot<wgpu::Buffer>,
    face_slot: BufferSlot<wgpu::Buffer>,
    node_slot: BufferSlot<wgpu::Buffer>,
    geometry_slot: BufferSlot<wgpu::Buffer>,

    face_count: u32,
    emitter_count: u32,
    frames: u64,
}

impl GpuBackend {
    pub fn new(context: GpuContext, config: SimulationConfig) -> Result<Self> {
        config.validate()?;
        check_dispatch_size(&context, config.max_particles.max(config.max_nodes))?;
        context.check_storage_size("particles", ArrayBuffer::<Particle>::byte_size(config.max_particles as usize))?;
        context.check_storage_size("quadtree nodes", ArrayBuffer::<QuadTreeNode>::byte_size(config.max_nodes as usize))?;
        context.check_storage_size("quadtree geometry", ArrayBuffer::<PolygonFace>::byte_size(config.max_geometry_faces() as usize))?;
        context.check_storage_size("tree counters", tree::block_size(config.max_nodes))?;

        let device = &context.device;
        let programs = ShaderRegistry::new(device);

        let particles = ArrayBuffer::new(device, "particles", config.max_particles as usize, false);
        let faces = ArrayBuffer::new(device, "region faces", config.max_region_faces as usize, true);
        let emitters = ArrayBuffer::new(device, "emitters", config.max_emitters as usize, true);
        let nodes = ArrayBuffer::new(device, "quadtree nodes", config.max_nodes as usize, false);

        let words = |size: u64| word_index(size);
        let reset_counters = ArrayBuffer::new(device, "reset counters", words(counters::reset::BLOCK_SIZE), false);
        let update_counters = ArrayBuffer::new(device, "update counters", words(counters::update::BLOCK_SIZE), false);
        let tree_counters = ArrayBuffer::new(device, "tree counters", words(tree::block_size(config.max_nodes)), false);
        let geometry_counters = ArrayBuffer::new(device, "geometry counters", words(counters::geometry::BLOCK_SIZE), false);

        let reset_uniforms = UniformBuffer::new(device);
        let update_uniforms = UniformBuffer::new(device);
        let tree_uniforms = UniformBuffer::new(device);

        let reset_bind_group = bind_group(
            device,
            "particle reset",
            &programs.get(ShaderKey::ParticleReset).layout,
            vec![
                particles.binding_resource(),
                emitters.binding_resource(),
                reset_counters.binding_resource(),
                reset_uniforms.binding_resource(),
            ],
        );
        let update_bind_group = bind_group(
            device,
            "particle update",
            &programs.get(ShaderKey::ParticleUpdate).layout,
            vec![
                particles.binding_resource(),
                faces.binding_resource(),
                update_counters.binding_resource(),
                update_uniforms.binding_resource(),
            ],
        );
        let tree_reset_bind_group = bind_group(
            device,
            "quadtree reset",
            &programs.get(ShaderKey::QuadTreeReset).layout,
            vec![
                nodes.binding_resource(),
                tree_counters.binding_resource(),
                tree_uniforms.binding_resource(),
            ],
        );
        let populate_bind_group = bind_group(
            device,
            "quadtree populate",
            &programs.get(ShaderKey::QuadTreePopulate).layout,
            vec![
                particles.binding_resource(),
                nodes.binding_resource(),
                tree_counters.binding_resource(),
                tree_uniforms.binding_resource(),
            ],
        );

        let active_readback = CounterReadback::new(device, "active particles", 1);
        let tree_readback = CounterReadback::new(device, "tree counters", 2);
        let geometry_readback = CounterReadback::new(device, "geometry faces", 1);

        log::info!(
            "gpu backend on '{}': {} particles, {} nodes, {:?} read-back",
            context.adapter_info.name,
            config.max_particles,
            config.max_nodes,
            config.readback
        );

        Ok(Self {
            particle_slot: BufferSlot::with_handle(
                "particles",
                DrawStyle::Points,
                particles.buffer().clone(),
                config.max_particles,
            ),
            face_slot: BufferSlot::with_handle("region faces", DrawStyle::Lines, faces.buffer().clone(), 0),
            node_slot: BufferSlot::with_handle("quadtree nodes", DrawStyle::Points, nodes.buffer().clone(), 0),
            geometry_slot: BufferSlot::new("quadtree geometry", DrawStyle::Lines),
            tree_state: TreeUniforms::from_config(&config, NodeBounds::default()),
            programs,
            particles,
            faces,
            emitters,
            nodes,
            geometry: None,
            reset_counters,
            update_counters,
            tree_counters,
            geometry_counters,
            reset_uniforms,
            update_uniforms,
            tree_uniforms,
            reset_bind_group,
            update_bind_group,
            tree_reset_bind_group,
            populate_bind_group,
            geometry_bind_group: None,
            active_readback,
            tree_readback,
            geometry_readback,
            face_count: 0,
            emitter_count: 0,
            frames: 0,
            context,
            config,
        })
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn particle_slot(&self) -> &BufferSlot<wgpu::Buffer> {
        &self.particle_slot
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    fn encoder(&self, label: &str) -> wgpu::CommandEncoder {
        self.context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some(label) })
    }

    fn submit(&self, encoder: wgpu::CommandEncoder) {
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }

    fn write_reset_uniforms(&mut self, quota: u32, frame_seed: u32) {
        let uniforms = ResetUniforms {
            max_particles: self.config.max_particles,
            quota,
            emitter_count: self.emitter_count,
            frame_seed,
        };
        self.reset_uniforms.update_content(&self.context.queue, uniforms);
    }

    fn write_update_uniforms(&mut self, delta_time_sec: f32) {
        let uniforms = UpdateUniforms {
            max_particles: self.config.max_particles,
            face_count: self.face_count,
            delta_time_sec,
            _padding: 0,
        };
        self.update_uniforms.update_content(&self.context.queue, uniforms);
    }

    /// Uniforms for the tree stages plus the counter header populate expects
    fn write_tree_state(&mut self, bounds: NodeBounds) {
        self.tree_state = TreeUniforms::from_config(&self.config, bounds);
        self.tree_uniforms.update_content(&self.context.queue, self.tree_state);
        self.context.queue.write_buffer(
            self.tree_counters.buffer(),
            tree::NODES_IN_USE,
            bytemuck::cast_slice(&tree::header(self.tree_state.initial_nodes)),
        );
        self.node_slot.set_vertex_count(self.tree_state.initial_nodes);
    }

    /// The geometry buffer is allocated on first use
    fn ensure_geometry(&mut self) {
        if self.geometry.is_some() {
            return;
        }
        let device = &self.context.device;
        let capacity = self.config.max_geometry_faces() as usize;
        let geometry = ArrayBuffer::new(device, "quadtree geometry", capacity, false);
        self.geometry_bind_group = Some(bind_group(
            device,
            "quadtree geometry",
            &self.programs.get(ShaderKey::QuadTreeGeometry).layout,
            vec![
                self.nodes.binding_resource(),
                geometry.binding_resource(),
                self.geometry_counters.binding_resource(),
                self.tree_uniforms.binding_resource(),
            ],
        ));
        log::debug!("allocated quadtree geometry buffer for {} faces", capacity);
        self.geometry_slot.init(geometry.buffer().clone(), 0);
        self.geometry = Some(geometry);
    }

    fn encode_particle_reset(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(self.reset_counters.buffer(), 0, None);
        encode_pass(
            encoder,
            &self.programs,
            ShaderKey::ParticleReset,
            &self.reset_bind_group,
            self.config.max_particles,
        );
    }

    fn encode_particle_update(&mut self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(self.update_counters.buffer(), 0, None);
        encode_pass(
            encoder,
            &self.programs,
            ShaderKey::ParticleUpdate,
            &self.update_bind_group,
            self.config.max_particles,
        );
        self.active_readback.record_copy(
            encoder,
            self.update_counters.buffer(),
            counters::update::ACTIVE_PARTICLES,
        );
        self.frames += 1;
    }

    fn encode_tree_reset(&self, encoder: &mut wgpu::CommandEncoder) {
        encode_pass(
            encoder,
            &self.programs,
            ShaderKey::QuadTreeReset,
            &self.tree_reset_bind_group,
            self.config.max_nodes,
        );
    }

    fn encode_populate(&mut self, encoder: &mut wgpu::CommandEncoder) {
        encode_pass(
            encoder,
            &self.programs,
            ShaderKey::QuadTreePopulate,
            &self.populate_bind_group,
            self.config.max_particles,
        );
        self.tree_readback
            .record_copy(encoder, self.tree_counters.buffer(), tree::NODES_IN_USE);
    }

    fn encode_geometry(&mut self, encoder: &mut wgpu::CommandEncoder) {
        let Some(geometry_bind_group) = &self.geometry_bind_group else {
            log::error!("quadtree geometry buffer is not initialized; stage skipped");
            return;
        };
        encoder.clear_buffer(self.geometry_counters.buffer(), 0, None);
        encode_pass(
            encoder,
            &self.programs,
            ShaderKey::QuadTreeGeometry,
            geometry_bind_group,
            self.config.max_nodes,
        );
        self.geometry_readback.record_copy(
            encoder,
            self.geometry_counters.buffer(),
            counters::geometry::FACES_IN_USE,
        );
    }

    fn collect_active(&mut self) -> Result<u32> {
        let values = collect(&mut self.active_readback, &self.context.device, self.config.readback)?;
        Ok(values.first().copied().unwrap_or(0))
    }

    fn collect_tree(&mut self) -> Result<TreeCounts> {
        let values = collect(&mut self.tree_readback, &self.context.device, self.config.readback)?;
        let word = |i: usize| values.get(i).copied().unwrap_or(0);
        let counts = TreeCounts::from_raw(word(0), word(1), self.config.max_nodes);
        self.node_slot.set_vertex_count(counts.nodes_in_use);
        Ok(counts)
    }

    fn collect_geometry(&mut self) -> Result<u32> {
        let values = collect(&mut self.geometry_readback, &self.context.device, self.config.readback)?;
        let faces = values
            .first()
            .copied()
            .unwrap_or(0)
            .min(self.config.max_geometry_faces());
        self.geometry_slot.set_vertex_count(faces * 2);
        Ok(faces)
    }

    /// Copy the front of a device buffer through a staging buffer and wait
    fn read_buffer<T: bytemuck::Pod>(&self, source: &wgpu::Buffer, count: usize) -> Result<Vec<T>> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let size = (count * size_of::<T>()) as u64;
        let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("staging buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self.encoder("staging copy");
        encoder.copy_buffer_to_buffer(source, 0, &staging, 0, size);
        self.submit(encoder);

        let slice = staging.slice(..);
        let (sender, receiver) = oneshot::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        let _ = self.context.device.poll(wgpu::MaintainBase::Wait);

        match futures::executor::block_on(receiver) {
            Ok(result) => result?,
            Err(_) => return Err(Error::ReadbackChannel("staging buffer")),
        }
        let data = {
            let mapped = slice.get_mapped_range();
            bytemuck::cast_slice::<u8, T>(&mapped).to_vec()
        };
        staging.unmap();
        Ok(data)
    }

    fn read_counter(&self, block: &ArrayBuffer<u32>, byte_offset: u64) -> Result<u32> {
        let words = self.read_buffer::<u32>(block.buffer(), word_index(byte_offset) + 1)?;
        Ok(words.last().copied().unwrap_or(0))
    }
}

impl ComputeBackend for GpuBackend {
    fn name(&self) -> &str {
        "gpu"
    }

    fn config(&self) -> &SimulationConfig {
        &self.config
    }

    fn upload_particles(&mut self, particles: &[Particle]) {
        let written = self.particles.update_data(&self.context.queue, particles);
        if written < particles.len() {
            log::warn!("particle upload truncated to {} of {}", written, particles.len());
        }
    }

    fn upload_faces(&mut self, faces: &[PolygonFace]) {
        let written = self.faces.update_data(&self.context.queue, faces);
        if written < faces.len() {
            log::warn!("region face upload truncated to {} of {}", written, faces.len());
        }
        self.face_count = written as u32;
        self.face_slot.set_vertex_count(self.face_count * 2);
    }

    fn upload_emitters(&mut self, emitters: &[EmitterDescriptor]) {
        let written = self.emitters.update_data(&self.context.queue, emitters);
        if written < emitters.len() {
            log::warn!("emitter upload truncated to {} of {}", written, emitters.len());
        }
        self.emitter_count = written as u32;
    }

    fn reset_particles(&mut self, quota: u32, frame_seed: u32) {
        self.write_reset_uniforms(quota, frame_seed);
        let mut encoder = self.encoder("particle reset");
        self.encode_particle_reset(&mut encoder);
        self.submit(encoder);
    }

    fn update_particles(&mut self, delta_time_sec: f32) -> Result<u32> {
        self.write_update_uniforms(delta_time_sec);
        let mut encoder = self.encoder("particle update");
        self.encode_particle_update(&mut encoder);
        self.submit(encoder);
        self.collect_active()
    }

    fn reset_quadtree(&mut self, bounds: NodeBounds) {
        self.write_tree_state(bounds);
        let mut encoder = self.encoder("quadtree reset");
        self.encode_tree_reset(&mut encoder);
        self.submit(encoder);
    }

    fn populate_quadtree(&mut self) -> Result<TreeCounts> {
        let mut encoder = self.encoder("quadtree populate");
        self.encode_populate(&mut encoder);
        self.submit(encoder);
        self.collect_tree()
    }

    fn generate_geometry(&mut self) -> Result<u32> {
        self.ensure_geometry();
        let mut encoder = self.encoder("quadtree geometry");
        self.encode_geometry(&mut encoder);
        self.submit(encoder);
        self.collect_geometry()
    }

    fn read_particles(&mut self) -> Result<Vec<Particle>> {
        self.read_buffer(self.particles.buffer(), self.config.max_particles as usize)
    }

    fn read_quadtree(&mut self) -> Result<QuadTreeSnapshot> {
        let nodes_in_use = self
            .read_counter(&self.tree_counters, tree::NODES_IN_USE)?
            .min(self.config.max_nodes);
        let nodes = self.read_buffer(self.nodes.buffer(), self.config.max_nodes as usize)?;
        Ok(QuadTreeSnapshot::new(nodes, nodes_in_use))
    }

    fn read_geometry(&mut self) -> Result<Vec<PolygonFace>> {
        let Some(geometry) = &self.geometry else {
            return Ok(Vec::new());
        };
        let count = self
            .read_counter(&self.geometry_counters, counters::geometry::FACES_IN_USE)?
            .min(self.config.max_geometry_faces());
        self.read_buffer(geometry.buffer(), count as usize)
    }

    fn buffer_config(&self, buffer: SharedBuffer) -> Option<BufferConfig> {
        match buffer {
            SharedBuffer::Particles => self.particle_slot.configure(),
            SharedBuffer::RegionFaces => self.face_slot.configure(),
            SharedBuffer::QuadTreeNodes => self.node_slot.configure(),
            SharedBuffer::QuadTreeGeometry => self.geometry_slot.configure(),
        }
    }

    /// Records the stages into as few submissions as the read-back mode
    /// allows. Blocking mode submits the particle stages first so the active
    /// count can decide whether populate runs; deferred mode always records
    /// populate, which then skips every inactive slot on the device.
    fn run_frame(&mut self, inputs: &FrameInputs) -> Result<FrameCounts> {
        self.upload_faces(inputs.faces);
        self.upload_emitters(inputs.emitters);
        self.write_reset_uniforms(inputs.quota, inputs.frame_seed);
        self.write_update_uniforms(inputs.delta_time_sec);
        self.write_tree_state(inputs.tree_bounds);
        self.ensure_geometry();

        let mut encoder = self.encoder("frame");
        self.encode_particle_reset(&mut encoder);
        self.encode_particle_update(&mut encoder);

        let mut active_particles = None;
        if self.config.readback == ReadbackMode::Blocking {
            self.submit(encoder);
            active_particles = Some(self.collect_active()?);
            encoder = self.encoder("frame quadtree");
        }
        let run_populate = active_particles.map_or(true, |active| active > 0);

        self.encode_tree_reset(&mut encoder);
        if run_populate {
            self.encode_populate(&mut encoder);
        }
        self.encode_geometry(&mut encoder);
        self.submit(encoder);

        let active_particles = match active_particles {
            Some(active) => active,
            None => self.collect_active()?,
        };
        let tree = if run_populate {
            self.collect_tree()?
        } else {
            self.node_slot.set_vertex_count(self.tree_state.initial_nodes);
            TreeCounts {
                nodes_in_use: self.tree_state.initial_nodes,
                particles_in_tree: 0,
            }
        };
        let geometry_faces = self.collect_geometry()?;

        Ok(FrameCounts {
            active_particles,
            tree,
            geometry_faces,
        })
    }
}

fn workgroup_count(invocations: u32) -> u32 {
    invocations.div_ceil(WORKGROUP_SIZE)
}

fn check_dispatch_size(context: &GpuContext, invocations: u32) -> Result<()> {
    let limit = context.device.limits().max_compute_workgroups_per_dimension;
    let needed = workgroup_count(invocations);
    if needed > limit {
        return Err(Error::InvalidConfig(format!(
            "{} invocations need {} workgroups, device allows {}",
            invocations, needed, limit
        )));
    }
    Ok(())
}

fn encode_pass(
    encoder: &mut wgpu::CommandEncoder,
    programs: &ShaderRegistry,
    key: ShaderKey,
    bind_group: &wgpu::BindGroup,
    invocations: u32,
) {
    let program = programs.get(key);
    let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
        label: Some(key.label()),
        timestamp_writes: None,
    });
    pass.set_pipeline(&program.pipeline);
    pass.set_bind_group(0, bind_group, &[]);
    pass.dispatch_workgroups(workgroup_count(invocations), 1, 1);
}

/// Start the map of a freshly copied read-back and return its values: the
/// fresh ones when blocking, the newest completed ones when deferred.
fn collect(readback: &mut CounterReadback, device: &wgpu::Device, mode: ReadbackMode) -> Result<Vec<u32>> {
    readback.begin_map();
    let values = match mode {
        ReadbackMode::Blocking => readback.wait(device)?,
        ReadbackMode::Deferred => readback.poll(device)?,
    };
    Ok(values.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workgroup_count_rounds_up() {
        assert_eq!(workgroup_count(0), 0);
        assert_eq!(workgroup_count(1), 1);
        assert_eq!(workgroup_count(256), 1);
        assert_eq!(workgroup_count(257), 2);
        assert_eq!(workgroup_count(100_000), 391);
    }
}
