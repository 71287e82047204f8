//! Compiled compute programs, looked up by stage

use crate::wgpu_utils::binding_types::{
    compute_layout, storage_buffer_read_only, storage_buffer_read_write, uniform,
};

/// Symbolic name of each compute program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderKey {
    ParticleReset = 0,
    ParticleUpdate = 1,
    QuadTreeReset = 2,
    QuadTreePopulate = 3,
    QuadTreeGeometry = 4,
}

impl ShaderKey {
    pub const ALL: [ShaderKey; 5] = [
        ShaderKey::ParticleReset,
        ShaderKey::ParticleUpdate,
        ShaderKey::QuadTreeReset,
        ShaderKey::QuadTreePopulate,
        ShaderKey::QuadTreeGeometry,
    ];

    pub fn label(self) -> &'static str {
        match self {
            ShaderKey::ParticleReset => "particle reset",
            ShaderKey::ParticleUpdate => "particle update",
            ShaderKey::QuadTreeReset => "quadtree reset",
            ShaderKey::QuadTreePopulate => "quadtree populate",
            ShaderKey::QuadTreeGeometry => "quadtree geometry",
        }
    }

    pub fn source(self) -> &'static str {
        match self {
            ShaderKey::ParticleReset => include_str!("../shaders/particle_reset.wgsl"),
            ShaderKey::ParticleUpdate => include_str!("../shaders/particle_update.wgsl"),
            ShaderKey::QuadTreeReset => include_str!("../shaders/quadtree_reset.wgsl"),
            ShaderKey::QuadTreePopulate => include_str!("../shaders/quadtree_populate.wgsl"),
            ShaderKey::QuadTreeGeometry => include_str!("../shaders/quadtree_geometry.wgsl"),
        }
    }

    /// Bind group 0 entries, in binding order
    pub fn bindings(self) -> Vec<wgpu::BindingType> {
        let rw = storage_buffer_read_write();
        let ro = storage_buffer_read_only();
        match self {
            // particles, emitters/faces, counters, uniforms
            ShaderKey::ParticleReset | ShaderKey::ParticleUpdate => vec![rw, ro, rw, uniform()],
            // nodes, tree counters, uniforms
            ShaderKey::QuadTreeReset => vec![rw, rw, uniform()],
            // particles, nodes, tree counters, uniforms
            ShaderKey::QuadTreePopulate => vec![ro, rw, rw, uniform()],
            // nodes, geometry faces, geometry counters, uniforms
            ShaderKey::QuadTreeGeometry => vec![ro, rw, rw, uniform()],
        }
    }
}

/// A compute pipeline and the layout of its only bind group
pub struct ComputeProgram {
    pub key: ShaderKey,
    pub pipeline: wgpu::ComputePipeline,
    pub layout: wgpu::BindGroupLayout,
}

impl ComputeProgram {
    fn new(device: &wgpu::Device, key: ShaderKey) -> Self {
        let layout = compute_layout(device, key.label(), &key.bindings());
        let pipeline = create_compute_pipeline(device, key.label(), key.source(), "main", &layout);
        Self {
            key,
            pipeline,
            layout,
        }
    }
}

pub fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &str,
    shader_source: &str,
    entry_point: &str,
    bind_group_layout: &wgpu::BindGroupLayout,
) -> wgpu::ComputePipeline {
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(shader_source.into()),
    });

    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts: &[bind_group_layout],
        push_constant_ranges: &[],
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&pipeline_layout),
        module: &shader,
        entry_point: Some(entry_point),
        compilation_options: Default::default(),
        cache: None,
    })
}

/// Every program, compiled once per device
pub struct ShaderRegistry {
    programs: [ComputeProgram; 5],
}

impl ShaderRegistry {
    pub fn new(device: &wgpu::Device) -> Self {
        let programs = ShaderKey::ALL.map(|key| ComputeProgram::new(device, key));
        log::debug!("compiled {} compute programs", programs.len());
        Self { programs }
    }

    pub fn get(&self, key: ShaderKey) -> &ComputeProgram {
        &self.programs[key as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WORKGROUP_SIZE;

    #[test]
    fn test_keys_index_their_own_slot() {
        for (i, key) in ShaderKey::ALL.iter().enumerate() {
            assert_eq!(*key as usize, i);
        }
    }

    #[test]
    fn test_sources_match_host_layout() {
        let workgroup = format!("@workgroup_size({})", WORKGROUP_SIZE);
        for key in ShaderKey::ALL {
            let source = key.source();
            assert!(source.contains(&workgroup), "{:?}", key);
            assert!(source.contains("fn main("), "{:?}", key);
            let bindings = key.bindings().len();
            assert!(source.contains(&format!("@binding({})", bindings - 1)), "{:?}", key);
            assert!(!source.contains(&format!("@binding({})", bindings)), "{:?}", key);
        }
    }
}
