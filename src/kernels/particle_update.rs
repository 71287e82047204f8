//! Particle update stage

use bytemuck::{Pod, Zeroable};
use std::sync::atomic::Ordering;

use crate::device::{CounterBlock, DeviceArray};
use crate::particle::Particle;
use crate::polygon::{contains_point, PolygonFace};
use crate::quadtree::counters::update;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct UpdateUniforms {
    pub max_particles: u32,
    pub face_count: u32,
    pub delta_time_sec: f32,
    pub _padding: u32,
}

/// Move one particle, retire it if it left the region, count it otherwise
pub fn update_particle(
    id: u32,
    particles: &DeviceArray<Particle>,
    faces: &[PolygonFace],
    counters: &CounterBlock,
    uniforms: &UpdateUniforms,
) {
    if id >= uniforms.max_particles {
        return;
    }
    let index = id as usize;
    let mut particle = particles.load(index);
    if !particle.is_active() {
        return;
    }

    particle.integrate(uniforms.delta_time_sec);
    let face_count = (uniforms.face_count as usize).min(faces.len());
    if contains_point(&faces[..face_count], particle.position_2d()) {
        counters
            .at(update::ACTIVE_PARTICLES)
            .fetch_add(1, Ordering::Relaxed);
    } else {
        particle.is_active = 0;
    }
    particles.store(index, particle);
}
