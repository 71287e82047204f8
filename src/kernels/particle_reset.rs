//! Particle reset stage
//!
//! Every inactive slot takes a ticket from the frame's claim counter. Slots
//! holding one of the first `quota` tickets are seeded from emitter
//! `ticket % emitter_count`; the rest stay inactive. Active slots are never
//! touched.

use bytemuck::{Pod, Zeroable};
use std::sync::atomic::Ordering;

use crate::device::{CounterBlock, DeviceArray};
use crate::emitter::EmitterDescriptor;
use crate::particle::Particle;
use crate::quadtree::counters::reset;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ResetUniforms {
    pub max_particles: u32,
    pub quota: u32,
    pub emitter_count: u32,
    pub frame_seed: u32,
}

/// One invocation of the reset stage
pub fn reset_particle(
    id: u32,
    particles: &DeviceArray<Particle>,
    emitters: &[EmitterDescriptor],
    counters: &CounterBlock,
    uniforms: &ResetUniforms,
) {
    let emitter_count = (uniforms.emitter_count as usize).min(emitters.len());
    if id >= uniforms.max_particles || emitter_count == 0 {
        return;
    }
    let index = id as usize;
    if particles.load(index).is_active() {
        return;
    }

    let ticket = counters
        .at(reset::EMITTED_THIS_FRAME)
        .fetch_add(1, Ordering::Relaxed);
    if ticket >= uniforms.quota {
        return;
    }

    let emitter = &emitters[ticket as usize % emitter_count];
    let (position, velocity) = emitter.sample(id, uniforms.frame_seed);
    particles.store(index, Particle::active(position, velocity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::{ParticleEmitter, PointEmitter};

    const LIMIT: u64 = 1 << 20;

    fn run(particles: &DeviceArray<Particle>, emitters: &[EmitterDescriptor], quota: u32) {
        let counters = CounterBlock::new("reset", reset::BLOCK_SIZE, LIMIT).unwrap();
        let uniforms = ResetUniforms {
            max_particles: particles.len() as u32,
            quota,
            emitter_count: emitters.len() as u32,
            frame_seed: 1,
        };
        for id in 0..particles.len() as u32 {
            reset_particle(id, particles, emitters, &counters, &uniforms);
        }
    }

    #[test]
    fn test_activates_at_most_quota() {
        let particles = DeviceArray::<Particle>::zeroed("particles", 10, LIMIT).unwrap();
        let emitters = [PointEmitter::new([0.0, 0.0], 0.0, 0.0).descriptor()];
        run(&particles, &emitters, 4);
        let active = particles.snapshot().iter().filter(|p| p.is_active()).count();
        assert_eq!(active, 4);
    }

    #[test]
    fn test_active_slots_are_untouched() {
        let particles = DeviceArray::<Particle>::zeroed("particles", 3, LIMIT).unwrap();
        let existing = Particle::active([9.0, 9.0], [1.0, 0.0]);
        particles.store(1, existing);
        let emitters = [PointEmitter::new([0.0, 0.0], 0.0, 0.0).descriptor()];
        run(&particles, &emitters, 10);
        let snapshot = particles.snapshot();
        assert_eq!(snapshot[1], existing);
        assert!(snapshot.iter().all(|p| p.is_active()));
    }

    #[test]
    fn test_round_robin_over_emitters() {
        let particles = DeviceArray::<Particle>::zeroed("particles", 4, LIMIT).unwrap();
        let emitters = [
            PointEmitter::new([-1.0, 0.0], 0.0, 0.0).descriptor(),
            PointEmitter::new([1.0, 0.0], 0.0, 0.0).descriptor(),
        ];
        run(&particles, &emitters, 4);
        let left = particles
            .snapshot()
            .iter()
            .filter(|p| p.position_2d() == [-1.0, 0.0])
            .count();
        assert_eq!(left, 2);
    }

    #[test]
    fn test_no_emitters_is_a_no_op() {
        let particles = DeviceArray::<Particle>::zeroed("particles", 4, LIMIT).unwrap();
        run(&particles, &[], 4);
        assert!(particles.snapshot().iter().all(|p| !p.is_active()));
    }
}
