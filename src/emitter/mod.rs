//! Particle emitters
//!
//! Emitters are host-side descriptions of where new particles appear. Each
//! frame they are transformed and flattened into [`EmitterDescriptor`]
//! records. The reset stage samples those records on the device with a hash
//! of the slot index and the frame seed, so the host never generates
//! per-particle state.

pub mod bar;
pub mod point;

use bytemuck::{Pod, Zeroable};
use cgmath::Matrix4;
use std::f32::consts::TAU;

use crate::particle::Particle;

pub use bar::BarEmitter;
pub use point::PointEmitter;

pub const EMITTER_KIND_POINT: u32 = 0;
pub const EMITTER_KIND_BAR: u32 = 1;

/// Flat emitter record read by the reset stage, 64 bytes.
///
/// Point emitters use `origin` only. Bar emitters emit from the segment
/// `origin..end` along `direction`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct EmitterDescriptor {
    pub origin: [f32; 4],
    pub end: [f32; 4],
    pub direction: [f32; 4],
    pub kind: u32,
    pub min_speed: f32,
    pub max_speed: f32,
    pub _padding: u32,
}

/// PCG-style integer hash
#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input.wrapping_mul(747_796_405).wrapping_add(2_891_336_453);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(277_803_737);
    (word >> 22) ^ word
}

/// Map a hash to [0, 1) using its top 24 bits
#[inline]
pub fn unit_float(hash: u32) -> f32 {
    (hash >> 8) as f32 / 16_777_216.0
}

impl EmitterDescriptor {
    /// Deterministic position and velocity for one slot in one frame
    pub fn sample(&self, slot: u32, frame_seed: u32) -> ([f32; 2], [f32; 2]) {
        let h1 = pcg_hash(slot ^ pcg_hash(frame_seed));
        let h2 = pcg_hash(h1);
        let r1 = unit_float(h1);
        let r2 = unit_float(h2);
        let speed = self.min_speed + (self.max_speed - self.min_speed) * r2;

        match self.kind {
            EMITTER_KIND_BAR => {
                let position = [
                    self.origin[0] + (self.end[0] - self.origin[0]) * r1,
                    self.origin[1] + (self.end[1] - self.origin[1]) * r1,
                ];
                let velocity = [self.direction[0] * speed, self.direction[1] * speed];
                (position, velocity)
            }
            _ => {
                let angle = TAU * r1;
                let position = [self.origin[0], self.origin[1]];
                let velocity = [angle.cos() * speed, angle.sin() * speed];
                (position, velocity)
            }
        }
    }
}

/// Interface the simulation uses to feed the reset stage
pub trait ParticleEmitter: Send + Sync {
    /// Recompute world-space emission geometry from the canonical one
    fn set_transform(&mut self, transform: &Matrix4<f32>);

    /// Flattened record for the device
    fn descriptor(&self) -> EmitterDescriptor;

    /// Host-side sample, identical to what the reset stage computes
    fn sample(&self, slot: u32, frame_seed: u32) -> Particle {
        let (position, velocity) = self.descriptor().sample(slot, frame_seed);
        Particle::active(position, velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_size() {
        assert_eq!(std::mem::size_of::<EmitterDescriptor>(), 64);
    }

    #[test]
    fn test_hash_is_deterministic_and_spreads() {
        assert_eq!(pcg_hash(42), pcg_hash(42));
        assert_ne!(pcg_hash(0), pcg_hash(1));
    }

    #[test]
    fn test_unit_float_range() {
        assert_eq!(unit_float(0), 0.0);
        assert!(unit_float(u32::MAX) < 1.0);
    }
}
