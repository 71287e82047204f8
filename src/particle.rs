//! Particle record shared by every compute stage

use bytemuck::{Pod, Zeroable};

/// One particle slot, 48 bytes.
///
/// Position and velocity use the first two components of a four component
/// vector so the record has the same layout on the host and in WGSL. Slots
/// are recycled in place; an inactive slot keeps stale motion state until the
/// reset stage overwrites it.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Particle {
    pub position: [f32; 4],
    pub velocity: [f32; 4],
    pub is_active: u32,
    pub _padding: [u32; 3],
}

impl Particle {
    pub fn active(position: [f32; 2], velocity: [f32; 2]) -> Self {
        Self {
            position: [position[0], position[1], 0.0, 1.0],
            velocity: [velocity[0], velocity[1], 0.0, 0.0],
            is_active: 1,
            _padding: [0; 3],
        }
    }

    pub fn is_active(&self) -> bool {
        self.is_active != 0
    }

    pub fn position_2d(&self) -> [f32; 2] {
        [self.position[0], self.position[1]]
    }

    pub fn velocity_2d(&self) -> [f32; 2] {
        [self.velocity[0], self.velocity[1]]
    }

    /// Advance the position by one explicit Euler step
    pub fn integrate(&mut self, delta_time_sec: f32) {
        self.position[0] += self.velocity[0] * delta_time_sec;
        self.position[1] += self.velocity[1] * delta_time_sec;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_size() {
        assert_eq!(std::mem::size_of::<Particle>(), 48);
        assert_eq!(std::mem::offset_of!(Particle, velocity), 16);
        assert_eq!(std::mem::offset_of!(Particle, is_active), 32);
    }

    #[test]
    fn test_zeroed_particle_is_inactive() {
        let particle = Particle::zeroed();
        assert!(!particle.is_active());
    }

    #[test]
    fn test_integrate_moves_along_velocity() {
        let mut particle = Particle::active([0.0, 0.0], [2.0, -1.0]);
        particle.integrate(0.5);
        assert_eq!(particle.position_2d(), [1.0, -0.5]);
        assert_eq!(particle.velocity_2d(), [2.0, -1.0]);
    }
}
