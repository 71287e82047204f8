use cgmath::{Matrix4, Vector4};

use super::{EmitterDescriptor, ParticleEmitter, EMITTER_KIND_POINT};

/// Emits from a single point in a random direction
#[derive(Clone, Debug)]
pub struct PointEmitter {
    position: [f32; 2],
    transformed: [f32; 2],
    pub min_speed: f32,
    pub max_speed: f32,
}

impl PointEmitter {
    pub fn new(position: [f32; 2], min_speed: f32, max_speed: f32) -> Self {
        Self {
            position,
            transformed: position,
            min_speed,
            max_speed,
        }
    }

    pub fn position(&self) -> [f32; 2] {
        self.transformed
    }
}

impl ParticleEmitter for PointEmitter {
    fn set_transform(&mut self, transform: &Matrix4<f32>) {
        let p = transform * Vector4::new(self.position[0], self.position[1], 0.0, 1.0);
        self.transformed = [p.x, p.y];
    }

    fn descriptor(&self) -> EmitterDescriptor {
        EmitterDescriptor {
            origin: [self.transformed[0], self.transformed[1], 0.0, 1.0],
            kind: EMITTER_KIND_POINT,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            ..Default::default()
        }
    }
}
