use cgmath::{InnerSpace, Matrix4, Vector2, Vector4};

use super::{EmitterDescriptor, ParticleEmitter, EMITTER_KIND_BAR};

/// Emits from a random point along a segment, all in one direction
#[derive(Clone, Debug)]
pub struct BarEmitter {
    start: [f32; 2],
    end: [f32; 2],
    emit_direction: [f32; 2],
    transformed: ([f32; 2], [f32; 2], [f32; 2]),
    pub min_speed: f32,
    pub max_speed: f32,
}

fn unit(v: [f32; 2]) -> [f32; 2] {
    let v = Vector2::new(v[0], v[1]);
    if v.magnitude2() > 0.0 {
        let n = v.normalize();
        [n.x, n.y]
    } else {
        [0.0, 0.0]
    }
}

impl BarEmitter {
    pub fn new(
        start: [f32; 2],
        end: [f32; 2],
        emit_direction: [f32; 2],
        min_speed: f32,
        max_speed: f32,
    ) -> Self {
        let emit_direction = unit(emit_direction);
        Self {
            start,
            end,
            emit_direction,
            transformed: (start, end, emit_direction),
            min_speed,
            max_speed,
        }
    }

    /// World-space start, end and emit direction
    pub fn segment(&self) -> ([f32; 2], [f32; 2], [f32; 2]) {
        self.transformed
    }
}

impl ParticleEmitter for BarEmitter {
    fn set_transform(&mut self, transform: &Matrix4<f32>) {
        let point = |p: [f32; 2]| {
            let v = transform * Vector4::new(p[0], p[1], 0.0, 1.0);
            [v.x, v.y]
        };
        let d = transform * Vector4::new(self.emit_direction[0], self.emit_direction[1], 0.0, 0.0);
        self.transformed = (point(self.start), point(self.end), unit([d.x, d.y]));
    }

    fn descriptor(&self) -> EmitterDescriptor {
        let (start, end, direction) = self.transformed;
        EmitterDescriptor {
            origin: [start[0], start[1], 0.0, 1.0],
            end: [end[0], end[1], 0.0, 1.0],
            direction: [direction[0], direction[1], 0.0, 0.0],
            kind: EMITTER_KIND_BAR,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
            _padding: 0,
        }
    }
}
