//! Confinement region plus emitters, moved together by one transform

use cgmath::{Deg, Matrix4, SquareMatrix, Vector3};

use crate::emitter::{BarEmitter, EmitterDescriptor, ParticleEmitter, PointEmitter};
use crate::polygon::{PolygonFace, PolygonRegion};
use crate::quadtree::NodeBounds;

/// Grid bounds used when neither the config nor the region gives any
pub const FALLBACK_TREE_BOUNDS: NodeBounds = NodeBounds {
    left: -1.0,
    top: 1.0,
    right: 1.0,
    bottom: -1.0,
};

pub struct Scene {
    pub region: PolygonRegion,
    emitters: Vec<Box<dyn ParticleEmitter>>,
    transform: Matrix4<f32>,
}

impl Scene {
    pub fn new(region: PolygonRegion, emitters: Vec<Box<dyn ParticleEmitter>>) -> Self {
        Self {
            region,
            emitters,
            transform: Matrix4::identity(),
        }
    }

    /// The demo quad with four point and four bar emitters, rotated by 45°
    pub fn demo() -> Self {
        let mut scene = Self::new(PolygonRegion::demo(), demo_emitters());
        scene.set_transform(demo_transform());
        scene
    }

    pub fn add_emitter(&mut self, mut emitter: Box<dyn ParticleEmitter>) {
        emitter.set_transform(&self.transform);
        self.emitters.push(emitter);
    }

    pub fn emitter_count(&self) -> usize {
        self.emitters.len()
    }

    pub fn transform(&self) -> Matrix4<f32> {
        self.transform
    }

    /// Re-derive the region faces and emitter positions from their
    /// canonical values
    pub fn set_transform(&mut self, transform: Matrix4<f32>) {
        self.transform = transform;
        self.region.set_transform(&transform);
        for emitter in &mut self.emitters {
            emitter.set_transform(&transform);
        }
    }

    pub fn faces(&self) -> &[PolygonFace] {
        self.region.faces()
    }

    pub fn descriptors(&self) -> Vec<EmitterDescriptor> {
        self.emitters.iter().map(|e| e.descriptor()).collect()
    }

    /// Bounds of the initial grid: the override when given, else the
    /// region's bounding box
    pub fn tree_bounds(&self, configured: Option<NodeBounds>) -> NodeBounds {
        configured
            .or_else(|| self.region.bounds())
            .unwrap_or(FALLBACK_TREE_BOUNDS)
    }
}

pub fn demo_emitters() -> Vec<Box<dyn ParticleEmitter>> {
    let points = [[-0.4, -0.5], [0.4, -0.5], [0.5, 0.25], [-0.5, 0.25]]
        .into_iter()
        .map(|p| Box::new(PointEmitter::new(p, 0.3, 0.5)) as Box<dyn ParticleEmitter>);

    let bars = [
        ([-0.1, -0.6], [0.1, -0.6], [0.0, 1.0]),
        ([0.6, -0.1], [0.6, 0.1], [-1.0, 0.0]),
        ([0.1, 0.4], [-0.1, 0.4], [0.0, -1.0]),
        ([-0.6, 0.1], [-0.6, -0.1], [1.0, 0.0]),
    ]
    .into_iter()
    .map(|(start, end, direction)| {
        Box::new(BarEmitter::new(start, end, direction, 0.1, 0.6)) as Box<dyn ParticleEmitter>
    });

    points.chain(bars).collect()
}

pub fn demo_transform() -> Matrix4<f32> {
    Matrix4::from_angle_z(Deg(45.0)) * Matrix4::from_translation(Vector3::new(-0.1, -0.05, 0.0))
}
