//! Confinement polygon
//!
//! The region is a convex polygon stored as directed faces with outward
//! normals. Faces are wound counter-clockwise (y up), so the outward normal of
//! an edge is the edge direction rotated by -90 degrees. A point is inside when
//! its signed distance to every face is zero or negative.

use bytemuck::{Pod, Zeroable};
use cgmath::{InnerSpace, Matrix4, Vector2, Vector4};

use crate::quadtree::NodeBounds;

/// One end of a face: a position (w = 1) and the face normal (w = 0).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct FaceVertex {
    pub position: [f32; 4],
    pub normal: [f32; 4],
}

/// A directed boundary edge, 64 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PolygonFace {
    pub start: FaceVertex,
    pub end: FaceVertex,
}

fn rotate_neg_90(v: Vector2<f32>) -> Vector2<f32> {
    Vector2::new(v.y, -v.x)
}

impl PolygonFace {
    /// Build a face from a counter-clockwise edge
    pub fn from_edge(start: [f32; 2], end: [f32; 2]) -> Self {
        let direction = Vector2::new(end[0] - start[0], end[1] - start[1]);
        let normal = if direction.magnitude2() > 0.0 {
            rotate_neg_90(direction).normalize()
        } else {
            Vector2::new(0.0, 0.0)
        };
        let normal = [normal.x, normal.y, 0.0, 0.0];
        Self {
            start: FaceVertex {
                position: [start[0], start[1], 0.0, 1.0],
                normal,
            },
            end: FaceVertex {
                position: [end[0], end[1], 0.0, 1.0],
                normal,
            },
        }
    }

    /// Signed distance of `point` from the face line, positive outside
    #[inline]
    pub fn signed_distance(&self, point: [f32; 2]) -> f32 {
        let dx = point[0] - self.start.position[0];
        let dy = point[1] - self.start.position[1];
        dx * self.start.normal[0] + dy * self.start.normal[1]
    }

    pub fn is_outside(&self, point: [f32; 2]) -> bool {
        self.signed_distance(point) > 0.0
    }

    fn transformed(&self, transform: &Matrix4<f32>) -> Self {
        Self {
            start: self.start.transformed(transform),
            end: self.end.transformed(transform),
        }
    }
}

impl FaceVertex {
    fn transformed(&self, transform: &Matrix4<f32>) -> Self {
        let p = transform * Vector4::new(self.position[0], self.position[1], 0.0, 1.0);
        let n = transform * Vector4::new(self.normal[0], self.normal[1], 0.0, 0.0);
        let n = Vector2::new(n.x, n.y);
        let n = if n.magnitude2() > 0.0 { n.normalize() } else { n };
        Self {
            position: [p.x, p.y, 0.0, 1.0],
            normal: [n.x, n.y, 0.0, 0.0],
        }
    }
}

/// Inclusive containment against a face set. Points on the boundary are inside.
pub fn contains_point(faces: &[PolygonFace], point: [f32; 2]) -> bool {
    !faces.iter().any(|face| face.is_outside(point))
}

/// Canonical faces plus the transformed copy the compute stages see
#[derive(Clone, Debug)]
pub struct PolygonRegion {
    canonical: Vec<PolygonFace>,
    transformed: Vec<PolygonFace>,
}

impl PolygonRegion {
    pub fn new(faces: Vec<PolygonFace>) -> Self {
        Self {
            transformed: faces.clone(),
            canonical: faces,
        }
    }

    /// Build a closed region from counter-clockwise vertices
    pub fn from_vertices(vertices: &[[f32; 2]]) -> Self {
        let faces = (0..vertices.len())
            .map(|i| PolygonFace::from_edge(vertices[i], vertices[(i + 1) % vertices.len()]))
            .collect();
        Self::new(faces)
    }

    /// Four-sided confinement region of the demo scene
    pub fn demo() -> Self {
        Self::new(demo_quad_faces())
    }

    /// Recompute the transformed faces from the canonical set
    pub fn set_transform(&mut self, transform: &Matrix4<f32>) {
        self.transformed = self
            .canonical
            .iter()
            .map(|face| face.transformed(transform))
            .collect();
    }

    pub fn faces(&self) -> &[PolygonFace] {
        &self.transformed
    }

    pub fn canonical_faces(&self) -> &[PolygonFace] {
        &self.canonical
    }

    pub fn contains(&self, point: [f32; 2]) -> bool {
        contains_point(&self.transformed, point)
    }

    /// Axis-aligned bounding box of the transformed faces
    pub fn bounds(&self) -> Option<NodeBounds> {
        let mut points = self
            .transformed
            .iter()
            .flat_map(|face| [face.start.position, face.end.position]);
        let first = points.next()?;
        let mut bounds = NodeBounds {
            left: first[0],
            top: first[1],
            right: first[0],
            bottom: first[1],
        };
        for p in points {
            bounds.left = bounds.left.min(p[0]);
            bounds.right = bounds.right.max(p[0]);
            bounds.top = bounds.top.max(p[1]);
            bounds.bottom = bounds.bottom.min(p[1]);
        }
        Some(bounds)
    }
}

/// Faces of the quad used by the demo scene, wound counter-clockwise
pub fn demo_quad_faces() -> Vec<PolygonFace> {
    let corners = [[-0.5, -0.75], [0.5, -0.75], [0.75, 0.5], [-0.75, 0.5]];
    (0..corners.len())
        .map(|i| PolygonFace::from_edge(corners[i], corners[(i + 1) % corners.len()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{Deg, Vector3};

    fn unit_square() -> PolygonRegion {
        PolygonRegion::from_vertices(&[[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]])
    }

    #[test]
    fn test_face_record_size() {
        assert_eq!(std::mem::size_of::<FaceVertex>(), 32);
        assert_eq!(std::mem::size_of::<PolygonFace>(), 64);
    }

    #[test]
    fn test_normals_point_outward() {
        let region = unit_square();
        let bottom = region.faces()[0];
        assert_eq!(&bottom.start.normal[..2], &[0.0, -1.0]);
        let right = region.faces()[1];
        assert_eq!(&right.start.normal[..2], &[1.0, 0.0]);
    }

    #[test]
    fn test_boundary_counts_as_inside() {
        let region = unit_square();
        assert!(region.contains([0.0, 0.0]));
        assert!(region.contains([1.0, 0.0]));
        assert!(region.contains([-1.0, -1.0]));
        assert!(!region.contains([1.0001, 0.0]));
        assert!(!region.contains([0.0, -1.5]));
    }

    #[test]
    fn test_demo_quad_contains_origin() {
        let region = PolygonRegion::demo();
        assert_eq!(region.faces().len(), 4);
        assert!(region.contains([0.0, 0.0]));
        assert!(!region.contains([0.9, 0.9]));
    }

    #[test]
    fn test_transform_moves_faces_not_canonical() {
        let mut region = unit_square();
        region.set_transform(&Matrix4::from_translation(Vector3::new(5.0, 0.0, 0.0)));
        assert!(region.contains([5.0, 0.0]));
        assert!(!region.contains([0.0, 0.0]));
        assert_eq!(region.canonical_faces()[0].start.position[0], -1.0);
    }

    #[test]
    fn test_rotation_keeps_normals_unit_length() {
        let mut region = PolygonRegion::demo();
        region.set_transform(&Matrix4::from_angle_z(Deg(45.0)));
        for face in region.faces() {
            let n = Vector2::new(face.start.normal[0], face.start.normal[1]);
            assert!((n.magnitude() - 1.0).abs() < 1e-5);
        }
        assert!(region.contains([0.0, 0.0]));
    }

    #[test]
    fn test_bounds_cover_all_vertices() {
        let bounds = PolygonRegion::demo().bounds().unwrap();
        assert_eq!(bounds.left, -0.75);
        assert_eq!(bounds.right, 0.75);
        assert_eq!(bounds.top, 0.5);
        assert_eq!(bounds.bottom, -0.75);
        assert!(PolygonRegion::new(Vec::new()).bounds().is_none());
    }
}
