use bevy::prelude::*;

/// View frustum as six planes `(normal, d)` with normals pointing inwards:
/// a point `p` is inside a plane when `normal.dot(p) + d >= 0`.
///
/// Plane order is right, left, bottom, top, far, near.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub const NEAR: usize = 5;

    pub fn from_planes(planes: [Vec4; 6]) -> Self {
        let mut planes = planes;
        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }
        Self { planes }
    }

    /// Extract the planes of a combined projection * view matrix.
    pub fn from_view_projection(matrix: &Mat4) -> Self {
        let rows = [matrix.row(0), matrix.row(1), matrix.row(2), matrix.row(3)];
        Self::from_planes([
            rows[3] - rows[0],
            rows[3] + rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[3] - rows[2],
            rows[3] + rows[2],
        ])
    }

    /// A frustum that contains everything; useful for headless rendering.
    pub fn everything() -> Self {
        Self { planes: [Vec4::new(0.0, 0.0, 0.0, f32::MAX); 6] }
    }

    fn distance(plane: Vec4, point: Vec3) -> f32 {
        plane.truncate().dot(point) + plane.w
    }

    /// Returns 0.0 if the sphere is completely outside, otherwise its
    /// distance from the near plane plus the radius.
    pub fn sphere_in_frustum(&self, center: Vec3, radius: f32) -> f32 {
        for plane in &self.planes {
            if Self::distance(*plane, center) <= -radius {
                return 0.0;
            }
        }
        Self::distance(self.planes[Self::NEAR], center) + radius
    }

    /// `false` only if all eight box corners lie behind one plane.
    pub fn box_in_frustum(&self, min: Vec3, max: Vec3) -> bool {
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];
        self.planes
            .iter()
            .all(|plane| corners.iter().any(|&corner| Self::distance(*plane, corner) >= 0.0))
    }
}
