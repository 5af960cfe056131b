//! Triangle primitive and triangle/box overlap tests
//!
//! The 3D overlap test is the separating-axis test of Akenine-Möller:
//! three box face normals, the triangle normal and the nine
//! edge-cross-axis directions. Touching counts as overlapping, which is
//! what conservative voxelization needs.

use glam::{Vec2, Vec3};

use super::aabb::Aabb;

/// Squared length below which a separating axis is treated as degenerate
const AXIS_EPSILON: f32 = 1e-12;

/// A triangle given by its three corners
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub a: Vec3,
    pub b: Vec3,
    pub c: Vec3,
}

impl Triangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3) -> Self {
        Self { a, b, c }
    }

    /// Unnormalized normal, length equals twice the area
    pub fn scaled_normal(&self) -> Vec3 {
        (self.b - self.a).cross(self.c - self.a)
    }

    pub fn area(&self) -> f32 {
        self.scaled_normal().length() * 0.5
    }

    /// True for zero-area (collinear or coincident) triangles and non-finite input
    pub fn is_degenerate(&self) -> bool {
        let n = self.scaled_normal();
        !n.is_finite() || n.length_squared() <= f32::EPSILON * f32::EPSILON
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::from_points([self.a, self.b, self.c])
    }

    /// Index (0=x, 1=y, 2=z) of the largest normal component
    pub fn dominant_axis(&self) -> usize {
        let n = self.scaled_normal().abs();
        if n.x >= n.y && n.x >= n.z {
            0
        } else if n.y >= n.z {
            1
        } else {
            2
        }
    }

    /// Separating-axis test against the box `center ± half`
    pub fn overlaps_box(&self, center: Vec3, half: Vec3) -> bool {
        let v0 = self.a - center;
        let v1 = self.b - center;
        let v2 = self.c - center;

        // Box face normals
        let min = v0.min(v1).min(v2);
        let max = v0.max(v1).max(v2);
        if min.x > half.x || max.x < -half.x
            || min.y > half.y || max.y < -half.y
            || min.z > half.z || max.z < -half.z
        {
            return false;
        }

        // Triangle plane
        let edges = [v1 - v0, v2 - v1, v0 - v2];
        let normal = edges[0].cross(edges[1]);
        let r = half.dot(normal.abs());
        if normal.dot(v0).abs() > r {
            return false;
        }

        // Edge x axis cross products
        for edge in edges {
            for axis in [Vec3::X, Vec3::Y, Vec3::Z] {
                let n = axis.cross(edge);
                if n.length_squared() < AXIS_EPSILON {
                    continue;
                }
                let p0 = v0.dot(n);
                let p1 = v1.dot(n);
                let p2 = v2.dot(n);
                let r = half.dot(n.abs());
                if p0.min(p1).min(p2) > r || p0.max(p1).max(p2) < -r {
                    return false;
                }
            }
        }

        true
    }

    /// Barycentric weights of `p` projected onto the triangle plane.
    ///
    /// Weights are clamped to the triangle so points off the triangle map to
    /// the nearest edge. Degenerate triangles return the first corner.
    pub fn barycentric(&self, p: Vec3) -> Vec3 {
        let e0 = self.b - self.a;
        let e1 = self.c - self.a;
        let ep = p - self.a;
        let d00 = e0.dot(e0);
        let d01 = e0.dot(e1);
        let d11 = e1.dot(e1);
        let d20 = ep.dot(e0);
        let d21 = ep.dot(e1);
        let denom = d00 * d11 - d01 * d01;
        if denom.abs() <= f32::EPSILON {
            return Vec3::X;
        }
        let v = (d11 * d20 - d01 * d21) / denom;
        let w = (d00 * d21 - d01 * d20) / denom;
        let weights = Vec3::new(1.0 - v - w, v, w).max(Vec3::ZERO);
        let sum = weights.element_sum();
        if sum > 0.0 { weights / sum } else { Vec3::X }
    }
}

/// Separating-axis test of a 2D triangle against the square `center ± half`
pub fn triangle_overlaps_square(tri: &[Vec2; 3], center: Vec2, half: f32) -> bool {
    let min = tri[0].min(tri[1]).min(tri[2]) - center;
    let max = tri[0].max(tri[1]).max(tri[2]) - center;
    if min.x > half || max.x < -half || min.y > half || max.y < -half {
        return false;
    }

    for i in 0..3 {
        let edge = tri[(i + 1) % 3] - tri[i];
        let n = edge.perp();
        if n.length_squared() < AXIS_EPSILON {
            continue;
        }
        let c = center.dot(n);
        let p0 = tri[0].dot(n) - c;
        let p1 = tri[1].dot(n) - c;
        let p2 = tri[2].dot(n) - c;
        let r = half * (n.x.abs() + n.y.abs());
        if p0.min(p1).min(p2) > r || p0.max(p1).max(p2) < -r {
            return false;
        }
    }

    true
}
