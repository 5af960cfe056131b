//! Triangle meshes and procedural primitives
//!
//! A mesh owns one vertex pool and one index buffer. Submeshes are index
//! ranges into it, each with its own material.

use glam::{Vec2, Vec3};

use crate::core::{Error, Result};
use crate::math::Aabb;

use super::registry::MaterialId;

/// A range of the index buffer drawn with one material.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Submesh {
    /// First index in the mesh index buffer
    pub base_index: u32,
    /// Number of indices, a multiple of 3
    pub index_count: u32,
    /// Added to every index of this submesh
    pub base_vertex: u32,
    pub material: MaterialId,
}

impl Submesh {
    pub fn triangle_count(&self) -> u32 {
        self.index_count / 3
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub name: String,
    pub positions: Vec<Vec3>,
    /// Per-vertex texture coordinates, same length as `positions` when present
    pub uvs: Option<Vec<Vec2>>,
    pub indices: Vec<u32>,
    pub submeshes: Vec<Submesh>,
}

impl Mesh {
    /// Mesh with a single submesh covering all indices
    pub fn new(name: impl Into<String>, positions: Vec<Vec3>, indices: Vec<u32>, material: MaterialId) -> Self {
        let index_count = indices.len() as u32;
        Self {
            name: name.into(),
            positions,
            uvs: None,
            indices,
            submeshes: vec![Submesh {
                base_index: 0,
                index_count,
                base_vertex: 0,
                material,
            }],
        }
    }

    pub fn with_uvs(mut self, uvs: Vec<Vec2>) -> Self {
        self.uvs = Some(uvs);
        self
    }

    /// Append a submesh; ranges are checked by [`validate`](Self::validate)
    pub fn add_submesh(&mut self, submesh: Submesh) -> u32 {
        self.submeshes.push(submesh);
        (self.submeshes.len() - 1) as u32
    }

    pub fn triangle_count(&self) -> u32 {
        self.submeshes.iter().map(Submesh::triangle_count).sum()
    }

    /// Vertex indices of a triangle, `first_index` relative to the submesh
    pub fn triangle_indices(&self, submesh: u32, first_index: u32) -> Option<[u32; 3]> {
        let sub = self.submeshes.get(submesh as usize)?;
        if first_index + 3 > sub.index_count {
            return None;
        }
        let start = (sub.base_index + first_index) as usize;
        let idx = self.indices.get(start..start + 3)?;
        Some([
            idx[0] + sub.base_vertex,
            idx[1] + sub.base_vertex,
            idx[2] + sub.base_vertex,
        ])
    }

    pub fn local_bounds(&self) -> Aabb {
        Aabb::from_points(self.positions.iter().copied())
    }

    /// Check index ranges and UV length
    pub fn validate(&self) -> Result<()> {
        let err = |msg: String| Err(Error::InvalidMesh(format!("{}: {}", self.name, msg)));

        if let Some(uvs) = &self.uvs {
            if uvs.len() != self.positions.len() {
                return err(format!("{} uvs for {} positions", uvs.len(), self.positions.len()));
            }
        }
        for (i, sub) in self.submeshes.iter().enumerate() {
            if sub.index_count % 3 != 0 {
                return err(format!("submesh {} index count {} is not a multiple of 3", i, sub.index_count));
            }
            let end = sub.base_index as usize + sub.index_count as usize;
            let Some(range) = self.indices.get(sub.base_index as usize..end) else {
                return err(format!("submesh {} range ends at {} past {} indices", i, end, self.indices.len()));
            };
            if let Some(bad) = range
                .iter()
                .find(|&&idx| idx as usize + sub.base_vertex as usize >= self.positions.len())
            {
                return err(format!(
                    "submesh {} references vertex {}",
                    i,
                    *bad as usize + sub.base_vertex as usize
                ));
            }
        }
        Ok(())
    }

    /// Single triangle
    pub fn triangle(a: Vec3, b: Vec3, c: Vec3, material: MaterialId) -> Self {
        Self::new("triangle", vec![a, b, c], vec![0, 1, 2], material)
            .with_uvs(vec![Vec2::ZERO, Vec2::X, Vec2::Y])
    }

    /// Axis-aligned box centered at the origin, 24 vertices with per-face UVs
    pub fn cuboid(half_extents: Vec3, material: MaterialId) -> Self {
        let h = half_extents;
        let mut positions = Vec::with_capacity(24);
        let mut uvs = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for axis in 0..3 {
            for sign in [-1.0f32, 1.0] {
                let mut normal = Vec3::ZERO;
                normal[axis] = sign;
                let mut u = Vec3::ZERO;
                u[(axis + 1) % 3] = 1.0;
                let mut v = Vec3::ZERO;
                v[(axis + 2) % 3] = 1.0;

                let base = positions.len() as u32;
                for (du, dv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                    positions.push((normal + u * du + v * dv) * h);
                    uvs.push(Vec2::new((du + 1.0) * 0.5, (dv + 1.0) * 0.5));
                }
                if sign > 0.0 {
                    indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
                } else {
                    indices.extend_from_slice(&[base, base + 2, base + 1, base, base + 3, base + 2]);
                }
            }
        }

        Self::new("cuboid", positions, indices, material).with_uvs(uvs)
    }

    /// Latitude/longitude sphere centered at the origin.
    ///
    /// Pole rows would produce zero-area triangles, so they are left out.
    pub fn uv_sphere(radius: f32, segments: u32, rings: u32, material: MaterialId) -> Self {
        let segments = segments.max(3);
        let rings = rings.max(2);
        let mut positions = Vec::new();
        let mut uvs = Vec::new();

        for r in 0..=rings {
            let v = r as f32 / rings as f32;
            let theta = v * std::f32::consts::PI;
            for s in 0..=segments {
                let u = s as f32 / segments as f32;
                let phi = u * std::f32::consts::TAU;
                positions.push(Vec3::new(
                    theta.sin() * phi.cos(),
                    theta.cos(),
                    theta.sin() * phi.sin(),
                ) * radius);
                uvs.push(Vec2::new(u, v));
            }
        }

        let stride = segments + 1;
        let mut indices = Vec::new();
        for r in 0..rings {
            for s in 0..segments {
                let i0 = r * stride + s;
                let i1 = i0 + 1;
                let i2 = i0 + stride;
                let i3 = i2 + 1;
                if r > 0 {
                    indices.extend_from_slice(&[i0, i2, i1]);
                }
                if r + 1 < rings {
                    indices.extend_from_slice(&[i1, i2, i3]);
                }
            }
        }

        Self::new("uv_sphere", positions, indices, material).with_uvs(uvs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAT: MaterialId = MaterialId(0);

    #[test]
    fn test_cuboid() {
        let mesh = Mesh::cuboid(Vec3::new(1.0, 2.0, 3.0), MAT);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(mesh.validate().is_ok());
        let b = mesh.local_bounds();
        assert_eq!(b.min, Vec3::new(-1.0, -2.0, -3.0));
        assert_eq!(b.max, Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_uv_sphere() {
        let mesh = Mesh::uv_sphere(2.0, 16, 8, MAT);
        assert!(mesh.validate().is_ok());
        // Two triangles per quad minus one per pole quad
        assert_eq!(mesh.triangle_count(), 16 * 8 * 2 - 2 * 16);
        assert!(mesh.positions.iter().all(|p| (p.length() - 2.0).abs() < 1e-4));
    }

    #[test]
    fn test_triangle_indices_with_base_vertex() {
        let mut mesh = Mesh::new(
            "two",
            vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE, Vec3::NEG_X],
            vec![0, 1, 2, 0, 1, 2],
            MAT,
        );
        mesh.submeshes[0].index_count = 3;
        mesh.add_submesh(Submesh {
            base_index: 3,
            index_count: 3,
            base_vertex: 3,
            material: MaterialId(1),
        });
        assert!(mesh.validate().is_ok());
        assert_eq!(mesh.triangle_indices(0, 0), Some([0, 1, 2]));
        assert_eq!(mesh.triangle_indices(1, 0), Some([3, 4, 5]));
        assert_eq!(mesh.triangle_indices(1, 3), None);
        assert_eq!(mesh.triangle_indices(2, 0), None);
    }

    #[test]
    fn test_validate_rejects() {
        let mut mesh = Mesh::new("bad", vec![Vec3::ZERO, Vec3::X], vec![0, 1, 2], MAT);
        assert!(matches!(mesh.validate(), Err(Error::InvalidMesh(_))));

        mesh.positions.push(Vec3::Y);
        assert!(mesh.validate().is_ok());
        mesh.submeshes[0].index_count = 4;
        assert!(mesh.validate().is_err());

        let mesh = Mesh::triangle(Vec3::ZERO, Vec3::X, Vec3::Y, MAT).with_uvs(vec![Vec2::ZERO]);
        assert!(mesh.validate().is_err());
    }
}
