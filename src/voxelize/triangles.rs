//! Flattened triangle list for one cycle
//!
//! Instances and their submeshes are laid end to end with a prefix sum so a
//! single global index addresses any triangle in the scene. The batch list
//! and the per-instance transforms are reused between cycles.

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec2, Vec3};

use crate::math::Triangle;
use crate::scene::{MaterialId, MeshId, SceneRegistry, SceneView};
use crate::voxel::VolumeLayout;

/// Compact reference to one triangle of one instance - 16 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct TriangleRef {
    pub mesh: u32,
    pub submesh: u32,
    /// Offset of the first index relative to the submesh's `base_index`
    pub first_index: u32,
    pub instance: u32,
}

/// A triangle resolved into voxel space
#[derive(Clone, Copy, Debug)]
pub struct VoxelTriangle {
    pub triangle: Triangle,
    pub uvs: Option<[Vec2; 3]>,
    pub material: MaterialId,
}

impl VoxelTriangle {
    /// Albedo at voxel-space point `p`.
    ///
    /// Textured materials are sampled at the barycentric UV of `p`; flat ones
    /// skip the interpolation.
    pub fn color_at(&self, registry: &SceneRegistry, p: Vec3) -> [u8; 3] {
        let textured = registry
            .material(self.material)
            .is_some_and(|m| m.albedo.is_some());
        let uv = match (textured, self.uvs) {
            (true, Some(uvs)) => {
                let w = self.triangle.barycentric(p);
                Some(uvs[0] * w.x + uvs[1] * w.y + uvs[2] * w.z)
            }
            _ => None,
        };
        registry.albedo(self.material, uv)
    }
}

#[derive(Clone, Copy, Debug)]
struct Batch {
    /// Global index of the batch's first triangle
    start: u32,
    triangles: u32,
    instance: u32,
    mesh: MeshId,
    submesh: u32,
}

#[derive(Debug, Default)]
pub struct TriangleTable {
    batches: Vec<Batch>,
    voxel_from_object: Vec<Mat4>,
    total: u32,
}

impl TriangleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Re-flatten `scene` for voxel space of `layout`
    pub fn rebuild(&mut self, scene: &SceneView<'_>, layout: &VolumeLayout) {
        self.batches.clear();
        self.voxel_from_object.clear();

        let world_to_voxel = layout.world_to_voxel_matrix();
        let mut start = 0u32;
        for (instance, inst) in scene.instances.iter().enumerate() {
            self.voxel_from_object.push(world_to_voxel * inst.transform);
            let Some(mesh) = scene.registry.mesh(inst.mesh) else {
                log::warn!("Instance {} references unknown mesh {}", instance, inst.mesh.0);
                continue;
            };
            for (submesh, sub) in mesh.submeshes.iter().enumerate() {
                let triangles = sub.triangle_count();
                if triangles == 0 {
                    continue;
                }
                self.batches.push(Batch {
                    start,
                    triangles,
                    instance: instance as u32,
                    mesh: inst.mesh,
                    submesh: submesh as u32,
                });
                start += triangles;
            }
        }
        self.total = start;
    }

    /// Triangles in the table
    pub fn len(&self) -> u32 {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }

    /// Reference for global triangle `index`
    pub fn get(&self, index: u32) -> Option<TriangleRef> {
        if index >= self.total {
            return None;
        }
        let i = self
            .batches
            .partition_point(|b| b.start + b.triangles <= index);
        let batch = self.batches.get(i)?;
        Some(TriangleRef {
            mesh: batch.mesh.0,
            submesh: batch.submesh,
            first_index: (index - batch.start) * 3,
            instance: batch.instance,
        })
    }

    /// Voxel-space corners, UVs and material of `tri`
    pub fn resolve(&self, scene: &SceneView<'_>, tri: TriangleRef) -> Option<VoxelTriangle> {
        let mesh = scene.registry.mesh(MeshId(tri.mesh))?;
        let sub = mesh.submeshes.get(tri.submesh as usize)?;
        let [i0, i1, i2] = mesh.triangle_indices(tri.submesh, tri.first_index)?;
        let m = self.voxel_from_object.get(tri.instance as usize)?;
        let corner = |i: u32| mesh.positions.get(i as usize).map(|p| m.transform_point3(*p));
        let triangle = Triangle::new(corner(i0)?, corner(i1)?, corner(i2)?);
        let uvs = mesh
            .uvs
            .as_ref()
            .and_then(|uv| Some([*uv.get(i0 as usize)?, *uv.get(i1 as usize)?, *uv.get(i2 as usize)?]));
        Some(VoxelTriangle {
            triangle,
            uvs,
            material: sub.material,
        })
    }
}
