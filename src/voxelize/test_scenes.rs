//! Scenes shared by the voxelizer tests

use std::collections::BTreeSet;

use glam::{Mat4, Quat, UVec3, Vec3};

use crate::math::Aabb;
use crate::scene::{Material, MaterialId, Mesh, MeshInstance, SceneRegistry, SceneView};
use crate::voxel::VoxelVolume;

use super::raster::cell_overlaps;
use super::triangles::TriangleTable;

pub struct TestScene {
    pub registry: SceneRegistry,
    pub instances: Vec<MeshInstance>,
    pub bounds: Aabb,
}

impl TestScene {
    pub fn view(&self) -> SceneView<'_> {
        SceneView::new(&self.registry, &self.instances)
    }
}

/// Registry with a single flat material
pub fn registry(color: [u8; 4]) -> (SceneRegistry, MaterialId) {
    let mut registry = SceneRegistry::new();
    let material = registry.add_material(Material::solid("flat", color)).unwrap();
    (registry, material)
}

/// One world unit per voxel over `[0, resolution]^3`
pub fn unit_bounds(resolution: u32) -> Aabb {
    Aabb::new(Vec3::ZERO, Vec3::splat(resolution as f32))
}

/// Sphere, box and a big slanted quad in a 16 unit cube: a mix of small
/// and large triangles
pub fn mixed_scene() -> TestScene {
    let (mut registry, flat) = registry([200, 120, 40, 255]);
    let sphere = registry.add_mesh(Mesh::uv_sphere(4.5, 16, 8, flat)).unwrap();
    let cube = registry.add_mesh(Mesh::cuboid(Vec3::new(2.0, 1.5, 3.0), flat)).unwrap();
    let quad = registry
        .add_mesh(Mesh::new(
            "quad",
            vec![
                Vec3::new(1.2, 1.1, 3.3),
                Vec3::new(14.6, 1.7, 6.1),
                Vec3::new(14.1, 14.8, 12.4),
                Vec3::new(0.7, 13.9, 9.2),
            ],
            vec![0, 1, 2, 0, 2, 3],
            flat,
        ))
        .unwrap();

    let instances = vec![
        MeshInstance::at(sphere, Vec3::new(8.3, 8.1, 7.7)),
        MeshInstance::new(
            cube,
            Mat4::from_rotation_translation(
                Quat::from_euler(glam::EulerRot::XYZ, 0.4, 0.7, 0.2),
                Vec3::new(4.2, 11.3, 5.1),
            ),
        ),
        MeshInstance::at(quad, Vec3::ZERO),
    ];

    TestScene { registry, instances, bounds: unit_bounds(16) }
}

/// Scene made of one triangle per entry
pub fn triangles_scene(triangles: &[[Vec3; 3]], resolution: u32) -> TestScene {
    let (mut registry, flat) = registry([90, 180, 255, 255]);
    let instances = triangles
        .iter()
        .map(|t| {
            let mesh = registry.add_mesh(Mesh::triangle(t[0], t[1], t[2], flat)).unwrap();
            MeshInstance::new(mesh, Mat4::IDENTITY)
        })
        .collect();
    TestScene { registry, instances, bounds: unit_bounds(resolution) }
}

/// Test every cell of the grid against every triangle
pub fn brute_force(scene: &TestScene, volume: &VoxelVolume) -> BTreeSet<[u32; 3]> {
    let view = scene.view();
    let layout = volume.layout();
    let mut table = TriangleTable::new();
    table.rebuild(&view, layout);

    let n = layout.resolution();
    let mut cells = BTreeSet::new();
    for index in 0..table.len() {
        let Some(tri) = table.get(index).and_then(|r| table.resolve(&view, r)) else {
            continue;
        };
        if tri.triangle.is_degenerate() {
            continue;
        }
        for z in 0..n {
            for y in 0..n {
                for x in 0..n {
                    let cell = UVec3::new(x, y, z);
                    if cell_overlaps(&tri.triangle, cell) {
                        cells.insert(cell.to_array());
                    }
                }
            }
        }
    }
    cells
}

/// Occupied cells of level 0
pub fn occupied(volume: &VoxelVolume) -> BTreeSet<[u32; 3]> {
    let layout = volume.layout();
    let view = volume.level(0);
    (0..view.len())
        .filter(|&i| !view.get_linear(i).is_empty())
        .map(|i| layout.cell_at(0, i).to_array())
        .collect()
}
