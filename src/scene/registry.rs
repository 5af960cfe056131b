//! Scene registry: meshes, materials and textures addressed by handle
//!
//! The voxelizer borrows a [`SceneView`] for one cycle; it never owns
//! geometry.

use glam::{Mat4, Vec2, Vec3};

use crate::core::{Error, Result};
use crate::math::Aabb;

use super::mesh::Mesh;

/// Handle to a mesh in a [`SceneRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MeshId(pub u32);

/// Handle to a material in a [`SceneRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(pub u32);

/// Handle to a texture in a [`SceneRegistry`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// RGBA8 image sampled with nearest filtering and repeat addressing.
#[derive(Clone, Debug)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub texels: Vec<[u8; 4]>,
}

impl Texture {
    pub fn new(width: u32, height: u32, texels: Vec<[u8; 4]>) -> Result<Self> {
        if width == 0 || height == 0 || texels.len() != (width * height) as usize {
            return Err(Error::InvalidMesh(format!(
                "texture {}x{} with {} texels",
                width,
                height,
                texels.len()
            )));
        }
        Ok(Self { width, height, texels })
    }

    /// Checkerboard of `cells` x `cells` squares, one texel each
    pub fn checker(cells: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cells = cells.max(1);
        let texels = (0..cells * cells)
            .map(|i| if ((i % cells) + (i / cells)) % 2 == 0 { a } else { b })
            .collect();
        Self { width: cells, height: cells, texels }
    }

    /// Nearest texel at `uv`, wrapping outside `[0, 1)`
    pub fn sample_nearest(&self, uv: Vec2) -> [u8; 4] {
        let wrapped = uv - uv.floor();
        let x = ((wrapped.x * self.width as f32) as u32).min(self.width - 1);
        let y = ((wrapped.y * self.height as f32) as u32).min(self.height - 1);
        self.texels[(y * self.width + x) as usize]
    }
}

/// Surface description; only albedo matters for voxelization.
#[derive(Clone, Debug)]
pub struct Material {
    pub name: String,
    pub base_color: [u8; 4],
    /// Multiplied with `base_color` when present
    pub albedo: Option<TextureId>,
}

impl Material {
    pub fn solid(name: impl Into<String>, base_color: [u8; 4]) -> Self {
        Self {
            name: name.into(),
            base_color,
            albedo: None,
        }
    }

    pub fn textured(name: impl Into<String>, base_color: [u8; 4], albedo: TextureId) -> Self {
        Self {
            name: name.into(),
            base_color,
            albedo: Some(albedo),
        }
    }
}

/// A placed mesh.
#[derive(Clone, Copy, Debug)]
pub struct MeshInstance {
    pub mesh: MeshId,
    /// Object to world
    pub transform: Mat4,
}

impl MeshInstance {
    pub fn new(mesh: MeshId, transform: Mat4) -> Self {
        Self { mesh, transform }
    }

    /// Translation-only placement
    pub fn at(mesh: MeshId, position: Vec3) -> Self {
        Self::new(mesh, Mat4::from_translation(position))
    }
}

#[derive(Clone, Debug, Default)]
pub struct SceneRegistry {
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    textures: Vec<Texture>,
}

impl SceneRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId((self.textures.len() - 1) as u32)
    }

    pub fn add_material(&mut self, material: Material) -> Result<MaterialId> {
        if let Some(tex) = material.albedo {
            if self.texture(tex).is_none() {
                return Err(Error::InvalidMesh(format!(
                    "material {} references missing texture {}",
                    material.name, tex.0
                )));
            }
        }
        self.materials.push(material);
        Ok(MaterialId((self.materials.len() - 1) as u32))
    }

    /// Validate and register a mesh; every submesh material must exist
    pub fn add_mesh(&mut self, mesh: Mesh) -> Result<MeshId> {
        mesh.validate()?;
        if let Some(sub) = mesh.submeshes.iter().find(|s| self.material(s.material).is_none()) {
            return Err(Error::InvalidMesh(format!(
                "{} references missing material {}",
                mesh.name, sub.material.0
            )));
        }
        self.meshes.push(mesh);
        Ok(MeshId((self.meshes.len() - 1) as u32))
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0 as usize)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0 as usize)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0 as usize)
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Albedo of `material` at `uv`. Missing materials come out mid grey.
    pub fn albedo(&self, material: MaterialId, uv: Option<Vec2>) -> [u8; 3] {
        let Some(mat) = self.material(material) else {
            return [128, 128, 128];
        };
        let base = mat.base_color;
        let texel = match (mat.albedo.and_then(|t| self.texture(t)), uv) {
            (Some(tex), Some(uv)) => tex.sample_nearest(uv),
            _ => return [base[0], base[1], base[2]],
        };
        let modulate = |b: u8, t: u8| ((b as u32 * t as u32 + 127) / 255) as u8;
        [
            modulate(base[0], texel[0]),
            modulate(base[1], texel[1]),
            modulate(base[2], texel[2]),
        ]
    }

    /// World bounds of all `instances`; instances of unknown meshes are ignored
    pub fn bounds(&self, instances: &[MeshInstance]) -> Aabb {
        let mut bounds = Aabb::EMPTY;
        for inst in instances {
            let Some(mesh) = self.mesh(inst.mesh) else { continue };
            for p in &mesh.positions {
                bounds.expand(inst.transform.transform_point3(*p));
            }
        }
        bounds
    }
}

/// Everything one voxelization cycle reads.
#[derive(Clone, Copy)]
pub struct SceneView<'a> {
    pub registry: &'a SceneRegistry,
    pub instances: &'a [MeshInstance],
}

impl<'a> SceneView<'a> {
    pub fn new(registry: &'a SceneRegistry, instances: &'a [MeshInstance]) -> Self {
        Self { registry, instances }
    }

    /// Triangles across all instances
    pub fn triangle_count(&self) -> u64 {
        self.instances
            .iter()
            .filter_map(|inst| self.registry.mesh(inst.mesh))
            .map(|mesh| mesh.triangle_count() as u64)
            .sum()
    }

    pub fn bounds(&self) -> Aabb {
        self.registry.bounds(self.instances)
    }
}
