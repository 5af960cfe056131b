//! Scene description consumed by the voxelizer

pub mod mesh;
pub mod registry;

pub use mesh::{Mesh, Submesh};
pub use registry::{
    Material, MaterialId, MeshId, MeshInstance, SceneRegistry, SceneView, Texture, TextureId,
};
