//! Error types for the voxelizer

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid resolution {0}: must be a power of two >= 2")]
    InvalidResolution(u32),

    #[error("invalid volume bounds: {0}")]
    InvalidBounds(String),

    #[error("invalid mesh: {0}")]
    InvalidMesh(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
