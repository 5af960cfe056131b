//! Mathematical utilities and data structures

pub mod aabb;
pub mod triangle;

pub use aabb::Aabb;
pub use triangle::{Triangle, triangle_overlaps_square};
