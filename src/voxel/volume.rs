//! Voxel volume storage
//!
//! One allocation of `AtomicU32` holds the base grid followed by every mip
//! level. Writers only go through atomics, so any number of rasterizer
//! workers can merge into the same volume through a shared reference.
//! Clearing takes `&mut self`, which keeps a half-cleared volume out of
//! reach of readers.

use std::str::FromStr;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::UVec3;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::layout::VolumeLayout;
use super::voxel::Voxel;

/// Cells per rayon job when sweeping a whole level
const PAR_CHUNK: usize = 4096;

pub struct VoxelVolume {
    layout: VolumeLayout,
    cells: Box<[AtomicU32]>,
}

impl VoxelVolume {
    /// Allocate every level of `layout`, all empty
    pub fn new(layout: VolumeLayout) -> Self {
        let cells: Vec<AtomicU32> = (0..layout.total_len())
            .into_par_iter()
            .map(|_| AtomicU32::new(0))
            .collect();
        Self {
            layout,
            cells: cells.into_boxed_slice(),
        }
    }

    pub fn layout(&self) -> &VolumeLayout {
        &self.layout
    }

    pub fn resolution(&self) -> u32 {
        self.layout.resolution()
    }

    /// Bytes held by the cell storage
    pub fn memory_size(&self) -> usize {
        self.cells.len() * std::mem::size_of::<AtomicU32>()
    }

    /// Raw cells of one level
    pub fn level_cells(&self, level: u32) -> &[AtomicU32] {
        let start = self.layout.level_offset(level);
        &self.cells[start..start + self.layout.level_len(level)]
    }

    /// Read view over one level
    pub fn level(&self, level: u32) -> MipView<'_> {
        MipView {
            layout: &self.layout,
            level,
            cells: self.level_cells(level),
        }
    }

    /// Zero the base level
    pub fn clear(&mut self) {
        let len = self.layout.level_len(0);
        Self::zero(&mut self.cells[..len]);
    }

    /// Zero every level
    pub fn clear_all(&mut self) {
        Self::zero(&mut self.cells);
    }

    fn zero(cells: &mut [AtomicU32]) {
        cells
            .par_chunks_mut(PAR_CHUNK)
            .for_each(|chunk| chunk.iter_mut().for_each(|c| *c.get_mut() = 0));
    }

    /// Merge one fragment of `color` into a base level cell.
    ///
    /// The result does not depend on the order concurrent merges land in,
    /// apart from rounding of the running average.
    #[inline]
    pub fn merge(&self, cell: UVec3, color: [u8; 3]) {
        let index = self.layout.linear_index(0, cell);
        self.merge_at(index, color);
    }

    #[inline]
    pub(crate) fn merge_at(&self, index: usize, color: [u8; 3]) {
        // The closure always returns Some, so this cannot fail
        let _ = self.cells[index].fetch_update(Ordering::Relaxed, Ordering::Relaxed, |bits| {
            Some(Voxel::from_bits(bits).merged(color).to_bits())
        });
    }

    /// Overwrite a cell; used by mip aggregation
    #[inline]
    pub(crate) fn store(&self, level: u32, cell: UVec3, voxel: Voxel) {
        let index = self.layout.level_offset(level) + self.layout.linear_index(level, cell);
        self.cells[index].store(voxel.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub fn load(&self, level: u32, cell: UVec3) -> Voxel {
        self.level(level).get(cell)
    }

    pub fn is_occupied(&self, level: u32, cell: UVec3) -> bool {
        !self.load(level, cell).is_empty()
    }

    /// Number of non-empty cells in `level`
    pub fn occupied_count(&self, level: u32) -> usize {
        self.level(level).occupied_count()
    }

    /// Occupied cell counts for every level, base first
    pub fn occupancy(&self) -> Vec<usize> {
        (0..self.layout.mip_level_count())
            .map(|level| self.occupied_count(level))
            .collect()
    }
}

/// Axis a slice is taken across
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceAxis {
    X,
    Y,
    Z,
}

impl FromStr for SliceAxis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x" => Ok(SliceAxis::X),
            "y" => Ok(SliceAxis::Y),
            "z" => Ok(SliceAxis::Z),
            other => Err(format!("unknown slice axis '{}'", other)),
        }
    }
}

/// A 2D cut through one level as RGBA8 pixels, row-major
#[derive(Clone, Debug)]
pub struct SliceImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// Borrowed read access to one level of a [`VoxelVolume`]
#[derive(Clone, Copy)]
pub struct MipView<'a> {
    layout: &'a VolumeLayout,
    level: u32,
    cells: &'a [AtomicU32],
}

impl<'a> MipView<'a> {
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Cells per side
    pub fn resolution(&self) -> u32 {
        self.layout.level_resolution(self.level)
    }

    pub fn voxel_width(&self) -> f32 {
        self.layout.voxel_width_at(self.level)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &'a [AtomicU32] {
        self.cells
    }

    #[inline]
    pub fn get(&self, cell: UVec3) -> Voxel {
        self.get_linear(self.layout.linear_index(self.level, cell))
    }

    #[inline]
    pub fn get_linear(&self, index: usize) -> Voxel {
        Voxel::from_bits(self.cells[index].load(Ordering::Relaxed))
    }

    /// Bounds-checked lookup
    pub fn try_get(&self, cell: UVec3) -> Option<Voxel> {
        let side = self.resolution();
        (cell.max_element() < side).then(|| self.get(cell))
    }

    /// Lookup by world position; `None` outside the cube
    pub fn sample_world(&self, p: glam::Vec3) -> Option<Voxel> {
        let cell = self.layout.world_to_voxel(p)? >> self.level;
        Some(self.get(cell))
    }

    pub fn occupied_count(&self) -> usize {
        self.cells
            .par_chunks(PAR_CHUNK)
            .map(|chunk| {
                chunk
                    .iter()
                    .filter(|c| c.load(Ordering::Relaxed) != 0)
                    .count()
            })
            .sum()
    }

    /// Raw packed values in storage order
    pub fn to_bits(&self) -> Vec<u32> {
        self.cells.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// RGBA8 texels in storage order, ready for a 3D texture upload.
    ///
    /// Base level alpha is 255 for any occupied cell; mip levels use their
    /// coverage.
    pub fn to_rgba8(&self) -> Vec<u8> {
        let base = self.level == 0;
        self.cells
            .iter()
            .flat_map(|c| Voxel::from_bits(c.load(Ordering::Relaxed)).to_rgba8(base))
            .collect()
    }

    /// Cut across `axis` at `index`. `None` when `index` is out of range.
    pub fn slice_rgba8(&self, axis: SliceAxis, index: u32) -> Option<SliceImage> {
        let side = self.resolution();
        if index >= side {
            return None;
        }
        let base = self.level == 0;
        let mut pixels = Vec::with_capacity((side * side * 4) as usize);
        for v in 0..side {
            for u in 0..side {
                let cell = match axis {
                    SliceAxis::X => UVec3::new(index, u, v),
                    SliceAxis::Y => UVec3::new(u, index, v),
                    SliceAxis::Z => UVec3::new(u, v, index),
                };
                pixels.extend_from_slice(&self.get(cell).to_rgba8(base));
            }
        }
        Some(SliceImage { width: side, height: side, pixels })
    }
}
