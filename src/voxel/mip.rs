//! Mip pyramid construction in a single parallel pass
//!
//! The base grid is cut into blocks of side `2^G`. One task per block
//! builds levels `1..=G` for its block alone. Above `G` every cell has a
//! scratch counter; a finished child bumps its parent's counter and the
//! child that arrives eighth computes the parent, then keeps climbing.
//! Everybody else stops. The counter RMWs (`AcqRel`) order the children's
//! stores before the parent's reads.

use std::sync::atomic::{AtomicU32, Ordering};

use glam::UVec3;
use rayon::prelude::*;

use super::layout::VolumeLayout;
use super::volume::VoxelVolume;
use super::voxel::Voxel;

/// Offsets of the 8 children of a cell, x fastest
const CHILD_OFFSETS: [UVec3; 8] = [
    UVec3::new(0, 0, 0),
    UVec3::new(1, 0, 0),
    UVec3::new(0, 1, 0),
    UVec3::new(1, 1, 0),
    UVec3::new(0, 0, 1),
    UVec3::new(1, 0, 1),
    UVec3::new(0, 1, 1),
    UVec3::new(1, 1, 1),
];

pub struct MipAggregator {
    group_level: u32,
    max_level: u32,
    /// Scratch counters for levels above `group_level`, one per cell
    counters: Box<[AtomicU32]>,
    /// Start of each level's counters; index 0 is `group_level + 1`
    counter_offsets: Vec<usize>,
}

impl MipAggregator {
    /// `group_level` is clamped to `1..=top level`
    pub fn new(layout: &VolumeLayout, group_level: u32) -> Self {
        let max_level = layout.mip_level_count() - 1;
        let group_level = group_level.clamp(1, max_level);

        let mut counter_offsets = Vec::new();
        let mut total = 0usize;
        for level in group_level + 1..=max_level {
            counter_offsets.push(total);
            total += layout.level_len(level);
        }
        let counters = (0..total)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            group_level,
            max_level,
            counters,
            counter_offsets,
        }
    }

    /// Level each leaf task builds up to on its own
    pub fn group_level(&self) -> u32 {
        self.group_level
    }

    /// Number of independent leaf tasks
    pub fn leaf_count(&self, layout: &VolumeLayout) -> usize {
        layout.level_len(self.group_level)
    }

    /// Rebuild levels `1..` of `volume` from its base level
    pub fn build(&mut self, volume: &VoxelVolume) {
        for counter in self.counters.iter_mut() {
            *counter.get_mut() = 0;
        }

        let this = &*self;
        let layout = volume.layout();
        let leaves = this.leaf_count(layout);
        (0..leaves).into_par_iter().for_each(|leaf| {
            let block = layout.cell_at(this.group_level, leaf);
            this.build_block(volume, block);
            this.climb(volume, block);
        });
    }

    /// Levels `1..=group_level` below the level-G cell `block`
    fn build_block(&self, volume: &VoxelVolume, block: UVec3) {
        for level in 1..=self.group_level {
            let side = 1u32 << (self.group_level - level);
            let origin = block * side;
            for z in 0..side {
                for y in 0..side {
                    for x in 0..side {
                        Self::aggregate_cell(volume, level, origin + UVec3::new(x, y, z));
                    }
                }
            }
        }
    }

    /// Walk up from a finished cell at `group_level` while this task is the
    /// last child to arrive
    fn climb(&self, volume: &VoxelVolume, mut cell: UVec3) {
        let layout = volume.layout();
        for level in self.group_level + 1..=self.max_level {
            let parent = cell / 2;
            let slot = self.counter_offsets[(level - self.group_level - 1) as usize]
                + layout.linear_index(level, parent);
            if self.counters[slot].fetch_add(1, Ordering::AcqRel) != 7 {
                return;
            }
            Self::aggregate_cell(volume, level, parent);
            cell = parent;
        }
    }

    fn aggregate_cell(volume: &VoxelVolume, level: u32, cell: UVec3) {
        let child_level = volume.level(level - 1);
        let base = cell * 2;
        let children = CHILD_OFFSETS.map(|offset| child_level.get(base + offset));
        volume.store(level, cell, Voxel::aggregate(&children));
    }
}
