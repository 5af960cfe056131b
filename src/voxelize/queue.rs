//! Queue of triangles too large for the per-triangle path

use crate::voxel::{AppendBuffer, DispatchIndirectArgs};

use super::triangles::TriangleRef;

pub struct LargeTriangleQueue {
    entries: AppendBuffer<TriangleRef>,
    group_size: u32,
}

impl LargeTriangleQueue {
    pub fn new(capacity: u32, group_size: u32) -> Self {
        Self {
            entries: AppendBuffer::new(capacity),
            group_size: group_size.max(1),
        }
    }

    /// Append a triangle; `false` if the queue is full
    pub fn push(&self, tri: TriangleRef) -> bool {
        self.entries.push(tri).is_some()
    }

    pub fn get(&self, slot: u32) -> Option<TriangleRef> {
        self.entries.get(slot)
    }

    pub fn len(&self) -> u32 {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> u32 {
        self.entries.capacity()
    }

    pub fn dropped(&self) -> u32 {
        self.entries.dropped()
    }

    /// Entries handled by one dispatch group
    pub fn group_size(&self) -> u32 {
        self.group_size
    }

    pub fn entries(&self) -> &AppendBuffer<TriangleRef> {
        &self.entries
    }

    /// Groups needed to consume the current entries
    pub fn dispatch_args(&self) -> DispatchIndirectArgs {
        self.entries.dispatch_args(self.group_size)
    }

    /// Close the producing pass and size the consuming one.
    ///
    /// Call once per cycle after the classifier has joined; reports
    /// overflow for the cycle.
    pub fn publish(&self) -> DispatchIndirectArgs {
        let dropped = self.dropped();
        if dropped > 0 {
            log::warn!(
                "Large triangle queue full: {} triangles dropped (capacity {})",
                dropped,
                self.capacity()
            );
        }
        self.dispatch_args()
    }

    pub fn reset(&mut self) {
        self.entries.reset();
    }
}
