//! Fixed-capacity append buffer and indirect argument records
//!
//! Producers on any thread claim a slot with a single atomic increment and
//! then write their record into it. The cursor saturates at capacity: once
//! the buffer is full further pushes are dropped and counted instead of
//! wrapping around. Consumers read after the producing stage has joined.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::{Pod, Zeroable};

/// Arguments of an indirect compute dispatch, laid out like the GPU expects
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DispatchIndirectArgs {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl DispatchIndirectArgs {
    /// One group per `group_size` items, rounded up
    pub fn for_count(count: u32, group_size: u32) -> Self {
        Self {
            x: count.div_ceil(group_size.max(1)),
            y: 1,
            z: 1,
        }
    }

    pub fn group_count(&self) -> u32 {
        self.x * self.y * self.z
    }
}

/// Vertices of a unit cube drawn as a triangle list
pub const CUBE_VERTEX_COUNT: u32 = 36;

/// Arguments of an indirect non-indexed draw
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndirectArgs {
    pub vertex_count: u32,
    pub instance_count: u32,
    pub first_vertex: u32,
    pub first_instance: u32,
}

impl DrawIndirectArgs {
    /// One cube per instance
    pub fn cubes(instance_count: u32) -> Self {
        Self {
            vertex_count: CUBE_VERTEX_COUNT,
            instance_count,
            first_vertex: 0,
            first_instance: 0,
        }
    }
}

/// Lock-free append list of `Pod` records backed by `AtomicU32` words
pub struct AppendBuffer<T: Pod> {
    words: Box<[AtomicU32]>,
    capacity: u32,
    cursor: AtomicU32,
    dropped: AtomicU32,
    _marker: PhantomData<T>,
}

impl<T: Pod> AppendBuffer<T> {
    const WORDS: usize = {
        assert!(std::mem::size_of::<T>() % 4 == 0, "record size must be a multiple of 4");
        std::mem::size_of::<T>() / 4
    };

    pub fn new(capacity: u32) -> Self {
        let words = (0..capacity as usize * Self::WORDS)
            .map(|_| AtomicU32::new(0))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            words,
            capacity,
            cursor: AtomicU32::new(0),
            dropped: AtomicU32::new(0),
            _marker: PhantomData,
        }
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Records written so far; never exceeds capacity
    pub fn len(&self) -> u32 {
        self.cursor.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pushes rejected because the buffer was full
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Reserve the next slot, or count a drop when full
    pub fn claim_slot(&self) -> Option<u32> {
        let capacity = self.capacity;
        match self.cursor.fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| {
            (c < capacity).then_some(c + 1)
        }) {
            Ok(slot) => Some(slot),
            Err(_) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Claim a slot and write `value` into it
    pub fn push(&self, value: T) -> Option<u32> {
        let slot = self.claim_slot()?;
        self.write(slot, &value);
        Some(slot)
    }

    fn write(&self, slot: u32, value: &T) {
        let start = slot as usize * Self::WORDS;
        let bytes = bytemuck::bytes_of(value);
        for (word, chunk) in self.words[start..start + Self::WORDS]
            .iter()
            .zip(bytes.chunks_exact(4))
        {
            let bits = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            word.store(bits, Ordering::Relaxed);
        }
    }

    /// Record at `slot`, if it has been claimed
    pub fn get(&self, slot: u32) -> Option<T> {
        if slot >= self.len() {
            return None;
        }
        let start = slot as usize * Self::WORDS;
        let mut value = T::zeroed();
        let bytes = bytemuck::bytes_of_mut(&mut value);
        for (word, chunk) in self.words[start..start + Self::WORDS]
            .iter()
            .zip(bytes.chunks_exact_mut(4))
        {
            chunk.copy_from_slice(&word.load(Ordering::Relaxed).to_ne_bytes());
        }
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.len()).filter_map(move |slot| self.get(slot))
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Written records as raw bytes for a buffer upload
    pub fn to_bytes(&self) -> Vec<u8> {
        let len = self.len() as usize * Self::WORDS;
        self.words[..len]
            .iter()
            .flat_map(|w| w.load(Ordering::Relaxed).to_ne_bytes())
            .collect()
    }

    /// Indirect dispatch covering the current count
    pub fn dispatch_args(&self, group_size: u32) -> DispatchIndirectArgs {
        DispatchIndirectArgs::for_count(self.len(), group_size)
    }

    /// Empty the buffer and the drop counter; contents are left in place
    pub fn reset(&mut self) {
        *self.cursor.get_mut() = 0;
        *self.dropped.get_mut() = 0;
    }
}
