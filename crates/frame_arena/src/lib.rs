//! Frame-scoped resource allocator.
//!
//! One arena backs exactly one frame of recording. It hands out two kinds of
//! opaque handle: `ResourceHandle` for registered objects (typically the Copy
//! ids of long-lived backend resources) and `MemoryBlockHandle` for byte
//! regions in growable scratch storage. `reset` invalidates every handle in
//! O(1) by bumping the arena generation; backing capacity is kept so frames
//! after the first allocate nothing.

use std::any::Any;
use std::sync::atomic::{AtomicU32, Ordering};

use bytemuck::Pod;
use render_protocol::{MemoryBlockHandle, ResourceHandle};

// Generations are drawn from a process-wide counter so a handle can never
// accidentally validate against a different arena that happens to be on the
// same frame number.
static NEXT_GENERATION: AtomicU32 = AtomicU32::new(1);

fn fresh_generation() -> u32 {
    NEXT_GENERATION.fetch_add(1, Ordering::Relaxed)
}

pub struct FrameArena {
    generation: u32,
    references: Vec<Box<dyn Any + Send>>,
    scratch: Vec<u8>,
}

impl FrameArena {
    pub fn new() -> Self {
        Self {
            generation: fresh_generation(),
            references: Vec::new(),
            scratch: Vec::new(),
        }
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Registers a frame-scoped reference to an externally-owned object.
    /// The arena never takes ownership of backend resources; callers register
    /// their Copy ids.
    pub fn reference<T: Any + Send>(&mut self, value: T) -> ResourceHandle {
        let index = u32::try_from(self.references.len())
            .unwrap_or_else(|_| panic!("frame arena reference table overflow"));
        self.references.push(Box::new(value));
        ResourceHandle {
            index,
            generation: self.generation,
        }
    }

    /// Returns the object registered under `handle`. A handle from another
    /// frame or a mismatched type is a programmer error and panics.
    pub fn resolve<T: Any>(&self, handle: ResourceHandle) -> &T {
        self.check_generation(handle.generation, "resource handle");
        let entry = self
            .references
            .get(handle.index as usize)
            .unwrap_or_else(|| {
                panic!(
                    "resource handle index {} out of bounds (frame has {} references)",
                    handle.index,
                    self.references.len()
                )
            });
        entry.downcast_ref::<T>().unwrap_or_else(|| {
            panic!(
                "resource handle {} resolved as {} but holds a different type",
                handle.index,
                std::any::type_name::<T>()
            )
        })
    }

    /// Reserves `length` zeroed bytes of scratch storage.
    pub fn alloc_region(&mut self, length: usize) -> MemoryBlockHandle {
        let offset = u32::try_from(self.scratch.len())
            .unwrap_or_else(|_| panic!("frame arena scratch storage overflow"));
        let length = u32::try_from(length)
            .unwrap_or_else(|_| panic!("frame arena region length overflow"));
        self.scratch.resize(self.scratch.len() + length as usize, 0);
        MemoryBlockHandle {
            offset,
            length,
            generation: self.generation,
        }
    }

    /// Copies `bytes` into scratch storage.
    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> MemoryBlockHandle {
        let handle = self.alloc_region(bytes.len());
        self.region_mut(handle).copy_from_slice(bytes);
        handle
    }

    /// Copies a Pod value into scratch storage.
    pub fn alloc_value<T: Pod>(&mut self, value: T) -> MemoryBlockHandle {
        self.alloc_bytes(bytemuck::bytes_of(&value))
    }

    pub fn region(&self, handle: MemoryBlockHandle) -> &[u8] {
        self.check_generation(handle.generation, "memory block handle");
        &self.scratch[handle.offset as usize..(handle.offset + handle.length) as usize]
    }

    pub fn region_mut(&mut self, handle: MemoryBlockHandle) -> &mut [u8] {
        self.check_generation(handle.generation, "memory block handle");
        &mut self.scratch[handle.offset as usize..(handle.offset + handle.length) as usize]
    }

    /// Reads a Pod value back from a region previously written with
    /// `alloc_value`.
    pub fn read_value<T: Pod>(&self, handle: MemoryBlockHandle) -> T {
        let bytes = self.region(handle);
        assert_eq!(
            bytes.len(),
            size_of::<T>(),
            "memory block length {} does not match {} ({} bytes)",
            bytes.len(),
            std::any::type_name::<T>(),
            size_of::<T>()
        );
        bytemuck::pod_read_unaligned(bytes)
    }

    /// Invalidates every handle issued this frame and rewinds storage for
    /// reuse. Capacity is retained. Idempotent.
    pub fn reset(&mut self) {
        self.generation = fresh_generation();
        self.references.clear();
        self.scratch.clear();
    }

    fn check_generation(&self, handle_generation: u32, what: &str) {
        if handle_generation != self.generation {
            panic!(
                "{what} from generation {handle_generation} resolved against arena generation {}; \
                 handles do not survive a frame reset",
                self.generation
            );
        }
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct FakeTextureId(u64);

    #[test]
    fn reference_and_resolve_roundtrip() {
        let mut arena = FrameArena::new();
        let handle = arena.reference(FakeTextureId(7));
        assert_eq!(*arena.resolve::<FakeTextureId>(handle), FakeTextureId(7));
    }

    #[test]
    #[should_panic(expected = "handles do not survive a frame reset")]
    fn resolve_rejects_handle_from_previous_frame() {
        let mut arena = FrameArena::new();
        let handle = arena.reference(FakeTextureId(7));
        arena.reset();
        let _ = arena.resolve::<FakeTextureId>(handle);
    }

    #[test]
    #[should_panic(expected = "holds a different type")]
    fn resolve_rejects_type_mismatch() {
        let mut arena = FrameArena::new();
        let handle = arena.reference(FakeTextureId(7));
        let _ = arena.resolve::<u64>(handle);
    }

    #[test]
    #[should_panic(expected = "handles do not survive a frame reset")]
    fn handles_do_not_cross_arenas() {
        let mut first = FrameArena::new();
        let second = FrameArena::new();
        let handle = first.reference(FakeTextureId(7));
        let _ = second.resolve::<FakeTextureId>(handle);
    }

    #[test]
    fn alloc_value_reads_back_equal() {
        let mut arena = FrameArena::new();
        let handle = arena.alloc_value([1.0f32, 2.0, 3.0]);
        assert_eq!(arena.read_value::<[f32; 3]>(handle), [1.0, 2.0, 3.0]);
    }

    #[test]
    fn regions_are_independent_and_zeroed() {
        let mut arena = FrameArena::new();
        let first = arena.alloc_bytes(&[0xAA; 4]);
        let second = arena.alloc_region(4);
        assert_eq!(arena.region(second), &[0, 0, 0, 0]);
        assert_eq!(arena.region(first), &[0xAA; 4]);
    }

    #[test]
    #[should_panic(expected = "handles do not survive a frame reset")]
    fn region_rejects_stale_block_handle() {
        let mut arena = FrameArena::new();
        let handle = arena.alloc_bytes(&[1, 2, 3]);
        arena.reset();
        let _ = arena.region(handle);
    }

    #[test]
    fn reset_is_idempotent_and_reuses_capacity() {
        let mut arena = FrameArena::new();
        let _ = arena.alloc_region(1024);
        let capacity_before = arena.scratch.capacity();
        arena.reset();
        arena.reset();
        assert_eq!(arena.scratch.len(), 0);
        assert_eq!(arena.references.len(), 0);
        assert_eq!(arena.scratch.capacity(), capacity_before);
        let handle = arena.alloc_bytes(&[9]);
        assert_eq!(arena.region(handle), &[9]);
    }
}
