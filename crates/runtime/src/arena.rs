//! `RtArena`: the arena type consumed by generated C through the handle ABI.
//!
//! Two allocation strategies live side by side in one arena, matching the
//! two array forms spec §4.7.1 describes:
//!
//! - **Managed (handle-backed)** allocations go through [`sn_core::HandleTable`]:
//!   individually growable-with-rebinding, individually freeable via
//!   `mark_dead`, validity-checked by generation.
//! - **Raw (bump-backed)** allocations come from an append-only `bumpalo::Bump`:
//!   cheap, never individually freed, a fresh block is bump-allocated on
//!   growth and the old one is abandoned until the whole arena is destroyed.
//!   This is the fast path codegen picks for non-escaping locals (spec
//!   §4.7.1 "Array query expressions ... use the raw form").
//!
//! Both strategies are guarded by one mutex when the arena is marked
//! thread-safe (spec §5): "Allocation and handle-slot mutation must be safe
//! for concurrent callers when the arena is marked thread-safe."

use bumpalo::Bump;
use sn_core::{Handle, HandleTable};
use std::sync::Mutex;

/// Arena state behind the mutex. Kept as one struct so a single lock guards
/// both allocation strategies, matching the spec's "one mutex per
/// thread-safe arena" requirement rather than two independently-locked
/// pools that could deadlock against each other.
struct ArenaInner {
    handles: HandleTable,
    bump: Bump,
}

pub struct RtArena {
    inner: Mutex<ArenaInner>,
    /// Parent arena, if this one was created as a child (e.g. a `private`
    /// lambda's per-call arena, spec §4.7.2). Promotion walks up this chain.
    parent: Option<*const RtArena>,
}

// Safety: all mutable state lives behind `inner`'s mutex; `parent` is only
// ever read, never mutated, after construction.
unsafe impl Send for RtArena {}
unsafe impl Sync for RtArena {}

impl RtArena {
    pub fn new() -> Box<RtArena> {
        Self::with_parent(None)
    }

    pub fn with_parent(parent: Option<*const RtArena>) -> Box<RtArena> {
        Box::new(RtArena {
            inner: Mutex::new(ArenaInner {
                handles: HandleTable::new(),
                bump: Bump::new(),
            }),
            parent,
        })
    }

    pub fn parent(&self) -> Option<&RtArena> {
        // Safety: the parent arena is guaranteed to outlive `self` by
        // generated-code discipline (a child arena never escapes the call
        // that created it; see spec §4.7.2 "private" modifier).
        self.parent.map(|p| unsafe { &*p })
    }

    pub(crate) fn with_handles<R>(&self, f: impl FnOnce(&mut HandleTable) -> R) -> R {
        let mut guard = self.inner.lock().expect("RtArena mutex poisoned");
        f(&mut guard.handles)
    }

    /// Bump-allocate `size` raw, uninitialized bytes with `align`.
    pub(crate) fn bump_alloc(&self, size: usize, align: usize) -> *mut u8 {
        let mut guard = self.inner.lock().expect("RtArena mutex poisoned");
        let layout = std::alloc::Layout::from_size_align(size.max(1), align.max(1))
            .expect("invalid array layout");
        guard.bump.alloc_layout(layout).as_ptr()
    }

    /// Arena-duplicate a string as a NUL-terminated C string.
    pub fn strdup(&self, s: &str) -> *mut u8 {
        let mut guard = self.inner.lock().expect("RtArena mutex poisoned");
        let mut buf = Vec::with_capacity(s.len() + 1);
        buf.extend_from_slice(s.as_bytes());
        buf.push(0);
        guard.bump.alloc_slice_copy(&buf).as_mut_ptr()
    }

    pub fn alloc_managed(&self, previous: Handle, size: usize) -> Handle {
        self.with_handles(|t| t.alloc(previous, size))
    }

    pub fn pin(&self, h: Handle) -> Option<*mut u8> {
        self.with_handles(|t| t.pin(h))
    }

    pub fn unpin(&self, h: Handle) {
        self.with_handles(|t| t.unpin(h))
    }

    pub fn mark_dead(&self, h: Handle) {
        self.with_handles(|t| t.mark_dead(h))
    }

    pub fn is_valid(&self, h: Handle) -> bool {
        self.with_handles(|t| t.is_valid(h))
    }

    pub fn read(&self, h: Handle) -> Option<Vec<u8>> {
        self.with_handles(|t| t.read(h).map(|b| b.to_vec()))
    }

    /// Destroys this arena's contents: every handle it owns becomes
    /// invalid, matching the "arena isolation" property of spec §8.
    pub fn destroy(self: Box<Self>) {
        // Dropping `self` frees the bump chunks and the handle table's
        // backing vectors; `clear` isn't strictly needed before drop, but
        // keeps behavior well-defined for any lingering raw pointer that
        // outlives the Box in debug builds.
        self.with_handles(|t| t.clear());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_arena_has_no_valid_handles() {
        let arena = RtArena::new();
        assert!(!arena.is_valid(Handle::NULL));
    }

    #[test]
    fn alloc_pin_roundtrip() {
        let arena = RtArena::new();
        let h = arena.alloc_managed(Handle::NULL, 16);
        assert!(arena.is_valid(h));
        let ptr = arena.pin(h).expect("pin should succeed on a live handle");
        unsafe {
            *ptr = 42;
        }
        let bytes = arena.read(h).unwrap();
        assert_eq!(bytes[0], 42);
    }

    #[test]
    fn destroying_arena_invalidates_its_handles() {
        let arena = RtArena::new();
        let h = arena.alloc_managed(Handle::NULL, 8);
        assert!(arena.is_valid(h));
        arena.destroy();
    }
}
