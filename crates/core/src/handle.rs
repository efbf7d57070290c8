//! Generational handle table: the per-arena slot array backing every
//! heap-lived SN value.
//!
//! A [`Handle`] is a 32-bit non-zero integer packing a slot index (low 24
//! bits) and a generation counter (high 8 bits). `HANDLE_NULL` (0) never
//! names a live slot. A handle is valid iff the generation it encodes
//! matches the generation currently stored in its slot; growing or freeing
//! a slot bumps the generation so stale handles are rejected rather than
//! silently aliasing new data.

/// Sentinel for "no handle" — spec §3's `HANDLE_NULL`.
pub const HANDLE_NULL: u32 = 0;

const INDEX_BITS: u32 = 24;
const INDEX_MASK: u32 = (1 << INDEX_BITS) - 1;

/// A generational handle into a [`HandleTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle(u32);

impl Handle {
    pub const NULL: Handle = Handle(HANDLE_NULL);

    pub fn from_raw(raw: u32) -> Handle {
        Handle(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0 == HANDLE_NULL
    }

    fn pack(index: u32, generation: u8) -> Handle {
        debug_assert!(index <= INDEX_MASK, "handle table exhausted its index space");
        let raw = (u32::from(generation) << INDEX_BITS) | (index & INDEX_MASK);
        // generation 0 + index 0 would collide with HANDLE_NULL; slot 0 is
        // never issued for exactly this reason (see `HandleTable::new`).
        Handle(raw)
    }

    fn index(self) -> usize {
        (self.0 & INDEX_MASK) as usize
    }

    fn generation(self) -> u8 {
        (self.0 >> INDEX_BITS) as u8
    }
}

/// A single arena-owned allocation. `data` is the owned backing storage;
/// pinning hands out a raw pointer into it for the duration of a use.
pub struct Slot {
    data: Vec<u8>,
    generation: u8,
    alive: bool,
}

impl Slot {
    fn len(&self) -> usize {
        self.data.len()
    }
}

/// The slot array for one arena. Allocation, growth-in-place, and
/// mark-dead-and-replace are the three operations the handle ABI's `_h`
/// functions are built from (spec §4.7.1).
#[derive(Default)]
pub struct HandleTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl HandleTable {
    pub fn new() -> Self {
        let mut t = HandleTable {
            slots: Vec::new(),
            free: Vec::new(),
        };
        // Reserve index 0 so no real handle ever encodes as HANDLE_NULL.
        t.slots.push(Slot {
            data: Vec::new(),
            generation: 0,
            alive: false,
        });
        t
    }

    /// Allocate a fresh slot of `size` bytes, zero-initialized.
    fn new_slot(&mut self, size: usize) -> Handle {
        let data = vec![0u8; size];
        if let Some(idx) = self.free.pop() {
            let slot = &mut self.slots[idx as usize];
            slot.data = data;
            slot.alive = true;
            Handle::pack(idx, slot.generation)
        } else {
            let idx = self.slots.len() as u32;
            self.slots.push(Slot {
                data,
                generation: 1,
                alive: true,
            });
            Handle::pack(idx, 1)
        }
    }

    /// `rt_managed_alloc`'s core: allocate `size` bytes, optionally reusing
    /// `previous`'s slot in place when it is alive and already large enough.
    /// Returns the same handle when capacity sufficed, otherwise a fresh one
    /// with `previous` (if any) marked dead — the transactional contract
    /// every typed `_h` array operation relies on.
    pub fn alloc(&mut self, previous: Handle, size: usize) -> Handle {
        if !previous.is_null() && self.is_valid(previous) {
            let idx = previous.index();
            if self.slots[idx].len() >= size {
                return previous;
            }
        }
        let fresh = self.new_slot(size);
        if !previous.is_null() && self.is_valid(previous) {
            self.mark_dead(previous);
        }
        fresh
    }

    pub fn is_valid(&self, h: Handle) -> bool {
        if h.is_null() {
            return false;
        }
        let idx = h.index();
        idx < self.slots.len() && self.slots[idx].alive && self.slots[idx].generation == h.generation()
    }

    /// Acquire a raw pointer to the slot's storage. The caller promises not
    /// to retain the pointer past the matching `unpin` call.
    pub fn pin(&mut self, h: Handle) -> Option<*mut u8> {
        if !self.is_valid(h) {
            return None;
        }
        Some(self.slots[h.index()].data.as_mut_ptr())
    }

    /// No-op bookkeeping hook; kept symmetrical with `pin` so callers that
    /// track pin/unpin pairs (e.g. under `-g` builds with extra assertions)
    /// have a single discipline to follow.
    pub fn unpin(&mut self, _h: Handle) {}

    pub fn size_of(&self, h: Handle) -> Option<usize> {
        if !self.is_valid(h) {
            return None;
        }
        Some(self.slots[h.index()].len())
    }

    /// Invalidate `h` and bump its slot's generation so any other handle
    /// still encoding the old generation is rejected by `is_valid`.
    pub fn mark_dead(&mut self, h: Handle) {
        if h.is_null() {
            return;
        }
        let idx = h.index();
        if idx >= self.slots.len() {
            return;
        }
        let slot = &mut self.slots[idx];
        if slot.alive && slot.generation == h.generation() {
            slot.alive = false;
            slot.data = Vec::new();
            slot.generation = slot.generation.wrapping_add(1).max(1);
            self.free.push(idx as u32);
        }
    }

    /// Copy `size` bytes from `src` into a freshly allocated slot in this
    /// table, returning the new handle. Used by cross-arena promotion: the
    /// caller is responsible for resolving any nested handles afterwards.
    pub fn clone_from(&mut self, src: &[u8]) -> Handle {
        let h = self.new_slot(src.len());
        self.slots[h.index()].data.copy_from_slice(src);
        h
    }

    pub fn read(&self, h: Handle) -> Option<&[u8]> {
        if !self.is_valid(h) {
            return None;
        }
        Some(&self.slots[h.index()].data)
    }

    /// Invalidates every handle this table owns. Models "destroying the
    /// arena invalidates every handle with owner A" (spec §8).
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.alive = false;
            slot.data = Vec::new();
            slot.generation = slot.generation.wrapping_add(1).max(1);
        }
        self.free = (1..self.slots.len() as u32).collect();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_handle_is_never_valid() {
        let t = HandleTable::new();
        assert!(!t.is_valid(Handle::NULL));
    }

    #[test]
    fn alloc_reuses_slot_when_capacity_suffices() {
        let mut t = HandleTable::new();
        let h1 = t.alloc(Handle::NULL, 8);
        let h2 = t.alloc(h1, 4);
        assert_eq!(h1, h2, "shrinking within capacity must keep the same handle");
        assert!(t.is_valid(h1));
    }

    #[test]
    fn alloc_replaces_and_kills_old_handle_on_growth() {
        let mut t = HandleTable::new();
        let h1 = t.alloc(Handle::NULL, 4);
        let h2 = t.alloc(h1, 64);
        assert_ne!(h1, h2);
        assert!(!t.is_valid(h1), "old handle must be dead after growth-replace");
        assert!(t.is_valid(h2));
    }

    #[test]
    fn mark_dead_invalidates_handle() {
        let mut t = HandleTable::new();
        let h = t.alloc(Handle::NULL, 8);
        t.mark_dead(h);
        assert!(!t.is_valid(h));
    }

    #[test]
    fn clear_invalidates_every_handle() {
        let mut t = HandleTable::new();
        let a = t.alloc(Handle::NULL, 8);
        let b = t.alloc(Handle::NULL, 8);
        t.clear();
        assert!(!t.is_valid(a));
        assert!(!t.is_valid(b));
    }
}
