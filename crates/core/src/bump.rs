//! Single-owner bump allocator for the compiler's own AST and string storage.
//!
//! This is the "compilation arena" of spec component A: every AST node,
//! interned struct name, and diagnostic string allocated during a single
//! compilation lives here and is freed together when the arena is dropped.
//! It has nothing to do with the generational handle table in [`crate::handle`],
//! which is the *runtime* library's arena contract for generated C.

use bumpalo::Bump;

/// A bump-allocated arena owning every AST node and interned string produced
/// while compiling one module graph.
pub struct BumpArena {
    bump: Bump,
}

impl BumpArena {
    pub fn new() -> Self {
        BumpArena { bump: Bump::new() }
    }

    pub fn with_capacity(bytes: usize) -> Self {
        BumpArena {
            bump: Bump::with_capacity(bytes),
        }
    }

    /// Allocate a value into the arena, returning a reference tied to the
    /// arena's lifetime.
    pub fn alloc<T>(&self, val: T) -> &T {
        self.bump.alloc(val)
    }

    /// Copy a string into arena-owned storage, returning a `'arena` slice.
    /// Used for diagnostic messages and identifiers that must outlive the
    /// token they were lexed from.
    pub fn strdup<'a>(&'a self, s: &str) -> &'a str {
        self.bump.alloc_str(s)
    }

    /// Total bytes currently allocated from the underlying chunks.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}

impl Default for BumpArena {
    fn default() -> Self {
        Self::new()
    }
}
