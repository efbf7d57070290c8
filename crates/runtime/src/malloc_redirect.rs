//! Optional malloc-redirect shim (spec §6, §9; grounded on
//! `original_source/src/runtime/malloc/*` and `runtime_malloc_redirect_*.c`).
//!
//! Lets generated code redirect ordinary `malloc`/`free` traffic from a
//! linked C library into an [`RtArena`](crate::arena::RtArena) so
//! third-party allocations participate in arena lifetime. Compiled only
//! under the `malloc-redirect` feature (off by default — this is squarely
//! the "optional" runtime module spec §1 calls out).
//!
//! Four pieces, matching the four original source files:
//! - a push/pop stack of redirect states (nested redirects compose),
//! - a tracked-allocation set (`rt_malloc_redirect_is_tracked`, for leak
//!   auditing),
//! - a re-entrancy guard (spec §5: "re-entrant only through a thread-local
//!   guard flag; recursion from within an allocation hook ... falls back
//!   to the underlying allocator"),
//! - hook installation, stubbed to "unsupported on this platform" outside
//!   Linux — per-platform PLT/fishhook/MinHook patching is explicitly out
//!   of scope (spec §1 "per-platform I/O shims ... beyond naming the
//!   operations they must provide").

use std::cell::{Cell, RefCell};
use std::collections::HashSet;

#[derive(Clone, Copy, Default)]
pub struct RedirectConfig {
    pub thread_safe: bool,
}

struct RedirectState {
    tracked: HashSet<usize>,
    config: RedirectConfig,
}

thread_local! {
    static REDIRECT_STACK: RefCell<Vec<RedirectState>> = const { RefCell::new(Vec::new()) };
    static HOOK_GUARD: Cell<bool> = const { Cell::new(false) };
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_malloc_redirect_push(thread_safe: bool) -> bool {
    REDIRECT_STACK.with(|s| {
        s.borrow_mut().push(RedirectState {
            tracked: HashSet::new(),
            config: RedirectConfig { thread_safe },
        });
    });
    true
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_malloc_redirect_pop() -> bool {
    REDIRECT_STACK.with(|s| s.borrow_mut().pop().is_some())
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_malloc_redirect_active() -> bool {
    REDIRECT_STACK.with(|s| !s.borrow().is_empty())
}

/// Record that `ptr` (as an address) originated from the current redirect
/// scope's allocator, so `rt_malloc_redirect_is_tracked` can later answer
/// "did this pointer come from the arena?" (spec §6).
pub fn track(ptr: usize) {
    REDIRECT_STACK.with(|s| {
        if let Some(top) = s.borrow_mut().last_mut() {
            top.tracked.insert(ptr);
        }
    });
}

pub fn untrack(ptr: usize) {
    REDIRECT_STACK.with(|s| {
        if let Some(top) = s.borrow_mut().last_mut() {
            top.tracked.remove(&ptr);
        }
    });
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_malloc_redirect_is_tracked(ptr: *const u8) -> bool {
    let addr = ptr as usize;
    REDIRECT_STACK.with(|s| {
        s.borrow()
            .last()
            .map(|top| top.tracked.contains(&addr))
            .unwrap_or(false)
    })
}

/// Guards against re-entrant hook invocation (an allocation made while
/// already inside a hook falls back to the system allocator). Returns
/// `true` if the caller now holds the guard and must call
/// `release_reentrancy_guard` when done; `false` means a hook is already
/// running on this thread and the caller must use the real allocator
/// directly.
pub fn try_enter_hook() -> bool {
    HOOK_GUARD.with(|g| {
        if g.get() {
            false
        } else {
            g.set(true);
            true
        }
    })
}

pub fn release_reentrancy_guard() {
    HOOK_GUARD.with(|g| g.set(false));
}

/// Platform hook installation. Real interposition (fishhook on macOS, PLT
/// patching on Linux, MinHook on Windows) is out of scope per spec §1; this
/// reports whether the shim *could* install hooks on the current platform
/// without actually doing the unsafe binary patching.
#[unsafe(no_mangle)]
pub extern "C" fn rt_malloc_redirect_install_hooks() -> bool {
    cfg!(target_os = "linux")
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_malloc_redirect_uninstall_hooks() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nested_push_pop_composes() {
        assert!(!rt_malloc_redirect_active());
        rt_malloc_redirect_push(false);
        rt_malloc_redirect_push(true);
        assert!(rt_malloc_redirect_active());
        assert!(rt_malloc_redirect_pop());
        assert!(rt_malloc_redirect_active());
        assert!(rt_malloc_redirect_pop());
        assert!(!rt_malloc_redirect_active());
    }

    #[test]
    fn tracked_allocations_are_scoped_to_top_of_stack() {
        rt_malloc_redirect_push(false);
        track(0x1000);
        assert!(rt_malloc_redirect_is_tracked(0x1000 as *const u8));
        untrack(0x1000);
        assert!(!rt_malloc_redirect_is_tracked(0x1000 as *const u8));
        rt_malloc_redirect_pop();
    }

    #[test]
    fn reentrancy_guard_blocks_nested_hook_entry() {
        assert!(try_enter_hook());
        assert!(!try_enter_hook(), "a second entry must fall back instead of recursing");
        release_reentrancy_guard();
        assert!(try_enter_hook());
        release_reentrancy_guard();
    }
}
