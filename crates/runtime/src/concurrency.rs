//! Thread model backing spec §5 "Concurrency & Resource Model".
//!
//! - A thread-local arena pointer, set when a task begins running a
//!   closure, lets `default`-modifier closures prefer "the arena of the
//!   task I'm running on" over "the arena I was created in" (spec §4.7.2).
//! - `RtMutex` is the lock primitive the `lock(expr) => body` statement
//!   lowers to (spec §4.7.3 doesn't cover it; it's driven directly by
//!   §5's "lock" paragraph): acquire, run body, release on every exit path.
//!   Rust's own `Mutex` + `Drop`-based guard already gives release-on-
//!   every-exit-path for free, including on panic (the runtime's analogue
//!   of a thrown `return`/`break`), so codegen's job is just to scope the
//!   guard to the lowered body.

use std::cell::Cell;
use std::sync::atomic::Ordering;
use std::sync::Mutex;

thread_local! {
    /// Set on entry to a spawned task's closure; cleared on exit. A
    /// `default`-modifier lambda's effective arena is this, if set,
    /// otherwise its own stored arena (spec §4.7.2).
    static CURRENT_TASK_ARENA: Cell<*const crate::arena::RtArena> = const { Cell::new(std::ptr::null()) };
}

pub fn set_current_task_arena(arena: *const crate::arena::RtArena) {
    CURRENT_TASK_ARENA.with(|c| c.set(arena));
}

pub fn current_task_arena() -> Option<*const crate::arena::RtArena> {
    CURRENT_TASK_ARENA.with(|c| {
        let p = c.get();
        if p.is_null() {
            None
        } else {
            Some(p)
        }
    })
}

pub fn clear_current_task_arena() {
    CURRENT_TASK_ARENA.with(|c| c.set(std::ptr::null()));
}

/// A blocking mutex referenced by a `lock(expr) => body` statement.
/// Acquisition is blocking with no timeout (spec §5: "Acquisition is
/// blocking; timeouts are not specified" / "not interruptible").
///
/// `inner` backs [`with_lock`], the closure-taking form used by this
/// crate's own tests; `raw` backs the plain acquire/release pair generated
/// C needs, since it has no way to hand a `MutexGuard` back across the FFI
/// boundary. The two never run against the same call — generated code only
/// ever goes through the raw pair.
pub struct RtMutex {
    inner: Mutex<()>,
    raw: std::sync::atomic::AtomicBool,
}

impl RtMutex {
    pub fn new() -> Box<RtMutex> {
        Box::new(RtMutex { inner: Mutex::new(()), raw: std::sync::atomic::AtomicBool::new(false) })
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mutex_create() -> *mut RtMutex {
    Box::into_raw(RtMutex::new())
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mutex_destroy(m: *mut RtMutex) {
    if !m.is_null() {
        unsafe {
            drop(Box::from_raw(m));
        }
    }
}

/// Blocking acquire for generated `lock(expr) => body` statements. Spins
/// with a yield between attempts rather than parking on a condvar — simple,
/// and acceptable because SN's `lock` sections are expected to be short
/// (spec §5 names no fairness or timeout guarantees to uphold).
#[unsafe(no_mangle)]
pub extern "C" fn rt_mutex_lock(m: &RtMutex) {
    while m
        .raw
        .compare_exchange_weak(false, true, Ordering::Acquire, Ordering::Relaxed)
        .is_err()
    {
        std::thread::yield_now();
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_mutex_unlock(m: &RtMutex) {
    m.raw.store(false, Ordering::Release);
}

/// Acquire the mutex, invoke `body`, and release it whether `body` returns
/// normally or unwinds (the generated-code analogue of `break`/`continue`/
/// `return`/failure exiting the locked region). Codegen emits the lowered
/// body as a Rust (well: C, but the *runtime*-side guard discipline is
/// identical) closure invoked between acquire and release.
pub fn with_lock<R>(m: &RtMutex, body: impl FnOnce() -> R) -> R {
    let _guard = m.inner.lock().expect("RtMutex poisoned");
    body()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_lock_releases_after_body_runs() {
        let m = RtMutex::new();
        let result = with_lock(&m, || 1 + 1);
        assert_eq!(result, 2);
        // Lock must be free again; a second acquisition must not block.
        let result2 = with_lock(&m, || 3);
        assert_eq!(result2, 3);
    }

    #[test]
    fn task_arena_thread_local_defaults_to_none() {
        assert!(current_task_arena().is_none());
        let arena = crate::arena::RtArena::new();
        set_current_task_arena(&*arena as *const _);
        assert!(current_task_arena().is_some());
        clear_current_task_arena();
        assert!(current_task_arena().is_none());
    }
}
