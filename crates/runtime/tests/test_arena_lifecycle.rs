//! Integration tests for the handle ABI's arena/mutex surface, exercised
//! the way generated C actually calls it: through the `extern "C"`
//! boundary in `sn_runtime::ffi`, not the internal `RtArena` methods.

use sn_runtime::arena::RtArena;
use sn_runtime::ffi::{
    rt_arena_create, rt_arena_destroy, rt_managed_alloc, rt_managed_mark_dead, rt_managed_pin,
    rt_managed_unpin,
};

#[test]
fn managed_alloc_pin_roundtrips_written_bytes() {
    let arena = RtArena::new();
    let h = rt_managed_alloc(&arena, 0, 8);
    assert_ne!(h, 0, "a fresh allocation must not return the null handle");

    let ptr = rt_managed_pin(&arena, h);
    assert!(!ptr.is_null());
    unsafe {
        std::ptr::write(ptr as *mut i64, 42);
    }
    rt_managed_unpin(&arena, h);

    let ptr2 = rt_managed_pin(&arena, h);
    let value = unsafe { std::ptr::read(ptr2 as *const i64) };
    assert_eq!(value, 42);
    rt_managed_unpin(&arena, h);
}

#[test]
fn mark_dead_handle_no_longer_pins() {
    let arena = RtArena::new();
    let h = rt_managed_alloc(&arena, 0, 8);
    rt_managed_mark_dead(&arena, h);
    assert!(rt_managed_pin(&arena, h).is_null(), "a dead handle must not pin");
}

#[test]
fn child_arena_created_and_destroyed_through_ffi() {
    let parent = RtArena::new();
    let parent_ptr: *const RtArena = &*parent;
    let child = rt_arena_create(parent_ptr);
    assert!(!child.is_null());
    rt_arena_destroy(child);
}

#[test]
fn root_arena_created_through_ffi_has_no_parent() {
    let root = rt_arena_create(std::ptr::null());
    assert!(!root.is_null());
    rt_arena_destroy(root);
}
