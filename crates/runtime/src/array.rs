//! Typed array operations: the generic engine behind every `rt_array_*`
//! entry point in [`crate::ffi`].
//!
//! Every mutating operation is written once, generically over the element
//! type, and in two forms:
//!
//! - `*_h` — handle-based. Transactional: returns the same handle when
//!   capacity allows in-place mutation, or a fresh handle (with the old one
//!   marked dead) on growth. Callers MUST rebind their variable to the
//!   returned handle (spec §4.7.1 "Handle ABI").
//! - plain — raw-pointer based, backed by the arena's bump allocator.
//!   Growth always produces a fresh pointer; nothing is reclaimed until the
//!   whole arena is destroyed.
//!
//! Layout (spec §3 "Array layout"): `[ArrayMetadata | element[0..n]]`. A raw
//! or pinned pointer always points at `element[0]`; metadata sits exactly
//! [`ARRAY_HEADER`] bytes before it.

use crate::arena::RtArena;
use sn_core::Handle;
use std::fmt::Display;
use std::mem::size_of;

/// Mirrors spec §3's `Metadata = {arena_ref, size, capacity}` exactly, so a
/// pointer handed to hypothetically-generated C can recover all three
/// fields the same way the original `RtArrayMetadata` does. `arena` is
/// carried for ABI parity with spec.md and debugging; the Rust runtime
/// itself always reaches the owning arena through the `&RtArena` argument
/// threaded through every call instead of dereferencing this field.
#[repr(C)]
pub struct ArrayMetadata {
    pub arena: *mut std::ffi::c_void,
    pub size: u64,
    pub capacity: u64,
}

pub const ARRAY_HEADER: usize = size_of::<ArrayMetadata>();

/// Sentinel for an omitted slice bound (spec §6, "LONG_MIN as omitted").
pub const SLICE_OMITTED: i64 = i64::MIN;

unsafe fn meta(raw: *mut u8) -> *mut ArrayMetadata {
    raw.cast::<ArrayMetadata>().sub(1)
}

pub(crate) unsafe fn read_len_cap(raw: *mut u8) -> (usize, usize) {
    let m = &*meta(raw);
    (m.size as usize, m.capacity as usize)
}

pub(crate) unsafe fn write_header(raw: *mut u8, size: usize, capacity: usize) {
    let m = &mut *meta(raw);
    m.size = size as u64;
    m.capacity = capacity as u64;
}

unsafe fn write_header_full(raw: *mut u8, arena_ptr: *mut std::ffi::c_void, size: usize, capacity: usize) {
    let m = &mut *meta(raw);
    m.arena = arena_ptr;
    m.size = size as u64;
    m.capacity = capacity as u64;
}

unsafe fn elems<T>(raw: *mut u8) -> *mut T {
    raw.cast::<T>()
}

fn block_bytes_for(elem_size: usize, capacity: usize) -> usize {
    ARRAY_HEADER + capacity * elem_size
}

fn block_bytes<T>(capacity: usize) -> usize {
    block_bytes_for(size_of::<T>(), capacity)
}

/// Allocate a fresh block (header + `capacity` elements of `elem_size`
/// bytes each) from the arena's handle table, writing `size`/`capacity`
/// into the header. Returns the handle and the pointer to element 0 — the
/// header itself lives at `elem_ptr - ARRAY_HEADER`, which is how
/// [`meta`] finds it back from any element pointer this function hands out.
pub(crate) fn fresh_block_bytes(arena: &RtArena, elem_size: usize, size: usize, capacity: usize) -> (Handle, *mut u8) {
    let h = arena.alloc_managed(Handle::NULL, block_bytes_for(elem_size, capacity));
    let buf = arena.pin(h).expect("freshly allocated handle must pin");
    let elem_ptr = unsafe { buf.add(ARRAY_HEADER) };
    let arena_ptr = arena as *const RtArena as *mut std::ffi::c_void;
    unsafe { write_header_full(elem_ptr, arena_ptr, size, capacity) };
    (h, elem_ptr)
}

fn fresh_handle_block<T>(arena: &RtArena, size: usize, capacity: usize) -> (Handle, *mut u8) {
    fresh_block_bytes(arena, size_of::<T>(), size, capacity)
}

fn fresh_raw_block<T>(arena: &RtArena, size: usize, capacity: usize) -> *mut u8 {
    let buf = arena.bump_alloc(block_bytes::<T>(capacity), std::mem::align_of::<T>().max(8));
    let elem_ptr = unsafe { buf.add(ARRAY_HEADER) };
    let arena_ptr = arena as *const RtArena as *mut std::ffi::c_void;
    unsafe { write_header_full(elem_ptr, arena_ptr, size, capacity) };
    elem_ptr
}

/// Read an array's logical length given either its raw or pinned pointer.
/// Returns 0 for a null/empty pointer (spec: arrays may be empty without a
/// backing allocation).
pub fn len_of(raw: *const u8) -> usize {
    if raw.is_null() {
        return 0;
    }
    unsafe { (*meta(raw as *mut u8)).size as usize }
}

pub fn elem_data<T>(raw: *mut u8) -> *mut T {
    unsafe { elems::<T>(raw) }
}

// ---------------------------------------------------------------------
// Handle-form mutating operations
// ---------------------------------------------------------------------

pub fn create_h<T: Copy>(arena: &RtArena, data: &[T]) -> Handle {
    if data.is_empty() {
        return Handle::NULL;
    }
    let (h, block) = fresh_handle_block::<T>(arena, data.len(), data.len());
    unsafe {
        std::ptr::copy_nonoverlapping(data.as_ptr(), elems::<T>(block), data.len());
    }
    h
}

pub fn clone_h<T: Copy>(arena: &RtArena, arr_h: Handle) -> Handle {
    if arr_h.is_null() {
        return Handle::NULL;
    }
    let raw = arena.pin(arr_h).expect("clone of a dead handle");
    let (size, _) = unsafe { read_len_cap(raw) };
    let (h, block) = fresh_handle_block::<T>(arena, size, size.max(4));
    unsafe {
        std::ptr::copy_nonoverlapping(elems::<T>(raw), elems::<T>(block), size);
    }
    arena.unpin(arr_h);
    h
}

/// Transactional push: see module docs. This is the one operation every
/// `rt_array_push_<ty>_h` FFI entry point in [`crate::ffi`] forwards to.
pub fn push_h<T: Copy>(arena: &RtArena, arr_h: Handle, elem: T) -> Handle {
    if arr_h.is_null() {
        let (h, block) = fresh_handle_block::<T>(arena, 1, 4);
        unsafe { elems::<T>(block).write(elem) };
        return h;
    }
    let raw = arena.pin(arr_h).expect("push onto a dead handle");
    let (size, cap) = unsafe { read_len_cap(raw) };
    if size < cap {
        unsafe {
            elems::<T>(raw).add(size).write(elem);
            write_header(raw, size + 1, cap);
        }
        arena.unpin(arr_h);
        return arr_h;
    }
    let new_cap = if cap == 0 { 4 } else { cap * 2 };
    let (new_h, new_block) = fresh_handle_block::<T>(arena, size + 1, new_cap);
    unsafe {
        std::ptr::copy_nonoverlapping(elems::<T>(raw), elems::<T>(new_block), size);
        elems::<T>(new_block).add(size).write(elem);
    }
    arena.unpin(arr_h);
    arena.mark_dead(arr_h);
    new_h
}

/// Pop the last element. Returns `(new_handle, popped)`; panics (as a
/// runtime diagnostic, spec §7 "pop from empty array") if the array is
/// empty.
pub fn pop_h<T: Copy>(arena: &RtArena, arr_h: Handle) -> (Handle, T) {
    let raw = arena.pin(arr_h).unwrap_or_else(|| {
        crate::error::runtime_panic("pop from empty array");
    });
    let (size, cap) = unsafe { read_len_cap(raw) };
    if size == 0 {
        crate::error::runtime_panic("pop from empty array");
    }
    let popped = unsafe { elems::<T>(raw).add(size - 1).read() };
    unsafe { write_header(raw, size - 1, cap) };
    arena.unpin(arr_h);
    (arr_h, popped)
}

pub fn concat_h<T: Copy>(arena: &RtArena, a: *const u8, b: *const u8) -> Handle {
    let len_a = len_of(a);
    let len_b = len_of(b);
    let total = len_a + len_b;
    let cap = total.max(4);
    let (h, block) = fresh_handle_block::<T>(arena, total, cap);
    unsafe {
        if len_a > 0 {
            std::ptr::copy_nonoverlapping(elems::<T>(a as *mut u8), elems::<T>(block), len_a);
        }
        if len_b > 0 {
            std::ptr::copy_nonoverlapping(
                elems::<T>(b as *mut u8),
                elems::<T>(block).add(len_a),
                len_b,
            );
        }
    }
    h
}

/// Resolve slice bounds against `SLICE_OMITTED`, clamping to `[0, len]`.
fn resolve_slice_bounds(len: usize, start: i64, end: i64, step: i64) -> (usize, usize, i64) {
    let step = if step == SLICE_OMITTED { 1 } else { step };
    let default_start = if step < 0 { len as i64 - 1 } else { 0 };
    let default_end = if step < 0 { -1 } else { len as i64 };
    let s = if start == SLICE_OMITTED { default_start } else { start };
    let e = if end == SLICE_OMITTED { default_end } else { end };
    let clamp = |v: i64| -> i64 { v.clamp(if step < 0 { -1 } else { 0 }, len as i64) };
    (clamp(s).max(0) as usize, clamp(e).max(0) as usize, step)
}

pub fn slice_h<T: Copy>(arena: &RtArena, src: *const u8, start: i64, end: i64, step: i64) -> Handle {
    let len = len_of(src);
    if len == 0 {
        return Handle::NULL;
    }
    let (s, e, step) = resolve_slice_bounds(len, start, end, step);
    let src_elems = unsafe { elems::<T>(src as *mut u8) };
    let mut out = Vec::new();
    if step > 0 {
        let mut i = s as i64;
        while i < e as i64 && (i as usize) < len {
            out.push(unsafe { *src_elems.add(i as usize) });
            i += step;
        }
    } else if step < 0 {
        let mut i = s as i64;
        while i > e as i64 && i >= 0 {
            out.push(unsafe { *src_elems.add(i as usize) });
            i += step;
        }
    }
    create_h(arena, &out)
}

pub fn rev_h<T: Copy>(arena: &RtArena, arr_h: Handle) -> Handle {
    let raw = arena.pin(arr_h).unwrap_or(std::ptr::null_mut());
    if raw.is_null() {
        return Handle::NULL;
    }
    let (size, _) = unsafe { read_len_cap(raw) };
    let mut out: Vec<T> = (0..size).map(|i| unsafe { *elems::<T>(raw).add(i) }).collect();
    out.reverse();
    arena.unpin(arr_h);
    create_h(arena, &out)
}

/// Reverse an array in place (scenario 1: `xs.reverse()` must mutate the
/// caller's array, not rebind it — capacity never changes on reverse, so
/// this never needs to return a different handle).
pub fn reverse_in_place<T: Copy>(arena: &RtArena, arr_h: Handle) {
    let raw = match arena.pin(arr_h) {
        Some(r) => r,
        None => return,
    };
    let (size, _) = unsafe { read_len_cap(raw) };
    unsafe {
        let data = elems::<T>(raw);
        let mut i = 0usize;
        let mut j = size.saturating_sub(1);
        while i < j {
            std::ptr::swap(data.add(i), data.add(j));
            i += 1;
            j -= 1;
        }
    }
    arena.unpin(arr_h);
}

pub fn rem_h<T: Copy>(arena: &RtArena, arr_h: Handle, idx: i64) -> Handle {
    let raw = arena
        .pin(arr_h)
        .unwrap_or_else(|| crate::error::runtime_panic("index out of bounds"));
    let (size, _) = unsafe { read_len_cap(raw) };
    if idx < 0 || idx as usize >= size {
        crate::error::runtime_panic("index out of bounds");
    }
    let idx = idx as usize;
    let mut out: Vec<T> = Vec::with_capacity(size - 1);
    for i in 0..size {
        if i != idx {
            out.push(unsafe { *elems::<T>(raw).add(i) });
        }
    }
    arena.unpin(arr_h);
    arena.mark_dead(arr_h);
    create_h(arena, &out)
}

pub fn ins_h<T: Copy>(arena: &RtArena, arr_h: Handle, elem: T, idx: i64) -> Handle {
    let raw = arena.pin(arr_h).unwrap_or(std::ptr::null_mut());
    let size = if raw.is_null() { 0 } else { unsafe { read_len_cap(raw).0 } };
    if idx < 0 || idx as usize > size {
        crate::error::runtime_panic("index out of bounds");
    }
    let idx = idx as usize;
    let mut out: Vec<T> = Vec::with_capacity(size + 1);
    for i in 0..idx {
        out.push(unsafe { *elems::<T>(raw).add(i) });
    }
    out.push(elem);
    for i in idx..size {
        out.push(unsafe { *elems::<T>(raw).add(i) });
    }
    if !raw.is_null() {
        arena.unpin(arr_h);
        arena.mark_dead(arr_h);
    }
    create_h(arena, &out)
}

pub fn alloc_h<T: Copy>(arena: &RtArena, count: i64, default: T) -> Handle {
    if count <= 0 {
        return Handle::NULL;
    }
    let count = count as usize;
    let (h, block) = fresh_handle_block::<T>(arena, count, count);
    unsafe {
        let data = elems::<T>(block);
        for i in 0..count {
            data.add(i).write(default);
        }
    }
    h
}

pub fn range_h(arena: &RtArena, start: i64, end: i64) -> Handle {
    if end <= start {
        return Handle::NULL;
    }
    let count = (end - start) as usize;
    let (h, block) = fresh_handle_block::<i64>(arena, count, count);
    unsafe {
        let data = elems::<i64>(block);
        for i in 0..count {
            data.add(i).write(start + i as i64);
        }
    }
    h
}

// ---------------------------------------------------------------------
// Query operations (raw pointer; non-mutating)
// ---------------------------------------------------------------------

pub fn index_of<T: PartialEq + Copy>(raw: *const u8, needle: T) -> i64 {
    let len = len_of(raw);
    let data = unsafe { elems::<T>(raw as *mut u8) };
    for i in 0..len {
        if unsafe { *data.add(i) } == needle {
            return i as i64;
        }
    }
    -1
}

pub fn contains<T: PartialEq + Copy>(raw: *const u8, needle: T) -> bool {
    index_of(raw, needle) >= 0
}

pub fn join<T: Copy + Display>(raw: *const u8, sep: &str) -> String {
    let len = len_of(raw);
    let data = unsafe { elems::<T>(raw as *mut u8) };
    let mut out = String::new();
    for i in 0..len {
        if i > 0 {
            out.push_str(sep);
        }
        out.push_str(&format!("{}", unsafe { *data.add(i) }));
    }
    out
}

/// Sum of a numeric array (scenario 1: `xs.sum()`). Not part of the ABI
/// list in spec §6 verbatim, but named as a concrete array query in spec
/// §8's end-to-end scenario, so it gets the same raw-pointer treatment as
/// `indexOf`/`contains`/`join`.
pub fn sum<T>(raw: *const u8) -> T
where
    T: Copy + std::iter::Sum,
{
    let len = len_of(raw);
    let data = unsafe { elems::<T>(raw as *mut u8) };
    (0..len).map(|i| unsafe { *data.add(i) }).sum()
}

/// Depth-parameterized `to_string` formatter covering the original's
/// hand-unrolled 1D/2D/3D variants (spec §4.7.5 / original_source
/// `runtime_array_h_tostring_3d.c`). `resolve_inner` turns a stored `u32`
/// element into its own raw pointer when `depth > 1` (i.e. the element is
/// itself a nested array handle).
pub fn to_string_depth<T: Copy + Display>(
    raw: *const u8,
    depth: u32,
    resolve_inner: &dyn Fn(u32) -> *const u8,
) -> String {
    if depth <= 1 {
        let len = len_of(raw);
        let data = unsafe { elems::<T>(raw as *mut u8) };
        let items: Vec<String> = (0..len)
            .map(|i| format!("{}", unsafe { *data.add(i) }))
            .collect();
        return format!("[{}]", items.join(", "));
    }
    let len = len_of(raw);
    let handles = unsafe { elems::<u32>(raw as *mut u8) };
    let items: Vec<String> = (0..len)
        .map(|i| {
            let inner = resolve_inner(unsafe { *handles.add(i) });
            to_string_depth::<T>(inner, depth - 1, resolve_inner)
        })
        .collect();
    format!("[{}]", items.join(", "))
}

// ---------------------------------------------------------------------
// Raw (bump-backed) counterparts for non-escaping locals
// ---------------------------------------------------------------------

pub fn push_raw<T: Copy>(arena: &RtArena, raw: *mut u8, elem: T) -> *mut u8 {
    if raw.is_null() {
        let block = fresh_raw_block::<T>(arena, 1, 4);
        unsafe { elems::<T>(block).write(elem) };
        return block;
    }
    let (size, cap) = unsafe { read_len_cap(raw) };
    if size < cap {
        unsafe {
            elems::<T>(raw).add(size).write(elem);
            write_header(raw, size + 1, cap);
        }
        return raw;
    }
    let new_cap = if cap == 0 { 4 } else { cap * 2 };
    let block = fresh_raw_block::<T>(arena, size + 1, new_cap);
    unsafe {
        std::ptr::copy_nonoverlapping(elems::<T>(raw), elems::<T>(block), size);
        elems::<T>(block).add(size).write(elem);
    }
    block
}

pub fn pop_raw<T: Copy>(raw: *mut u8) -> T {
    if raw.is_null() {
        crate::error::runtime_panic("pop from empty array");
    }
    let (size, cap) = unsafe { read_len_cap(raw) };
    if size == 0 {
        crate::error::runtime_panic("pop from empty array");
    }
    let popped = unsafe { elems::<T>(raw).add(size - 1).read() };
    unsafe { write_header(raw, size - 1, cap) };
    popped
}

pub fn create_raw<T: Copy>(arena: &RtArena, data: &[T]) -> *mut u8 {
    if data.is_empty() {
        return std::ptr::null_mut();
    }
    let block = fresh_raw_block::<T>(arena, data.len(), data.len());
    unsafe { std::ptr::copy_nonoverlapping(data.as_ptr(), elems::<T>(block), data.len()) };
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::RtArena;

    #[test]
    fn push_in_place_when_capacity_allows() {
        let arena = RtArena::new();
        let h1 = push_h::<i64>(&arena, Handle::NULL, 1);
        let h2 = push_h::<i64>(&arena, h1, 2);
        assert_eq!(h1, h2);
        let raw = arena.pin(h2).unwrap();
        assert_eq!(len_of(raw), 2);
    }

    #[test]
    fn push_grows_and_rebinds_past_capacity() {
        let arena = RtArena::new();
        let mut h = Handle::NULL;
        for i in 0..5i64 {
            h = push_h::<i64>(&arena, h, i);
        }
        let raw = arena.pin(h).unwrap();
        assert_eq!(len_of(raw), 5);
        let data = elem_data::<i64>(raw);
        for i in 0..5i64 {
            assert_eq!(unsafe { *data.add(i as usize) }, i);
        }
    }

    #[test]
    fn pop_then_push_keeps_handle_transactional() {
        let arena = RtArena::new();
        let mut h = Handle::NULL;
        for i in 0..4i64 {
            h = push_h::<i64>(&arena, h, i);
        }
        let (h2, popped) = pop_h::<i64>(&arena, h);
        assert_eq!(h, h2, "pop never needs to grow so the handle is unchanged");
        assert_eq!(popped, 3);
    }

    #[test]
    fn reverse_in_place_matches_scenario_one() {
        let arena = RtArena::new();
        let data: Vec<i64> = (0..10).collect();
        let h = create_h(&arena, &data);
        let sum_before: i64 = sum(arena.pin(h).unwrap());
        reverse_in_place::<i64>(&arena, h);
        let sum_after: i64 = sum(arena.pin(h).unwrap());
        assert_eq!(sum_before, sum_after);
    }

    #[test]
    fn slice_honors_omitted_sentinel_and_negative_step() {
        let arena = RtArena::new();
        let data: Vec<i64> = (0..5).collect();
        let h = create_h(&arena, &data);
        let raw = arena.pin(h).unwrap();
        let rev = slice_h::<i64>(&arena, raw, SLICE_OMITTED, SLICE_OMITTED, -1);
        let rev_raw = arena.pin(rev).unwrap();
        let got: Vec<i64> = (0..len_of(rev_raw))
            .map(|i| unsafe { *elem_data::<i64>(rev_raw).add(i) })
            .collect();
        assert_eq!(got, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn index_of_and_contains() {
        let arena = RtArena::new();
        let data = vec![10i64, 20, 30];
        let h = create_h(&arena, &data);
        let raw = arena.pin(h).unwrap();
        assert_eq!(index_of::<i64>(raw, 20), 1);
        assert!(contains::<i64>(raw, 30));
        assert!(!contains::<i64>(raw, 99));
    }
}
