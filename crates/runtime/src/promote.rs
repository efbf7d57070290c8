//! Cross-arena promotion (spec §4.7.4, §6 `rt_managed_promote`).
//!
//! When escape analysis (spec §4.4.3) flags a handle-rooted value as
//! escaping to an outer arena, codegen emits a call to one of these
//! helpers instead of a plain assignment. Each clones the data into the
//! destination arena and re-resolves any nested handles so the result is
//! valid there — a shallow `memcpy` into another arena would leave nested
//! handles dangling (they'd still name slots in the *source* arena).

use crate::arena::RtArena;
use crate::array;
use crate::string_ops;
use sn_core::Handle;

/// `rt_managed_promote`: the single-level primitive. Clones the raw bytes
/// of `handle`'s slot from `src` into `dest`, with no handle rewriting.
/// Used directly for `any`-free scalar payloads; every other promotion
/// helper builds on this one.
#[unsafe(no_mangle)]
pub extern "C" fn rt_managed_promote(dest: &RtArena, src: &RtArena, handle: u32) -> u32 {
    let h = Handle::from_raw(handle);
    if h.is_null() {
        return 0;
    }
    match src.read(h) {
        Some(bytes) => dest.with_handles(|t| t.clone_from(&bytes)).raw(),
        None => 0,
    }
}

/// Promote a `string` handle: strings carry no nested handles, so this is
/// a plain promote by content rather than raw bytes (keeps the header's
/// `arena` field, if any, honest in the destination).
#[unsafe(no_mangle)]
pub extern "C" fn promote_string(dest: &RtArena, src: &RtArena, handle: u32) -> u32 {
    rt_managed_promote(dest, src, handle)
}

/// Promote `array(string)`: re-resolve every element handle (each a
/// `string`) from `src` into `dest`.
#[unsafe(no_mangle)]
pub extern "C" fn promote_array_string(dest: &RtArena, src: &RtArena, handle: u32) -> u32 {
    let h = Handle::from_raw(handle);
    if h.is_null() {
        return 0;
    }
    let raw = match src.pin(h) {
        Some(r) => r,
        None => return 0,
    };
    let len = array::len_of(raw);
    let elems = array::elem_data::<u32>(raw);
    let resolved: Vec<u32> = (0..len)
        .map(|i| promote_string(dest, src, unsafe { *elems.add(i) }))
        .collect();
    src.unpin(h);
    array::create_h(dest, &resolved).raw()
}

/// Promote `array(array(string))`: one level deeper than
/// [`promote_array_string`].
#[unsafe(no_mangle)]
pub extern "C" fn promote_array2_string(dest: &RtArena, src: &RtArena, handle: u32) -> u32 {
    let h = Handle::from_raw(handle);
    if h.is_null() {
        return 0;
    }
    let raw = match src.pin(h) {
        Some(r) => r,
        None => return 0,
    };
    let len = array::len_of(raw);
    let elems = array::elem_data::<u32>(raw);
    let resolved: Vec<u32> = (0..len)
        .map(|i| promote_array_string(dest, src, unsafe { *elems.add(i) }))
        .collect();
    src.unpin(h);
    array::create_h(dest, &resolved).raw()
}

/// General depth-parameterized handle-array promotion, generalizing the
/// original's hand-unrolled string/2D-string variants to arbitrary nesting
/// depth (spec §9 open question: store nested handles in a dedicated
/// handle-slot array variant, never a pointer cast).
#[unsafe(no_mangle)]
pub extern "C" fn promote_array_handle_depth(
    dest: &RtArena,
    src: &RtArena,
    handle: u32,
    depth: u32,
) -> u32 {
    if depth <= 1 {
        return rt_managed_promote(dest, src, handle);
    }
    let h = Handle::from_raw(handle);
    if h.is_null() {
        return 0;
    }
    let raw = match src.pin(h) {
        Some(r) => r,
        None => return 0,
    };
    let len = array::len_of(raw);
    let elems = array::elem_data::<u32>(raw);
    let resolved: Vec<u32> = (0..len)
        .map(|i| promote_array_handle_depth(dest, src, unsafe { *elems.add(i) }, depth - 1))
        .collect();
    src.unpin(h);
    array::create_h(dest, &resolved).raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn promote_string_is_readable_in_destination() {
        let src = RtArena::new();
        let dest = RtArena::new();
        let h = string_ops::rt_managed_strdup(&src, 0, c"hello".as_ptr());
        let promoted = promote_string(&dest, &src, h);
        assert_eq!(string_ops::as_str(&dest, Handle::from_raw(promoted)), "hello");
    }

    #[test]
    fn promote_array_of_strings_resolves_each_element() {
        let src = RtArena::new();
        let dest = RtArena::new();
        let a = string_ops::rt_managed_strdup(&src, 0, c"alpha".as_ptr());
        let b = string_ops::rt_managed_strdup(&src, 0, c"beta".as_ptr());
        let arr = array::create_h(&src, &[a, b]);
        let promoted = promote_array_string(&dest, &src, arr.raw());
        let promoted_raw = dest.pin(Handle::from_raw(promoted)).unwrap();
        assert_eq!(array::len_of(promoted_raw), 2);
        let elems = array::elem_data::<u32>(promoted_raw);
        let s0 = string_ops::as_str(&dest, Handle::from_raw(unsafe { *elems }));
        assert_eq!(s0, "alpha");
    }
}
