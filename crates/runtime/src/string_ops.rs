//! String helpers: equality, concatenation, interpolation, encoding.
//!
//! SN strings are handle-backed (spec §3 "string" contributes 8/8 to
//! struct layout because it's a handle). The layout mirrors the array one
//! but without an element-type distinction: `[StringMeta{len}][bytes...][NUL]`.

use crate::arena::RtArena;
use sn_core::Handle;
use std::ffi::CStr;
use std::os::raw::c_char;

#[repr(C)]
struct StringMeta {
    len: u64,
}

const HEADER: usize = std::mem::size_of::<StringMeta>();

fn alloc_string(arena: &RtArena, bytes: &[u8]) -> Handle {
    let total = HEADER + bytes.len() + 1;
    let h = arena.alloc_managed(Handle::NULL, total);
    let raw = arena.pin(h).expect("freshly allocated string handle must pin");
    unsafe {
        (*raw.cast::<StringMeta>()).len = bytes.len() as u64;
        let data = raw.add(HEADER);
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), data, bytes.len());
        *data.add(bytes.len()) = 0;
    }
    arena.unpin(h);
    h
}

/// Read a handle's contents as a UTF-8 `&str` slice; panics on a dead
/// handle (internal invariant, never reachable from well-typed SN since
/// the type checker guarantees string handles outlive their uses).
pub fn as_str<'a>(arena: &'a RtArena, h: Handle) -> String {
    if h.is_null() {
        return String::new();
    }
    let raw = arena.pin(h).expect("use of a dead string handle");
    let len = unsafe { (*raw.cast::<StringMeta>()).len as usize };
    let bytes = unsafe { std::slice::from_raw_parts(raw.add(HEADER), len) };
    let s = String::from_utf8_lossy(bytes).into_owned();
    arena.unpin(h);
    s
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_managed_strdup(
    arena: &RtArena,
    previous: u32,
    cstr: *const c_char,
) -> u32 {
    let _ = previous; // spec §6: previous may be reused by rt_managed_alloc; strings are always freshly sized here.
    if cstr.is_null() {
        return alloc_string(arena, b"").raw();
    }
    let s = unsafe { CStr::from_ptr(cstr) }.to_string_lossy();
    alloc_string(arena, s.as_bytes()).raw()
}

/// Length in bytes, read straight out of the header without decoding
/// (codegen's `.len()` lowering for strings).
#[unsafe(no_mangle)]
pub extern "C" fn rt_string_len(arena: &RtArena, h: u32) -> u64 {
    let handle = Handle::from_raw(h);
    if handle.is_null() {
        return 0;
    }
    let raw = arena.pin(handle).expect("use of a dead string handle");
    let len = unsafe { (*raw.cast::<StringMeta>()).len };
    arena.unpin(handle);
    len
}

/// Borrowed, NUL-terminated view of a string handle's bytes, valid as long
/// as the handle is (codegen passes this straight to `printf`/`strcmp`-style
/// callees without an intervening arena round trip).
#[unsafe(no_mangle)]
pub extern "C" fn rt_string_cstr(arena: &RtArena, h: u32) -> *const c_char {
    let handle = Handle::from_raw(h);
    if handle.is_null() {
        return c"".as_ptr();
    }
    let raw = arena.pin(handle).expect("use of a dead string handle");
    unsafe { raw.add(HEADER) as *const c_char }
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_long_to_string(arena: &RtArena, v: i64) -> u32 {
    alloc_string(arena, v.to_string().as_bytes()).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_double_to_string(arena: &RtArena, v: f64) -> u32 {
    alloc_string(arena, v.to_string().as_bytes()).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_bool_to_string(arena: &RtArena, v: bool) -> u32 {
    alloc_string(arena, if v { b"true" } else { b"false" }).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_char_to_string(arena: &RtArena, v: u8) -> u32 {
    alloc_string(arena, &[v]).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_eq_string(arena: &RtArena, a: u32, b: u32) -> bool {
    as_str(arena, Handle::from_raw(a)) == as_str(arena, Handle::from_raw(b))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_string_concat(arena: &RtArena, a: u32, b: u32) -> u32 {
    let mut s = as_str(arena, Handle::from_raw(a));
    s.push_str(&as_str(arena, Handle::from_raw(b)));
    alloc_string(arena, s.as_bytes()).raw()
}

/// Builds an interpolated string (spec §4.1/§4.2 `Interpolated`) out of
/// alternating literal fragments and already-stringified sub-expression
/// results. Codegen emits one `rt_string_builder_*` call sequence per
/// `Interpolated` expression.
pub struct StringBuilder {
    buf: String,
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_string_builder_new() -> *mut StringBuilder {
    Box::into_raw(Box::new(StringBuilder { buf: String::new() }))
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_string_builder_push(
    builder: *mut StringBuilder,
    arena: &RtArena,
    part: u32,
) {
    let b = unsafe { &mut *builder };
    b.buf.push_str(&as_str(arena, Handle::from_raw(part)));
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_string_builder_finish(builder: *mut StringBuilder, arena: &RtArena) -> u32 {
    let b = unsafe { Box::from_raw(builder) };
    alloc_string(arena, b.buf.as_bytes()).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_string_from_utf8(arena: &RtArena, bytes: *const u8, len: u64) -> u32 {
    if bytes.is_null() || len == 0 {
        return alloc_string(arena, b"").raw();
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len as usize) };
    let s = String::from_utf8_lossy(slice);
    alloc_string(arena, s.as_bytes()).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_string_from_latin1(arena: &RtArena, bytes: *const u8, len: u64) -> u32 {
    if bytes.is_null() || len == 0 {
        return alloc_string(arena, b"").raw();
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len as usize) };
    let s: String = slice.iter().map(|&b| b as char).collect();
    alloc_string(arena, s.as_bytes()).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_bytes_to_hex(arena: &RtArena, bytes: *const u8, len: u64) -> u32 {
    if bytes.is_null() || len == 0 {
        return alloc_string(arena, b"").raw();
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len as usize) };
    alloc_string(arena, hex::encode(slice).as_bytes()).raw()
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_bytes_to_base64(arena: &RtArena, bytes: *const u8, len: u64) -> u32 {
    use base64::Engine;
    if bytes.is_null() || len == 0 {
        return alloc_string(arena, b"").raw();
    }
    let slice = unsafe { std::slice::from_raw_parts(bytes, len as usize) };
    let encoded = base64::engine::general_purpose::STANDARD.encode(slice);
    alloc_string(arena, encoded.as_bytes()).raw()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strdup_and_eq_roundtrip() {
        let arena = RtArena::new();
        let h = alloc_string(&arena, b"hello");
        assert_eq!(as_str(&arena, h), "hello");
        let h2 = alloc_string(&arena, b"hello");
        assert!(rt_eq_string(&arena, h.raw(), h2.raw()));
    }

    #[test]
    fn concat_appends() {
        let arena = RtArena::new();
        let a = alloc_string(&arena, b"foo");
        let b = alloc_string(&arena, b"bar");
        let c = rt_string_concat(&arena, a.raw(), b.raw());
        assert_eq!(as_str(&arena, Handle::from_raw(c)), "foobar");
    }

    #[test]
    fn interpolation_builder_joins_parts() {
        let arena = RtArena::new();
        let builder = rt_string_builder_new();
        let a = alloc_string(&arena, b"day ");
        let b = alloc_string(&arena, b"3");
        rt_string_builder_push(builder, &arena, a.raw());
        rt_string_builder_push(builder, &arena, b.raw());
        let result = rt_string_builder_finish(builder, &arena);
        assert_eq!(as_str(&arena, Handle::from_raw(result)), "day 3");
    }

    #[test]
    fn hex_and_base64_encode() {
        let arena = RtArena::new();
        let data = [0xDEu8, 0xAD, 0xBE, 0xEF];
        let hex_h = rt_bytes_to_hex(&arena, data.as_ptr(), data.len() as u64);
        assert_eq!(as_str(&arena, Handle::from_raw(hex_h)), "deadbeef");
        let b64_h = rt_bytes_to_base64(&arena, data.as_ptr(), data.len() as u64);
        assert_eq!(as_str(&arena, Handle::from_raw(b64_h)), "3q2+7w==");
    }
}
