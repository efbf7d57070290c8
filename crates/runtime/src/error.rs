//! Generated-code runtime errors (spec §7, category 7).
//!
//! The original C runtime reports these by writing to stderr and calling
//! `exit(1)`; the redesign notes (spec §9) ask for `Result`-based
//! propagation from each *operation*, with a single top-level handler in
//! generated `main` that prints and exits. `runtime_panic` is that single
//! handler: every fallible runtime primitive that cannot recover (pop from
//! an empty array, OOB index, division by zero, checked-arithmetic
//! overflow, use of a dead handle) funnels through here.

use std::fmt::Display;

/// Prints `message` to stderr and terminates the process with exit code 1.
/// Never returns; callers use it in an expression position (e.g.
/// `foo.unwrap_or_else(|| runtime_panic("..."))`) so the non-terminating
/// type checks.
pub fn runtime_panic(message: impl Display) -> ! {
    eprintln!("sn runtime error: {}", message);
    std::process::exit(1);
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_error_panic(message: *const std::os::raw::c_char) -> ! {
    let msg = if message.is_null() {
        "unknown runtime error".to_string()
    } else {
        unsafe { std::ffi::CStr::from_ptr(message) }
            .to_string_lossy()
            .into_owned()
    };
    runtime_panic(msg)
}
