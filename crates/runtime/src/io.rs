//! Platform-specific I/O primitives isolated behind a small shim, so
//! differences between platforms never leak into codegen (the same role
//! `compat_io.h` plays for the Sindarin C runtime's memory-stream and
//! descriptor handling).

use std::io::Write;

/// Flushes stdout. Generated `print`/`println` go through libc's `printf`
/// directly (unbuffered is not assumed), but a program that mixes
/// `stdout`-buffered output with a direct write to fd 2 needs an explicit
/// flush point before it exits or forks a child process.
#[unsafe(no_mangle)]
pub extern "C" fn rt_io_flush_stdout() {
    let _ = std::io::stdout().flush();
}

/// Writes a raw UTF-8 buffer straight to stderr, bypassing the string
/// arena — used by the panic/error-reporting path (§7), which must still
/// produce a message after an arena has been torn down.
#[unsafe(no_mangle)]
pub extern "C" fn rt_io_eprint(ptr: *const u8, len: u64) {
    if ptr.is_null() {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(ptr, len as usize) };
    let _ = std::io::stderr().write_all(bytes);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_does_not_panic() {
        rt_io_flush_stdout();
    }

    #[test]
    fn eprint_handles_null() {
        rt_io_eprint(std::ptr::null(), 0);
    }
}
