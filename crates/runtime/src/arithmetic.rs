//! Checked-arithmetic helpers (spec §4.6 "Arithmetic mode").
//!
//! Under `checked` mode, codegen emits a call to one of these instead of
//! the raw C operator; under `unchecked` it emits the operator directly
//! and these functions are never linked in. Division and modulo are always
//! checked (spec: "division/modulo are always checked for divide-by-zero")
//! regardless of arithmetic mode.

use crate::error::runtime_panic;

macro_rules! checked_ops {
    ($ty:ty, $add:ident, $sub:ident, $mul:ident, $div:ident, $rem:ident) => {
        #[unsafe(no_mangle)]
        pub extern "C" fn $add(a: $ty, b: $ty) -> $ty {
            a.checked_add(b).unwrap_or_else(|| runtime_panic("integer overflow in +"))
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $sub(a: $ty, b: $ty) -> $ty {
            a.checked_sub(b).unwrap_or_else(|| runtime_panic("integer overflow in -"))
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $mul(a: $ty, b: $ty) -> $ty {
            a.checked_mul(b).unwrap_or_else(|| runtime_panic("integer overflow in *"))
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $div(a: $ty, b: $ty) -> $ty {
            if b == 0 {
                runtime_panic("division by zero");
            }
            a.checked_div(b).unwrap_or_else(|| runtime_panic("integer overflow in /"))
        }

        #[unsafe(no_mangle)]
        pub extern "C" fn $rem(a: $ty, b: $ty) -> $ty {
            if b == 0 {
                runtime_panic("division by zero (modulo)");
            }
            a.checked_rem(b).unwrap_or_else(|| runtime_panic("integer overflow in %"))
        }
    };
}

checked_ops!(
    i64,
    rt_add_checked_long,
    rt_sub_checked_long,
    rt_mul_checked_long,
    rt_div_checked_long,
    rt_rem_checked_long
);
checked_ops!(
    i32,
    rt_add_checked_int32,
    rt_sub_checked_int32,
    rt_mul_checked_int32,
    rt_div_checked_int32,
    rt_rem_checked_int32
);
checked_ops!(
    u64,
    rt_add_checked_uint,
    rt_sub_checked_uint,
    rt_mul_checked_uint,
    rt_div_checked_uint,
    rt_rem_checked_uint
);
checked_ops!(
    u32,
    rt_add_checked_uint32,
    rt_sub_checked_uint32,
    rt_mul_checked_uint32,
    rt_div_checked_uint32,
    rt_rem_checked_uint32
);

/// Division/modulo are always checked for divide-by-zero even under
/// `unchecked` arithmetic mode; codegen routes unchecked `+ - *` straight
/// to the C operator but still calls these two for `/ %`.
#[unsafe(no_mangle)]
pub extern "C" fn rt_div_unchecked_long(a: i64, b: i64) -> i64 {
    if b == 0 {
        runtime_panic("division by zero");
    }
    a.wrapping_div(b)
}

#[unsafe(no_mangle)]
pub extern "C" fn rt_rem_unchecked_long(a: i64, b: i64) -> i64 {
    if b == 0 {
        runtime_panic("division by zero (modulo)");
    }
    a.wrapping_rem(b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_add_traps_are_not_hit_on_normal_input() {
        assert_eq!(rt_add_checked_long(2, 3), 5);
    }

    #[test]
    fn checked_div_succeeds_on_nonzero_divisor() {
        assert_eq!(rt_div_checked_long(10, 3), 3);
        assert_eq!(rt_rem_checked_long(10, 3), 1);
    }

    #[test]
    fn checked_mul_succeeds_within_range() {
        assert_eq!(rt_mul_checked_int32(6, 7), 42);
    }
}
