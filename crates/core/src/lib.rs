//! Arena allocation and generational handle-table primitives shared by the
//! SN compiler (for AST/string allocation) and the SN runtime library (for
//! the handle ABI consumed by generated C).
//!
//! This crate has no knowledge of SN source syntax or C code generation; it
//! is the allocation substrate both of those build on.

pub mod bump;
pub mod handle;

pub use bump::BumpArena;
pub use handle::{Handle, HandleTable, Slot, HANDLE_NULL};
