//! Runtime support linked into every compiled SN program (spec §6).
//!
//! This crate builds as a `staticlib` consumed by generated C (identical
//! in spirit to how `seq-runtime` backs `navicore-cem3`'s generated LLVM
//! IR) and as an `rlib` for its own unit tests. The `extern "C"` surface
//! lives entirely in [`ffi`]; everything else is the Rust-side
//! implementation behind it.

pub mod arena;
pub mod arithmetic;
pub mod array;
pub mod error;
pub mod ffi;
pub mod io;
#[cfg(feature = "malloc-redirect")]
pub mod malloc_redirect;
pub mod promote;
pub mod concurrency;
pub mod string_ops;

pub use arena::RtArena;
pub use error::runtime_panic;
