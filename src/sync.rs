//! Atomics facade so the cursor protocol can be model-checked under loom.
//!
//! Record headers live in caller memory and always use the std atomics; only
//! the control cursors switch to loom types.

#[cfg(not(feature = "loom"))]
pub(crate) use std::hint::spin_loop;
#[cfg(feature = "loom")]
pub(crate) use loom::hint::spin_loop;

#[cfg(not(feature = "loom"))]
pub(crate) use std::sync::atomic::AtomicU64;
#[cfg(feature = "loom")]
pub(crate) use loom::sync::atomic::AtomicU64;

pub(crate) use std::sync::atomic::Ordering;
