//! Indirection over the atomics implementation so the concurrency-critical
//! modules (the anchor CAS loop, the descriptor pool stack, the hazard-record
//! list) can be exercised under `loom`'s model checker without duplicating
//! their logic.
//!
//! Everything under `crate::sync` behaves like `std::sync` when `cfg(loom)`
//! is not set, and is swapped for `loom`'s instrumented equivalents when it
//! is set.

#[cfg(not(loom))]
pub use std::sync::atomic;

#[cfg(loom)]
pub use loom::sync::atomic;
