#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(rust_2018_idioms)]
//! A lock-free slab allocator for small, fixed-size objects.
//!
//! This crate implements the Michael (2004) lock-free allocator design: a
//! per-superblock state machine packed into a single 64-bit atomic word (the
//! "anchor"), coordinated through a heap's active descriptor slot and a
//! per-size-class partial list, with descriptor reclamation made safe via
//! hazard pointers.
//!
//! # Layering
//! * [`hazard_ptr`]: safe memory reclamation for lock-free readers.
//! * [`queues`]: the MPSC queue used internally to recycle hazard records.
//! * [`slab`]: the allocator itself - anchors, descriptors, the descriptor
//!   pool, size classes, heaps and the allocate/free paths.
//!
//! # Feature-Flags
//! * `std` (default): required - this allocator talks to the OS page
//!   allocator and hazard-pointer machinery through `std`.
//! * `debug`: enables a per-slot sentinel byte used to catch double-frees
//!   and foreign-pointer frees on a best-effort basis.
//! * `testing`: exposes the offline consistency checker ([`slab::consistency`])
//!   outside of `#[cfg(test)]`.
//!
//! # Example
//! ```
//! use lfslab::slab::{Heap, SizeClass};
//!
//! let sc = SizeClass::new(64);
//! let heap = Heap::new(&sc);
//!
//! let ptr = heap.alloc().expect("the system allocator has memory available");
//! unsafe { heap.free(ptr) };
//! ```

extern crate alloc;

pub mod hazard_ptr;
pub mod queues;
pub mod slab;

pub(crate) mod sync;

pub use slab::{Heap, SizeClass};
