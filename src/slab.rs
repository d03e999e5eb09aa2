//! A lock-free slab allocator for objects of a single fixed size class.
//!
//! # Internal design
//! ## Superblock
//! A [`superblock`] is an aligned, OS-backed region holding a contiguous
//! array of equally-sized slots plus a small header that points back at the
//! [`Descriptor`](descriptor::Descriptor) owning it, so that
//! `descriptor_of(ptr)` is an O(1) mask-and-load instead of a search.
//!
//! ## Descriptor
//! Every superblock has exactly one [`Descriptor`](descriptor::Descriptor),
//! whose [`Anchor`](anchor::Anchor) packs the free-slot chain head, the
//! free-slot count, the FULL/PARTIAL/EMPTY state, and an ABA tag into a
//! single 64-bit word that is mutated only by CAS.
//!
//! ## Descriptor pool
//! Retired descriptors are recycled through a process-wide, hazard-pointer
//! protected, lock-free stack (see [`descriptor_pool`]), batch-refilled from
//! the OS page allocator.
//!
//! ## Size class / Heap
//! A [`SizeClass`] owns the lock-free partial-descriptor stack for one slot
//! size. A [`Heap`] is the per-thread-group front end: it owns a single
//! *active* descriptor slot and falls back to its size class's partial list,
//! and ultimately to a freshly OS-allocated superblock, on miss.
//!
//! # References
//! * Michael, M. M. (2004). "Scalable Lock-Free Dynamic Memory Allocation".

pub mod anchor;
#[cfg(any(test, feature = "testing"))]
pub mod consistency;
pub mod descriptor;
pub mod descriptor_pool;
pub mod heap;
pub mod platform;
pub mod size_class;
pub mod superblock;

mod collection;

pub use heap::Heap;
pub use size_class::SizeClass;

use std::sync::atomic::{AtomicBool, Ordering};

/// Set by the `assert_invariant!` machinery the moment any internal
/// consistency check fails. Lets other threads poll [`is_stopped`] in tests
/// to halt cleanly instead of continuing to operate on a corrupted heap.
static STOP_THREADS: AtomicBool = AtomicBool::new(false);

/// Whether an invariant violation has already been observed by some thread.
pub fn is_stopped() -> bool {
    STOP_THREADS.load(Ordering::Acquire)
}

/// Asserts an allocator invariant. On failure this publishes [`is_stopped`]
/// with a release store, so a concurrent thread observing it through
/// [`is_stopped`] after an acquire load is guaranteed to see the failure,
/// before panicking.
macro_rules! assert_invariant {
    ($cond:expr $(, $($arg:tt)+)?) => {
        if !($cond) {
            $crate::slab::STOP_THREADS.store(true, std::sync::atomic::Ordering::Release);
            panic!($($($arg)+)?);
        }
    };
}
pub(crate) use assert_invariant;
