//! The process-wide pool of retired descriptors.
//!
//! A live `Descriptor` is never freed directly: once its anchor reaches
//! `EMPTY` and nobody manages to re-arm it, its superblock is returned to the
//! OS and the descriptor itself is handed to the hazard-pointer subsystem for
//! deferred reclamation, which eventually pushes it back onto [`POOL`] for
//! reuse by a future `desc_alloc`. A concurrent thread may be mid-way through
//! reading `POOL`'s head and about to dereference its `next` field, so
//! skipping the hazard-protected deferral and reusing the descriptor
//! immediately would be a use-after-free.

use std::sync::atomic::Ordering;

use crate::slab::anchor::AnchorState;
use crate::slab::collection::{stack_domain, DescriptorStack};
use crate::slab::descriptor::Descriptor;
use crate::slab::superblock;

/// Batch size for OS-backed descriptor refills.
pub const NUM_DESC_BATCH: usize = 64;

static POOL: DescriptorStack = DescriptorStack::new();

/// Draws a descriptor from the pool, OS-allocating and threading a fresh
/// batch of [`NUM_DESC_BATCH`] descriptors if the pool is empty. The returned
/// descriptor is marked `in_use` and otherwise zeroed/uninitialized - the
/// caller is responsible for populating `sb`, `slot_size`, `max_count`,
/// `heap` and the anchor before publishing it anywhere.
pub(crate) fn desc_alloc() -> *mut Descriptor {
    loop {
        if let Some(desc) = POOL.pop() {
            let d = unsafe { &*desc };
            debug_assert!(
                !d.in_use.load(Ordering::Relaxed),
                "descriptor popped from the pool while still marked in_use"
            );
            d.in_use.store(true, Ordering::Relaxed);
            return desc;
        }

        let batch: Vec<*mut Descriptor> = (0..NUM_DESC_BATCH)
            .map(|_| Box::into_raw(Box::new(Descriptor::new_uninit())))
            .collect();

        for pair in batch.windows(2) {
            unsafe { &*pair[0] }.next.store(pair[1], Ordering::Relaxed);
        }
        unsafe { &*batch[NUM_DESC_BATCH - 1] }
            .next
            .store(std::ptr::null_mut(), Ordering::Relaxed);

        if POOL.try_install_chain_if_empty(batch[1]) {
            let head = unsafe { &*batch[0] };
            head.in_use.store(true, Ordering::Relaxed);
            return batch[0];
        }

        // Some other thread's refill (or a retiring descriptor) got there
        // first; this batch was never published, so it's ours alone to free.
        for desc in batch {
            drop(unsafe { Box::from_raw(desc) });
        }
    }
}

/// Retires `desc`: its anchor must already be `EMPTY` and it must be marked
/// `in_use`. Frees its superblock immediately (no reader can still be
/// walking an `EMPTY` descriptor's free chain), clears `in_use`, and defers
/// the descriptor's return to the pool until the hazard-pointer subsystem
/// confirms no thread still holds it protected.
pub(crate) fn desc_retire(desc: *mut Descriptor) {
    let d = unsafe { &*desc };
    debug_assert_eq!(d.anchor().state, AnchorState::Empty, "only EMPTY descriptors may be retired");
    debug_assert!(d.in_use.load(Ordering::Relaxed), "retiring a descriptor that was never marked in_use");

    superblock::free_sb(d.sb);
    d.in_use.store(false, Ordering::Relaxed);

    stack_domain::retire(desc, |ptr: *mut Descriptor| {
        POOL.push(ptr);
    });
}
