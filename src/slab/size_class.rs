//! A size class: one slot size, and the lock-free stack of descriptors
//! currently `PARTIAL` (or stale `EMPTY`) for that size.

use crate::slab::anchor::{AnchorState, MAX_SLOT_COUNT};
use crate::slab::collection::DescriptorStack;
use crate::slab::descriptor::Descriptor;
use crate::slab::descriptor_pool;
use crate::slab::superblock;

/// Owns the partial-descriptor stack for one slot size. Shared by every
/// [`Heap`](crate::slab::heap::Heap) built on top of it - multiple heaps on
/// the same size class simply compete for the same partial stack, which is
/// exactly the sharing the lock-free design is built to support.
pub struct SizeClass {
    slot_size: usize,
    partial: DescriptorStack,
}

impl SizeClass {
    /// Builds a size class for `slot_size`-byte allocations. `slot_size`
    /// must be at least 4 bytes, since a free slot stores its successor's
    /// index as a `u32` in its own first four bytes, and must leave a
    /// superblock with fewer than 1024 slots, since the anchor packs
    /// `avail`/`count` into 10 bits each (spec.md §8).
    pub fn new(slot_size: usize) -> Self {
        assert!(slot_size >= 4, "slot_size must be at least 4 bytes to hold a free-chain index");
        let max_count = superblock::slot_count(slot_size);
        assert!(
            max_count < MAX_SLOT_COUNT,
            "slot_size {slot_size} packs {max_count} slots per superblock, \
             overflowing the anchor's 10-bit avail/count fields (limit {MAX_SLOT_COUNT})"
        );
        Self {
            slot_size,
            partial: DescriptorStack::new(),
        }
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// Exposes the raw partial stack for the offline consistency checker,
    /// which needs to drain and restore it wholesale.
    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn partial_stack(&self) -> &DescriptorStack {
        &self.partial
    }

    /// Pushes `desc` onto the partial stack. Used both when a `FULL`
    /// descriptor transitions to `PARTIAL` on free and can't take the active
    /// slot, and when a descriptor loses the active-slot CAS race right
    /// after being created.
    pub(crate) fn put_partial(&self, desc: *mut Descriptor) {
        self.partial.push(desc);
    }

    /// Pops the next usable descriptor from the partial stack, retiring and
    /// skipping any stale `EMPTY` entries it encounters along the way.
    pub(crate) fn get_partial(&self) -> Option<*mut Descriptor> {
        loop {
            let desc = self.partial.pop()?;
            let state = unsafe { &*desc }.anchor().state;
            if state == AnchorState::Empty {
                descriptor_pool::desc_retire(desc);
                continue;
            }
            return Some(desc);
        }
    }

    /// Opportunistically retires up to `limit` stale `EMPTY` descriptors
    /// found at the front of the partial stack, bounded so a `free()` call
    /// can't be stuck doing unbounded cleanup work. Descriptors that are not
    /// `EMPTY` are pushed back.
    pub(crate) fn remove_empty_partial(&self, limit: usize) {
        let mut reinsert = Vec::new();
        let mut removed = 0;

        while removed < limit {
            let Some(desc) = self.partial.pop() else {
                break;
            };
            if unsafe { &*desc }.anchor().state == AnchorState::Empty {
                descriptor_pool::desc_retire(desc);
                removed += 1;
            } else {
                reinsert.push(desc);
                break;
            }
        }

        for desc in reinsert {
            self.partial.push(desc);
        }
    }
}
