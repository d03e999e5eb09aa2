//! Per-thread-group front end: owns a single active descriptor slot and
//! falls back to its size class's partial stack, then to a freshly
//! OS-allocated superblock (spec.md §3, §4.4-§4.6).

use std::sync::atomic::{AtomicPtr, Ordering};

use crate::slab::anchor::{Anchor, AnchorState};
use crate::slab::assert_invariant;
use crate::slab::descriptor::Descriptor;
use crate::slab::descriptor_pool;
use crate::slab::size_class::SizeClass;
use crate::slab::superblock;

#[cfg(feature = "debug")]
const SLOT_DEBUG_IN_USE: u8 = 0xaa;
#[cfg(feature = "debug")]
const SLOT_DEBUG_FREE: u8 = 0x00;

/// A lock-free front end for allocating and freeing fixed-size slots drawn
/// from one [`SizeClass`].
///
/// The `'sc` lifetime ties a `Heap` to the `SizeClass` it was built on, so
/// the borrow checker - not a doc-comment - rules out a `SizeClass` being
/// dropped while a `Heap` built on it is still reachable (spec.md §3).
pub struct Heap<'sc> {
    size_class: &'sc SizeClass,
    active: AtomicPtr<Descriptor>,
}

// A Heap is referenced from its own descriptors (`Descriptor::heap`) and
// shared across threads through `&Heap`; all mutable state is atomic.
unsafe impl<'sc> Sync for Heap<'sc> {}
unsafe impl<'sc> Send for Heap<'sc> {}

enum NewSuperblock {
    Installed(*mut u8),
    LostRace,
}

impl<'sc> Heap<'sc> {
    /// Builds a heap over `size_class`.
    pub fn new(size_class: &'sc SizeClass) -> Self {
        Self {
            size_class,
            active: AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    pub(crate) fn size_class(&self) -> &SizeClass {
        self.size_class
    }

    /// Non-destructively reads the currently active descriptor, if any.
    /// Used only by the offline consistency checker - every other caller
    /// must go through the CAS-based swap/compare_exchange in [`alloc`]/
    /// [`free_to_descriptor`], never a plain load.
    #[cfg(any(test, feature = "testing"))]
    pub(crate) fn peek_active(&self) -> *mut Descriptor {
        self.active.load(Ordering::Acquire)
    }

    /// Returns a slot-sized region, or `None` only if the OS allocator has
    /// no memory left to back a new superblock.
    pub fn alloc(&self) -> Option<*mut u8> {
        loop {
            let taken = self.active.swap(std::ptr::null_mut(), Ordering::AcqRel);
            let desc = if !taken.is_null() {
                taken
            } else if let Some(d) = self.size_class().get_partial() {
                d
            } else {
                match self.alloc_from_new_sb() {
                    Some(NewSuperblock::Installed(addr)) => return Some(addr),
                    Some(NewSuperblock::LostRace) => continue,
                    None => return None,
                }
            };

            if let Some(addr) = self.alloc_from_descriptor(desc) {
                return Some(addr);
            }
            // desc's anchor was stale EMPTY; alloc_from_descriptor already
            // retired it. Retry from the top.
        }
    }

    /// Drives the anchor CAS loop described in spec.md §4.4 for a descriptor
    /// this thread has exclusively taken from either `active` or the
    /// partial stack. Returns `None` if the descriptor turned out to be a
    /// stale `EMPTY` entry (already retired by the time this returns).
    fn alloc_from_descriptor(&self, desc: *mut Descriptor) -> Option<*mut u8> {
        let d = unsafe { &*desc };

        loop {
            let old = d.anchor();
            if old.state == AnchorState::Empty {
                descriptor_pool::desc_retire(desc);
                return None;
            }
            assert_invariant!(
                old.state == AnchorState::Partial && old.count > 0,
                "a descriptor reachable from active or partial must be PARTIAL with free slots"
            );

            let addr = d.slot_ptr(old.avail);
            let next = unsafe { (addr as *const u32).read_unaligned() };

            let new_count = old.count - 1;
            let new_state = if new_count == 0 { AnchorState::Full } else { AnchorState::Partial };
            if new_state == AnchorState::Partial {
                assert_invariant!(next < d.max_count(), "free-chain next-index out of range");
            }

            let new = Anchor {
                avail: next,
                count: new_count,
                state: new_state,
                tag: old.tag.wrapping_add(1),
            };

            if d.update_anchor(old, new, Ordering::AcqRel, Ordering::Acquire) {
                if new.state == AnchorState::Partial
                    && self
                        .active
                        .compare_exchange(std::ptr::null_mut(), desc, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                {
                    self.size_class().put_partial(desc);
                }

                #[cfg(feature = "debug")]
                unsafe {
                    *addr.add(d.slot_size() - 1) = SLOT_DEBUG_IN_USE;
                }

                return Some(addr);
            }
        }
    }

    /// Draws a fresh descriptor and superblock and attempts to install it as
    /// this heap's active slot (spec.md §4.5). `None` means the OS allocator
    /// is out of memory; `Some(LostRace)` means another thread published a
    /// descriptor to `active` first, so this one was retired unused and the
    /// caller should retry from the top.
    fn alloc_from_new_sb(&self) -> Option<NewSuperblock> {
        let desc = descriptor_pool::desc_alloc();
        let sc = self.size_class();
        let slot_size = sc.slot_size();
        let max = superblock::slot_count(slot_size);
        assert_invariant!(max >= 2, "size class's slot size leaves room for fewer than 2 slots per superblock");

        let sb = superblock::alloc_sb(desc);

        // Thread slots [1, max-1) into the free chain; slot 0 is handed
        // directly to the caller below. The last slot's next-index is never
        // followed (count bounds traversal) but is written anyway so a
        // debug build never reads uninitialized memory.
        for index in 1..max.saturating_sub(1) {
            let slot = unsafe { sb.add((index as usize) * slot_size) };
            unsafe { (slot as *mut u32).write_unaligned(index + 1) };
        }
        if max > 1 {
            let last = unsafe { sb.add(((max - 1) as usize) * slot_size) };
            unsafe { (last as *mut u32).write_unaligned(u32::MAX) };
        }

        let d = unsafe { &*desc };
        unsafe {
            (*desc).sb = sb;
            (*desc).slot_size = slot_size;
            (*desc).max_count = max;
            (*desc).heap = self as *const Heap<'sc> as *const ();
        }
        d.anchor.store(
            u64::from(Anchor {
                avail: 1,
                count: max - 1,
                state: AnchorState::Partial,
                tag: 0,
            }),
            Ordering::Release,
        );

        if self
            .active
            .compare_exchange(std::ptr::null_mut(), desc, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            #[cfg(feature = "debug")]
            unsafe {
                *sb.add(slot_size - 1) = SLOT_DEBUG_IN_USE;
            }
            Some(NewSuperblock::Installed(sb))
        } else {
            d.anchor.store(
                u64::from(Anchor {
                    avail: 0,
                    count: max,
                    state: AnchorState::Empty,
                    tag: 1,
                }),
                Ordering::Release,
            );
            descriptor_pool::desc_retire(desc);
            Some(NewSuperblock::LostRace)
        }
    }

    /// Returns `ptr` (previously issued by [`alloc`](Heap::alloc) on this
    /// heap, or on any other heap sharing the same size class) to its
    /// owning descriptor (spec.md §4.6).
    ///
    /// # Safety
    /// `ptr` must have been returned by a prior `alloc()` call and must not
    /// already have been freed.
    pub unsafe fn free(&self, ptr: *mut u8) {
        let desc = unsafe { superblock::descriptor_of(ptr) };
        assert_invariant!(!desc.is_null(), "free() called with a pointer that has no superblock header");

        let d = unsafe { &*desc };

        #[cfg(feature = "debug")]
        unsafe {
            let byte = *ptr.add(d.slot_size() - 1);
            assert_invariant!(byte != SLOT_DEBUG_FREE, "double free detected via slot sentinel byte");
            *ptr.add(d.slot_size() - 1) = SLOT_DEBUG_FREE;
        }

        let owning_heap = unsafe { &*(d.heap as *const Heap<'sc>) };
        owning_heap.free_to_descriptor(desc, ptr);
    }

    fn free_to_descriptor(&self, desc: *mut Descriptor, ptr: *mut u8) {
        let d = unsafe { &*desc };

        loop {
            let old = d.anchor();
            unsafe { (ptr as *mut u32).write_unaligned(old.avail) };

            let new_avail = d.index_of(ptr);
            let new_count = old.count + 1;
            let mut new_state = old.state;
            if old.state == AnchorState::Full {
                new_state = AnchorState::Partial;
            }
            if new_count == d.max_count() {
                new_state = AnchorState::Empty;
            }

            let new = Anchor {
                avail: new_avail,
                count: new_count,
                state: new_state,
                tag: old.tag.wrapping_add(1),
            };

            if d.update_anchor(old, new, Ordering::AcqRel, Ordering::Acquire) {
                if new.state == AnchorState::Empty {
                    if self
                        .active
                        .compare_exchange(desc, std::ptr::null_mut(), Ordering::AcqRel, Ordering::Acquire)
                        .is_ok()
                    {
                        descriptor_pool::desc_retire(desc);
                    } else {
                        self.size_class().remove_empty_partial(2);
                    }
                } else if old.state == AnchorState::Full && new.state == AnchorState::Partial {
                    if self
                        .active
                        .compare_exchange(std::ptr::null_mut(), desc, Ordering::AcqRel, Ordering::Acquire)
                        .is_err()
                    {
                        self.size_class().put_partial(desc);
                    }
                }
                return;
            }
        }
    }
}
