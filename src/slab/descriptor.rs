//! Per-superblock metadata record: the [`Descriptor`] and its atomic
//! [`Anchor`](anchor) CAS helper.

// The anchor is the ABA-sensitive hot spot in this crate: it goes through
// `crate::sync` rather than `std::sync` directly so its CAS loop can be
// exercised under `loom`'s model checker (see the `loom_tests` module
// below). `in_use`/`next` stay on plain `std::sync` atomics - they're only
// ever touched by a descriptor's exclusive owner or through the
// hazard-protected stack in `collection`, which is itself not
// loom-instrumented (see DESIGN.md).
use crate::sync::atomic::{AtomicU64, Ordering};

use crate::slab::anchor::{Anchor, AnchorState};

/// Metadata for exactly one live superblock.
///
/// A `Descriptor` is drawn from the [`descriptor_pool`](crate::slab::descriptor_pool),
/// attached to a freshly OS-allocated superblock, installed as a heap's
/// active slot or pushed onto a size class's partial stack, and - once its
/// anchor reaches `EMPTY` and nobody re-arms it - retired: its superblock is
/// freed, `in_use` is cleared, and the descriptor itself is returned to the
/// pool through hazard-deferred reclamation.
pub struct Descriptor {
    pub(crate) anchor: AtomicU64,
    pub(crate) sb: *mut u8,
    pub(crate) slot_size: usize,
    pub(crate) max_count: u32,
    /// Back-reference to the owning heap, type-erased to `*const ()`. Null
    /// until the descriptor is handed to a heap in `alloc_from_new_sb`; read
    /// only by the thread that currently owns the descriptor (has
    /// CAS-removed it from `active`, or is retiring it), so plain
    /// loads/stores are sufficient.
    ///
    /// Type-erased rather than `*const Heap<'sc>` because a `Descriptor` is
    /// drawn from the process-wide descriptor pool and is not itself
    /// generic over any one heap's `'sc` - only `Heap::alloc_from_new_sb`
    /// (which stores it) and `Heap::free` (which casts it back to
    /// `*const Heap<'sc>` using its own `'sc`) ever touch this field.
    ///
    /// # Safety invariant
    /// The `Heap` this points at must outlive every descriptor it ever
    /// installs as active or pushes onto its size class's partial stack -
    /// exactly as the superblock header's descriptor pointer must stay
    /// valid for as long as any of its slots are in use.
    pub(crate) heap: *const (),
    /// Assertion-only bookkeeping: true from the moment `desc_alloc` hands a
    /// descriptor out until `desc_retire` reclaims it. A descriptor must
    /// never be observed with `in_use == true` while also sitting in the
    /// descriptor pool's free stack.
    pub(crate) in_use: std::sync::atomic::AtomicBool,
    /// Intrusive link used while this descriptor resides in the descriptor
    /// pool's free stack or a size class's partial stack (never both at
    /// once).
    pub(crate) next: std::sync::atomic::AtomicPtr<Descriptor>,
}

// Descriptors are referenced through raw pointers from multiple threads by
// design (that is the entire point of the anchor CAS protocol); all mutation
// goes through atomics or is gated by exclusive logical ownership.
unsafe impl Sync for Descriptor {}
unsafe impl Send for Descriptor {}

impl Descriptor {
    /// Builds a descriptor for a not-yet-populated superblock. Starts out
    /// `FULL` with zero free slots so that no other thread can observe it as
    /// allocatable before `Heap::alloc_from_new_sb` finishes threading the
    /// free-slot chain and installs a `PARTIAL` anchor.
    pub(crate) fn new_uninit() -> Self {
        Self {
            anchor: AtomicU64::new(Anchor::empty_full(0).into()),
            sb: std::ptr::null_mut(),
            slot_size: 0,
            max_count: 0,
            heap: std::ptr::null(),
            in_use: std::sync::atomic::AtomicBool::new(false),
            next: std::sync::atomic::AtomicPtr::new(std::ptr::null_mut()),
        }
    }

    /// Atomically loads the current anchor.
    pub fn anchor(&self) -> Anchor {
        Anchor::from(self.anchor.load(Ordering::Acquire))
    }

    /// Performs the anchor CAS: if `old` is `EMPTY`, `new` must also be
    /// `EMPTY` - an `EMPTY` descriptor is being retired and must never be
    /// re-armed by a racing allocate or free.
    pub fn update_anchor(&self, old: Anchor, new: Anchor, success: Ordering, failure: Ordering) -> bool {
        if old.state == AnchorState::Empty {
            debug_assert_eq!(
                new.state,
                AnchorState::Empty,
                "an EMPTY descriptor must not be re-armed by a concurrent CAS"
            );
        }

        self.anchor
            .compare_exchange(old.into(), new.into(), success, failure)
            .is_ok()
    }

    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn superblock_ptr(&self) -> *mut u8 {
        self.sb
    }

    /// Index, within this descriptor's superblock, of the slot `ptr` points
    /// at. Does not validate that `ptr` actually belongs to this superblock;
    /// callers locate the descriptor via `superblock::descriptor_of` first,
    /// which already guarantees that.
    pub fn index_of(&self, ptr: *mut u8) -> u32 {
        let offset = (ptr as usize) - (self.sb as usize);
        (offset / self.slot_size) as u32
    }

    pub fn slot_ptr(&self, index: u32) -> *mut u8 {
        (self.sb as usize + index as usize * self.slot_size) as *mut u8
    }
}

impl std::fmt::Debug for Descriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Descriptor {{ anchor: {:?}, slot_size: {}, max_count: {} }}",
            self.anchor(),
            self.slot_size,
            self.max_count
        )
    }
}

/// Model-checks the anchor CAS loop under every thread interleaving `loom`
/// is willing to explore: two threads racing to take a slot from the same
/// free chain, directly against `Descriptor::alloc_slot`, without going
/// through `Heap` or the hazard-protected descriptor-pool stack, neither of
/// which is loom-instrumented (see DESIGN.md).
#[cfg(all(test, loom))]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    fn seeded(count: u32) -> Descriptor {
        let mut desc = Descriptor::new_uninit();
        desc.anchor.store(
            u64::from(Anchor {
                avail: 0,
                count,
                state: AnchorState::Partial,
                tag: 0,
            }),
            Ordering::Relaxed,
        );
        desc.max_count = count;
        desc
    }

    /// Two threads each try to take one slot via the same CAS loop
    /// `Heap::alloc_from_descriptor` uses. Every successful CAS must
    /// increment `tag` and decrement `count` by exactly one; no update may
    /// be lost.
    #[test]
    fn concurrent_take_never_loses_a_decrement() {
        loom::model(|| {
            let desc = Arc::new(seeded(2));

            let take = |d: Arc<Descriptor>| {
                loop {
                    let old = d.anchor();
                    if old.count == 0 {
                        return false;
                    }
                    let new_count = old.count - 1;
                    let new = Anchor {
                        avail: old.avail,
                        count: new_count,
                        state: if new_count == 0 { AnchorState::Full } else { AnchorState::Partial },
                        tag: old.tag.wrapping_add(1),
                    };
                    if d.update_anchor(old, new, Ordering::AcqRel, Ordering::Acquire) {
                        return true;
                    }
                }
            };

            let d1 = desc.clone();
            let t1 = thread::spawn(move || take(d1));
            let d2 = desc.clone();
            let t2 = thread::spawn(move || take(d2));

            let took1 = t1.join().unwrap();
            let took2 = t2.join().unwrap();

            assert!(took1 && took2, "both threads must succeed with 2 slots available");
            let final_anchor = desc.anchor();
            assert_eq!(0, final_anchor.count);
            assert_eq!(AnchorState::Full, final_anchor.state);
            assert_eq!(2, final_anchor.tag);
        });
    }

    /// An `EMPTY` anchor must never be CAS-ed into a non-`EMPTY` state by a
    /// racing thread.
    #[test]
    fn empty_anchor_is_never_rearmed() {
        loom::model(|| {
            let desc = Arc::new(seeded(0));
            desc.anchor.store(
                u64::from(Anchor {
                    avail: 0,
                    count: 0,
                    state: AnchorState::Empty,
                    tag: 0,
                }),
                Ordering::Relaxed,
            );

            let d1 = desc.clone();
            let t1 = thread::spawn(move || {
                let old = d1.anchor();
                assert_eq!(AnchorState::Empty, old.state);
                // Attempting to re-arm an EMPTY anchor must fail under
                // debug assertions; here we only assert the CAS helper
                // refuses to leave the descriptor non-EMPTY if it races
                // against a concurrent retirement that keeps it EMPTY.
                let new = Anchor { avail: 0, count: 0, state: AnchorState::Empty, tag: old.tag + 1 };
                d1.update_anchor(old, new, Ordering::AcqRel, Ordering::Acquire)
            });

            assert!(t1.join().unwrap());
            assert_eq!(AnchorState::Empty, desc.anchor().state);
        });
    }
}
