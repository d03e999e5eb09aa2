//! Offline consistency checker.
//!
//! This walks a heap's active descriptor and then every descriptor currently
//! on its size class's partial stack, checking each one against the
//! allocator's core invariants (state/count agreement, free-chain shape,
//! slot-size consistency). It is a terminal diagnostic, not something meant
//! to run on a hot path: it drains the partial stack wholesale while it
//! works (restoring it before returning), which would otherwise contend
//! with every other thread's `alloc`/`free` calls - hence this module is
//! compiled only for tests or behind the `testing` feature, never exposed
//! as a library call alongside `alloc`/`free`.

use std::collections::HashSet;
use std::fmt;

use crate::slab::anchor::{Anchor, AnchorState};
use crate::slab::descriptor::Descriptor;
use crate::slab::heap::Heap;

/// One violated invariant, naming the descriptor (by superblock address, a
/// stable and printable identity) and what was wrong with it.
#[derive(Debug, PartialEq, Eq)]
pub enum ConsistencyError {
    /// `count`/`state` disagree: `count==max` must imply `EMPTY`,
    /// `count==0` must imply `FULL`, anything else must be `PARTIAL`.
    StateCountMismatch { sb: usize, anchor: Anchor },
    /// The free-slot chain starting at `avail` did not have exactly `count`
    /// reachable entries before either cycling or running off the end.
    ChainLengthMismatch { sb: usize, expected: u32, found: u32 },
    /// The free-slot chain visited the same slot index twice.
    ChainCycle { sb: usize, index: u32 },
    /// The free-slot chain referenced a slot index `>= max_count`.
    ChainIndexOutOfRange { sb: usize, index: u32, max_count: u32 },
    /// A descriptor's `slot_size` does not match its size class's.
    SlotSizeMismatch { sb: usize, descriptor: usize, size_class: usize },
    /// `debug` feature only: a slot reachable from the free chain does not
    /// carry the free sentinel byte.
    FreeSlotNotSentinel { sb: usize, index: u32 },
    /// `debug` feature only: a slot *not* reachable from the free chain (so,
    /// by elimination, in use) carries the free sentinel byte.
    InUseSlotHasSentinel { sb: usize, index: u32 },
}

impl fmt::Display for ConsistencyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateCountMismatch { sb, anchor } => {
                write!(f, "sb {sb:#x}: state {:?} inconsistent with count {}", anchor.state, anchor.count)
            }
            Self::ChainLengthMismatch { sb, expected, found } => {
                write!(f, "sb {sb:#x}: free chain has {found} reachable slots, anchor claims {expected}")
            }
            Self::ChainCycle { sb, index } => write!(f, "sb {sb:#x}: free chain revisits slot {index}"),
            Self::ChainIndexOutOfRange { sb, index, max_count } => {
                write!(f, "sb {sb:#x}: free chain references slot {index}, out of range for max_count {max_count}")
            }
            Self::SlotSizeMismatch { sb, descriptor, size_class } => {
                write!(f, "sb {sb:#x}: descriptor slot_size {descriptor} != size class slot_size {size_class}")
            }
            Self::FreeSlotNotSentinel { sb, index } => {
                write!(f, "sb {sb:#x}: free slot {index} missing debug sentinel")
            }
            Self::InUseSlotHasSentinel { sb, index } => {
                write!(f, "sb {sb:#x}: in-use slot {index} still carries the free debug sentinel")
            }
        }
    }
}

/// Walks `heap`'s active descriptor and every descriptor on its size class's
/// partial stack, returning every invariant violation found. An empty
/// result means the heap passed every check.
///
/// # Safety
/// No other thread may be concurrently calling `alloc`/`free` on `heap` (or
/// any other heap sharing its size class) while this runs: draining and
/// restoring the partial stack is not itself safe to race against normal
/// allocator traffic.
pub fn check_heap(heap: &Heap<'_>) -> Vec<ConsistencyError> {
    let mut errors = Vec::new();

    let active = heap.peek_active();
    if !active.is_null() {
        check_descriptor(active, heap, &mut errors);
    }

    let sc = heap.size_class();
    let partial = sc.partial_stack().drain_all();
    for desc in &partial {
        check_descriptor(*desc, heap, &mut errors);
    }
    for desc in partial {
        sc.partial_stack().push(desc);
    }

    errors
}

fn check_descriptor(desc: *mut Descriptor, heap: &Heap<'_>, errors: &mut Vec<ConsistencyError>) {
    let d = unsafe { &*desc };
    let anchor = d.anchor();
    let sb = d.superblock_ptr() as usize;
    let max_count = d.max_count();

    let expected_state = if anchor.count == max_count {
        AnchorState::Empty
    } else if anchor.count == 0 {
        AnchorState::Full
    } else {
        AnchorState::Partial
    };
    if anchor.state != expected_state {
        errors.push(ConsistencyError::StateCountMismatch { sb, anchor });
    }

    if d.slot_size() != heap.size_class().slot_size() {
        errors.push(ConsistencyError::SlotSizeMismatch {
            sb,
            descriptor: d.slot_size(),
            size_class: heap.size_class().slot_size(),
        });
    }

    let mut visited = HashSet::new();
    let mut current = anchor.avail;
    let mut reachable = 0u32;
    while reachable < anchor.count {
        if current >= max_count {
            errors.push(ConsistencyError::ChainIndexOutOfRange { sb, index: current, max_count });
            break;
        }
        if !visited.insert(current) {
            errors.push(ConsistencyError::ChainCycle { sb, index: current });
            break;
        }
        reachable += 1;
        if reachable == anchor.count {
            break;
        }
        let slot = d.slot_ptr(current);
        current = unsafe { (slot as *const u32).read_unaligned() };
    }
    if reachable != anchor.count && visited.len() as u32 == reachable {
        errors.push(ConsistencyError::ChainLengthMismatch { sb, expected: anchor.count, found: reachable });
    }

    #[cfg(feature = "debug")]
    check_debug_sentinels(d, &visited, errors);
}

#[cfg(feature = "debug")]
fn check_debug_sentinels(d: &Descriptor, free_indices: &HashSet<u32>, errors: &mut Vec<ConsistencyError>) {
    const SLOT_DEBUG_FREE: u8 = 0x00;

    let sb = d.superblock_ptr() as usize;
    for index in 0..d.max_count() {
        let byte = unsafe { *d.slot_ptr(index).add(d.slot_size() - 1) };
        let is_free = free_indices.contains(&index);
        if is_free && byte != SLOT_DEBUG_FREE {
            errors.push(ConsistencyError::FreeSlotNotSentinel { sb, index });
        } else if !is_free && byte == SLOT_DEBUG_FREE {
            errors.push(ConsistencyError::InUseSlotHasSentinel { sb, index });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::slab::size_class::SizeClass;

    #[test]
    fn fresh_heap_has_no_active_or_partial_descriptors() {
        let sc = SizeClass::new(64);
        let heap = Heap::new(&sc);
        assert!(check_heap(&heap).is_empty());
    }

    #[test]
    fn single_alloc_passes_checks() {
        let sc = SizeClass::new(64);
        let heap = Heap::new(&sc);

        let ptr = heap.alloc().unwrap();
        assert!(check_heap(&heap).is_empty(), "{:?}", check_heap(&heap));

        unsafe { heap.free(ptr) };
        assert!(check_heap(&heap).is_empty());
    }

    #[test]
    fn fill_and_partially_drain_one_superblock() {
        use crate::slab::superblock;

        let sc = SizeClass::new(256);
        let heap = Heap::new(&sc);

        let max = superblock::slot_count(256) as usize;
        let mut ptrs = Vec::new();
        for _ in 0..max {
            ptrs.push(heap.alloc().unwrap());
        }
        assert!(check_heap(&heap).is_empty(), "{:?}", check_heap(&heap));

        // Free half: FULL -> PARTIAL.
        for p in ptrs.drain(..max / 2) {
            unsafe { heap.free(p) };
        }
        assert!(check_heap(&heap).is_empty(), "{:?}", check_heap(&heap));

        for p in ptrs {
            unsafe { heap.free(p) };
        }
        assert!(check_heap(&heap).is_empty());
    }

    #[test]
    fn detects_state_count_mismatch() {
        let sc = SizeClass::new(64);
        let heap = Heap::new(&sc);

        let ptr = heap.alloc().unwrap();
        let desc = unsafe { super::super::superblock::descriptor_of(ptr) };
        let d = unsafe { &*desc };

        // Corrupt the anchor directly: claim EMPTY while count is still 0
        // slots short of max_count.
        let bad = Anchor {
            avail: d.anchor().avail,
            count: d.max_count() - 1,
            state: AnchorState::Empty,
            tag: d.anchor().tag,
        };
        d.anchor.store(u64::from(bad), std::sync::atomic::Ordering::Relaxed);

        let errors = check_heap(&heap);
        assert!(
            errors.iter().any(|e| matches!(e, ConsistencyError::StateCountMismatch { .. })),
            "{errors:?}"
        );
    }
}
