//! The packed 64-bit anchor word and its `AVAIL`/`COUNT`/`STATE`/`TAG` fields.

/// Width, in bits, of the `avail` and `count` fields. `2^10 - 1 = 1023`
/// free-slot indices, which bounds a superblock to at most 1024 slots -
/// comfortably above `SB_USABLE_SIZE / slot_size` for any slot size this
/// allocator supports (`slot_size >= 4`, per the in-slot next-index
/// encoding).
const INDEX_BITS: u32 = 10;
const INDEX_MASK: u64 = (1 << INDEX_BITS) - 1;

/// One past the largest value `avail`/`count` can hold. A size class whose
/// `slot_count` reaches this bound would silently truncate on every anchor
/// pack (spec.md §8: "verify `max_count < 1024`").
pub(crate) const MAX_SLOT_COUNT: u32 = 1 << INDEX_BITS;

const STATE_BITS: u32 = 2;
const STATE_MASK: u64 = (1 << STATE_BITS) - 1;

/// Remaining bits after `avail`, `count` and `state` are packed: the ABA tag.
const TAG_BITS: u32 = 64 - 2 * INDEX_BITS - STATE_BITS;
const TAG_MASK: u64 = (1 << TAG_BITS) - 1;

const AVAIL_SHIFT: u32 = 0;
const COUNT_SHIFT: u32 = INDEX_BITS;
const STATE_SHIFT: u32 = 2 * INDEX_BITS;
const TAG_SHIFT: u32 = 2 * INDEX_BITS + STATE_BITS;

/// The three states a descriptor's anchor can be in. `count == max ⇔ Empty`;
/// `count == 0 ⇔ Full`; otherwise `Partial`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum AnchorState {
    /// `count == 0`: no free slots, not reachable from a heap's active slot
    /// nor the partial stack.
    Full,
    /// `0 < count < max`: eligible for allocation, reachable from either a
    /// heap's active slot or the size class's partial stack.
    Partial,
    /// `count == max`: every slot is free; about to be retired.
    Empty,
}

impl From<u64> for AnchorState {
    fn from(raw: u64) -> Self {
        match raw {
            0b00 => Self::Full,
            0b01 => Self::Partial,
            0b10 => Self::Empty,
            other => unreachable!("anchor state bits corrupted: {:#b}", other),
        }
    }
}

impl From<AnchorState> for u64 {
    fn from(state: AnchorState) -> Self {
        match state {
            AnchorState::Full => 0b00,
            AnchorState::Partial => 0b01,
            AnchorState::Empty => 0b10,
        }
    }
}

/// A decoded view of a descriptor's 64-bit anchor word.
///
/// * `avail` - index, within the owning superblock, of the head of the
///   free-slot chain.
/// * `count` - number of free slots reachable from `avail`.
/// * `state` - derived relationship between `count` and the superblock's
///   slot count, kept in lock-step with `count` by every transition.
/// * `tag` - incremented on every successful CAS that moves `avail`, so a
///   thread that read a stale `avail`/next-index pair can never mistake a
///   since-reused slot for the one it originally observed.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Anchor {
    pub avail: u32,
    pub count: u32,
    pub state: AnchorState,
    pub tag: u64,
}

impl Anchor {
    /// The anchor of a brand-new, not-yet-populated descriptor: no slots,
    /// `FULL`, so it can never be mistaken for an allocatable descriptor
    /// before `Heap::alloc_from_new_sb` finishes initializing it.
    pub fn empty_full(avail: u32) -> Self {
        Self {
            avail,
            count: 0,
            state: AnchorState::Full,
            tag: 0,
        }
    }
}

impl From<u64> for Anchor {
    fn from(raw: u64) -> Self {
        let avail = ((raw >> AVAIL_SHIFT) & INDEX_MASK) as u32;
        let count = ((raw >> COUNT_SHIFT) & INDEX_MASK) as u32;
        let state = AnchorState::from((raw >> STATE_SHIFT) & STATE_MASK);
        let tag = (raw >> TAG_SHIFT) & TAG_MASK;

        Self {
            avail,
            count,
            state,
            tag,
        }
    }
}

impl From<Anchor> for u64 {
    fn from(anchor: Anchor) -> Self {
        debug_assert!((anchor.avail as u64) <= INDEX_MASK, "avail out of range");
        debug_assert!((anchor.count as u64) <= INDEX_MASK, "count out of range");

        let avail_bits = (anchor.avail as u64 & INDEX_MASK) << AVAIL_SHIFT;
        let count_bits = (anchor.count as u64 & INDEX_MASK) << COUNT_SHIFT;
        let state_bits = u64::from(anchor.state) << STATE_SHIFT;
        let tag_bits = (anchor.tag & TAG_MASK) << TAG_SHIFT;

        avail_bits | count_bits | state_bits | tag_bits
    }
}
