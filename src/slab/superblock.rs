//! Superblock allocation and O(1) descriptor addressing (spec.md §3, §4.1).

use crate::slab::descriptor::Descriptor;
use crate::slab::platform;

/// Size, in bytes, of one superblock. Aligned to itself, so a slot pointer's
/// low bits can be masked off to reach the header.
pub const SB_SIZE: usize = 16 * 1024;

/// Reserved prefix holding the back-pointer to this superblock's descriptor.
/// A `*mut Descriptor` is 8 bytes; the remaining 8 pad the usable region to
/// the same alignment the slots themselves need.
pub const SB_HEADER_SIZE: usize = 16;

/// Bytes actually available for slots.
pub const SB_USABLE_SIZE: usize = SB_SIZE - SB_HEADER_SIZE;

/// How many `slot_size`-byte slots fit in one superblock.
pub fn slot_count(slot_size: usize) -> u32 {
    (SB_USABLE_SIZE / slot_size) as u32
}

/// Allocates a fresh, zeroed superblock and writes `desc` into its header.
/// Returns the address of the first usable slot (header address +
/// [`SB_HEADER_SIZE`]).
pub(crate) fn alloc_sb(desc: *mut Descriptor) -> *mut u8 {
    let header = platform::alloc_aligned(SB_SIZE, SB_SIZE);
    assert!(!header.is_null(), "OS allocator returned null for a superblock");

    unsafe { (header as *mut *mut Descriptor).write(desc) };

    unsafe { header.add(SB_HEADER_SIZE) }
}

/// Returns a superblock's header + all its slots to the OS. `sb` must be the
/// usable-region pointer returned by [`alloc_sb`] (or equivalently, any slot
/// pointer masked down and advanced past the header).
pub(crate) fn free_sb(sb: *mut u8) {
    let header = unsafe { sb.sub(SB_HEADER_SIZE) };
    unsafe { platform::free_aligned(header, SB_SIZE, SB_SIZE) };
}

/// Locates the descriptor owning the superblock that `ptr` was allocated
/// from, in O(1): mask `ptr` down to its superblock's base address and read
/// the back-pointer stashed there by [`alloc_sb`].
///
/// # Safety
/// `ptr` must be a pointer previously returned by [`Heap::alloc`](crate::slab::heap::Heap::alloc)
/// on a still-live superblock.
pub(crate) unsafe fn descriptor_of(ptr: *mut u8) -> *mut Descriptor {
    let header = ((ptr as usize) & !(SB_SIZE - 1)) as *mut *mut Descriptor;
    unsafe { header.read() }
}
