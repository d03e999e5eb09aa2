//! End-to-end concurrency scenarios against the public `Heap`/`SizeClass`
//! API: the handoffs and races the unit tests embedded in `src/slab/*`
//! don't already cover on their own, run with real OS threads the way
//! `tests/hazard_ptr.rs` does.
//!
//! `Heap<'sc>` borrows its `SizeClass`, so every scenario here shares heaps
//! across threads with `std::thread::scope` rather than `Arc` + `'static`
//! `thread::spawn` - the scope ties the spawned threads' lifetime to the
//! enclosing `sc`/`heap` bindings instead. Raw pointers handed between
//! threads travel as `usize`, since `*mut u8` is not `Send`.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;
use std::thread;

use lfslab::slab::{superblock, Heap, SizeClass};

/// Many threads hammering alloc/free on several independent heaps sharing
/// one size class: partial-stack handoffs and active-slot races happen on
/// every heap at once, not just within a single one.
#[test]
fn multiple_heaps_share_one_size_class() {
    let sc = SizeClass::new(96);
    let heaps: Vec<_> = (0..4).map(|_| Heap::new(&sc)).collect();

    thread::scope(|scope| {
        for heap in &heaps {
            scope.spawn(move || {
                for _ in 0..300 {
                    let ptr = heap.alloc().expect("system allocator has memory");
                    unsafe { heap.free(ptr) };
                }
            });
        }
    });
}

/// Allocates a whole superblock's worth of slots, then has several threads
/// race to free every slot at once. Exactly one thread should observe the
/// FULL -> PARTIAL transition publish the descriptor to `active` (or the
/// partial stack), and exactly one should observe the last free drive
/// PARTIAL -> EMPTY and retire the descriptor - this stresses the anchor's
/// ABA tag under real thread scheduling rather than loom's model checker,
/// which only covers the narrower CAS loop in `descriptor.rs` directly.
#[test]
fn aba_stress_full_superblock_freed_concurrently() {
    for _ in 0..20 {
        let sc = SizeClass::new(64);
        let heap = Heap::new(&sc);

        let max = superblock::slot_count(64) as usize;
        let mut ptrs = Vec::with_capacity(max);
        for _ in 0..max {
            ptrs.push(heap.alloc().expect("space for a full superblock") as usize);
        }

        let barrier = Barrier::new(8);
        let chunks: Vec<Vec<usize>> = {
            let mut chunks = vec![Vec::new(); 8];
            for (i, p) in ptrs.into_iter().enumerate() {
                chunks[i % 8].push(p);
            }
            chunks
        };

        thread::scope(|scope| {
            for chunk in chunks {
                let barrier = &barrier;
                let heap = &heap;
                scope.spawn(move || {
                    barrier.wait();
                    for p in chunk {
                        unsafe { heap.free(p as *mut u8) };
                    }
                });
            }
        });

        // The whole superblock is free; the heap must still be able to draw
        // a fresh one without tripping any `assert_invariant!` along the way.
        let p = heap.alloc().expect("heap usable after concurrent full drain");
        unsafe { heap.free(p) };
    }
}

/// spec.md §8 scenario 4: each thread holds a private array of entry slots
/// and, every iteration, either allocates into a null entry or frees a live
/// one - chosen randomly rather than in a fixed round-robin pattern, so the
/// `avail`/`tag` pairing gets exercised under a different interleaving of
/// allocate/free decisions on every run instead of the same one every time.
#[test]
fn aba_random_alloc_free_stress() {
    use rand::Rng;

    const ENTRIES: usize = 256;
    const ITERATIONS: usize = 20_000;

    let sc = SizeClass::new(64);
    let heap = Heap::new(&sc);

    thread::scope(|scope| {
        for _ in 0..4 {
            let heap = &heap;
            scope.spawn(move || {
                let mut entries: Vec<Option<*mut u8>> = vec![None; ENTRIES];
                let mut rng = rand::thread_rng();

                for _ in 0..ITERATIONS {
                    let index = rng.gen_range(0..ENTRIES);
                    match entries[index] {
                        None => entries[index] = Some(heap.alloc().expect("system allocator has memory")),
                        Some(ptr) => {
                            unsafe { heap.free(ptr) };
                            entries[index] = None;
                        }
                    }
                }

                for entry in entries.into_iter().flatten() {
                    unsafe { heap.free(entry) };
                }
            });
        }
    });

    // The heap must still be fully usable after the randomized churn.
    let p = heap.alloc().expect("heap usable after randomized stress");
    unsafe { heap.free(p) };
}

/// Forces the descriptor pool's batch-refill path to race: enough
/// concurrent heaps draw brand-new superblocks at once that more than one
/// `NUM_DESC_BATCH`-sized refill must happen, and more than one thread can
/// lose the CAS that installs a freshly OS-allocated batch.
#[test]
fn descriptor_pool_batch_refill_races() {
    let sc = SizeClass::new(4096);
    let heap = Heap::new(&sc);

    thread::scope(|scope| {
        for _ in 0..16 {
            scope.spawn(|| {
                let mut ptrs = Vec::new();
                for _ in 0..40 {
                    ptrs.push(heap.alloc().expect("system allocator has memory"));
                }
                for p in ptrs {
                    unsafe { heap.free(p) };
                }
            });
        }
    });
}

/// Leaves a stale `EMPTY` descriptor sitting on the partial stack (by
/// racing a retiring free against a concurrent alloc that still holds the
/// same descriptor as its size class's only partial entry), then confirms a
/// later `alloc` skips over it instead of handing out a pointer into a
/// freed superblock.
#[test]
fn stale_empty_descriptor_in_partial_queue_is_skipped() {
    let sc = SizeClass::new(256);
    let heap = Heap::new(&sc);

    let max = superblock::slot_count(256) as usize;
    let mut ptrs = Vec::with_capacity(max);
    for _ in 0..max {
        ptrs.push(heap.alloc().expect("space for a full superblock"));
    }

    // Free all but one slot from a second heap sharing the size class, so
    // this descriptor sits on the shared partial stack right up to the
    // moment it goes EMPTY.
    let second = Heap::new(&sc);
    let last = ptrs.pop().unwrap();
    for p in ptrs {
        unsafe { second.free(p) };
    }
    unsafe { second.free(last) };

    // The descriptor has now been retired; subsequent allocs across every
    // heap on this size class must keep working, never reaching into the
    // freed superblock.
    let mut out = Vec::new();
    for _ in 0..max {
        out.push(heap.alloc().expect("heap still usable after a retirement"));
    }
    let mut unique = HashSet::new();
    for p in &out {
        assert!(unique.insert(*p as usize), "alloc handed out the same slot twice after a retirement");
    }
    for p in out {
        unsafe { heap.free(p) };
    }
}

/// Every pointer handed out across a high-thread-count, high-iteration run
/// is written to and read back without another thread ever observing a
/// torn or aliased value - a coarse aliasing check on top of the more
/// targeted scenarios above.
#[test]
fn concurrent_alloc_free_never_aliases_a_live_slot() {
    let sc = SizeClass::new(64);
    let heap = Heap::new(&sc);
    let violations = AtomicUsize::new(0);

    thread::scope(|scope| {
        for thread_id in 0..8u32 {
            let violations = &violations;
            let heap = &heap;
            scope.spawn(move || {
                for i in 0..1000u32 {
                    let ptr = heap.alloc().expect("system allocator has memory");
                    let tag = (thread_id << 24) ^ i;
                    unsafe { (ptr as *mut u32).write_unaligned(tag) };
                    thread::yield_now();
                    let observed = unsafe { (ptr as *const u32).read_unaligned() };
                    if observed != tag {
                        violations.fetch_add(1, Ordering::Relaxed);
                    }
                    unsafe { heap.free(ptr) };
                }
            });
        }
    });

    assert_eq!(0, violations.load(Ordering::Relaxed), "a live slot was aliased across threads");
}

/// The offline consistency checker must pass after a heap has gone through
/// a realistic amount of concurrent churn across several superblocks, once
/// every thread has quiesced (`check_heap`'s safety contract requires no
/// concurrent `alloc`/`free` while it runs).
#[cfg(feature = "testing")]
#[test]
fn consistency_check_passes_after_concurrent_churn() {
    use lfslab::slab::consistency;

    let sc = SizeClass::new(128);
    let heap = Heap::new(&sc);

    thread::scope(|scope| {
        for _ in 0..6 {
            scope.spawn(|| {
                let mut held = Vec::new();
                for i in 0..400 {
                    held.push(heap.alloc().expect("system allocator has memory"));
                    if i % 3 == 0 {
                        if let Some(p) = held.pop() {
                            unsafe { heap.free(p) };
                        }
                    }
                }
                for p in held {
                    unsafe { heap.free(p) };
                }
            });
        }
    });

    let errors = consistency::check_heap(&heap);
    assert!(errors.is_empty(), "{errors:?}");
}
