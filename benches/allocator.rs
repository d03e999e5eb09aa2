use std::alloc::{GlobalAlloc, Layout};

use criterion::black_box;

fn alloc_dealloc<A>(allocator: &A, layout: Layout)
where
    A: GlobalAlloc,
{
    let ptr = unsafe { allocator.alloc(layout) };

    unsafe { allocator.dealloc(black_box(ptr), layout) };
}

pub mod slab {
    use criterion::{Criterion, Throughput};
    use lfslab::slab::{Heap, SizeClass};
    use std::thread;

    pub fn single_threaded(ctx: &mut Criterion) {
        let mut group = ctx.benchmark_group("allocator::slab::single_threaded");
        group.throughput(Throughput::Elements(1));

        group.bench_function("alloc-dealloc 1", |b| {
            let sc = SizeClass::new(64);
            let heap = Heap::new(&sc);

            b.iter(|| {
                let ptr = heap.alloc().expect("system allocator has memory");
                unsafe { heap.free(criterion::black_box(ptr)) };
            });
        });
    }

    pub fn multi_threaded(ctx: &mut Criterion) {
        let mut group = ctx.benchmark_group("allocator::slab::multi_threaded");
        group.throughput(Throughput::Elements(4));

        group.bench_function("4 threads alloc-dealloc", |b| {
            let sc = SizeClass::new(64);
            let heap = Heap::new(&sc);

            b.iter(|| {
                thread::scope(|scope| {
                    for _ in 0..4 {
                        scope.spawn(|| {
                            let ptr = heap.alloc().expect("system allocator has memory");
                            unsafe { heap.free(criterion::black_box(ptr)) };
                        });
                    }
                });
            });
        });
    }
}

pub mod system_alloc {
    use super::alloc_dealloc;

    use criterion::{Criterion, Throughput};

    pub fn single_threaded(ctx: &mut Criterion) {
        let mut group = ctx.benchmark_group("allocator::system_alloc::single_threaded");

        group.throughput(Throughput::Elements(1));

        group.bench_function("alloc-dealloc 1", |b| {
            let allocator = std::alloc::System;

            let layout = std::alloc::Layout::new::<usize>();

            b.iter(|| {
                alloc_dealloc(&allocator, layout);
            });
        });
    }
}
