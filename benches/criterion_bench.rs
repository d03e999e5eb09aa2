use criterion::{criterion_group, criterion_main, Criterion};

mod allocator;

criterion_group! {
    name = allocator_group;
    config = Criterion::default();
    targets = allocator::slab::single_threaded, allocator::slab::multi_threaded, allocator::system_alloc::single_threaded,
}

criterion_main!(allocator_group);
