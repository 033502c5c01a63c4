//! Real-world scenario benchmarks
//!
//! Benchmarks that simulate actual allocate/free traffic patterns against
//! the buddy heap.

use buddy_heap::allocator::traits::{Allocator, Resettable};
use buddy_heap::engine::BuddyAllocator;
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use std::alloc::Layout;

/// Allocate/free a single request-sized block per iteration, never growing.
fn bench_request_response(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_response");
    group.throughput(Throughput::Elements(1));

    let mut pool = vec![0u8; 4 * 1024 * 1024];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let layout = Layout::from_size_align(256, 8).unwrap();

    group.bench_function("alloc_then_free", |b| {
        b.iter(|| unsafe {
            let req = heap.allocate(layout).unwrap();
            std::ptr::write_bytes(req.cast::<u8>().as_ptr(), 0x42, 256);
            black_box(req);
            heap.deallocate(req.cast(), layout);
        });
    });

    group.finish();
}

/// Churn many differently sized blocks and periodically reset, to exercise
/// split/coalesce under pressure.
fn bench_mixed_sizes_with_reset(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_sizes");

    let mut pool = vec![0u8; 8 * 1024 * 1024];
    let heap = BuddyAllocator::init(&mut pool).unwrap();
    let sizes = [32usize, 128, 512, 2048];

    group.bench_function("churn_then_reset", |b| {
        b.iter(|| unsafe {
            let mut live = Vec::with_capacity(sizes.len());
            for &size in &sizes {
                let layout = Layout::from_size_align(size, 8).unwrap();
                let ptr = heap.allocate(layout).unwrap();
                live.push((ptr, layout));
            }
            black_box(&live);
            for (ptr, layout) in live {
                heap.deallocate(ptr.cast(), layout);
            }
            heap.reset();
        });
    });

    group.finish();
}

criterion_group!(benches, bench_request_response, bench_mixed_sizes_with_reset);
criterion_main!(benches);
