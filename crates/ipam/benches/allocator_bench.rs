//! Performance benchmarks for the block allocator

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ipam::{AddressRange, Allocator, BlockAllocator, Container};

/// `count` consecutive /24 blocks starting at 10.0.0.0
fn packed_blocks(count: u32) -> Vec<String> {
    (0..count)
        .map(|i| format!("10.{}.{}.0/24", (i >> 8) & 0xff, i & 0xff))
        .collect()
}

/// Benchmark first-fit search as the container fills up
fn bench_next_available(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_next_available");
    let container = Container::Block(AddressRange::parse("10.0.0.0/8").unwrap());
    let allocator = Allocator::new();

    for count in [0u32, 100, 1_000, 10_000].iter() {
        let existing = packed_blocks(*count);

        group.throughput(Throughput::Elements(*count as u64));
        group.bench_with_input(BenchmarkId::new("existing", count), count, |b, _| {
            b.iter(|| black_box(allocator.find_next_available(&container, &existing, 24)))
        });
    }

    group.finish();
}

/// Benchmark search when only a gap near the end is free
fn bench_fragmented(c: &mut Criterion) {
    let container = Container::Block(AddressRange::parse("10.0.0.0/16").unwrap());
    let allocator = Allocator::new();

    // Lower half of every /24 taken except the last
    let existing: Vec<String> = (0..255u32)
        .map(|i| format!("10.0.{i}.0/25"))
        .collect();

    c.bench_function("find_next_available_fragmented", |b| {
        b.iter(|| black_box(allocator.find_next_available(&container, &existing, 24)))
    });
}

/// Benchmark capacity accounting
fn bench_capacity(c: &mut Criterion) {
    let container = Container::Block(AddressRange::parse("10.0.0.0/8").unwrap());
    let allocator = Allocator::new();
    let existing = packed_blocks(10_000);

    c.bench_function("available_capacity_10k", |b| {
        b.iter(|| black_box(allocator.available_capacity(&container, &existing)))
    });
}

/// Benchmark IPv6 search
fn bench_ipv6(c: &mut Criterion) {
    let container = Container::Block(AddressRange::parse("2001:db8::/32").unwrap());
    let allocator = Allocator::new();
    let existing: Vec<String> = (0..1_000u32)
        .map(|i| format!("2001:db8:{i:x}::/48"))
        .collect();

    c.bench_function("find_next_available_ipv6", |b| {
        b.iter(|| black_box(allocator.find_next_available(&container, &existing, 48)))
    });
}

criterion_group!(
    benches,
    bench_next_available,
    bench_fragmented,
    bench_capacity,
    bench_ipv6
);
criterion_main!(benches);
