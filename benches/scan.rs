//! Scan pass throughput across region sizes.

use std::sync::atomic::AtomicBool;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use flipwatch::{scan_and_refresh, RegionBuffer, ResidencyPolicy};

fn bench_scan_and_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("scan_and_refresh");

    for size in [1usize << 20, 16 << 20, 64 << 20] {
        group.throughput(Throughput::Bytes(size as u64));
        let cancel = AtomicBool::new(false);

        let mut region = RegionBuffer::allocate(size, ResidencyPolicy::Off).unwrap();
        group.bench_with_input(BenchmarkId::new("compare_only", size), &size, |b, _| {
            b.iter(|| black_box(scan_and_refresh(&mut region, false, &cancel).unwrap()));
        });

        let mut region = RegionBuffer::allocate(size, ResidencyPolicy::Off).unwrap();
        group.bench_with_input(BenchmarkId::new("compare_and_touch", size), &size, |b, _| {
            b.iter(|| black_box(scan_and_refresh(&mut region, true, &cancel).unwrap()));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_scan_and_refresh);
criterion_main!(benches);
