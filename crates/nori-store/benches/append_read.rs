use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use nori_store::Store;
use std::io::Cursor;
use tokio::runtime::Runtime;

fn bench_sequential_appends(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("sequential_appends");

    for size in [64usize, 1024, 16 * 1024] {
        let record = vec![0x5Au8; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &record, |b, record| {
            let file = tokio::fs::File::from_std(tempfile::tempfile().unwrap());
            let store = rt.block_on(Store::new(file)).unwrap();
            let store = &store;

            b.to_async(&rt)
                .iter(|| async move { black_box(store.append(record).await.unwrap()) });
        });
    }

    group.finish();
}

fn bench_reads(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("reads");

    for size in [64usize, 1024, 16 * 1024] {
        let (store, positions) = rt.block_on(async {
            let store = Store::new(Cursor::new(Vec::new())).await.unwrap();
            let record = vec![0xA5u8; size];
            let mut positions = Vec::with_capacity(1000);
            for _ in 0..1000 {
                positions.push(store.append(&record).await.unwrap().1);
            }
            (store, positions)
        });

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            let mut next = 0;
            b.to_async(&rt).iter(|| {
                let pos = positions[next % positions.len()];
                next += 1;
                let store = &store;
                async move { black_box(store.read(pos).await.unwrap()) }
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_sequential_appends, bench_reads);
criterion_main!(benches);
