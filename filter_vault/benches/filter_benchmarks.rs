use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use filter_vault::{CuckooFilter, ScalingBloom};

fn bench_bloom_add(c: &mut Criterion) {
    let mut group = c.benchmark_group("bloom_add");

    for n in [1_000, 10_000, 100_000].iter() {
        let mut chain = ScalingBloom::new(*n as u64, 0.01).unwrap();
        let keys: Vec<Vec<u8>> = (0..*n).map(|i| format!("key{}", i).into_bytes()).collect();

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(n), &keys, |b, keys| {
            let mut idx = 0;
            b.iter(|| {
                chain.add(black_box(&keys[idx % keys.len()])).unwrap();
                idx += 1;
            });
        });
    }

    group.finish();
}

fn bench_bloom_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("bloom_check");

    for n in [1_000, 10_000, 100_000].iter() {
        let mut chain = ScalingBloom::new(*n as u64, 0.01).unwrap();
        let keys: Vec<Vec<u8>> = (0..*n).map(|i| format!("key{}", i).into_bytes()).collect();
        for key in &keys {
            chain.add(key).unwrap();
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(n), &keys, |b, keys| {
            let mut idx = 0;
            b.iter(|| {
                let present = chain.check(black_box(&keys[idx % keys.len()]));
                idx += 1;
                present
            });
        });
    }

    group.finish();
}

fn bench_bloom_check_after_growth(c: &mut Criterion) {
    // a chain filled to 8x its reserved capacity pays one probe set per layer
    let mut chain = ScalingBloom::new(1_000, 0.01).unwrap();
    let keys: Vec<Vec<u8>> = (0..8_000).map(|i| format!("key{}", i).into_bytes()).collect();
    for key in &keys {
        chain.add(key).unwrap();
    }

    c.bench_function("bloom_check_grown_chain", |b| {
        let mut idx = 0;
        b.iter(|| {
            let present = chain.check(black_box(&keys[idx % keys.len()]));
            idx += 1;
            present
        });
    });
}

fn bench_cuckoo_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("cuckoo_insert");

    for n in [1_000, 10_000, 100_000].iter() {
        // half-loaded filter, then a fresh batch of keys per measurement so
        // duplicate fingerprints never pile up across iterations
        let mut base = CuckooFilter::new(*n as u64 * 2).unwrap();
        for i in 0..*n {
            base.insert(format!("key{}", i).as_bytes());
        }
        let fresh: Vec<Vec<u8>> = (*n..*n + 1_000).map(|i| format!("key{}", i).into_bytes()).collect();

        group.throughput(Throughput::Elements(fresh.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n), &fresh, |b, fresh| {
            b.iter_batched(
                || base.clone(),
                |mut filter| {
                    for key in fresh {
                        filter.insert(black_box(key));
                    }
                    filter
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn bench_cuckoo_check(c: &mut Criterion) {
    let mut group = c.benchmark_group("cuckoo_check");

    for n in [1_000, 10_000, 100_000].iter() {
        let mut filter = CuckooFilter::new(*n as u64 * 2).unwrap();
        let keys: Vec<Vec<u8>> = (0..*n).map(|i| format!("key{}", i).into_bytes()).collect();
        for key in &keys {
            filter.insert(key);
        }

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(n), &keys, |b, keys| {
            let mut idx = 0;
            b.iter(|| {
                let present = filter.check(black_box(&keys[idx % keys.len()]));
                idx += 1;
                present
            });
        });
    }

    group.finish();
}

fn bench_cuckoo_delete_insert_cycle(c: &mut Criterion) {
    let mut filter = CuckooFilter::new(100_000).unwrap();
    let keys: Vec<Vec<u8>> = (0..50_000).map(|i| format!("key{}", i).into_bytes()).collect();
    for key in &keys {
        filter.insert(key);
    }

    c.bench_function("cuckoo_delete_insert_cycle", |b| {
        let mut idx = 0;
        b.iter(|| {
            let key = black_box(&keys[idx % keys.len()]);
            filter.delete(key);
            filter.insert(key);
            idx += 1;
        });
    });
}

criterion_group!(
    benches,
    bench_bloom_add,
    bench_bloom_check,
    bench_bloom_check_after_growth,
    bench_cuckoo_insert,
    bench_cuckoo_check,
    bench_cuckoo_delete_insert_cycle
);
criterion_main!(benches);
