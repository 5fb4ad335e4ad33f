// In carrow-core/benches/builder_bench.rs

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use carrow::{Float64ArrayBuilder, Int64ArrayBuilder, StringArrayBuilder, BUILDER_CAPACITY};

const ROWS: usize = 100_000;

fn bench_int64_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("Int64 Builder Append");
    group.throughput(Throughput::Elements(ROWS as u64));

    // Capacity 1 crosses the native boundary once per value; the default batches.
    for capacity in [1, 64, BUILDER_CAPACITY] {
        group.bench_with_input(BenchmarkId::from_parameter(capacity), &capacity, |b, &capacity| {
            b.iter(|| {
                let mut builder = Int64ArrayBuilder::with_capacity(capacity).unwrap();
                for i in 0..ROWS as i64 {
                    builder.append(black_box(i)).unwrap();
                }
                black_box(builder.finish().unwrap())
            })
        });
    }
    group.finish();
}

fn bench_float64_extend(c: &mut Criterion) {
    let values: Vec<f64> = (0..ROWS).map(|i| i as f64 * 0.25).collect();
    let mut group = c.benchmark_group("Float64 Builder Extend");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.bench_function("default capacity", |b| {
        b.iter(|| {
            let mut builder = Float64ArrayBuilder::new().unwrap();
            builder.extend(black_box(&values).iter().copied()).unwrap();
            black_box(builder.finish().unwrap())
        })
    });
    group.finish();
}

fn bench_string_append(c: &mut Criterion) {
    let values: Vec<String> = (0..ROWS).map(|i| format!("row-{i:08}")).collect();
    let mut group = c.benchmark_group("String Builder Append");
    group.throughput(Throughput::Elements(ROWS as u64));
    group.bench_function("default capacity", |b| {
        b.iter(|| {
            let mut builder = StringArrayBuilder::new().unwrap();
            builder.extend(black_box(&values).iter().cloned()).unwrap();
            black_box(builder.finish().unwrap())
        })
    });
    group.finish();
}

criterion_group!(benches, bench_int64_append, bench_float64_extend, bench_string_append);
criterion_main!(benches);
