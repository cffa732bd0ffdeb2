//! Benchmarks for encoding and decoding values against a store.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use turtle_pack::{Codec, Store, Value};

fn generate_records(n: usize) -> Vec<Value> {
    let kinds = ["turtle", "tortoise", "terrapin"];
    (0..n)
        .map(|i| {
            Value::object([
                ("id", Value::from(i)),
                ("kind", Value::from(kinds[i % kinds.len()])),
                ("shell", Value::Bytes(vec![(i % 251) as u8; 24])),
                ("tags", (0..(i % 5)).map(|t| format!("tag{}", t)).collect()),
            ])
        })
        .collect()
}

fn bench_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode");
    let codec = Codec::new();

    for size in [100, 1_000, 10_000] {
        let records = generate_records(size);

        group.bench_with_input(BenchmarkId::new("fresh", size), &records, |b, records| {
            b.iter(|| {
                let mut store = Store::new();
                for record in records.iter() {
                    black_box(codec.encode(&mut store, record).unwrap());
                }
                black_box(store)
            });
        });

        let mut warm = Store::new();
        for record in records.iter() {
            codec.encode(&mut warm, record).unwrap();
        }
        group.bench_with_input(BenchmarkId::new("warm", size), &records, |b, records| {
            b.iter(|| {
                let mut store = warm.snapshot();
                for record in records.iter() {
                    black_box(codec.encode(&mut store, record).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("decode");
    let codec = Codec::new();

    for size in [100, 1_000, 10_000] {
        let records = generate_records(size);
        let mut store = Store::new();
        let codes: Vec<Vec<u8>> = records
            .iter()
            .map(|r| codec.encode(&mut store, r).unwrap())
            .collect();

        group.bench_with_input(BenchmarkId::new("records", size), &codes, |b, codes| {
            b.iter(|| {
                for code in codes.iter() {
                    black_box(codec.decode(&store, code).unwrap());
                }
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let codec = Codec::new();
    let mut store = Store::new();
    for record in generate_records(10_000).iter() {
        codec.encode(&mut store, record).unwrap();
    }
    let middle = store.byte_len() / 2;
    c.bench_function("clone_at_middle", |b| {
        b.iter(|| black_box(store.clone_at(black_box(middle)).unwrap()))
    });
}

criterion_group!(benches, bench_encode, bench_decode, bench_snapshot);
criterion_main!(benches);
