// Lookup benchmarks over a synthetic prefix set.

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use poptrie::{IpSearcher, PoptrieBuilder};
use std::hint::black_box;

/// Deterministic xorshift so runs are comparable.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

fn build_synthetic_set() -> IpSearcher {
    let mut rng = XorShift(0x9E37_79B9_7F4A_7C15);
    let mut builder = PoptrieBuilder::new();
    for _ in 0..10_000 {
        let addr = (rng.next() as u32).to_be_bytes();
        let mask = 12 + (rng.next() % 13) as u8; // /12..=/24
        let tag = 1 + (rng.next() % 500) as u16;
        builder.add_prefix(&addr, mask, tag).unwrap();
    }
    for _ in 0..1_000 {
        let mut addr = [0u8; 16];
        addr[..8].copy_from_slice(&rng.next().to_be_bytes());
        let mask = 20 + (rng.next() % 29) as u8; // /20..=/48
        let tag = 1 + (rng.next() % 500) as u16;
        builder.add_prefix(&addr, mask, tag).unwrap();
    }
    IpSearcher::from_bytes(builder.to_bytes()).expect("synthetic set must validate")
}

fn bench_single_lookups(c: &mut Criterion) {
    let searcher = build_synthetic_set();
    let mut rng = XorShift(0xDEAD_BEEF_CAFE_F00D);
    let probes: Vec<[u8; 4]> = (0..1024)
        .map(|_| (rng.next() as u32).to_be_bytes())
        .collect();

    let mut group = c.benchmark_group("lookup");
    group.throughput(Throughput::Elements(probes.len() as u64));
    group.bench_function("v4_single", |b| {
        b.iter(|| {
            let mut hits = 0u32;
            for probe in &probes {
                if searcher.lookup_code(black_box(probe)) != 0 {
                    hits += 1;
                }
            }
            black_box(hits)
        })
    });
    group.finish();
}

fn bench_packed_bulk(c: &mut Criterion) {
    let searcher = build_synthetic_set();
    let mut rng = XorShift(0x0123_4567_89AB_CDEF);
    let mut buf = Vec::with_capacity(100_000 * 4);
    for _ in 0..100_000 {
        buf.extend_from_slice(&(rng.next() as u32).to_be_bytes());
    }

    let mut group = c.benchmark_group("bulk");
    group.throughput(Throughput::Elements(100_000));
    group.bench_function("v4_packed_100k", |b| {
        b.iter(|| searcher.lookup_codes_packed(black_box(&buf), false).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_single_lookups, bench_packed_bulk);
criterion_main!(benches);
