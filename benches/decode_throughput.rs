//! Benchmarks for the shared memory read path
//!
//! Measures decode and validate of a full 32768-byte segment image, the work
//! done on every poll while bound to the producer.
//!
//! Platform: Cross-platform (synthetic segment images, CI-safe)

use criterion::{Criterion, Throughput, criterion_group, criterion_main};
use lmu_telemetry::test_utils::SegmentFixture;
use lmu_telemetry::{Decoder, SEGMENT_SIZE, Validator};
use std::hint::black_box;

fn bench_decode(c: &mut Criterion) {
    let decoder = Decoder::default();
    let segment = SegmentFixture::driving().build();

    let mut group = c.benchmark_group("decode");
    group.throughput(Throughput::Bytes(SEGMENT_SIZE as u64));

    group.bench_function("driving_segment", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&segment))))
    });

    let idle = SegmentFixture::empty().build();
    group.bench_function("zero_version_short_circuit", |b| {
        b.iter(|| black_box(decoder.decode(black_box(&idle))))
    });

    group.finish();
}

fn bench_decode_and_validate(c: &mut Criterion) {
    let decoder = Decoder::default();
    let validator = Validator::default();
    let segment = SegmentFixture::driving().build();
    let implausible = SegmentFixture::driving().gear(11).build();

    let mut group = c.benchmark_group("decode_and_validate");

    group.bench_function("accepted", |b| {
        b.iter(|| {
            let snapshot = decoder.decode(black_box(&segment)).ok().flatten();
            black_box(snapshot.and_then(|s| validator.accept(s)))
        })
    });

    group.bench_function("rejected", |b| {
        b.iter(|| {
            let snapshot = decoder.decode(black_box(&implausible)).ok().flatten();
            black_box(snapshot.and_then(|s| validator.accept(s)))
        })
    });

    group.finish();
}

criterion_group!(benches, bench_decode, bench_decode_and_validate);
criterion_main!(benches);
