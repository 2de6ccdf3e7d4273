//! # SIC Codec Benchmarks
//!
//! | Payload | Path |
//! |---------|------|
//! | Text | plain fields only |
//! | Audio | bulk bytes through the plain path |
//! | Uncompressed image | lossless array path |
//! | Compressed image | JPEG path |

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sic_message::{
    encode, Audio, AudioMessage, CompressedImage, CompressedImageMessage, MessageRegistry,
    NdArray, TextMessage, UncompressedImage, UncompressedImageMessage,
};
use std::time::Duration;

fn image(side: usize) -> NdArray {
    let pixels: Vec<u8> = (0..side * side * 3).map(|i| (i % 251) as u8).collect();
    NdArray::from_vec(vec![side, side, 3], pixels).expect("valid image shape")
}

fn bench_text(c: &mut Criterion) {
    let registry = MessageRegistry::with_core_types();
    let message = TextMessage::new("the quick brown fox".into())
        .with_timestamp(1.5)
        .with_origin("Dialog");
    let bytes = encode(&message).expect("encode");

    let mut group = c.benchmark_group("codec-text");
    group.bench_function("encode", |b| b.iter(|| black_box(encode(&message))));
    group.bench_function("decode", |b| b.iter(|| black_box(registry.decode(&bytes))));
    group.finish();
}

fn bench_audio(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec-audio");
    for seconds in [1usize, 5] {
        let message = AudioMessage::new(Audio {
            waveform: vec![0x7f; seconds * 32_000],
            sample_rate: 16_000,
        });
        group.throughput(Throughput::Bytes((seconds * 32_000) as u64));
        group.bench_with_input(BenchmarkId::new("encode", seconds), &message, |b, m| {
            b.iter(|| black_box(encode(m)))
        });
    }
    group.finish();
}

fn bench_images(c: &mut Criterion) {
    let registry = MessageRegistry::with_core_types();
    let mut group = c.benchmark_group("codec-image");
    group.measurement_time(Duration::from_secs(10));

    for side in [64usize, 240, 480] {
        group.throughput(Throughput::Bytes((side * side * 3) as u64));

        let raw = UncompressedImageMessage::new(UncompressedImage { image: image(side) });
        let raw_bytes = encode(&raw).expect("encode");
        group.bench_with_input(BenchmarkId::new("uncompressed_encode", side), &raw, |b, m| {
            b.iter(|| black_box(encode(m)))
        });
        group.bench_with_input(
            BenchmarkId::new("uncompressed_decode", side),
            &raw_bytes,
            |b, bytes| b.iter(|| black_box(registry.decode(bytes))),
        );

        let jpeg = CompressedImageMessage::new(CompressedImage { image: image(side) });
        let jpeg_bytes = encode(&jpeg).expect("encode");
        group.bench_with_input(BenchmarkId::new("jpeg_encode", side), &jpeg, |b, m| {
            b.iter(|| black_box(encode(m)))
        });
        group.bench_with_input(BenchmarkId::new("jpeg_decode", side), &jpeg_bytes, |b, bytes| {
            b.iter(|| black_box(registry.decode(bytes)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_text, bench_audio, bench_images);
criterion_main!(benches);
