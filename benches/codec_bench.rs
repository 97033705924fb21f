// Codec benchmarks for the run-length encoders and the end-to-end writer.

use bytes::Bytes;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;

use orcfile::config::CompressionKind;
use orcfile::encoding::byte_rle::{ByteRleReader, ByteRleWriter};
use orcfile::encoding::rle_v2::{IntRleV2Reader, IntRleV2Writer};
use orcfile::encoding::IntegerReader;
use orcfile::outstream::OutStream;
use orcfile::{TypeDescription, Value, Writer, WriterOptions};

fn encode_ints(values: &[i64]) -> Bytes {
    let mut w = IntRleV2Writer::new(OutStream::new(CompressionKind::None, 256 * 1024), true);
    for &v in values {
        w.write_int(v).unwrap();
    }
    w.finish().unwrap()
}

fn benchmark_rle_v2_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("rle_v2_write");

    for size in [1000usize, 100_000].iter() {
        let runs: Vec<i64> = (0..*size).map(|i| (i / 64) as i64).collect();
        let spread: Vec<i64> = (0..*size).map(|i| (i * 2654435761 % 1_000_003) as i64).collect();

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::new("runs", size), &runs, |b, values| {
            b.iter(|| black_box(encode_ints(values)));
        });
        group.bench_with_input(BenchmarkId::new("spread", size), &spread, |b, values| {
            b.iter(|| black_box(encode_ints(values)));
        });
    }

    group.finish();
}

fn benchmark_rle_v2_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("rle_v2_read");

    for size in [1000usize, 100_000].iter() {
        let values: Vec<i64> = (0..*size).map(|i| (i * 31 % 4096) as i64).collect();
        let encoded = encode_ints(&values);

        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut r = IntRleV2Reader::new(encoded.clone(), true);
                let mut sum = 0i64;
                while let Some(v) = r.next_int().unwrap() {
                    sum = sum.wrapping_add(v);
                }
                black_box(sum)
            });
        });
    }

    group.finish();
}

fn benchmark_byte_rle(c: &mut Criterion) {
    let mut group = c.benchmark_group("byte_rle");

    let input: Vec<u8> = (0..100_000).map(|i| (i / 100) as u8).collect();
    group.throughput(Throughput::Bytes(input.len() as u64));
    group.bench_function("write", |b| {
        b.iter(|| {
            let mut w = ByteRleWriter::new(OutStream::new(CompressionKind::None, 256 * 1024));
            for &byte in &input {
                w.write_byte(byte).unwrap();
            }
            black_box(w.finish().unwrap())
        });
    });

    let mut w = ByteRleWriter::new(OutStream::new(CompressionKind::None, 256 * 1024));
    for &byte in &input {
        w.write_byte(byte).unwrap();
    }
    let encoded = w.finish().unwrap();
    group.bench_function("read", |b| {
        b.iter(|| {
            let mut r = ByteRleReader::new(encoded.clone());
            let mut count = 0usize;
            while r.next_byte().unwrap().is_some() {
                count += 1;
            }
            black_box(count)
        });
    });

    group.finish();
}

fn benchmark_writer(c: &mut Criterion) {
    let mut group = c.benchmark_group("writer");
    group.sample_size(10);

    for size in [1000usize, 10_000].iter() {
        group.throughput(Throughput::Elements(*size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            let schema = TypeDescription::from_str("struct<a:bigint,b:string>").unwrap();
            b.iter(|| {
                let mut buf = Vec::new();
                let mut writer =
                    Writer::new(&mut buf, &schema, WriterOptions::default()).unwrap();
                for i in 0..size {
                    writer
                        .write_row(&[
                            Value::Int(i as i64),
                            Value::String(format!("{:x}", i % 1000)),
                        ])
                        .unwrap();
                }
                writer.close().unwrap();
                black_box(buf)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    benchmark_rle_v2_write,
    benchmark_rle_v2_read,
    benchmark_byte_rle,
    benchmark_writer
);
criterion_main!(benches);
