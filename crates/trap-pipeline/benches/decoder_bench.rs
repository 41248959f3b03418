//! 트랩 디코더 / CSV 싱크 벤치마크
//!
//! v1/v2c 트랩 디코딩 처리량과 배치 append 비용을 측정합니다.

use std::time::{Duration, SystemTime};

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use trapsink_core::pipeline::{TrapDecoder, TrapSink};
use trapsink_core::types::{TrapRow, ValueType};
use trapsink_pipeline::{RotatingCsvSink, RotationPolicy, SnmpTrapDecoder, TrapEncoder, TrapValue};

fn v1_trap() -> Vec<u8> {
    TrapEncoder::v1("public")
        .binding("1.3.6.1.2.1.1.3.0", TrapValue::TimeTicks(12345))
        .encode()
        .unwrap()
}

/// 바인딩 `n`개짜리 v2c 트랩 (값 타입 혼합)
fn v2c_trap(n: usize) -> Vec<u8> {
    let mut encoder = TrapEncoder::v2c("public")
        .binding("1.3.6.1.2.1.1.3.0", TrapValue::TimeTicks(12345))
        .binding(
            "1.3.6.1.6.3.1.1.4.1.0",
            TrapValue::ObjectIdentifier("1.3.6.1.4.1.8072.2.3.0.1".to_owned()),
        );
    for i in 0..n.saturating_sub(2) {
        let oid = format!("1.3.6.1.4.1.8072.2.3.2.{}", i + 1);
        let value = match i % 4 {
            0 => TrapValue::OctetString(b"link down on ge-0/0/1".to_vec()),
            1 => TrapValue::Counter64(u64::MAX - i as u64),
            2 => TrapValue::IpAddress([192, 0, 2, 10]),
            _ => TrapValue::Integer(-(i as i64)),
        };
        encoder = encoder.binding(oid, value);
    }
    encoder.encode().unwrap()
}

fn bench_decode(c: &mut Criterion) {
    let decoder = SnmpTrapDecoder::new();
    let mut group = c.benchmark_group("trap_decode");

    let v1 = v1_trap();
    group.throughput(Throughput::Elements(1));
    group.bench_function("v1_single_binding", |b| {
        b.iter(|| decoder.decode(black_box(&v1)).unwrap())
    });

    for n in [2usize, 10, 50] {
        let raw = v2c_trap(n);
        group.throughput(Throughput::Bytes(raw.len() as u64));
        group.bench_with_input(BenchmarkId::new("v2c_bindings", n), &raw, |b, raw| {
            b.iter(|| decoder.decode(black_box(raw)).unwrap())
        });
    }

    // 잘린 입력은 빠르게 실패해야 함
    let truncated = &v1[..v1.len() / 2];
    group.throughput(Throughput::Elements(1));
    group.bench_function("truncated", |b| {
        b.iter(|| decoder.decode(black_box(truncated)).unwrap_err())
    });

    group.finish();
}

fn bench_sink_append(c: &mut Criterion) {
    let dir = tempfile::tempdir().unwrap();
    let policy = RotationPolicy {
        max_size_bytes: 8 * 1024 * 1024,
        max_backups: 2,
        max_age_days: 0,
    };
    let mut sink = RotatingCsvSink::open(dir.path().join("bench.csv"), policy).unwrap();
    let rows: Vec<TrapRow> = (0..10)
        .map(|i| TrapRow {
            timestamp: SystemTime::UNIX_EPOCH + Duration::from_secs(1_792_152_000),
            source: "192.0.2.10:40000".to_owned(),
            oid: format!("1.3.6.1.4.1.8072.2.3.2.{i}"),
            value_type: ValueType::OctetString,
            value: "interface ge-0/0/1, state \"down\"".to_owned(),
        })
        .collect();

    let mut group = c.benchmark_group("csv_sink");
    group.throughput(Throughput::Elements(rows.len() as u64));
    group.bench_function("append_10_rows", |b| {
        b.iter(|| sink.append(black_box(&rows)).unwrap())
    });
    group.finish();

    sink.close().unwrap();
}

criterion_group!(benches, bench_decode, bench_sink_append);
criterion_main!(benches);
