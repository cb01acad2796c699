//! # Scan Ingest Benchmarks
//!
//! | Path | Target |
//! |------|--------|
//! | Payload normalization (V1 base64 / V2 text) | < 10µs |
//! | Conditional upsert, in-memory SQLite | < 100µs |
//! | Decode + normalize + upsert | < 150µs |

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use scan_ingest::{
    normalize, EventProcessor, ScanEnvelope, ScanIngestApi, ScanKey, ScanRecord, ScanStore,
    SqliteScanStore,
};

fn key(i: u64) -> ScanKey {
    let ip = format!("10.{}.{}.{}", (i >> 16) & 0xff, (i >> 8) & 0xff, i & 0xff);
    ScanKey::new(ip, 443, "https")
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");

    for size in [64usize, 1024, 16 * 1024] {
        let body = "x".repeat(size);
        let v1 = ScanEnvelope::v1(key(0), 1, body.as_bytes());
        let v2 = ScanEnvelope::v2(key(0), 1, &body);

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::new("v1", size), &v1, |b, env| {
            b.iter(|| black_box(normalize(env)))
        });
        group.bench_with_input(BenchmarkId::new("v2", size), &v2, |b, env| {
            b.iter(|| black_box(normalize(env)))
        });
    }

    group.finish();
}

fn bench_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("sqlite_upsert");
    let store = SqliteScanStore::open_in_memory().expect("in-memory store");

    let mut ts = 0i64;
    group.bench_function("advance_same_key", |b| {
        b.iter(|| {
            ts += 1;
            let record = ScanRecord {
                key: key(1),
                scanned_at: ts,
                response: "banner".to_string(),
                received_at: ts,
            };
            black_box(store.upsert(&record).expect("upsert"))
        })
    });

    group.bench_function("stale_same_key", |b| {
        let record = ScanRecord {
            key: key(1),
            scanned_at: 0,
            response: "stale".to_string(),
            received_at: 0,
        };
        b.iter(|| black_box(store.upsert(&record).expect("upsert")))
    });

    let mut i = 0u64;
    group.bench_function("insert_new_keys", |b| {
        b.iter(|| {
            i += 1;
            let record = ScanRecord {
                key: key(i + 1_000),
                scanned_at: 1,
                response: String::new(),
                received_at: 1,
            };
            black_box(store.upsert(&record).expect("upsert"))
        })
    });

    group.finish();
}

fn bench_process(c: &mut Criterion) {
    let processor = EventProcessor::new(Arc::new(
        SqliteScanStore::open_in_memory().expect("in-memory store"),
    ));
    let messages: Vec<Vec<u8>> = (0..1024)
        .map(|i| {
            ScanEnvelope::v2(key(i), i as i64, "HTTP/1.1 200 OK")
                .encode()
                .expect("encode")
        })
        .collect();

    let mut next = 0usize;
    c.bench_function("process_message", |b| {
        b.iter(|| {
            next = (next + 1) % messages.len();
            black_box(processor.process(&messages[next]).expect("process"))
        })
    });
}

criterion_group!(benches, bench_normalize, bench_upsert, bench_process);
criterion_main!(benches);
