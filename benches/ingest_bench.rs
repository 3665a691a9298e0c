//! Benchmarks for CSV ingestion and export
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use glucose::export::to_csv_bytes;
use glucose::ingest::CsvIngestor;
use glucose::storage::{GlucoseLevel, LevelStore, NewGlucoseLevel};

/// A LibreView-style export with `rows` readings, every fourth one empty
fn create_export(rows: usize) -> String {
    let mut csv = String::from("Glukose-Daten,Erstellt am,15-01-2024 00:00 UTC,Erstellt von,bench\n");
    csv.push_str("Gerät,Seriennummer,Gerätezeitstempel,Aufzeichnungstyp,Glukosewert-Verlauf mg/dL\n");

    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    for i in 0..rows {
        let ts = (base + Duration::minutes(15 * i as i64)).format("%d-%m-%Y %H:%M");
        let value = if i % 4 == 3 { String::new() } else { (80 + i % 90).to_string() };
        csv.push_str(&format!("FreeStyle LibreLink,ABC123,{},0,{}\n", ts, value));
    }
    csv
}

fn create_levels(count: usize) -> Vec<GlucoseLevel> {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..count)
        .map(|i| GlucoseLevel {
            id: i as i64 + 1,
            user_id: format!("user-{}", i % 10),
            timestamp: base + Duration::minutes(5 * i as i64),
            value: 70.0 + (i % 120) as f64,
        })
        .collect()
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    let ingestor = CsvIngestor::default();

    for size in [100, 1000, 10000] {
        let export = create_export(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("parse_reader_{}", size), |b| {
            b.iter(|| {
                ingestor
                    .parse_reader("bench", black_box(export.as_bytes()))
                    .unwrap()
            })
        });
    }

    group.finish();
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("store");
    let ingestor = CsvIngestor::default();
    let parsed = ingestor
        .parse_reader("bench", create_export(1000).as_bytes())
        .unwrap();
    let batch: Vec<NewGlucoseLevel> = parsed.levels;

    group.throughput(Throughput::Elements(batch.len() as u64));
    group.bench_function("insert_batch_1000", |b| {
        let store = LevelStore::open_in_memory().unwrap();
        b.iter(|| store.insert_batch(black_box(&batch)).unwrap())
    });

    group.finish();
}

fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");

    for size in [100, 1000, 10000] {
        let levels = create_levels(size);

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("to_csv_bytes_{}", size), |b| {
            b.iter(|| to_csv_bytes(black_box(&levels)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_parse, bench_insert, bench_export);
criterion_main!(benches);
