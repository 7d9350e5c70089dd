use criterion::{black_box, criterion_group, criterion_main, Criterion};
use chrono::NaiveDate;
use serde_json::{json, Value};

use ifplens_core::extraction::institute::InstituteDirectory;
use ifplens_core::extraction::record::sanitize_records;
use ifplens_core::geo::aggregate::GeoAggregator;
use ifplens_core::geo::normalize::NameNormalizer;
use ifplens_core::geo::postal::PostalLookup;
use ifplens_core::logging::structured::LogContext;
use ifplens_core::metrics::aggregate::{LinkingStats, MetricsAggregator};
use ifplens_core::metrics::window::TimeWindow;
use ifplens_core::pipeline::merge::RecordMerger;

const PINCODES: &[&str] = &["110001", "400001", "560001", "600001", "700001", "123456", "999999"];
const TYPES: &[&str] = &[
    "Primary School",
    "Coaching Centre",
    "University",
    "Corporate Office",
    "NGO",
];

fn synthetic_fleet(n: usize) -> (Vec<Value>, Value) {
    let records = (0..n)
        .map(|i| {
            json!({
                "_id": format!("r{}", i),
                "unique_device_id": format!("dev-{}", i % (n / 2 + 1)),
                "device_serial_no": format!("SN{:06}", i),
                "c": 1_700_000_000_000u64 + (i as u64) * 1000,
                "deleted": i % 17 == 0,
                "is_locked": i % 9 == 0,
                "locked_at": 1_700_000_000u64,
                "institute_id": format!("I{}", i % 400),
                "linking_source": if i % 3 == 0 { "IFP" } else { "ADMIN_WEB" },
                "meta": {"is_training_required": i % 5 == 0}
            })
        })
        .collect();

    let institutes: serde_json::Map<String, Value> = (0..400)
        .map(|i| {
            (
                format!("I{}", i),
                json!({
                    "name": format!("Institute {}", i),
                    "pincode": PINCODES[i % PINCODES.len()],
                    "institution_type": TYPES[i % TYPES.len()],
                    "country": if i % 4 == 0 { "IN" } else { "india" }
                }),
            )
        })
        .collect();

    (records, Value::Object(institutes))
}

fn bench_merge_and_aggregate(c: &mut Criterion) {
    let (raw_records, raw_institutes) = synthetic_fleet(10_000);
    let directory = InstituteDirectory::from_value(&raw_institutes);
    let lookup = PostalLookup::builtin().unwrap();
    let merger = RecordMerger::default();
    let aggregator = MetricsAggregator::default();
    let ctx = LogContext::new("bench");
    let window = TimeWindow::from_dates(
        NaiveDate::from_ymd_opt(2023, 11, 1).unwrap(),
        NaiveDate::from_ymd_opt(2023, 11, 30).unwrap(),
    );

    c.bench_function("sanitize_10k", |b| {
        b.iter(|| sanitize_records(black_box(&raw_records)))
    });

    let records = sanitize_records(&raw_records);
    c.bench_function("merge_10k", |b| {
        b.iter(|| merger.merge(black_box(records.clone()), &directory, &ctx))
    });

    let merged = merger.merge(records, &directory, &ctx);
    c.bench_function("aggregate_10k", |b| {
        b.iter(|| aggregator.aggregate(black_box(&merged), &window, LinkingStats::default()))
    });

    let geo = GeoAggregator::new(&lookup, NameNormalizer::default());
    c.bench_function("geo_10k", |b| b.iter(|| geo.aggregate(black_box(&merged))));
}

criterion_group!(benches, bench_merge_and_aggregate);
criterion_main!(benches);
