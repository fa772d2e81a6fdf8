//! Benchmarks for business-day resolution and log table formatting.

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use rpaflow::calendar::{BusinessDayResolver, HolidaySet, WeekendRule};
use rpaflow::logging::table::{format_row, TableRow};

fn resolve_benchmark(c: &mut Criterion) {
    let start = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap_or_default();
    let holidays: HolidaySet = start.iter_days().step_by(9).take(40).collect();
    let resolver = BusinessDayResolver::new(WeekendRule::default(), holidays);
    let today = NaiveDate::from_ymd_opt(2025, 12, 29).unwrap_or_default();

    c.bench_function("resolve", |b| b.iter(|| resolver.resolve(black_box(today))));
}

fn table_benchmark(c: &mut Criterion) {
    let row = TableRow {
        timestamp: "2025-10-14 08:00:00".to_string(),
        execution_id: Some(1024),
        transaction_id: Some(4096),
        function: "process_item".to_string(),
        file: "runner.rs".to_string(),
        line: 231,
        message: "Item finished: /bot/temp/SAL_DW07_02_131025P_MOV.TXT - Status: SUCCESS".to_string(),
        process_type: "business".to_string(),
        status: "information".to_string(),
    };

    c.bench_function("format_row", |b| b.iter(|| format_row(black_box(&row))));
}

criterion_group!(benches, resolve_benchmark, table_benchmark);
criterion_main!(benches);
