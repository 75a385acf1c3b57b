//! Benchmarks for booking and planning queries
use chrono::{Duration, NaiveDate, NaiveDateTime};
use clinic_core::{planning, PatientId, Schedule};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn base() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 1, 1)
        .and_then(|d| d.and_hms_opt(8, 0, 0))
        .unwrap()
}

/// `n` back-to-back 30 minute consultations for one practitioner
fn filled_schedule(n: i64) -> Schedule {
    let mut schedule = Schedule::new();
    for i in 0..n {
        schedule
            .schedule(base() + Duration::minutes(i * 30), "bench", "dr.martin", PatientId(1))
            .unwrap();
    }
    schedule
}

fn bench_booking(c: &mut Criterion) {
    let mut group = c.benchmark_group("booking");

    for size in [10i64, 100, 1000] {
        let schedule = filled_schedule(size);
        let free_slot = base() + Duration::minutes(size * 30);
        let taken_slot = base() + Duration::minutes(size * 15);

        group.bench_with_input(BenchmarkId::new("accept", size), &schedule, |b, s| {
            b.iter(|| {
                let mut s = s.clone();
                s.schedule(black_box(free_slot), "bench", "dr.martin", PatientId(1))
            })
        });

        group.bench_with_input(BenchmarkId::new("conflict", size), &schedule, |b, s| {
            b.iter(|| s.find_conflict("dr.martin", black_box(taken_slot), 30, None))
        });
    }

    group.finish();
}

fn bench_views(c: &mut Criterion) {
    let schedule = filled_schedule(1000);
    let day = base().date() + Duration::days(5);

    c.bench_function("day_view_1000", |b| {
        b.iter(|| planning::day_view(&schedule, "dr.martin", black_box(day)))
    });

    c.bench_function("month_view_1000", |b| {
        b.iter(|| planning::month_view(&schedule, "dr.martin", 2024, black_box(1)))
    });
}

criterion_group!(benches, bench_booking, bench_views);
criterion_main!(benches);
