//! Criterion benchmarks for statistics parsing and aggregation

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::{json, Value};
use std::hint::black_box;
use xtmreport::services::fetcher::parse_statistics;
use xtmreport::services::{Aggregator, ExclusionFilter, LocaleTable};
use xtmreport::types::{Project, ProjectFetch, UserStatisticRecord};

const LOCALES: [&str; 8] = ["es_ES", "de_DE", "fr_FR", "zh_CN", "zh_TW", "ja_JP", "pt_BR", "ko_KR"];
const STEPS: [&str; 4] = ["translate1", "correct1", "final review", "translate2"];

/// Synthetic outcomes: `projects` × 8 locales × `users` × 4 steps records
fn synthetic_fetches(projects: u64, users: usize) -> Vec<ProjectFetch> {
    (0..projects)
        .map(|id| {
            let records = LOCALES
                .iter()
                .flat_map(|locale| {
                    (0..users).flat_map(move |user| {
                        STEPS.iter().map(move |step| UserStatisticRecord {
                            project_id: id,
                            identity: Some(format!("user{user}@example.com")),
                            locale: locale.to_string(),
                            step: step.trim_end_matches(char::is_numeric).to_string(),
                            words: (id * 31 + user as u64 * 7) % 5_000,
                        })
                    })
                })
                .collect();
            ProjectFetch::success(Project::new(id, format!("project {id}")), records)
        })
        .collect()
}

fn statistics_body(users: usize) -> Value {
    let entries: Vec<Value> = LOCALES
        .iter()
        .map(|locale| {
            let users: Vec<Value> = (0..users)
                .map(|user| {
                    json!({
                        "username": format!("user{user}@example.com"),
                        "stepsStatistics": STEPS.iter().map(|step| json!({
                            "workflowStepName": step,
                            "jobsStatistics": [
                                {"sourceStatistics": {"totalWords": 1200}},
                                {"sourceStatistics": {"totalWords": 340}}
                            ]
                        })).collect::<Vec<_>>()
                    })
                })
                .collect();
            json!({"targetLanguage": locale, "usersStatistics": users})
        })
        .collect();
    Value::Array(entries)
}

fn bench_aggregate(c: &mut Criterion) {
    let aggregator = Aggregator::new(
        LocaleTable::default(),
        ExclusionFilter::new(["user0@example.com", "user3@example.com"]),
    );

    let mut group = c.benchmark_group("aggregate");
    for projects in [10u64, 100, 500] {
        let fetches = synthetic_fetches(projects, 10);
        let records: usize = fetches.iter().map(|f| f.outcome.records().len()).sum();
        group.throughput(Throughput::Elements(records as u64));

        group.bench_with_input(BenchmarkId::new("languages", projects), &fetches, |b, fetches| {
            b.iter(|| aggregator.aggregate(black_box(fetches)));
        });
        group.bench_with_input(BenchmarkId::new("users", projects), &fetches, |b, fetches| {
            b.iter(|| aggregator.users(black_box(fetches)));
        });
    }
    group.finish();
}

fn bench_view(c: &mut Criterion) {
    let table = Aggregator::default().aggregate(&synthetic_fetches(200, 10));

    c.bench_function("aggregate/view", |b| {
        b.iter(|| black_box(&table).view());
    });
}

fn bench_parse_statistics(c: &mut Criterion) {
    let project = Project::new(1, "bench");
    let body = statistics_body(25);

    let mut group = c.benchmark_group("parser");
    group.throughput(Throughput::Elements((LOCALES.len() * 25 * STEPS.len()) as u64));
    group.bench_function("parse_statistics", |b| {
        b.iter(|| parse_statistics(&project, black_box(&body)));
    });
    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_view, bench_parse_statistics);
criterion_main!(benches);
