//! Trigger-evaluation throughput: many rules against a day of observations.

use std::hint::black_box;
use std::time::Duration;

use chrono::Utc;
use criterion::{criterion_group, criterion_main, Criterion};

use adwatch::domain::models::{
    ConditionKind, MetricObservation, Rule, RuleScope, TriggerCondition,
};
use adwatch::services::TriggerEvaluator;

fn make_rules(count: usize) -> Vec<Rule> {
    (0..count)
        .map(|i| {
            Rule::new(
                format!("bench-rule-{i}"),
                RuleScope::for_metric("ppc", format!("metric-{}", i % 10)),
                TriggerCondition::new(ConditionKind::GreaterThan, Some(5.0))
                    .with_window(Duration::from_secs(24 * 3600))
                    .with_consecutive_count(if i % 3 == 0 { 3 } else { 1 }),
                "pause_campaign",
            )
        })
        .collect()
}

fn make_observations(count: usize) -> Vec<MetricObservation> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            MetricObservation::new(
                "ppc",
                format!("metric-{}", i % 10),
                (i % 13) as f64,
            )
            .with_recorded_at(now - chrono::Duration::seconds(i as i64 * 30))
        })
        .collect()
}

fn bench_evaluate(c: &mut Criterion) {
    let evaluator = TriggerEvaluator::new();
    let rules = make_rules(100);
    let observations = make_observations(1_000);
    let now = Utc::now();

    c.bench_function("evaluate_100_rules_1k_observations", |b| {
        b.iter(|| {
            let triggers =
                evaluator.evaluate(black_box(&rules), black_box(&observations), now);
            black_box(triggers)
        });
    });
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
