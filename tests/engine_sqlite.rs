use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use rusqlite::Connection;
use salary_analytics::analytics::derive;
use salary_analytics::analytics::{
    AnalyticsEngine, AnalyticsError, EngineOptions, Granularity, NamedFilter, QueryContext,
    SqliteStore,
};

mod util;

fn engine() -> AnalyticsEngine {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    util::seed(&conn);
    let store = Arc::new(SqliteStore::from_connection(conn));
    AnalyticsEngine::new(store.clone(), store)
}

fn ctx() -> QueryContext {
    QueryContext::background()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-6
}

#[test]
fn distribution_over_all_rows_is_dense_and_complete() {
    let buckets = engine()
        .distribution(&ctx(), &NamedFilter::default())
        .expect("distribution");

    assert_eq!(buckets.len() as u32, derive::bucket_count(util::TOTAL_ROWS));
    assert_eq!(buckets.len(), 7);
    assert_eq!(
        buckets.iter().map(|b| b.count).sum::<i64>(),
        util::TOTAL_ROWS
    );
    assert_eq!(buckets[0].lower_bound, 50_000.0);
    assert!(approx(buckets[6].upper_bound, 200_000.0));
    for pair in buckets.windows(2) {
        assert!(pair[0].lower_bound < pair[1].lower_bound);
        assert_eq!(pair[0].upper_bound, pair[1].lower_bound);
    }
    let counts: Vec<i64> = buckets.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![12, 0, 0, 5, 0, 0, 15]);
}

#[test]
fn sparse_distribution_keeps_only_populated_buckets() {
    let engine = engine().with_options(EngineOptions {
        include_empty_buckets: false,
    });
    let buckets = engine
        .distribution(&ctx(), &NamedFilter::default())
        .expect("distribution");
    let counts: Vec<i64> = buckets.iter().map(|b| b.count).collect();
    assert_eq!(counts, vec![12, 5, 15]);
}

#[test]
fn distribution_single_role_has_no_spread() {
    let filter = NamedFilter {
        standard_job_role_title: Some("Accountant".into()),
        ..Default::default()
    };
    assert!(engine().distribution(&ctx(), &filter).unwrap().is_empty());
}

#[test]
fn summary_over_all_rows() {
    let summary = engine()
        .summary(&ctx(), &NamedFilter::default(), 90)
        .expect("summary")
        .expect("rows present");
    assert_eq!(summary.total_count, 32);
    assert!(approx(summary.average_salary.unwrap(), 131_250.0));
    assert_eq!(summary.percentile25, Some(50_000.0));
    assert_eq!(summary.percentile50, Some(120_000.0));
    assert_eq!(summary.percentile75, Some(200_000.0));
    assert_eq!(summary.percentile_target, Some(200_000.0));
}

#[test]
fn summary_for_location_without_facts_is_none() {
    // Podolsk exists in dim_location but has no salary rows.
    let filter = NamedFilter {
        oblast_name: Some("Moscow Oblast".into()),
        ..Default::default()
    };
    assert!(engine().summary(&ctx(), &filter, 50).unwrap().is_none());
}

#[test]
fn city_filter_restricts_rows() {
    let filter = NamedFilter {
        city_name: Some("Moscow".into()),
        ..Default::default()
    };
    let summary = engine().summary(&ctx(), &filter, 50).unwrap().unwrap();
    assert_eq!(summary.total_count, 20);
}

#[test]
fn date_range_is_inclusive() {
    let filter = NamedFilter {
        date_start: Some(date(2024, 3, 15)),
        date_end: Some(date(2024, 3, 15)),
        ..Default::default()
    };
    let summary = engine().summary(&ctx(), &filter, 50).unwrap().unwrap();
    assert_eq!(summary.total_count, 14);
}

#[test]
fn time_series_returns_recent_months_oldest_first() {
    let points = engine()
        .time_series(&ctx(), &NamedFilter::default(), Granularity::Month, 2)
        .expect("time series");
    assert_eq!(points.len(), 2);
    assert_eq!(points[0].period_start, date(2024, 2, 1));
    assert_eq!(points[0].count, 9);
    assert!(approx(points[0].average_salary, 1_200_000.0 / 9.0));
    assert_eq!(points[1].period_start, date(2024, 3, 1));
    assert_eq!(points[1].count, 14);
}

#[test]
fn time_series_by_quarter_merges_months() {
    let points = engine()
        .time_series(&ctx(), &NamedFilter::default(), Granularity::Quarter, 12)
        .expect("time series");
    assert_eq!(points.len(), 1);
    assert_eq!(points[0].period_start, date(2024, 1, 1));
    assert_eq!(points[0].count, 32);
    assert!(approx(points[0].average_salary, 131_250.0));
}

#[test]
fn public_roles_apply_threshold_and_order() {
    let roles = engine()
        .public_roles(&ctx(), &NamedFilter::default(), 10)
        .expect("roles");
    let view: Vec<(&str, f64, i64)> = roles
        .iter()
        .map(|r| (r.role_title.as_str(), r.average_salary, r.record_count))
        .collect();
    assert_eq!(
        view,
        vec![("Data Scientist", 200_000.0, 15), ("Accountant", 50_000.0, 12)]
    );
}

#[test]
fn industry_and_level_narrow_roles() {
    let filter = NamedFilter {
        industry_field_name: Some("IT".into()),
        hierarchy_level_name: Some("Junior".into()),
        ..Default::default()
    };
    let roles = engine().public_roles(&ctx(), &filter, 0).unwrap();
    assert_eq!(roles.len(), 1);
    assert_eq!(roles[0].role_title, "Designer");
}

#[test]
fn unknown_industry_is_invalid_filter() {
    let filter = NamedFilter {
        industry_field_name: Some("Alchemy".into()),
        ..Default::default()
    };
    let err = engine().distribution(&ctx(), &filter).unwrap_err();
    assert!(matches!(err, AnalyticsError::InvalidFilter { .. }));
    assert_eq!(err.param(), Some("industryFieldName"));
}

#[test]
fn unsatisfiable_filters_return_empty_results() {
    let engine = engine();
    let unknown_city = NamedFilter {
        city_name: Some("Atlantis".into()),
        ..Default::default()
    };
    let disjoint_job = NamedFilter {
        industry_field_name: Some("Finance".into()),
        standard_job_role_title: Some("Data Scientist".into()),
        ..Default::default()
    };
    for filter in [unknown_city, disjoint_job] {
        assert!(engine.distribution(&ctx(), &filter).unwrap().is_empty());
        assert!(engine.summary(&ctx(), &filter, 90).unwrap().is_none());
        assert!(
            engine
                .time_series(&ctx(), &filter, Granularity::Month, 12)
                .unwrap()
                .is_empty()
        );
        assert!(engine.public_roles(&ctx(), &filter, 0).unwrap().is_empty());
    }
}

#[test]
fn facts_are_ordered_and_limited() {
    let facts = engine()
        .facts(&ctx(), &NamedFilter::default(), 5)
        .expect("facts");
    let ids: Vec<i64> = facts.iter().map(|f| f.salary_fact_id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
    assert!(facts.iter().all(|f| f.salary_amount == 200_000.0));
}

#[test]
fn expired_deadline_is_reported() {
    let ctx = QueryContext::with_timeout(Duration::ZERO);
    let err = engine()
        .summary(&ctx, &NamedFilter::default(), 90)
        .unwrap_err();
    assert!(matches!(err, AnalyticsError::DeadlineExceeded));
}

#[test]
fn engine_is_shareable_across_threads() {
    let engine = engine();
    let expected = serde_json::to_string(
        &engine
            .public_roles(&ctx(), &NamedFilter::default(), 10)
            .unwrap(),
    )
    .unwrap();

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(|| {
                    serde_json::to_string(
                        &engine
                            .public_roles(&ctx(), &NamedFilter::default(), 10)
                            .unwrap(),
                    )
                    .unwrap()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
}

#[test]
fn result_json_field_names() {
    let engine = engine();
    let summary = engine
        .summary(&ctx(), &NamedFilter::default(), 90)
        .unwrap();
    let json = serde_json::to_value(&summary).unwrap();
    for key in [
        "totalCount",
        "averageSalary",
        "percentile25",
        "percentile50",
        "percentile75",
        "percentileTarget",
    ] {
        assert!(json.get(key).is_some(), "missing {key} in {json}");
    }

    let points = engine
        .time_series(&ctx(), &NamedFilter::default(), Granularity::Month, 1)
        .unwrap();
    let json = serde_json::to_value(&points).unwrap();
    assert_eq!(json[0]["periodStart"], "2024-03-01");
    assert!(json[0]["avgSalary"].is_number());
    assert_eq!(json[0]["salaryCountInPeriod"], 14);
}
