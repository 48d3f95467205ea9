//! Time-bucket conversions for analytics.
//!
//! Truncates dates to month / quarter / year boundaries and converts between
//! `NaiveDate` and the ISO `YYYY-MM-DD` text stored in `dim_date.full_date`.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use super::types::{AnalyticsError, AnalyticsResult, Granularity, PeriodAggregate};

const ISO_DATE: &str = "%Y-%m-%d";

/// Truncate `date` to the first day of its period.
pub fn truncate(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    let month = match granularity {
        Granularity::Month => date.month(),
        Granularity::Quarter => quarter_start_month(date.month()),
        Granularity::Year => 1,
    };
    // Day 1 of an existing year/month is always valid.
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// First month of the quarter containing `month` (1, 4, 7 or 10).
pub fn quarter_start_month(month: u32) -> u32 {
    ((month.saturating_sub(1)) / 3) * 3 + 1
}

/// Format a date as ISO `YYYY-MM-DD`.
pub fn to_iso(date: NaiveDate) -> String {
    date.format(ISO_DATE).to_string()
}

/// Parse ISO `YYYY-MM-DD` text read from the store.
pub fn parse_iso(text: &str) -> AnalyticsResult<NaiveDate> {
    NaiveDate::parse_from_str(text, ISO_DATE).map_err(|e| {
        AnalyticsError::BackendUnavailable(format!("malformed date '{text}' in dim_date: {e}"))
    })
}

/// Re-bucket month-level aggregates into `granularity` periods, ascending.
pub fn rebucket(
    rows: impl IntoIterator<Item = PeriodAggregate>,
    granularity: Granularity,
) -> Vec<PeriodAggregate> {
    let mut merged: BTreeMap<NaiveDate, PeriodAggregate> = BTreeMap::new();
    for row in rows {
        let key = truncate(row.period_start, granularity);
        merged
            .entry(key)
            .or_insert_with(|| PeriodAggregate {
                period_start: key,
                ..Default::default()
            })
            .merge(&row);
    }
    merged.into_values().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
