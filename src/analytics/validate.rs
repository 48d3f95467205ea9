//! Report-parameter validation.
//!
//! Every check runs before any lookup or query, so a bad parameter never costs
//! a round-trip. Parameter names in errors are the external (camelCase) names.

use super::types::{AnalyticsError, AnalyticsResult};

/// Default percentile reported alongside the quartiles.
pub const DEFAULT_TARGET_PERCENTILE: i32 = 90;
/// Default number of periods in a time series.
pub const DEFAULT_PERIODS: i32 = 12;
/// Default significance threshold for public role aggregates.
pub const DEFAULT_MIN_RECORD_COUNT: i64 = 10;
/// Hard cap on raw fact listings.
pub const MAX_FACT_LIMIT: u32 = 1000;

/// `target_percentile` must be in `1..=99`.
pub fn target_percentile(value: i32) -> AnalyticsResult<f64> {
    if (1..=99).contains(&value) {
        Ok(f64::from(value) / 100.0)
    } else {
        Err(AnalyticsError::invalid_argument(
            "targetPercentile",
            format!("must be between 1 and 99, got {value}"),
        ))
    }
}

/// `periods` must be positive.
pub fn periods(value: i32) -> AnalyticsResult<usize> {
    if value > 0 {
        Ok(value as usize)
    } else {
        Err(AnalyticsError::invalid_argument(
            "periods",
            format!("must be greater than zero, got {value}"),
        ))
    }
}

/// `min_record_count` must not be negative.
pub fn min_record_count(value: i64) -> AnalyticsResult<i64> {
    if value >= 0 {
        Ok(value)
    } else {
        Err(AnalyticsError::invalid_argument(
            "minRecordCount",
            format!("cannot be negative, got {value}"),
        ))
    }
}

/// Fact listing `limit` must be in `1..=MAX_FACT_LIMIT`.
pub fn fact_limit(value: u32) -> AnalyticsResult<u32> {
    if (1..=MAX_FACT_LIMIT).contains(&value) {
        Ok(value)
    } else {
        Err(AnalyticsError::invalid_argument(
            "limit",
            format!("must be between 1 and {MAX_FACT_LIMIT}, got {value}"),
        ))
    }
}
