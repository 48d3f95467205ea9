//! Shared types for the analytics library.
//!
//! Filters, resolved filters, result rows and the error type used by the
//! resolver, the engine, the store traits and the CLI.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest dimension name accepted in a filter.
pub const MAX_NAME_LEN: usize = 255;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Analytics-specific error.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// A report parameter is out of range. Raised before any I/O.
    #[error("invalid argument '{param}': {message}")]
    InvalidArgument {
        param: &'static str,
        message: String,
    },

    /// A named filter component does not match any known dimension value.
    #[error("invalid filter '{param}': {message}")]
    InvalidFilter {
        param: &'static str,
        message: String,
    },

    /// The dimension lookup or aggregation store failed.
    #[error("analytics backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("query cancelled")]
    Cancelled,

    #[error("query deadline exceeded")]
    DeadlineExceeded,
}

impl AnalyticsError {
    pub fn invalid_argument(param: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            param,
            message: message.into(),
        }
    }

    pub fn invalid_filter(param: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidFilter {
            param,
            message: message.into(),
        }
    }

    /// Stable machine-readable kind, used in CLI error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidArgument { .. } => "invalid_argument",
            Self::InvalidFilter { .. } => "invalid_filter",
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    /// True when the caller's input was at fault (the 4xx family).
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidArgument { .. } | Self::InvalidFilter { .. }
        )
    }

    /// The offending parameter for caller errors.
    pub fn param(&self) -> Option<&'static str> {
        match self {
            Self::InvalidArgument { param, .. } | Self::InvalidFilter { param, .. } => Some(param),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for AnalyticsError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::OperationInterrupted =>
            {
                Self::Cancelled
            }
            other => Self::BackendUnavailable(other.to_string()),
        }
    }
}

/// Convenience alias.
pub type AnalyticsResult<T> = std::result::Result<T, AnalyticsError>;

// ---------------------------------------------------------------------------
// QueryContext
// ---------------------------------------------------------------------------

/// Caller-supplied cancellation flag and deadline.
///
/// Passed unchanged from the engine to every collaborator call. Cloning shares
/// the cancel flag, so a clone handed to another thread can cancel the query.
#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    cancel_flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl QueryContext {
    /// A context that never cancels and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            cancel_flag: Arc::new(AtomicBool::new(false)),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel(&self) {
        self.cancel_flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel_flag.load(Ordering::SeqCst)
    }

    /// Fail fast if the caller cancelled or the deadline passed.
    pub fn check(&self) -> AnalyticsResult<()> {
        if self.is_cancelled() {
            return Err(AnalyticsError::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(AnalyticsError::DeadlineExceeded);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Granularity
// ---------------------------------------------------------------------------

/// Time-bucket granularity for salary time series (library-side, no clap dependency).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    #[default]
    Month,
    Quarter,
    Year,
}

impl std::fmt::Display for Granularity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Month => write!(f, "month"),
            Self::Quarter => write!(f, "quarter"),
            Self::Year => write!(f, "year"),
        }
    }
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Human-readable salary filter, as supplied by a caller.
///
/// Callers convert from their own arg structs (e.g. the CLI's `FilterArgs`).
/// Empty strings count as "not supplied".
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedFilter {
    pub industry_field_name: Option<String>,
    pub standard_job_role_title: Option<String>,
    pub hierarchy_level_name: Option<String>,
    pub district_name: Option<String>,
    pub oblast_name: Option<String>,
    pub city_name: Option<String>,
    /// Inclusive lower bound.
    pub date_start: Option<NaiveDate>,
    /// Inclusive upper bound.
    pub date_end: Option<NaiveDate>,
}

impl NamedFilter {
    /// True when no dimension name is supplied (dates may still be set).
    pub fn has_no_names(&self) -> bool {
        self.named_fields().iter().all(|(_, v)| v.is_none())
    }

    /// Supplied, non-empty names paired with their external parameter name.
    pub(crate) fn named_fields(&self) -> [(&'static str, Option<&str>); 6] {
        [
            ("industryFieldName", non_empty(&self.industry_field_name)),
            ("standardJobRoleTitle", non_empty(&self.standard_job_role_title)),
            ("hierarchyLevelName", non_empty(&self.hierarchy_level_name)),
            ("districtName", non_empty(&self.district_name)),
            ("oblastName", non_empty(&self.oblast_name)),
            ("cityName", non_empty(&self.city_name)),
        ]
    }
}

pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

/// A filter expressed purely in dimension surrogate IDs.
///
/// `None` means "no restriction"; `Some(empty)` matches nothing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedFilter {
    pub location_ids: Option<BTreeSet<i64>>,
    pub job_ids: Option<BTreeSet<i64>>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
}

impl ResolvedFilter {
    /// A filter with no dimension restriction and no date bounds.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// True if an ID set is present but empty, so no fact can match.
    pub fn matches_nothing(&self) -> bool {
        self.location_ids.as_ref().is_some_and(BTreeSet::is_empty)
            || self.job_ids.as_ref().is_some_and(BTreeSet::is_empty)
    }
}

/// Outcome of filter resolution.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Resolution {
    Resolved(ResolvedFilter),
    /// Some named component matched no dimension rows; the fact store must not be queried.
    Unsatisfiable,
}

// ---------------------------------------------------------------------------
// Store-level rows
// ---------------------------------------------------------------------------

/// One salary observation from the fact table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FactRecord {
    pub salary_fact_id: i64,
    pub date_id: i64,
    pub location_id: i64,
    pub employer_id: i64,
    pub job_id: i64,
    pub employee_id: i64,
    pub salary_amount: f64,
    pub bonus_amount: Option<f64>,
}

/// MIN / MAX / COUNT / AVG over the filtered fact set.
///
/// `min`, `max` and `average` are `None` exactly when `count == 0`.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct SalaryStats {
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub count: i64,
    pub average: Option<f64>,
}

/// Sum and count for one truncated period. Additive, so finer periods can be
/// merged into coarser ones.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct PeriodAggregate {
    pub period_start: NaiveDate,
    pub salary_sum: f64,
    pub count: i64,
}

impl PeriodAggregate {
    pub fn merge(&mut self, other: &PeriodAggregate) {
        self.salary_sum += other.salary_sum;
        self.count += other.count;
    }

    pub fn average(&self) -> Option<f64> {
        super::derive::safe_avg(self.salary_sum, self.count)
    }
}

/// Average and count for one standard job-role title.
#[derive(Debug, Clone, PartialEq)]
pub struct RoleAggregate {
    pub role_title: String,
    pub average_salary: f64,
    pub count: i64,
}

// ---------------------------------------------------------------------------
// Report results
// ---------------------------------------------------------------------------

/// One histogram bucket of the salary distribution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributionBucket {
    #[serde(rename = "lowerBound")]
    pub lower_bound: f64,
    #[serde(rename = "upperBound")]
    pub upper_bound: f64,
    #[serde(rename = "bucketCount")]
    pub count: i64,
}

/// Summary statistics over the filtered fact set.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalarySummary {
    pub total_count: i64,
    pub average_salary: Option<f64>,
    pub percentile25: Option<f64>,
    pub percentile50: Option<f64>,
    pub percentile75: Option<f64>,
    pub percentile_target: Option<f64>,
}

/// Average salary for one truncated period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    #[serde(rename = "periodStart")]
    pub period_start: NaiveDate,
    #[serde(rename = "avgSalary")]
    pub average_salary: f64,
    #[serde(rename = "salaryCountInPeriod")]
    pub count: i64,
}

/// Publicly exposable aggregate for one standard job role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PublicRoleAggregate {
    #[serde(rename = "standardJobRoleTitle")]
    pub role_title: String,
    #[serde(rename = "averageSalary")]
    pub average_salary: f64,
    #[serde(rename = "salaryRecordCount")]
    pub record_count: i64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
