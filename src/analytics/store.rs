//! Collaborator traits consumed by the resolver and the engine.
//!
//! [`DimensionLookup`] maps dimension names to surrogate IDs and
//! [`AggregationStore`] runs the aggregate queries over the fact table. Both
//! take the caller's [`QueryContext`] so cancellation reaches data access
//! unchanged. [`crate::analytics::query::SqliteStore`] implements both.

use std::collections::{BTreeMap, BTreeSet};

use super::types::{
    AnalyticsResult, FactRecord, Granularity, PeriodAggregate, QueryContext, ResolvedFilter,
    RoleAggregate, SalaryStats,
};

/// Name → surrogate-ID lookups over the dimension tables.
pub trait DimensionLookup: Send + Sync {
    /// Location IDs matching every supplied name.
    fn resolve_location_ids(
        &self,
        ctx: &QueryContext,
        district: Option<&str>,
        oblast: Option<&str>,
        city: Option<&str>,
    ) -> AnalyticsResult<BTreeSet<i64>>;

    /// Job IDs matching every supplied criterion.
    fn resolve_job_ids(
        &self,
        ctx: &QueryContext,
        industry_field_id: Option<i64>,
        standard_job_role_title: Option<&str>,
        hierarchy_level_name: Option<&str>,
    ) -> AnalyticsResult<BTreeSet<i64>>;

    /// Industry field ID for an exact name, if one exists.
    fn resolve_industry_id(&self, ctx: &QueryContext, name: &str) -> AnalyticsResult<Option<i64>>;
}

/// Parameterized aggregate queries against the fact table.
///
/// Implementations apply the filter exactly; ordering, thresholds and
/// percentile policy are the engine's job.
pub trait AggregationStore: Send + Sync {
    /// MIN, MAX, COUNT and AVG of `salary_amount`.
    fn min_max_count(&self, ctx: &QueryContext, filter: &ResolvedFilter)
    -> AnalyticsResult<SalaryStats>;

    /// Record counts per bucket index, using
    /// [`crate::analytics::derive::bucket_index`]. Empty buckets may be absent.
    fn bucket_counts(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        min: f64,
        width: f64,
        bucket_count: u32,
    ) -> AnalyticsResult<BTreeMap<u32, i64>>;

    /// Continuous percentiles for each fraction in `[0, 1]`, in input order.
    /// Every entry is `None` when nothing matches.
    fn percentiles(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        fractions: &[f64],
    ) -> AnalyticsResult<Vec<Option<f64>>>;

    /// Sum and count per truncated period, in any order.
    fn group_by_period(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        granularity: Granularity,
    ) -> AnalyticsResult<Vec<PeriodAggregate>>;

    /// Average and count per standard job-role title, in any order.
    fn group_by_role(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
    ) -> AnalyticsResult<Vec<RoleAggregate>>;

    /// Raw fact rows, ascending by `salary_fact_id`, at most `limit`.
    fn list_facts(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        limit: u32,
    ) -> AnalyticsResult<Vec<FactRecord>>;
}
