//! The salary analytics engine.
//!
//! Each report is one pipeline: validate parameters, resolve the filter,
//! short-circuit if it can never match, run the store query, apply policy.
//! The engine holds no mutable state and is shared freely across threads.

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::derive;
use super::resolver::FilterResolver;
use super::store::{AggregationStore, DimensionLookup};
use super::types::*;
use super::validate;

/// Engine-level policy switches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Emit zero-count histogram buckets so the distribution is contiguous.
    /// When false only non-empty buckets are returned.
    pub include_empty_buckets: bool,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            include_empty_buckets: true,
        }
    }
}

/// Orchestrates [`FilterResolver`] and an [`AggregationStore`].
#[derive(Clone)]
pub struct AnalyticsEngine {
    resolver: FilterResolver,
    store: Arc<dyn AggregationStore>,
    options: EngineOptions,
}

impl AnalyticsEngine {
    pub fn new(lookup: Arc<dyn DimensionLookup>, store: Arc<dyn AggregationStore>) -> Self {
        Self {
            resolver: FilterResolver::new(lookup),
            store,
            options: EngineOptions::default(),
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Resolve `filter`, returning `None` when it can never match.
    fn resolve(
        &self,
        ctx: &QueryContext,
        filter: &NamedFilter,
        report: &'static str,
    ) -> AnalyticsResult<Option<ResolvedFilter>> {
        debug!(report, ?filter, "resolving filter");
        match self.resolver.resolve(ctx, filter)? {
            Resolution::Resolved(resolved) if !resolved.matches_nothing() => {
                ctx.check()?;
                Ok(Some(resolved))
            }
            _ => {
                info!(report, "filter resolved to no dimension ids; returning empty result");
                Ok(None)
            }
        }
    }

    // -----------------------------------------------------------------------
    // distribution
    // -----------------------------------------------------------------------

    /// Salary histogram with an adaptive bucket count.
    pub fn distribution(
        &self,
        ctx: &QueryContext,
        filter: &NamedFilter,
    ) -> AnalyticsResult<Vec<DistributionBucket>> {
        let started = Instant::now();
        let Some(resolved) = self.resolve(ctx, filter, "distribution")? else {
            return Ok(Vec::new());
        };

        let stats = self.store.min_max_count(ctx, &resolved)?;
        let (Some(min), Some(max)) = (stats.min, stats.max) else {
            return Ok(Vec::new());
        };
        if stats.count == 0 {
            return Ok(Vec::new());
        }

        let bucket_count = derive::bucket_count(stats.count);
        let Some(width) = derive::bucket_width(min, max, bucket_count) else {
            debug!(min, max, "all salaries identical; no distribution");
            return Ok(Vec::new());
        };

        ctx.check()?;
        let counts = self
            .store
            .bucket_counts(ctx, &resolved, min, width, bucket_count)?;

        let buckets: Vec<DistributionBucket> = (0..bucket_count)
            .filter_map(|index| {
                let count = counts.get(&index).copied().unwrap_or(0);
                if count == 0 && !self.options.include_empty_buckets {
                    return None;
                }
                let (lower_bound, upper_bound) = derive::bucket_bounds(min, width, index);
                Some(DistributionBucket {
                    lower_bound,
                    upper_bound,
                    count,
                })
            })
            .collect();

        info!(
            total = stats.count,
            bucket_count,
            emitted = buckets.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "salary distribution computed"
        );
        Ok(buckets)
    }

    // -----------------------------------------------------------------------
    // summary
    // -----------------------------------------------------------------------

    /// Count, average, quartiles and one caller-chosen percentile.
    ///
    /// Returns `None` both when the filter is unsatisfiable and when it
    /// matches zero fact rows.
    pub fn summary(
        &self,
        ctx: &QueryContext,
        filter: &NamedFilter,
        target_percentile: i32,
    ) -> AnalyticsResult<Option<SalarySummary>> {
        let started = Instant::now();
        let target = validate::target_percentile(target_percentile)?;
        let Some(resolved) = self.resolve(ctx, filter, "summary")? else {
            return Ok(None);
        };

        let stats = self.store.min_max_count(ctx, &resolved)?;
        if stats.count == 0 {
            info!("summary filter matched zero salary rows");
            return Ok(None);
        }

        ctx.check()?;
        let values = self
            .store
            .percentiles(ctx, &resolved, &[0.25, 0.50, 0.75, target])?;
        let at = |i: usize| values.get(i).copied().flatten();

        let summary = SalarySummary {
            total_count: stats.count,
            average_salary: stats.average,
            percentile25: at(0),
            percentile50: at(1),
            percentile75: at(2),
            percentile_target: at(3),
        };
        info!(
            total = summary.total_count,
            target_percentile,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "salary summary computed"
        );
        Ok(Some(summary))
    }

    // -----------------------------------------------------------------------
    // time_series
    // -----------------------------------------------------------------------

    /// Average salary per period for the `periods` most recent periods,
    /// oldest first.
    pub fn time_series(
        &self,
        ctx: &QueryContext,
        filter: &NamedFilter,
        granularity: Granularity,
        periods: i32,
    ) -> AnalyticsResult<Vec<TimeSeriesPoint>> {
        let started = Instant::now();
        let periods = validate::periods(periods)?;
        let Some(resolved) = self.resolve(ctx, filter, "time_series")? else {
            return Ok(Vec::new());
        };

        let mut rows = self.store.group_by_period(ctx, &resolved, granularity)?;

        // Most recent first for selection, then back to oldest first.
        rows.sort_by(|a, b| b.period_start.cmp(&a.period_start));
        rows.truncate(periods);
        rows.reverse();

        let points: Vec<TimeSeriesPoint> = rows
            .into_iter()
            .filter_map(|row| {
                row.average().map(|average_salary| TimeSeriesPoint {
                    period_start: row.period_start,
                    average_salary,
                    count: row.count,
                })
            })
            .collect();

        info!(
            %granularity,
            requested = periods,
            returned = points.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "salary time series computed"
        );
        Ok(points)
    }

    // -----------------------------------------------------------------------
    // public_roles
    // -----------------------------------------------------------------------

    /// Per-role averages for groups with at least `min_record_count` records,
    /// highest average first, ties by ascending title.
    pub fn public_roles(
        &self,
        ctx: &QueryContext,
        filter: &NamedFilter,
        min_record_count: i64,
    ) -> AnalyticsResult<Vec<PublicRoleAggregate>> {
        let started = Instant::now();
        let min_record_count = validate::min_record_count(min_record_count)?;
        let Some(resolved) = self.resolve(ctx, filter, "public_roles")? else {
            return Ok(Vec::new());
        };

        let groups = self.store.group_by_role(ctx, &resolved)?;
        let total_groups = groups.len();

        let mut roles: Vec<PublicRoleAggregate> = groups
            .into_iter()
            .filter(|g| g.count >= min_record_count)
            .map(|g| PublicRoleAggregate {
                role_title: g.role_title,
                average_salary: g.average_salary,
                record_count: g.count,
            })
            .collect();
        roles.sort_by(compare_roles);

        info!(
            min_record_count,
            total_groups,
            exposed = roles.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "public role aggregates computed"
        );
        Ok(roles)
    }

    // -----------------------------------------------------------------------
    // facts
    // -----------------------------------------------------------------------

    /// Raw fact rows matching `filter`, ascending by id, at most `limit`.
    pub fn facts(
        &self,
        ctx: &QueryContext,
        filter: &NamedFilter,
        limit: u32,
    ) -> AnalyticsResult<Vec<FactRecord>> {
        let limit = validate::fact_limit(limit)?;
        let Some(resolved) = self.resolve(ctx, filter, "facts")? else {
            return Ok(Vec::new());
        };
        let facts = self.store.list_facts(ctx, &resolved, limit)?;
        info!(count = facts.len(), limit, "fact rows fetched");
        Ok(facts)
    }
}

/// Average descending, then title ascending.
fn compare_roles(a: &PublicRoleAggregate, b: &PublicRoleAggregate) -> Ordering {
    b.average_salary
        .total_cmp(&a.average_salary)
        .then_with(|| a.role_title.cmp(&b.role_title))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
