//! SQLite reference store.
//!
//! [`SqliteStore`] implements both [`DimensionLookup`] and
//! [`AggregationStore`] over the star schema in [`super::schema`]. Every
//! statement is built from WHERE fragments plus bind values, so dimension
//! names never reach the SQL text.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use parking_lot::Mutex;
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, Row, Statement, params_from_iter};
use tracing::{debug, trace};

use super::bucketing;
use super::derive;
use super::schema;
use super::store::{AggregationStore, DimensionLookup};
use super::types::*;

/// Rows stepped between cancellation checks.
const CHECK_EVERY_ROWS: usize = 1024;

/// SQLite virtual-machine steps between progress-handler checks.
const PROGRESS_OPS: i32 = 1000;

/// Fact table joined with the date dimension; every fact query starts here.
const FACT_FROM: &str = "FROM fact_salaries fs JOIN dim_date d ON d.date_id = fs.date_id";

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Check whether a table exists in the database.
pub fn table_exists(conn: &Connection, name: &str) -> bool {
    conn.query_row(
        "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?1",
        [name],
        |_| Ok(()),
    )
    .is_ok()
}

/// Fail with a bootstrap hint if any of `tables` is missing.
fn ensure_tables(conn: &Connection, tables: &[&str]) -> AnalyticsResult<()> {
    match tables.iter().find(|t| !table_exists(conn, t)) {
        Some(missing) => Err(AnalyticsError::BackendUnavailable(format!(
            "table '{missing}' not found; run `salary-analytics init-db` first"
        ))),
        None => Ok(()),
    }
}

/// Progress handler that interrupts the running statement once `ctx` is
/// cancelled or past its deadline. Removed again on drop.
struct InterruptGuard<'c> {
    conn: &'c Connection,
}

impl<'c> InterruptGuard<'c> {
    fn arm(conn: &'c Connection, ctx: &QueryContext) -> Self {
        let ctx = ctx.clone();
        conn.progress_handler(PROGRESS_OPS, Some(move || ctx.check().is_err()));
        Self { conn }
    }
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn prepare<'c>(conn: &'c Connection, sql: &str, what: &str) -> AnalyticsResult<Statement<'c>> {
    conn.prepare(sql).map_err(|e| {
        AnalyticsError::BackendUnavailable(format!("failed to prepare {what} query: {e}"))
    })
}

/// Step `stmt`, checking `ctx` every [`CHECK_EVERY_ROWS`] rows.
fn collect_rows<T>(
    ctx: &QueryContext,
    stmt: &mut Statement<'_>,
    params: &[Value],
    map: impl FnMut(&Row<'_>) -> rusqlite::Result<T>,
) -> AnalyticsResult<Vec<T>> {
    let rows = stmt.query_map(params_from_iter(params.iter()), map)?;
    let mut out = Vec::new();
    for (i, row) in rows.enumerate() {
        if i % CHECK_EVERY_ROWS == 0 {
            ctx.check()?;
        }
        out.push(row?);
    }
    Ok(out)
}

fn where_clause(parts: &[String]) -> String {
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn push_id_set(
    parts: &mut Vec<String>,
    params: &mut Vec<Value>,
    column: &str,
    ids: &Option<BTreeSet<i64>>,
) {
    let Some(ids) = ids else {
        return;
    };
    if ids.is_empty() {
        parts.push("0 = 1".into());
        return;
    }
    let placeholders: Vec<String> = ids
        .iter()
        .map(|id| {
            params.push(Value::Integer(*id));
            format!("?{}", params.len())
        })
        .collect();
    parts.push(format!("{column} IN ({})", placeholders.join(", ")));
}

/// Build SQL WHERE clause fragments and bind values from a [`ResolvedFilter`].
///
/// Fragments reference `fs` (fact_salaries) and `d` (dim_date). An empty ID
/// set compiles to `0 = 1` so the query matches nothing.
pub fn build_where_parts(filter: &ResolvedFilter) -> (Vec<String>, Vec<Value>) {
    let mut parts = Vec::new();
    let mut params = Vec::new();

    push_id_set(&mut parts, &mut params, "fs.location_id", &filter.location_ids);
    push_id_set(&mut parts, &mut params, "fs.job_id", &filter.job_ids);

    if let Some(start) = filter.date_start {
        params.push(Value::Text(bucketing::to_iso(start)));
        parts.push(format!("d.full_date >= ?{}", params.len()));
    }
    if let Some(end) = filter.date_end {
        params.push(Value::Text(bucketing::to_iso(end)));
        parts.push(format!("d.full_date <= ?{}", params.len()));
    }

    (parts, params)
}

/// Equality fragments for the optional name columns of one dimension table.
fn name_parts(criteria: &[(&str, Option<&str>)]) -> (Vec<String>, Vec<Value>) {
    let mut parts = Vec::new();
    let mut params = Vec::new();
    for (column, value) in criteria {
        if let Some(value) = value {
            params.push(Value::Text((*value).to_string()));
            parts.push(format!("{column} = ?{}", params.len()));
        }
    }
    (parts, params)
}

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// `rusqlite`-backed lookup and aggregation store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file at `path`.
    pub fn open(path: &Path) -> AnalyticsResult<Self> {
        let conn = Connection::open(path).map_err(|e| {
            AnalyticsError::BackendUnavailable(format!(
                "failed to open database {}: {e}",
                path.display()
            ))
        })?;
        debug!(path = %path.display(), "opened salary database");
        Ok(Self::from_connection(conn))
    }

    pub fn open_in_memory() -> AnalyticsResult<Self> {
        Ok(Self::from_connection(Connection::open_in_memory()?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
        }
    }

    /// Create the star schema if it does not exist yet.
    pub fn init_schema(&self) -> AnalyticsResult<()> {
        schema::apply(&self.conn.lock())
    }

    /// Run `f` against the underlying connection (seeding, maintenance).
    pub fn with_connection<T>(
        &self,
        f: impl FnOnce(&Connection) -> AnalyticsResult<T>,
    ) -> AnalyticsResult<T> {
        f(&self.conn.lock())
    }

    /// Run one store call: check `ctx` and the schema, then run `f` with an
    /// [`InterruptGuard`] armed so SQLite stops mid-statement when `ctx` fails.
    fn guarded<T>(
        &self,
        ctx: &QueryContext,
        f: impl FnOnce(&Connection) -> AnalyticsResult<T>,
    ) -> AnalyticsResult<T> {
        ctx.check()?;
        let conn = self.conn.lock();
        ensure_tables(&conn, schema::REQUIRED_TABLES)?;
        let _interrupt = InterruptGuard::arm(&conn, ctx);
        f(&conn).map_err(|err| match err {
            // SQLite only reports "interrupted"; the context knows which.
            AnalyticsError::Cancelled => ctx.check().err().unwrap_or(AnalyticsError::Cancelled),
            other => other,
        })
    }

    fn lookup_ids(
        &self,
        ctx: &QueryContext,
        table: &str,
        id_column: &str,
        criteria: &[(&str, Option<&str>)],
        extra: Option<(&str, i64)>,
    ) -> AnalyticsResult<BTreeSet<i64>> {
        let (mut parts, mut params) = name_parts(criteria);
        if let Some((column, id)) = extra {
            params.push(Value::Integer(id));
            parts.push(format!("{column} = ?{}", params.len()));
        }
        let sql = format!("SELECT {id_column} FROM {table}{}", where_clause(&parts));
        trace!(%sql, "dimension lookup");

        self.guarded(ctx, |conn| {
            let mut stmt = prepare(conn, &sql, table)?;
            let ids = collect_rows(ctx, &mut stmt, &params, |row| row.get::<_, i64>(0))?;
            Ok(ids.into_iter().collect())
        })
    }
}

impl DimensionLookup for SqliteStore {
    fn resolve_location_ids(
        &self,
        ctx: &QueryContext,
        district: Option<&str>,
        oblast: Option<&str>,
        city: Option<&str>,
    ) -> AnalyticsResult<BTreeSet<i64>> {
        self.lookup_ids(
            ctx,
            "dim_location",
            "location_id",
            &[
                ("district_name", district),
                ("oblast_name", oblast),
                ("city_name", city),
            ],
            None,
        )
    }

    fn resolve_job_ids(
        &self,
        ctx: &QueryContext,
        industry_field_id: Option<i64>,
        standard_job_role_title: Option<&str>,
        hierarchy_level_name: Option<&str>,
    ) -> AnalyticsResult<BTreeSet<i64>> {
        self.lookup_ids(
            ctx,
            "dim_job",
            "job_id",
            &[
                ("standard_job_role_title", standard_job_role_title),
                ("hierarchy_level_name", hierarchy_level_name),
            ],
            industry_field_id.map(|id| ("industry_field_id", id)),
        )
    }

    fn resolve_industry_id(&self, ctx: &QueryContext, name: &str) -> AnalyticsResult<Option<i64>> {
        let sql = "SELECT industry_field_id FROM dim_industry_field WHERE industry_field_name = ?1";
        self.guarded(ctx, |conn| {
            let id = conn
                .query_row(sql, [name], |row| row.get::<_, i64>(0))
                .optional()?;
            Ok(id)
        })
    }
}

impl AggregationStore for SqliteStore {
    fn min_max_count(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
    ) -> AnalyticsResult<SalaryStats> {
        let (parts, params) = build_where_parts(filter);
        let sql = format!(
            "SELECT MIN(fs.salary_amount), MAX(fs.salary_amount), COUNT(*), AVG(fs.salary_amount)
             {FACT_FROM}{}",
            where_clause(&parts)
        );
        let stats = self.guarded(ctx, |conn| {
            Ok(conn.query_row(&sql, params_from_iter(params.iter()), |row| {
                Ok(SalaryStats {
                    min: row.get(0)?,
                    max: row.get(1)?,
                    count: row.get(2)?,
                    average: row.get(3)?,
                })
            })?)
        })?;
        debug!(count = stats.count, "salary stats fetched");
        Ok(stats)
    }

    fn bucket_counts(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        min: f64,
        width: f64,
        bucket_count: u32,
    ) -> AnalyticsResult<BTreeMap<u32, i64>> {
        let (parts, mut params) = build_where_parts(filter);
        params.push(Value::Real(min));
        let min_idx = params.len();
        params.push(Value::Real(width));
        let width_idx = params.len();
        params.push(Value::Integer(i64::from(bucket_count.saturating_sub(1))));
        let last_idx = params.len();

        // Same arithmetic as derive::bucket_index: floor, then clamp.
        let sql = format!(
            "SELECT MAX(0, MIN(CAST((fs.salary_amount - ?{min_idx}) / ?{width_idx} AS INTEGER),
                               ?{last_idx})) AS bucket,
                    COUNT(*)
             {FACT_FROM}{}
             GROUP BY bucket
             ORDER BY bucket",
            where_clause(&parts)
        );
        let rows = self.guarded(ctx, |conn| {
            let mut stmt = prepare(conn, &sql, "bucket count")?;
            collect_rows(ctx, &mut stmt, &params, |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })
        })?;

        let mut counts = BTreeMap::new();
        for (bucket, count) in rows {
            let index = u32::try_from(bucket).map_err(|_| {
                AnalyticsError::BackendUnavailable(format!("bucket index {bucket} out of range"))
            })?;
            counts.insert(index, count);
        }
        Ok(counts)
    }

    fn percentiles(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        fractions: &[f64],
    ) -> AnalyticsResult<Vec<Option<f64>>> {
        let (parts, params) = build_where_parts(filter);
        let sql = format!(
            "SELECT fs.salary_amount {FACT_FROM}{} ORDER BY fs.salary_amount",
            where_clause(&parts)
        );
        let sorted = self.guarded(ctx, |conn| {
            let mut stmt = prepare(conn, &sql, "percentile")?;
            collect_rows(ctx, &mut stmt, &params, |row| row.get::<_, f64>(0))
        })?;

        Ok(fractions
            .iter()
            .map(|f| derive::percentile_cont(&sorted, *f))
            .collect())
    }

    fn group_by_period(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        granularity: Granularity,
    ) -> AnalyticsResult<Vec<PeriodAggregate>> {
        let (parts, params) = build_where_parts(filter);
        let sql = format!(
            "SELECT date(d.full_date, 'start of month') AS month_start,
                    SUM(fs.salary_amount),
                    COUNT(*)
             {FACT_FROM}{}
             GROUP BY month_start",
            where_clause(&parts)
        );
        let rows = self.guarded(ctx, |conn| {
            let mut stmt = prepare(conn, &sql, "time series")?;
            collect_rows(ctx, &mut stmt, &params, |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, f64>(1)?,
                    row.get::<_, i64>(2)?,
                ))
            })
        })?;

        let months = rows
            .into_iter()
            .map(|(start, salary_sum, count)| {
                Ok(PeriodAggregate {
                    period_start: bucketing::parse_iso(&start)?,
                    salary_sum,
                    count,
                })
            })
            .collect::<AnalyticsResult<Vec<_>>>()?;
        Ok(bucketing::rebucket(months, granularity))
    }

    fn group_by_role(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
    ) -> AnalyticsResult<Vec<RoleAggregate>> {
        let (parts, params) = build_where_parts(filter);
        let sql = format!(
            "SELECT j.standard_job_role_title, AVG(fs.salary_amount), COUNT(*)
             {FACT_FROM}
             JOIN dim_job j ON j.job_id = fs.job_id{}
             GROUP BY j.standard_job_role_title",
            where_clause(&parts)
        );
        self.guarded(ctx, |conn| {
            let mut stmt = prepare(conn, &sql, "role aggregate")?;
            collect_rows(ctx, &mut stmt, &params, |row| {
                Ok(RoleAggregate {
                    role_title: row.get(0)?,
                    average_salary: row.get(1)?,
                    count: row.get(2)?,
                })
            })
        })
    }

    fn list_facts(
        &self,
        ctx: &QueryContext,
        filter: &ResolvedFilter,
        limit: u32,
    ) -> AnalyticsResult<Vec<FactRecord>> {
        let (parts, mut params) = build_where_parts(filter);
        params.push(Value::Integer(i64::from(limit)));
        let sql = format!(
            "SELECT fs.salary_fact_id, fs.date_id, fs.location_id, fs.employer_id,
                    fs.job_id, fs.employee_id, fs.salary_amount, fs.bonus_amount
             {FACT_FROM}{}
             ORDER BY fs.salary_fact_id
             LIMIT ?{}",
            where_clause(&parts),
            params.len()
        );
        self.guarded(ctx, |conn| {
            let mut stmt = prepare(conn, &sql, "fact listing")?;
            collect_rows(ctx, &mut stmt, &params, |row| {
                Ok(FactRecord {
                    salary_fact_id: row.get(0)?,
                    date_id: row.get(1)?,
                    location_id: row.get(2)?,
                    employer_id: row.get(3)?,
                    job_id: row.get(4)?,
                    employee_id: row.get(5)?,
                    salary_amount: row.get(6)?,
                    bonus_amount: row.get(7)?,
                })
            })
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
