//! Salary analytics library.
//!
//! Resolves human-readable filters against the dimension tables and runs
//! distribution, summary, time-series and public-role reports over the
//! salary fact table.
//!
//! # Module structure
//!
//! - [`types`]: filters, result rows, query context, error type
//! - [`resolver`]: name → surrogate-ID filter resolution
//! - [`engine`]: the four reports plus raw fact listing
//! - [`store`]: collaborator traits (`DimensionLookup`, `AggregationStore`)
//! - [`query`]: SQLite implementation of both traits
//! - [`schema`]: star-schema DDL
//! - [`bucketing`]: period truncation and ISO date conversions
//! - [`derive`]: histogram sizing and percentile math
//! - [`validate`]: report-parameter range checks

pub mod bucketing;
pub mod derive;
pub mod engine;
pub mod query;
pub mod resolver;
pub mod schema;
pub mod store;
pub mod types;
pub mod validate;

// Re-export the most commonly used items at the crate::analytics level.
pub use engine::{AnalyticsEngine, EngineOptions};
pub use query::SqliteStore;
pub use resolver::FilterResolver;
pub use store::{AggregationStore, DimensionLookup};
pub use types::{
    AnalyticsError, AnalyticsResult, DistributionBucket, FactRecord, Granularity, NamedFilter,
    PublicRoleAggregate, QueryContext, Resolution, ResolvedFilter, SalarySummary, TimeSeriesPoint,
};
