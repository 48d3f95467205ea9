//! Name → ID filter resolution.
//!
//! Turns a [`NamedFilter`] into a [`ResolvedFilter`] with as few lookups as
//! possible: the first step that matches nothing stops resolution, so an
//! impossible filter never reaches the aggregation store.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::store::DimensionLookup;
use super::types::{
    AnalyticsError, AnalyticsResult, MAX_NAME_LEN, NamedFilter, QueryContext, Resolution,
    ResolvedFilter, non_empty,
};

/// Resolves human-readable filters through a [`DimensionLookup`].
#[derive(Clone)]
pub struct FilterResolver {
    lookup: Arc<dyn DimensionLookup>,
}

impl FilterResolver {
    pub fn new(lookup: Arc<dyn DimensionLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve `filter` into dimension-ID sets.
    ///
    /// Order: location, then industry, then jobs. An unknown industry name is
    /// a caller error (`InvalidFilter`); a name combination that simply
    /// matches no rows is [`Resolution::Unsatisfiable`].
    pub fn resolve(&self, ctx: &QueryContext, filter: &NamedFilter) -> AnalyticsResult<Resolution> {
        validate_names(filter)?;
        if filter.has_no_names() {
            debug!("no dimension names supplied; skipping lookups");
            return Ok(Resolution::Resolved(ResolvedFilter {
                date_start: filter.date_start,
                date_end: filter.date_end,
                ..ResolvedFilter::unrestricted()
            }));
        }

        let location_ids = match most_specific_location(filter) {
            Some((level, name)) => {
                debug!(level, name, "resolving location ids");
                ctx.check()?;
                let ids = match level {
                    "city" => self.lookup.resolve_location_ids(ctx, None, None, Some(name))?,
                    "oblast" => self.lookup.resolve_location_ids(ctx, None, Some(name), None)?,
                    _ => self.lookup.resolve_location_ids(ctx, Some(name), None, None)?,
                };
                if ids.is_empty() {
                    info!(level, name, "no locations matched the filter");
                    return Ok(Resolution::Unsatisfiable);
                }
                debug!(count = ids.len(), "resolved location ids");
                Some(ids)
            }
            None => None,
        };

        let industry_field_id = match non_empty(&filter.industry_field_name) {
            Some(name) => {
                ctx.check()?;
                match self.lookup.resolve_industry_id(ctx, name)? {
                    Some(id) => Some(id),
                    None => {
                        warn!(industry = name, "unknown industry field name");
                        return Err(AnalyticsError::invalid_filter(
                            "industryFieldName",
                            format!("unknown industry field '{name}'"),
                        ));
                    }
                }
            }
            None => None,
        };

        let title = non_empty(&filter.standard_job_role_title);
        let level = non_empty(&filter.hierarchy_level_name);
        let job_ids = if title.is_some() || level.is_some() || industry_field_id.is_some() {
            debug!(?industry_field_id, ?title, ?level, "resolving job ids");
            ctx.check()?;
            let ids = self
                .lookup
                .resolve_job_ids(ctx, industry_field_id, title, level)?;
            if ids.is_empty() {
                info!("no jobs matched the filter");
                return Ok(Resolution::Unsatisfiable);
            }
            debug!(count = ids.len(), "resolved job ids");
            Some(ids)
        } else {
            None
        };

        Ok(Resolution::Resolved(ResolvedFilter {
            location_ids,
            job_ids,
            date_start: filter.date_start,
            date_end: filter.date_end,
        }))
    }
}

/// City beats oblast beats federal district.
fn most_specific_location(filter: &NamedFilter) -> Option<(&'static str, &str)> {
    non_empty(&filter.city_name)
        .map(|n| ("city", n))
        .or_else(|| non_empty(&filter.oblast_name).map(|n| ("oblast", n)))
        .or_else(|| non_empty(&filter.district_name).map(|n| ("district", n)))
}

fn validate_names(filter: &NamedFilter) -> AnalyticsResult<()> {
    let too_long = filter
        .named_fields()
        .into_iter()
        .find(|(_, value)| value.is_some_and(|name| name.chars().count() > MAX_NAME_LEN));
    match too_long {
        Some((param, _)) => Err(AnalyticsError::invalid_argument(
            param,
            format!("must be at most {MAX_NAME_LEN} characters"),
        )),
        None => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
