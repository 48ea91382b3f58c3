use polars::prelude::*;
use tracing::debug;

use super::{
    Result,
    compose::QueryPlan,
    lower::{filtered, ordered},
};
use listing_search_data::schema::listing;

/// Rows matching the plan's predicates, regardless of any window.
pub fn count_matches(listings: &LazyFrame, plan: &QueryPlan) -> Result<usize> {
    let total = filtered(listings.clone(), plan)
        .select([col(listing::ID)])
        .collect()?
        .height();
    debug!(total, "Counted matches");
    Ok(total)
}

/// `len` rows of the ordered result starting at `offset`.
pub fn fetch_window(
    listings: &LazyFrame,
    plan: &QueryPlan,
    offset: usize,
    len: usize,
) -> Result<DataFrame> {
    let offset = i64::try_from(offset).unwrap_or(i64::MAX);
    let len = IdxSize::try_from(len).unwrap_or(IdxSize::MAX);
    Ok(ordered(listings.clone(), plan).slice(offset, len).collect()?)
}

/// The whole ordered result.
pub fn fetch_all(listings: &LazyFrame, plan: &QueryPlan) -> Result<DataFrame> {
    Ok(ordered(listings.clone(), plan).collect()?)
}
