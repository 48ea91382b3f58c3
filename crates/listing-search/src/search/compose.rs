//! Turns validated filters into an engine-independent query plan.
//!
//! A [`QueryPlan`] is a conjunction of [`Predicate`]s plus the ordered
//! [`SortKey`]s. The same predicates drive both counting and fetching, so the two
//! cannot disagree on a fixed snapshot.
use tracing::debug;
use uuid::Uuid;

use super::ranking::{SortKey, order_for};
use crate::{
    config::{EngineConfig, SimilarityMetric},
    filter::{BoundingBox, FilterCriteria},
    geo::GeoPoint,
};
use listing_search_data::schema::listing;

/// Text columns a text clause can look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextField {
    Title,
    Description,
    ProductName,
    FarmerName,
}

impl TextField {
    /// Columns of the ranked free-text search
    pub const ALL: [Self; 3] = [Self::ProductName, Self::Title, Self::Description];
    /// Columns of the map search
    pub const MAP: [Self; 3] = [Self::Title, Self::ProductName, Self::FarmerName];

    pub fn column(self) -> &'static str {
        match self {
            Self::Title => listing::TITLE,
            Self::Description => listing::DESCRIPTION,
            Self::ProductName => listing::PRODUCT_NAME,
            Self::FarmerName => listing::FARMER_NAME,
        }
    }
}

/// One clause of a conjunctive filter. A null column value never satisfies a clause.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Both coordinates present
    HasLocation,
    /// Listing id, compared case-insensitively
    ListingId(String),
    Available(bool),
    /// Inclusive lower price bound, minor units
    MinPrice(i64),
    /// Inclusive upper price bound, minor units
    MaxPrice(i64),
    Product(Uuid),
    Category(Uuid),
    /// Exact category display name
    CategoryName(String),
    /// Literal case-insensitive substring on any of `fields`, no fuzzy matching
    Contains {
        query: String,
        fields: Vec<TextField>,
    },
    /// Literal case-insensitive substring or fuzzy match on any of `fields`
    Text {
        query: String,
        fields: Vec<TextField>,
        threshold: f64,
        metric: SimilarityMetric,
    },
    WithinBbox(BoundingBox),
    /// Great-circle distance to `center` at most `meters`
    WithinRadius { center: GeoPoint, meters: f64 },
}

/// Predicates (AND-ed) and sort keys (in priority order).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPlan {
    pub predicates: Vec<Predicate>,
    pub order: Vec<SortKey>,
}

impl QueryPlan {
    pub fn new(predicates: Vec<Predicate>, order: Vec<SortKey>) -> Self {
        Self { predicates, order }
    }
}

/// Filter clauses for `criteria`, one per dimension that is set.
pub fn predicates_for(criteria: &FilterCriteria, config: &EngineConfig) -> Vec<Predicate> {
    let mut predicates = vec![Predicate::HasLocation];

    if let Some(available) = criteria.available {
        predicates.push(Predicate::Available(available));
    }
    if let Some(min) = criteria.min_price_cents {
        predicates.push(Predicate::MinPrice(min));
    }
    if let Some(max) = criteria.max_price_cents {
        predicates.push(Predicate::MaxPrice(max));
    }
    if let Some(product_id) = criteria.product_id {
        predicates.push(Predicate::Product(product_id));
    }
    if let Some(category_id) = criteria.category_id {
        predicates.push(Predicate::Category(category_id));
    }
    if let Some(query) = &criteria.text {
        predicates.push(Predicate::Text {
            query: query.clone(),
            fields: TextField::ALL.to_vec(),
            threshold: config.similarity_threshold,
            metric: config.similarity_metric,
        });
    }
    if let Some(bbox) = criteria.bbox {
        predicates.push(Predicate::WithinBbox(bbox));
    }

    predicates
}

/// Full plan for a ranked search.
pub fn compose(criteria: &FilterCriteria, config: &EngineConfig) -> QueryPlan {
    let plan = QueryPlan::new(
        predicates_for(criteria, config),
        order_for(criteria, config.similarity_metric),
    );
    debug!(
        predicates = plan.predicates.len(),
        sort_keys = plan.order.len(),
        "Composed query plan"
    );
    plan
}
