//! Listing Search - filtered, ranked search over a farm marketplace's listings
//!
//! Listings are read from a point-in-time snapshot of the `listings` and
//! `listing_images` tables and searched with polars lazy queries.
//!
//! # Quick Start
//!
//! ```rust
//! use listing_search::{FilterCriteria, ListingSearcher, PageRequest};
//! use listing_search::data::{SampleDataConfig, create_sample_data};
//!
//! let (listings, images) = create_sample_data(&SampleDataConfig::sample())?;
//! let searcher = ListingSearcher::from_frames(listings, images)?;
//!
//! // Text search ranks by similarity first, then by the requested sort
//! let criteria = FilterCriteria::default()
//!     .with_text("appl")
//!     .with_price_range(None, Some(900));
//! let page = searcher.search_page(&criteria, PageRequest::first(searcher.config()))?;
//! println!("{} of {} listings", page.items.len(), page.total);
//! # Ok::<(), listing_search::error::ListingSearchError>(())
//! ```
//!
//! # Features
//!
//! - **Faceted filters**: text, price range, product, category, availability and bounding box
//! - **Relevance ranking**: substring or trigram similarity over title, description and product name
//! - **Map fast path**: bounding-box and radius queries returning lightweight points
//! - **Map search**: substring, category and availability filters over mappable listings
//! - **HTTP surface**: an axum router behind the `server` feature
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt::format::FmtSpan};

mod config;
mod core;
pub mod error;
mod filter;
mod geo;
mod projection;
mod search;
mod store;

#[cfg(feature = "server")]
pub mod server;

pub use core::ListingSearcher;

pub use config::{EngineConfig, EngineConfigBuilder, SimilarityMetric};
pub use filter::{
    BoundingBox, FieldError, FilterCriteria, PageRequest, RawSearchParams, SortDirection,
    SortField, SortSpec, ValidationErrors,
};
#[cfg(feature = "serde")]
pub use geo::{feature_collection, map_feature_collection};
pub use geo::{
    BboxQuery, EARTH_RADIUS_METERS, GeoPoint, MapSearchQuery, RadiusQuery, RawBboxParams,
    RawMapSearchParams, RawRadiusParams, haversine_distance,
};
pub use listing_search_data as data;
pub use listing_search_data::ListingSnapshotData;
pub use polars;
pub use projection::{
    GeometryPoint, ImageIndex, ListingCard, ListingDetail, ListingSummary, MapListing, Page,
};
pub use search::{
    Predicate, QueryPlan, SearchError, SortKey, TextField, compose, count_matches, fetch_all,
    fetch_window, text,
};
pub use store::{ListingStore, Snapshot};

static LOGGER_INIT: OnceCell<()> = OnceCell::new();

/// Initialize logging for the listing search library.
///
/// `RUST_LOG` takes precedence over `level` when set. Safe to call more than once;
/// only the first call installs the subscriber.
///
/// ```rust
/// use listing_search::init_logging;
/// use tracing::Level;
///
/// init_logging(Level::INFO)?;
/// # Ok::<(), listing_search::error::ListingSearchError>(())
/// ```
pub fn init_logging(
    level: impl Into<LevelFilter>,
) -> Result<&'static (), error::ListingSearchError> {
    LOGGER_INIT.get_or_try_init(|| {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(level.into().to_string()))?
            .add_directive("polars=warn".parse()?)
            .add_directive("hyper=warn".parse()?);

        tracing_subscriber::fmt::fmt()
            .with_env_filter(filter)
            .with_span_events(FmtSpan::CLOSE)
            .try_init()
            .map_err(|e| anyhow::anyhow!(e))?;
        Ok(())
    })
}
