//! The [`ListingSearcher`] facade over a listing store.
//!
//! Every operation takes its own [`Snapshot`] from the store and drops it on return,
//! so a count and the fetch that follows it always see the same data.
//!
//! ```rust
//! use listing_search::{FilterCriteria, ListingSearcher, PageRequest};
//! use listing_search::data::{SampleDataConfig, create_sample_data};
//!
//! let (listings, images) = create_sample_data(&SampleDataConfig::sample())?;
//! let searcher = ListingSearcher::from_frames(listings, images)?;
//!
//! let criteria = FilterCriteria::default().with_text("honey");
//! let page = searcher.search_page(&criteria, PageRequest::first(searcher.config()))?;
//! assert!(page.items.len() <= page.size);
//! # Ok::<(), listing_search::error::ListingSearchError>(())
//! ```
use std::{path::Path, sync::Arc};

use polars::prelude::*;
use tracing::{debug, info, instrument};

use crate::{
    config::EngineConfig,
    error::Result,
    filter::{FilterCriteria, PageRequest, RawSearchParams},
    geo::{BboxQuery, MapSearchQuery, RadiusQuery},
    projection::{
        GeometryPoint, ImageIndex, ListingCard, ListingDetail, ListingSummary, MapListing, Page,
    },
    search::{
        Predicate, QueryPlan, SearchError, compose, count_matches, fetch_window, predicate_expr,
    },
    store::{ListingStore, Snapshot},
};
use listing_search_data::ListingSnapshotData;

/// Listing search engine.
///
/// Cheap to clone and safe to share between threads; it holds no per-request state.
#[derive(Clone)]
pub struct ListingSearcher {
    store: Arc<dyn ListingStore>,
    config: EngineConfig,
}

impl ListingSearcher {
    pub fn new(store: impl ListingStore + 'static) -> Self {
        Self::with_config(store, EngineConfig::default())
    }

    pub fn with_config(store: impl ListingStore + 'static, config: EngineConfig) -> Self {
        Self {
            store: Arc::new(store),
            config,
        }
    }

    /// Searcher over the Parquet or CSV export in `dir`.
    #[instrument(name = "Open ListingSearcher", level = "info", skip_all, fields(dir = ?dir))]
    pub fn from_data_dir(dir: &Path) -> Result<Self> {
        Ok(Self::new(ListingSnapshotData::from_dir(dir)?))
    }

    /// Searcher over in-memory `listings` and `listing_images` frames.
    pub fn from_frames(listings: DataFrame, images: DataFrame) -> Result<Self> {
        Ok(Self::new(ListingSnapshotData::from_frames(listings, images)?))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    fn snapshot(&self) -> Result<Snapshot> {
        Ok(self.store.snapshot()?)
    }

    /// Number of listings matching `criteria`, independent of any page window.
    #[instrument(name = "Count listings", level = "info", skip_all)]
    pub fn count(&self, criteria: &FilterCriteria) -> Result<usize> {
        let snapshot = self.snapshot()?;
        let plan = compose(criteria, &self.config);
        Ok(count_matches(snapshot.listings(), &plan)?)
    }

    /// One window of the ranked result, without the total.
    #[instrument(name = "Search listings", level = "info", skip_all, fields(page = page.page, size = page.size))]
    pub fn search(&self, criteria: &FilterCriteria, page: PageRequest) -> Result<Vec<ListingCard>> {
        let snapshot = self.snapshot()?;
        let plan = compose(criteria, &self.config);
        self.fetch_cards(&snapshot, &plan, page)
    }

    /// Count, then fetch the window unless nothing matches.
    #[instrument(
        name = "Search listing page",
        level = "info",
        skip_all,
        fields(page = page.page, size = page.size, text = criteria.has_text())
    )]
    pub fn search_page(
        &self,
        criteria: &FilterCriteria,
        page: PageRequest,
    ) -> Result<Page<ListingCard>> {
        let t_search = std::time::Instant::now();
        let snapshot = self.snapshot()?;
        let plan = compose(criteria, &self.config);

        let total = count_matches(snapshot.listings(), &plan)?;
        if total == 0 {
            info!(elapsed = ?t_search.elapsed(), "No listings matched");
            return Ok(Page::empty(page.page, page.size));
        }

        let items = self.fetch_cards(&snapshot, &plan, page)?;
        info!(
            total,
            returned = items.len(),
            elapsed = ?t_search.elapsed(),
            "Search complete"
        );
        Ok(Page {
            items,
            page: page.page,
            size: page.size,
            total,
        })
    }

    /// Validates raw request parameters and runs [`Self::search_page`].
    pub fn search_raw(&self, params: &RawSearchParams) -> Result<Page<ListingCard>> {
        let (criteria, page) = params
            .validate(&self.config)
            .map_err(SearchError::Validation)?;
        self.search_page(&criteria, page)
    }

    fn fetch_cards(
        &self,
        snapshot: &Snapshot,
        plan: &QueryPlan,
        page: PageRequest,
    ) -> Result<Vec<ListingCard>> {
        let df = fetch_window(snapshot.listings(), plan, page.offset(), page.size)?;

        let mut cards = ListingCard::from_df(&df)?;
        let ids: Vec<String> = cards.iter().map(|c| c.id.clone()).collect();
        ImageIndex::load(snapshot.images(), &ids)?.attach_thumbnails(&mut cards);
        debug!(rows = cards.len(), "Projected cards");
        Ok(cards)
    }

    /// The mappable listing with `id`, whatever its availability. Ids compare case-insensitively.
    fn row_by_id(&self, snapshot: &Snapshot, id: &str) -> Result<DataFrame> {
        Ok(snapshot
            .listings()
            .clone()
            .filter(
                predicate_expr(&Predicate::ListingId(id.to_string()))
                    .and(predicate_expr(&Predicate::HasLocation)),
            )
            .limit(1)
            .collect()?)
    }

    #[instrument(name = "Find listing summary", level = "info", skip(self))]
    pub fn find_summary(&self, id: &str) -> Result<Option<ListingSummary>> {
        let snapshot = self.snapshot()?;
        let df = self.row_by_id(&snapshot, id)?;
        Ok(ListingCard::from_df(&df)?.first().map(ListingSummary::from))
    }

    #[instrument(name = "Find listing detail", level = "info", skip(self))]
    pub fn find_detail(&self, id: &str) -> Result<Option<ListingDetail>> {
        let snapshot = self.snapshot()?;
        let df = self.row_by_id(&snapshot, id)?;
        let Some(card) = ListingCard::from_df(&df)?.into_iter().next() else {
            return Ok(None);
        };
        let images = ImageIndex::load(snapshot.images(), &[card.id])?;
        Ok(ListingDetail::from_df(&df, &images)?.into_iter().next())
    }

    fn geometry_points(&self, plan: &QueryPlan, limit: usize) -> Result<Vec<GeometryPoint>> {
        let t_query = std::time::Instant::now();
        let snapshot = self.snapshot()?;
        let df = fetch_window(snapshot.listings(), plan, 0, limit)?;
        let points = GeometryPoint::from_df(&df)?;
        info!(rows = points.len(), limit, elapsed = ?t_query.elapsed(), "Fast-path query complete");
        Ok(points)
    }

    /// Newest listings inside the box, at most `query.limit`.
    #[instrument(name = "Listings within bbox", level = "info", skip_all, fields(limit = query.limit))]
    pub fn within_bbox(&self, query: &BboxQuery) -> Result<Vec<GeometryPoint>> {
        self.geometry_points(&query.plan(), query.limit)
    }

    /// Newest listings within `query.meters` of the center, at most `query.limit`.
    #[instrument(
        name = "Listings within radius",
        level = "info",
        skip_all,
        fields(meters = query.meters, limit = query.limit)
    )]
    pub fn within_radius(&self, query: &RadiusQuery) -> Result<Vec<GeometryPoint>> {
        self.geometry_points(&query.plan(), query.limit)
    }

    /// Newest mappable listings matching the map filters, each with its first image.
    #[instrument(
        name = "Map search",
        level = "info",
        skip_all,
        fields(limit = query.limit, text = query.text.is_some())
    )]
    pub fn map_search(&self, query: &MapSearchQuery) -> Result<Vec<MapListing>> {
        let t_query = std::time::Instant::now();
        let snapshot = self.snapshot()?;
        let df = fetch_window(snapshot.listings(), &query.plan(), 0, query.limit)?;

        let mut rows = MapListing::from_df(&df)?;
        let ids: Vec<String> = rows.iter().map(|r| r.id.clone()).collect();
        ImageIndex::load(snapshot.images(), &ids)?.attach_map_images(&mut rows);
        info!(rows = rows.len(), elapsed = ?t_query.elapsed(), "Map search complete");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::ListingSearchError,
        filter::{BoundingBox, SortSpec},
        geo::{GeoPoint, haversine_distance},
    };
    use listing_search_data::{SampleDataConfig, create_sample_data, test_data::listing_id};

    fn setup_test_env() {
        let _ = crate::init_logging(tracing::Level::WARN);
    }

    fn searcher() -> ListingSearcher {
        setup_test_env();
        let (listings, images) = create_sample_data(&SampleDataConfig::sample()).unwrap();
        ListingSearcher::from_frames(listings, images).unwrap()
    }

    /// Sample data with every stored listing id upper-cased.
    fn upper_case_id_searcher() -> ListingSearcher {
        setup_test_env();
        let (listings, images) = create_sample_data(&SampleDataConfig::sample()).unwrap();
        let upper = |df: DataFrame, column: &str| {
            df.lazy()
                .with_column(col(column).str().to_uppercase())
                .collect()
                .unwrap()
        };
        ListingSearcher::from_frames(
            upper(listings, listing_search_data::schema::listing::ID),
            upper(images, listing_search_data::schema::image::LISTING_ID),
        )
        .unwrap()
    }

    #[test]
    fn test_search_page_total_matches_count() {
        let searcher = searcher();
        let criteria = FilterCriteria::default();
        let page = searcher
            .search_page(&criteria, PageRequest::first(searcher.config()))
            .unwrap();

        assert_eq!(page.total, searcher.count(&criteria).unwrap());
        assert_eq!(page.items.len(), 24);
        assert_eq!(page.size, 24);
    }

    #[test]
    fn test_search_page_with_no_match_is_empty() {
        let searcher = searcher();
        let criteria = FilterCriteria::default().with_price_range(Some(1_000_000), None);
        let page = searcher
            .search_page(&criteria, PageRequest::first(searcher.config()))
            .unwrap();
        assert_eq!(page, Page::empty(0, 24));
    }

    #[test]
    fn test_search_raw_reports_validation_errors() {
        let searcher = searcher();
        let params = RawSearchParams {
            min_price: Some("cheap".into()),
            ..RawSearchParams::default()
        };
        let err = searcher.search_raw(&params).unwrap_err();
        assert!(matches!(
            err,
            ListingSearchError::SearchError(SearchError::Validation(_))
        ));
    }

    #[test]
    fn test_search_default_sort_is_newest_first() {
        let searcher = searcher();
        let criteria = FilterCriteria::default().with_sort(SortSpec::default());
        let page = searcher
            .search_page(&criteria, PageRequest::first(searcher.config()))
            .unwrap();
        // Sample listings get one hour newer per index, so ids descend.
        let ids: Vec<_> = page.items.iter().map(|c| c.id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort_by(|a, b| b.cmp(a));
        assert_eq!(ids, sorted);
    }

    #[test]
    fn test_find_summary_and_detail() {
        let searcher = searcher();
        // Listing 1 has one image, listing 2 two, listing 0 none.
        let summary = searcher.find_summary(&listing_id(1)).unwrap().unwrap();
        assert_eq!(summary.id, listing_id(1));

        let detail = searcher.find_detail(&listing_id(2)).unwrap().unwrap();
        assert_eq!(detail.image_urls.len(), 2);
        assert!(detail.image_urls[0].ends_with("/0.jpg"));
        assert_eq!(detail.card.thumbnail_url.as_ref(), detail.image_urls.first());

        let detail = searcher.find_detail(&listing_id(0)).unwrap().unwrap();
        assert!(detail.image_urls.is_empty());
        assert_eq!(detail.card.thumbnail_url, None);
    }

    #[test]
    fn test_find_ignores_availability_but_requires_location() {
        let searcher = searcher();
        // Sample: every 7th listing is unavailable, every 23rd has no location.
        let unavailable = searcher.find_detail(&listing_id(6)).unwrap().unwrap();
        assert!(!unavailable.available);

        assert!(searcher.find_summary(&listing_id(22)).unwrap().is_none());
        assert!(searcher.find_detail(&listing_id(22)).unwrap().is_none());
        assert!(searcher.find_summary("no-such-listing").unwrap().is_none());
    }

    #[test]
    fn test_find_by_id_ignores_case() {
        let searcher = upper_case_id_searcher();
        let id = listing_id(2);

        let summary = searcher.find_summary(&id).unwrap().unwrap();
        assert_eq!(summary.id, id.to_uppercase());

        let detail = searcher.find_detail(&id).unwrap().unwrap();
        assert_eq!(detail.image_urls.len(), 2);
        assert!(detail.card.thumbnail_url.is_some());

        assert!(searcher.find_detail(&id.to_uppercase()).unwrap().is_some());
    }

    #[test]
    fn test_map_search_filters_and_images() {
        let searcher = searcher();
        let query = MapSearchQuery::new(None, searcher.config())
            .with_text("HONEY")
            .with_category("Pantry")
            .with_available(Some(true));
        let rows = searcher.map_search(&query).unwrap();

        assert!(!rows.is_empty());
        for row in &rows {
            assert_eq!(row.product_name, "Honey");
            assert_eq!(row.category_name.as_deref(), Some("Pantry"));
            assert!(row.available);
            assert!(row.quantity.is_some());
        }
        // Listing i has i % 4 images
        let with_images = rows.iter().filter(|r| r.image_url.is_some()).count();
        assert!(with_images > 0);
        assert!(rows
            .iter()
            .filter_map(|r| r.image_url.as_deref())
            .all(|url| url.ends_with("/0.jpg")));
    }

    #[test]
    fn test_map_search_defaults() {
        let searcher = searcher();
        let rows = searcher
            .map_search(&MapSearchQuery::new(None, searcher.config()))
            .unwrap();
        // 240 sample listings, 10 of them without a location
        assert_eq!(rows.len(), 200);
        assert!(rows.iter().any(|r| !r.available));
        // Newest first: sample ids grow with creation time
        assert!(rows.windows(2).all(|w| w[0].id > w[1].id));

        let rows = searcher
            .map_search(&MapSearchQuery::new(Some(5), searcher.config()).with_category("Fruit"))
            .unwrap();
        assert_eq!(rows.len(), 5);
        assert!(rows.iter().all(|r| r.category_name.as_deref() == Some("Fruit")));
    }

    #[test]
    fn test_within_bbox_respects_box_and_limit() {
        let searcher = searcher();
        let bbox = BoundingBox::new(4.25, 50.75, 4.45, 50.95);
        let query = BboxQuery::new(bbox, None, searcher.config());
        let points = searcher.within_bbox(&query).unwrap();
        assert!(!points.is_empty());
        assert!(points.iter().all(|p| bbox.contains(p.lon, p.lat)));

        let capped = searcher
            .within_bbox(&BboxQuery::new(bbox, Some(3), searcher.config()))
            .unwrap();
        assert_eq!(capped.len(), 3);
        assert_eq!(capped[..], points[..3]);
    }

    #[test]
    fn test_within_radius_distance() {
        let searcher = searcher();
        let center = GeoPoint::new(4.3517, 50.8503);
        let query = RadiusQuery::new(center, Some(8000.0), None, searcher.config());
        let points = searcher.within_radius(&query).unwrap();

        assert!(!points.is_empty());
        for p in &points {
            let d = haversine_distance(center, GeoPoint::new(p.lon, p.lat));
            assert!(d <= 8000.0 + 1e-6, "{} is {d} m away", p.id);
        }
    }
}
