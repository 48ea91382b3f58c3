//! The read-only store the engine queries.
use polars::prelude::LazyFrame;

use crate::search::Result;
use listing_search_data::ListingSnapshotData;

/// Per-request view of the listings and images tables.
///
/// Taken once per request and dropped when the request ends; every query of
/// that request runs against the same frames.
#[derive(Clone)]
pub struct Snapshot {
    listings: LazyFrame,
    images: LazyFrame,
}

impl Snapshot {
    pub fn new(listings: LazyFrame, images: LazyFrame) -> Self {
        Self { listings, images }
    }

    pub fn listings(&self) -> &LazyFrame {
        &self.listings
    }

    pub fn images(&self) -> &LazyFrame {
        &self.images
    }
}

/// Source of point-in-time listing snapshots.
pub trait ListingStore: Send + Sync {
    fn snapshot(&self) -> Result<Snapshot>;
}

impl ListingStore for ListingSnapshotData {
    fn snapshot(&self) -> Result<Snapshot> {
        Ok(Snapshot::new(self.listings()?.clone(), self.images()?.clone()))
    }
}
