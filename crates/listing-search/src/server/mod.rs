//! HTTP surface over [`ListingSearcher`].
//!
//! Query execution is CPU-bound, so every engine call runs on tokio's blocking pool.
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use serde_json::json;
use tracing::{error, warn};
use uuid::Uuid;

use crate::{
    ListingSearcher,
    error::ListingSearchError,
    filter::{RawSearchParams, ValidationErrors},
    geo::{
        RawBboxParams, RawMapSearchParams, RawRadiusParams, feature_collection,
        map_feature_collection,
    },
    search::SearchError,
};

/// Failure of one request, as answered to the client.
#[derive(Debug)]
pub enum ApiError {
    Validation(ValidationErrors),
    NotFound,
    Internal,
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<ListingSearchError> for ApiError {
    fn from(err: ListingSearchError) -> Self {
        match err {
            ListingSearchError::SearchError(SearchError::Validation(errors)) => {
                Self::Validation(errors)
            }
            other => {
                error!(error = %other, "Listing search failed");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": "listing not found" })),
            )
                .into_response(),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "internal error" })),
            )
                .into_response(),
        }
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn blocking<T, F>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> crate::error::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!(error = %e, "Search task did not complete");
            ApiError::Internal
        })?
        .map_err(ApiError::from)
}

/// Router exposing the search, by-id and map endpoints.
pub fn router(searcher: ListingSearcher) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/search/listings", get(search_listings))
        .route("/api/listings/bbox", get(listings_in_bbox))
        .route("/api/listings/bbox.geojson", get(listings_in_bbox_geojson))
        .route("/api/listings/radius", get(listings_in_radius))
        .route("/api/listings/map", get(map_search))
        .route("/api/listings/map.geojson", get(map_search_geojson))
        .route("/api/listings/:id/summary", get(listing_summary))
        .route("/api/listings/:id", get(listing_detail))
        .with_state(searcher)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn search_listings(
    State(searcher): State<ListingSearcher>,
    Query(params): Query<RawSearchParams>,
) -> ApiResult<crate::Page<crate::ListingCard>> {
    let page = blocking(move || searcher.search_raw(&params)).await?;
    Ok(Json(page))
}

async fn listings_in_bbox(
    State(searcher): State<ListingSearcher>,
    Query(params): Query<RawBboxParams>,
) -> ApiResult<Vec<crate::GeometryPoint>> {
    let query = params.validate(searcher.config())?;
    let points = blocking(move || searcher.within_bbox(&query)).await?;
    Ok(Json(points))
}

async fn listings_in_bbox_geojson(
    State(searcher): State<ListingSearcher>,
    Query(params): Query<RawBboxParams>,
) -> ApiResult<serde_json::Value> {
    let query = params.validate(searcher.config())?;
    let points = blocking(move || searcher.within_bbox(&query)).await?;
    Ok(Json(feature_collection(&points)))
}

async fn listings_in_radius(
    State(searcher): State<ListingSearcher>,
    Query(params): Query<RawRadiusParams>,
) -> ApiResult<Vec<crate::GeometryPoint>> {
    let query = params.validate(searcher.config())?;
    let points = blocking(move || searcher.within_radius(&query)).await?;
    Ok(Json(points))
}

async fn map_search(
    State(searcher): State<ListingSearcher>,
    Query(params): Query<RawMapSearchParams>,
) -> ApiResult<Vec<crate::MapListing>> {
    let query = params.validate(searcher.config())?;
    let rows = blocking(move || searcher.map_search(&query)).await?;
    Ok(Json(rows))
}

async fn map_search_geojson(
    State(searcher): State<ListingSearcher>,
    Query(params): Query<RawMapSearchParams>,
) -> ApiResult<serde_json::Value> {
    let query = params.validate(searcher.config())?;
    let rows = blocking(move || searcher.map_search(&query)).await?;
    Ok(Json(map_feature_collection(&rows)))
}

/// Canonical form of a path id; anything that is not a UUID cannot exist.
fn listing_id(raw: &str) -> Result<String, ApiError> {
    Uuid::parse_str(raw).map(|id| id.to_string()).map_err(|_| {
        warn!(id = raw, "Malformed listing id");
        ApiError::NotFound
    })
}

async fn listing_summary(
    State(searcher): State<ListingSearcher>,
    Path(id): Path<String>,
) -> ApiResult<crate::ListingSummary> {
    let id = listing_id(&id)?;
    blocking(move || searcher.find_summary(&id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}

async fn listing_detail(
    State(searcher): State<ListingSearcher>,
    Path(id): Path<String>,
) -> ApiResult<crate::ListingDetail> {
    let id = listing_id(&id)?;
    blocking(move || searcher.find_detail(&id))
        .await?
        .map(Json)
        .ok_or(ApiError::NotFound)
}
