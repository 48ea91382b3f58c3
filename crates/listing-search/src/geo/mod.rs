//! Map queries: bounding-box panning, "near me" radius queries and map search.
//!
//! None of them rank. Results are the newest listings first, capped at a row limit.
//! The bbox and radius fast paths skip text, price and category filtering and
//! project [`GeometryPoint`]s; map search adds substring, category-name and
//! availability filters and projects [`MapListing`]s.
//!
//! [`GeometryPoint`]: crate::projection::GeometryPoint
//! [`MapListing`]: crate::projection::MapListing
use std::f64::consts::PI;

use crate::{
    config::EngineConfig,
    filter::{BoundingBox, ValidationErrors, non_blank, parse_optional, parse_required},
    search::{Predicate, QueryPlan, TextField, recency_order},
};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// WGS84 point, degrees.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// Great-circle distance in meters on a sphere of [`EARTH_RADIUS_METERS`].
pub fn haversine_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Largest haversine `a` term of a point within `meters` of the center.
pub fn haversine_threshold(meters: f64) -> f64 {
    let angle = meters / EARTH_RADIUS_METERS;
    if angle >= PI {
        1.0
    } else {
        (angle / 2.0).sin().powi(2)
    }
}

fn capped(requested: Option<i64>, max: usize, default: usize) -> usize {
    requested
        .and_then(|limit| usize::try_from(limit).ok())
        .filter(|limit| (1..=max).contains(limit))
        .unwrap_or(default)
}

/// Row cap actually applied: absent, non-positive or too large requests get the default.
pub fn effective_limit(requested: Option<i64>, config: &EngineConfig) -> usize {
    capped(
        requested,
        config.fast_path_max_limit,
        config.fast_path_default_limit,
    )
}

/// Row cap of a map search, same rule with its own default.
pub fn effective_map_limit(requested: Option<i64>, config: &EngineConfig) -> usize {
    capped(requested, config.fast_path_max_limit, config.map_default_limit)
}

/// Radius actually applied, in meters.
pub fn effective_radius(requested: Option<f64>, config: &EngineConfig) -> f64 {
    requested.map_or(config.default_radius_m, |m| m.max(config.min_radius_m))
}

/// Listings inside a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BboxQuery {
    pub bbox: BoundingBox,
    pub limit: usize,
}

impl BboxQuery {
    pub fn new(bbox: BoundingBox, limit: Option<i64>, config: &EngineConfig) -> Self {
        Self {
            bbox,
            limit: effective_limit(limit, config),
        }
    }

    pub fn plan(&self) -> QueryPlan {
        QueryPlan::new(
            vec![Predicate::HasLocation, Predicate::WithinBbox(self.bbox)],
            recency_order(),
        )
    }
}

/// Listings within a distance of a point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusQuery {
    pub center: GeoPoint,
    pub meters: f64,
    pub limit: usize,
}

impl RadiusQuery {
    pub fn new(
        center: GeoPoint,
        meters: Option<f64>,
        limit: Option<i64>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            center,
            meters: effective_radius(meters, config),
            limit: effective_limit(limit, config),
        }
    }

    pub fn plan(&self) -> QueryPlan {
        QueryPlan::new(
            vec![
                Predicate::HasLocation,
                Predicate::WithinRadius {
                    center: self.center,
                    meters: self.meters,
                },
            ],
            recency_order(),
        )
    }
}

/// Filtered map search: title, product or farmer substring, category name,
/// availability and an optional box.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MapSearchQuery {
    /// Trimmed, never blank
    pub text: Option<String>,
    /// Exact category display name
    pub category: Option<String>,
    /// `None` keeps available and unavailable listings
    pub available: Option<bool>,
    pub bbox: Option<BoundingBox>,
    pub limit: usize,
}

impl MapSearchQuery {
    pub fn new(limit: Option<i64>, config: &EngineConfig) -> Self {
        Self {
            limit: effective_map_limit(limit, config),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl AsRef<str>) -> Self {
        self.text = non_blank(Some(text.as_ref())).map(ToString::to_string);
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_available(mut self, available: Option<bool>) -> Self {
        self.available = available;
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    pub fn plan(&self) -> QueryPlan {
        let mut predicates = vec![Predicate::HasLocation];
        if let Some(query) = &self.text {
            predicates.push(Predicate::Contains {
                query: query.clone(),
                fields: TextField::MAP.to_vec(),
            });
        }
        if let Some(category) = &self.category {
            predicates.push(Predicate::CategoryName(category.clone()));
        }
        if let Some(available) = self.available {
            predicates.push(Predicate::Available(available));
        }
        if let Some(bbox) = self.bbox {
            predicates.push(Predicate::WithinBbox(bbox));
        }
        QueryPlan::new(predicates, recency_order())
    }
}

fn finite(
    value: Option<f64>,
    field: &'static str,
    errors: &mut ValidationErrors,
) -> Option<f64> {
    match value {
        Some(v) if !v.is_finite() => {
            errors.push(field, "must be a finite number");
            None
        }
        other => other,
    }
}

/// Bounding-box parameters as received.
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
#[derive(Debug, Clone, Default)]
pub struct RawBboxParams {
    pub min_lon: Option<String>,
    pub min_lat: Option<String>,
    pub max_lon: Option<String>,
    pub max_lat: Option<String>,
    pub limit: Option<String>,
}

impl RawBboxParams {
    pub fn validate(&self, config: &EngineConfig) -> Result<BboxQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut coordinate = |raw: &Option<String>, field| {
            let value = parse_required::<f64>(raw.as_deref(), field, "a number", &mut errors);
            finite(value, field, &mut errors)
        };

        let west = coordinate(&self.min_lon, "minLon");
        let south = coordinate(&self.min_lat, "minLat");
        let east = coordinate(&self.max_lon, "maxLon");
        let north = coordinate(&self.max_lat, "maxLat");
        let limit = parse_optional::<i64>(self.limit.as_deref(), "limit", "an integer", &mut errors);

        match (west, south, east, north) {
            (Some(w), Some(s), Some(e), Some(n)) if errors.is_empty() => Ok(BboxQuery::new(
                BoundingBox::new(w, s, e, n),
                limit,
                config,
            )),
            _ => Err(errors),
        }
    }
}

/// Radius parameters as received.
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
#[derive(Debug, Clone, Default)]
pub struct RawRadiusParams {
    pub lon: Option<String>,
    pub lat: Option<String>,
    pub meters: Option<String>,
    pub limit: Option<String>,
}

impl RawRadiusParams {
    pub fn validate(&self, config: &EngineConfig) -> Result<RadiusQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        let lon = parse_required::<f64>(self.lon.as_deref(), "lon", "a number", &mut errors)
            .filter(|lon| {
                let ok = (-180.0..=180.0).contains(lon);
                if !ok {
                    errors.push("lon", "must be within [-180, 180]");
                }
                ok
            });
        let lat = parse_required::<f64>(self.lat.as_deref(), "lat", "a number", &mut errors)
            .filter(|lat| {
                let ok = (-90.0..=90.0).contains(lat);
                if !ok {
                    errors.push("lat", "must be within [-90, 90]");
                }
                ok
            });
        let meters = parse_optional::<i64>(self.meters.as_deref(), "meters", "an integer", &mut errors);
        let limit = parse_optional::<i64>(self.limit.as_deref(), "limit", "an integer", &mut errors);

        match (lon, lat) {
            (Some(lon), Some(lat)) if errors.is_empty() => Ok(RadiusQuery::new(
                GeoPoint::new(lon, lat),
                meters.map(|m| m as f64),
                limit,
                config,
            )),
            _ => Err(errors),
        }
    }
}

/// Map search parameters as received.
#[cfg_attr(
    feature = "serde",
    derive(serde::Deserialize),
    serde(rename_all = "camelCase", default)
)]
#[derive(Debug, Clone, Default)]
pub struct RawMapSearchParams {
    pub q: Option<String>,
    pub category: Option<String>,
    pub available: Option<String>,
    pub min_lon: Option<String>,
    pub min_lat: Option<String>,
    pub max_lon: Option<String>,
    pub max_lat: Option<String>,
    pub limit: Option<String>,
}

impl RawMapSearchParams {
    /// The box applies only when all four corners are given.
    pub fn validate(&self, config: &EngineConfig) -> Result<MapSearchQuery, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut coordinate = |raw: &Option<String>, field| {
            let value = parse_optional::<f64>(raw.as_deref(), field, "a number", &mut errors);
            finite(value, field, &mut errors)
        };

        let west = coordinate(&self.min_lon, "minLon");
        let south = coordinate(&self.min_lat, "minLat");
        let east = coordinate(&self.max_lon, "maxLon");
        let north = coordinate(&self.max_lat, "maxLat");
        let limit = parse_optional::<i64>(self.limit.as_deref(), "limit", "an integer", &mut errors);

        let available = match non_blank(self.available.as_deref()) {
            None => None,
            Some(v) if v.eq_ignore_ascii_case("true") => Some(true),
            Some(v) if v.eq_ignore_ascii_case("false") => Some(false),
            Some(v) => {
                errors.push("available", format!("expected true or false, got '{v}'"));
                None
            }
        };

        let mut query = MapSearchQuery::new(limit, config).with_available(available);
        if let Some(q) = non_blank(self.q.as_deref()) {
            query = query.with_text(q);
        }
        if let Some(category) = non_blank(self.category.as_deref()) {
            query = query.with_category(category);
        }
        if let (Some(w), Some(s), Some(e), Some(n)) = (west, south, east, north) {
            query = query.with_bbox(BoundingBox::new(w, s, e, n));
        }
        errors.into_result(query)
    }
}

#[cfg(feature = "serde")]
mod geojson {
    use serde_json::{Value, json};

    use crate::projection::{GeometryPoint, MapListing};

    fn point(lon: f64, lat: f64, properties: Value) -> Value {
        json!({
            "type": "Feature",
            "geometry": {
                "type": "Point",
                "coordinates": [lon, lat],
            },
            "properties": properties,
        })
    }

    fn collection(features: Vec<Value>) -> Value {
        json!({
            "type": "FeatureCollection",
            "features": features,
        })
    }

    /// GeoJSON `FeatureCollection` of `Point` features, `[lon, lat]` coordinates.
    pub fn feature_collection(points: &[GeometryPoint]) -> Value {
        collection(
            points
                .iter()
                .map(|p| {
                    point(
                        p.lon,
                        p.lat,
                        json!({
                            "id": p.id,
                            "title": p.title,
                            "productName": p.product_name,
                            "priceCents": p.price_cents,
                            "currency": p.currency,
                            "farmerName": p.farmer_name,
                        }),
                    )
                })
                .collect(),
        )
    }

    /// Map search rows as a GeoJSON `FeatureCollection`.
    pub fn map_feature_collection(rows: &[MapListing]) -> Value {
        collection(
            rows.iter()
                .map(|r| {
                    point(
                        r.lon,
                        r.lat,
                        json!({
                            "id": r.id,
                            "title": r.title,
                            "product": r.product_name,
                            "category": r.category_name,
                            "farmer": r.farmer_name,
                            "priceCents": r.price_cents,
                            "currency": r.currency,
                            "quantity": r.quantity,
                            "unit": r.unit,
                            "available": r.available,
                            "imageUrl": r.image_url,
                        }),
                    )
                })
                .collect(),
        )
    }
}

#[cfg(feature = "serde")]
pub use geojson::{feature_collection, map_feature_collection};
