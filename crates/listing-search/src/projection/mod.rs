//! Output shapes built from listing rows.
//!
//! Every shape is derived from the same `listings` row; images come from the
//! separate `listing_images` table, ordered by their explicit sort order.
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use itertools::izip;
use polars::prelude::*;

use crate::search::{Result, SearchError};
use listing_search_data::schema::{image, listing};

fn required<T>(value: Option<T>, column: &str) -> Result<T> {
    value.ok_or_else(|| SearchError::Schema(format!("null value in required column '{column}'")))
}

/// List item and map marker of a search result.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ListingCard {
    pub id: String,
    pub farmer_id: Option<String>,
    pub title: String,
    pub price_cents: i64,
    pub currency: String,
    pub lon: f64,
    pub lat: f64,
    pub product_name: String,
    pub category_name: Option<String>,
    /// First image by sort order
    pub thumbnail_url: Option<String>,
    pub description: Option<String>,
    pub farmer_name: Option<String>,
}

impl ListingCard {
    pub fn field_names() -> Vec<&'static str> {
        vec![
            listing::ID,
            listing::FARMER_ID,
            listing::TITLE,
            listing::PRICE_CENTS,
            listing::CURRENCY,
            listing::LON,
            listing::LAT,
            listing::PRODUCT_NAME,
            listing::CATEGORY_NAME,
            listing::DESCRIPTION,
            listing::FARMER_NAME,
        ]
    }

    /// Cards without thumbnails; see [`ImageIndex::attach_thumbnails`].
    pub fn from_df(df: &DataFrame) -> Result<Vec<Self>> {
        let cols = df.select(Self::field_names())?.take_columns();

        izip!(
            cols[0].str()?,
            cols[1].str()?,
            cols[2].str()?,
            cols[3].i64()?,
            cols[4].str()?,
            cols[5].f64()?,
            cols[6].f64()?,
        )
        .zip(izip!(
            cols[7].str()?,
            cols[8].str()?,
            cols[9].str()?,
            cols[10].str()?,
        ))
        .map(
            |(
                (id, farmer_id, title, price_cents, currency, lon, lat),
                (product_name, category_name, description, farmer_name),
            )| {
                Ok(Self {
                    id: required(id, listing::ID)?.to_string(),
                    farmer_id: farmer_id.map(ToString::to_string),
                    title: required(title, listing::TITLE)?.to_string(),
                    price_cents: required(price_cents, listing::PRICE_CENTS)?,
                    currency: required(currency, listing::CURRENCY)?.to_string(),
                    lon: required(lon, listing::LON)?,
                    lat: required(lat, listing::LAT)?,
                    product_name: required(product_name, listing::PRODUCT_NAME)?.to_string(),
                    category_name: category_name.map(ToString::to_string),
                    thumbnail_url: None,
                    description: description.map(ToString::to_string),
                    farmer_name: farmer_name.map(ToString::to_string),
                })
            },
        )
        .collect()
    }
}

/// Minimal shape for panning the map to a listing or opening its popup.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ListingSummary {
    pub id: String,
    pub farmer_id: Option<String>,
    pub title: String,
    pub lon: f64,
    pub lat: f64,
    pub price_cents: i64,
    pub currency: String,
}

impl From<&ListingCard> for ListingSummary {
    fn from(card: &ListingCard) -> Self {
        Self {
            id: card.id.clone(),
            farmer_id: card.farmer_id.clone(),
            title: card.title.clone(),
            lon: card.lon,
            lat: card.lat,
            price_cents: card.price_cents,
            currency: card.currency.clone(),
        }
    }
}

/// Full listing with every image.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct ListingDetail {
    #[cfg_attr(feature = "serde", serde(flatten))]
    pub card: ListingCard,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub available: bool,
    pub created_at: DateTime<Utc>,
    /// In sort order, possibly empty
    pub image_urls: Vec<String>,
}

impl ListingDetail {
    pub fn from_df(df: &DataFrame, images: &ImageIndex) -> Result<Vec<Self>> {
        let mut cards = ListingCard::from_df(df)?;
        images.attach_thumbnails(&mut cards);

        let cols = df
            .select([
                listing::QUANTITY,
                listing::UNIT,
                listing::AVAILABLE,
                listing::CREATED_AT,
            ])?
            .take_columns();

        izip!(
            cards,
            cols[0].f64()?,
            cols[1].str()?,
            cols[2].bool()?,
            cols[3].i64()?,
        )
        .map(|(card, quantity, unit, available, created_at)| {
            let millis = required(created_at, listing::CREATED_AT)?;
            let created_at = DateTime::from_timestamp_millis(millis).ok_or_else(|| {
                SearchError::Schema(format!("created_at out of range: {millis}"))
            })?;
            Ok(Self {
                image_urls: images.urls(&card.id).to_vec(),
                card,
                quantity,
                unit: unit.map(ToString::to_string),
                available: required(available, listing::AVAILABLE)?,
                created_at,
            })
        })
        .collect()
    }
}

/// Minimal marker for the map fast path.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryPoint {
    pub id: String,
    pub title: String,
    pub product_name: String,
    pub price_cents: i64,
    pub currency: String,
    pub lon: f64,
    pub lat: f64,
    pub farmer_name: Option<String>,
}

impl GeometryPoint {
    pub fn field_names() -> Vec<&'static str> {
        vec![
            listing::ID,
            listing::TITLE,
            listing::PRODUCT_NAME,
            listing::PRICE_CENTS,
            listing::CURRENCY,
            listing::LON,
            listing::LAT,
            listing::FARMER_NAME,
        ]
    }

    pub fn from_df(df: &DataFrame) -> Result<Vec<Self>> {
        let cols = df.select(Self::field_names())?.take_columns();

        izip!(
            cols[0].str()?,
            cols[1].str()?,
            cols[2].str()?,
            cols[3].i64()?,
            cols[4].str()?,
            cols[5].f64()?,
            cols[6].f64()?,
            cols[7].str()?,
        )
        .map(
            |(id, title, product_name, price_cents, currency, lon, lat, farmer_name)| {
                Ok(Self {
                    id: required(id, listing::ID)?.to_string(),
                    title: required(title, listing::TITLE)?.to_string(),
                    product_name: required(product_name, listing::PRODUCT_NAME)?.to_string(),
                    price_cents: required(price_cents, listing::PRICE_CENTS)?,
                    currency: required(currency, listing::CURRENCY)?.to_string(),
                    lon: required(lon, listing::LON)?,
                    lat: required(lat, listing::LAT)?,
                    farmer_name: farmer_name.map(ToString::to_string),
                })
            },
        )
        .collect()
    }
}

/// Map search row: the marker plus what its popup shows.
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize),
    serde(rename_all = "camelCase")
)]
#[derive(Debug, Clone, PartialEq)]
pub struct MapListing {
    pub id: String,
    pub title: String,
    pub product_name: String,
    pub category_name: Option<String>,
    pub farmer_name: Option<String>,
    pub lon: f64,
    pub lat: f64,
    pub price_cents: i64,
    pub currency: String,
    pub quantity: Option<f64>,
    pub unit: Option<String>,
    pub available: bool,
    /// First image by sort order
    pub image_url: Option<String>,
}

impl MapListing {
    pub fn field_names() -> Vec<&'static str> {
        vec![
            listing::ID,
            listing::TITLE,
            listing::PRODUCT_NAME,
            listing::CATEGORY_NAME,
            listing::FARMER_NAME,
            listing::LON,
            listing::LAT,
            listing::PRICE_CENTS,
            listing::CURRENCY,
            listing::QUANTITY,
            listing::UNIT,
            listing::AVAILABLE,
        ]
    }

    /// Rows without images; see [`ImageIndex::attach_map_images`].
    pub fn from_df(df: &DataFrame) -> Result<Vec<Self>> {
        let cols = df.select(Self::field_names())?.take_columns();

        izip!(
            cols[0].str()?,
            cols[1].str()?,
            cols[2].str()?,
            cols[3].str()?,
            cols[4].str()?,
            cols[5].f64()?,
            cols[6].f64()?,
        )
        .zip(izip!(
            cols[7].i64()?,
            cols[8].str()?,
            cols[9].f64()?,
            cols[10].str()?,
            cols[11].bool()?,
        ))
        .map(
            |(
                (id, title, product_name, category_name, farmer_name, lon, lat),
                (price_cents, currency, quantity, unit, available),
            )| {
                Ok(Self {
                    id: required(id, listing::ID)?.to_string(),
                    title: required(title, listing::TITLE)?.to_string(),
                    product_name: required(product_name, listing::PRODUCT_NAME)?.to_string(),
                    category_name: category_name.map(ToString::to_string),
                    farmer_name: farmer_name.map(ToString::to_string),
                    lon: required(lon, listing::LON)?,
                    lat: required(lat, listing::LAT)?,
                    price_cents: required(price_cents, listing::PRICE_CENTS)?,
                    currency: required(currency, listing::CURRENCY)?.to_string(),
                    quantity,
                    unit: unit.map(ToString::to_string),
                    available: required(available, listing::AVAILABLE)?,
                    image_url: None,
                })
            },
        )
        .collect()
    }
}

/// One page of results and the total under the same filter.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub size: usize,
    pub total: usize,
}

impl<T> Page<T> {
    pub fn empty(page: usize, size: usize) -> Self {
        Self {
            items: Vec::new(),
            page,
            size,
            total: 0,
        }
    }
}

/// Image URLs per listing id, each list in sort order.
#[derive(Debug, Clone, Default)]
pub struct ImageIndex {
    by_listing: AHashMap<String, Vec<String>>,
}

impl ImageIndex {
    /// Loads the images of `listing_ids` in one pass over the images table.
    ///
    /// Ids are matched case-insensitively.
    pub fn load(images: &LazyFrame, listing_ids: &[String]) -> Result<Self> {
        if listing_ids.is_empty() {
            return Ok(Self::default());
        }
        let lowered: Vec<String> = listing_ids.iter().map(|id| id.to_lowercase()).collect();
        let ids = Series::new("ids".into(), lowered);
        let df = images
            .clone()
            .filter(
                col(image::LISTING_ID)
                    .str()
                    .to_lowercase()
                    .is_in(lit(ids).implode(), false)
                    .and(col(image::URL).is_not_null()),
            )
            .sort(
                [image::LISTING_ID, image::SORT_ORDER, image::URL],
                SortMultipleOptions::default().with_nulls_last(true),
            )
            .collect()?;

        let mut by_listing: AHashMap<String, Vec<String>> = AHashMap::new();
        for (listing_id, url) in izip!(
            df.column(image::LISTING_ID)?.str()?,
            df.column(image::URL)?.str()?,
        ) {
            if let (Some(listing_id), Some(url)) = (listing_id, url) {
                by_listing
                    .entry(listing_id.to_lowercase())
                    .or_default()
                    .push(url.to_string());
            }
        }
        Ok(Self { by_listing })
    }

    pub fn urls(&self, listing_id: &str) -> &[String] {
        self.by_listing
            .get(listing_id.to_lowercase().as_str())
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn thumbnail(&self, listing_id: &str) -> Option<&str> {
        self.urls(listing_id).first().map(String::as_str)
    }

    pub fn attach_thumbnails(&self, cards: &mut [ListingCard]) {
        for card in cards {
            card.thumbnail_url = self.thumbnail(&card.id).map(ToString::to_string);
        }
    }

    pub fn attach_map_images(&self, rows: &mut [MapListing]) {
        for row in rows {
            row.image_url = self.thumbnail(&row.id).map(ToString::to_string);
        }
    }
}
