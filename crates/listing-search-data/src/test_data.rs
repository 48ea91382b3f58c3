use chrono::{DateTime, Duration, Utc};
use polars::prelude::*;
use std::path::Path;
use tracing::info;
use uuid::Uuid;

use super::{
    Result,
    schema::{image, listing},
};

/// Configuration for sample snapshot generation
#[derive(Debug, Clone)]
pub struct SampleDataConfig {
    /// Number of listings to generate
    pub listings: usize,
    /// Images per listing; listing `i` gets `i % (images_per_listing + 1)` images
    pub images_per_listing: usize,
    /// Every n-th listing is flagged unavailable (0 disables)
    pub unavailable_every: usize,
    /// Every n-th listing has no coordinates (0 disables)
    pub unlocated_every: usize,
    /// Center of the generated points, `(lon, lat)`
    pub center: (f64, f64),
    /// Half-width of the square the points are spread over, in degrees
    pub spread_deg: f64,
    /// Creation time of the oldest listing; each next listing is one hour newer
    pub start: DateTime<Utc>,
}

impl Default for SampleDataConfig {
    fn default() -> Self {
        Self::sample()
    }
}

impl SampleDataConfig {
    /// A handful of rows for unit tests
    pub fn minimal() -> Self {
        Self {
            listings: 6,
            images_per_listing: 2,
            unavailable_every: 0,
            unlocated_every: 0,
            ..Self::sample()
        }
    }

    /// A few hundred listings around Brussels, some unavailable, some unmappable
    pub fn sample() -> Self {
        Self {
            listings: 240,
            images_per_listing: 3,
            unavailable_every: 7,
            unlocated_every: 23,
            center: (4.3517, 50.8503),
            spread_deg: 0.25,
            start: DateTime::from_timestamp(1_714_550_400, 0).unwrap_or_default(),
        }
    }
}

const PRODUCTS: [(&str, &str); 8] = [
    ("Carrot", "Vegetables"),
    ("Potato", "Vegetables"),
    ("Strawberry", "Fruit"),
    ("Apple", "Fruit"),
    ("Goat Cheese", "Dairy"),
    ("Free Range Eggs", "Eggs"),
    ("Honey", "Pantry"),
    ("Sourdough Bread", "Bakery"),
];

const CATEGORIES: [&str; 6] = ["Vegetables", "Fruit", "Dairy", "Eggs", "Pantry", "Bakery"];

const FARMS: [&str; 5] = [
    "Green Valley Farm",
    "Hoeve De Linde",
    "Ferme du Moulin",
    "Bee Happy Apiary",
    "Old Orchard",
];

const ADJECTIVES: [&str; 5] = ["Fresh", "Organic", "Seasonal", "Local", "Heirloom"];

const UNITS: [&str; 4] = ["kg", "piece", "dozen", "jar"];

/// Deterministic UUID for the n-th generated entity of a kind.
fn sample_uuid(kind: u16, n: usize) -> String {
    Uuid::from_u128((u128::from(kind) << 64) | n as u128).to_string()
}

pub fn product_id(product_index: usize) -> String {
    sample_uuid(2, product_index)
}

pub fn category_id(category: &str) -> String {
    let idx = CATEGORIES.iter().position(|c| *c == category).unwrap_or(0);
    sample_uuid(3, idx)
}

pub fn listing_id(n: usize) -> String {
    sample_uuid(1, n)
}

/// Cheap deterministic spread in [-1, 1).
fn jitter(n: usize, salt: u64) -> f64 {
    let mut x = (n as u64).wrapping_add(salt).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    x ^= x >> 31;
    x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x ^= x >> 29;
    (x % 20_000) as f64 / 10_000.0 - 1.0
}

/// Generates the `listings` and `listing_images` frames.
///
/// The output depends only on the configuration.
pub fn create_sample_data(config: &SampleDataConfig) -> Result<(DataFrame, DataFrame)> {
    info!(listings = config.listings, "Creating sample listing data");

    let n = config.listings;
    let every = |k: usize, i: usize| k != 0 && (i + 1) % k == 0;

    let mut ids = Vec::with_capacity(n);
    let mut farmer_ids = Vec::with_capacity(n);
    let mut titles = Vec::with_capacity(n);
    let mut descriptions: Vec<Option<String>> = Vec::with_capacity(n);
    let mut prices = Vec::with_capacity(n);
    let mut quantities = Vec::with_capacity(n);
    let mut units = Vec::with_capacity(n);
    let mut available = Vec::with_capacity(n);
    let mut lons: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut lats: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut product_ids = Vec::with_capacity(n);
    let mut product_names = Vec::with_capacity(n);
    let mut category_ids = Vec::with_capacity(n);
    let mut category_names = Vec::with_capacity(n);
    let mut farmer_names: Vec<Option<&str>> = Vec::with_capacity(n);
    let mut created_at = Vec::with_capacity(n);

    let mut image_listing_ids = Vec::new();
    let mut image_sort_orders = Vec::new();
    let mut image_urls = Vec::new();

    for i in 0..n {
        let product_idx = i % PRODUCTS.len();
        let (product, category) = PRODUCTS[product_idx];
        let farm_idx = (i / PRODUCTS.len()) % FARMS.len();
        let id = listing_id(i);

        titles.push(format!("{} {}", ADJECTIVES[i % ADJECTIVES.len()], product));
        descriptions.push((i % 4 != 3).then(|| format!("{product} from {}", FARMS[farm_idx])));
        prices.push(150 + ((i * 37) % 1200) as i64);
        quantities.push(1.0 + (i % 10) as f64);
        units.push(UNITS[product_idx % UNITS.len()]);
        available.push(!every(config.unavailable_every, i));
        if every(config.unlocated_every, i) {
            lons.push(None);
            lats.push(None);
        } else {
            lons.push(Some(config.center.0 + jitter(i, 11) * config.spread_deg));
            lats.push(Some(config.center.1 + jitter(i, 29) * config.spread_deg));
        }
        product_ids.push(product_id(product_idx));
        product_names.push(product);
        category_ids.push(category_id(category));
        category_names.push(category);
        farmer_ids.push(sample_uuid(4, farm_idx));
        farmer_names.push((farm_idx != FARMS.len() - 1).then_some(FARMS[farm_idx]));
        created_at.push((config.start + Duration::hours(i as i64)).timestamp_millis());

        // Sort orders are written in reverse to make ordering observable.
        let image_count = i % (config.images_per_listing + 1);
        for k in (0..image_count).rev() {
            image_listing_ids.push(id.clone());
            image_sort_orders.push(k as i64);
            image_urls.push(format!("https://img.example.org/listings/{id}/{k}.jpg"));
        }

        ids.push(id);
    }

    let listings = df![
        listing::ID => ids,
        listing::FARMER_ID => farmer_ids,
        listing::TITLE => titles,
        listing::DESCRIPTION => descriptions,
        listing::PRICE_CENTS => prices,
        listing::CURRENCY => vec!["EUR"; n],
        listing::QUANTITY => quantities,
        listing::UNIT => units,
        listing::AVAILABLE => available,
        listing::LON => lons,
        listing::LAT => lats,
        listing::PRODUCT_ID => product_ids,
        listing::PRODUCT_NAME => product_names,
        listing::CATEGORY_ID => category_ids,
        listing::CATEGORY_NAME => category_names,
        listing::FARMER_NAME => farmer_names,
        listing::CREATED_AT => created_at,
    ]?;

    let images = df![
        image::LISTING_ID => image_listing_ids,
        image::SORT_ORDER => image_sort_orders,
        image::URL => image_urls,
    ]?;

    Ok((listings, images))
}

/// Writes the sample snapshot as `listings.parquet` and `listing_images.parquet`.
pub fn write_sample_data(dir: &Path, config: &SampleDataConfig) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    let (mut listings, mut images) = create_sample_data(config)?;

    for (df, file_name) in [
        (&mut listings, "listings.parquet"),
        (&mut images, "listing_images.parquet"),
    ] {
        let path = dir.join(file_name);
        let mut file = std::fs::File::create(&path)?;
        ParquetWriter::new(&mut file).finish(df)?;
        info!(path = ?path.file_name(), rows = df.height(), "Saved to parquet file");
    }
    Ok(())
}
