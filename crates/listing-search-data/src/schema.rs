//! Column layout of the snapshot tables.
use polars::prelude::*;

use super::{DataError, Result};

/// Columns of the `listings` table.
pub mod listing {
    pub const TABLE: &str = "listings";

    pub const ID: &str = "id";
    pub const FARMER_ID: &str = "farmer_id";
    pub const TITLE: &str = "title";
    pub const DESCRIPTION: &str = "description";
    pub const PRICE_CENTS: &str = "price_cents";
    pub const CURRENCY: &str = "currency";
    pub const QUANTITY: &str = "quantity";
    pub const UNIT: &str = "unit";
    pub const AVAILABLE: &str = "available";
    pub const LON: &str = "lon";
    pub const LAT: &str = "lat";
    pub const PRODUCT_ID: &str = "product_id";
    pub const PRODUCT_NAME: &str = "product_name";
    pub const CATEGORY_ID: &str = "category_id";
    pub const CATEGORY_NAME: &str = "category_name";
    pub const FARMER_NAME: &str = "farmer_name";
    /// Milliseconds since the Unix epoch, UTC.
    pub const CREATED_AT: &str = "created_at";
}

/// Columns of the `listing_images` table.
pub mod image {
    pub const TABLE: &str = "listing_images";

    pub const LISTING_ID: &str = "listing_id";
    pub const SORT_ORDER: &str = "sort_order";
    pub const URL: &str = "url";
}

pub const LISTINGS_SCHEMA: [(PlSmallStr, DataType); 17] = [
    (PlSmallStr::from_static(listing::ID), DataType::String),
    (PlSmallStr::from_static(listing::FARMER_ID), DataType::String),
    (PlSmallStr::from_static(listing::TITLE), DataType::String),
    (PlSmallStr::from_static(listing::DESCRIPTION), DataType::String),
    (PlSmallStr::from_static(listing::PRICE_CENTS), DataType::Int64),
    (PlSmallStr::from_static(listing::CURRENCY), DataType::String),
    (PlSmallStr::from_static(listing::QUANTITY), DataType::Float64),
    (PlSmallStr::from_static(listing::UNIT), DataType::String),
    (PlSmallStr::from_static(listing::AVAILABLE), DataType::Boolean),
    (PlSmallStr::from_static(listing::LON), DataType::Float64),
    (PlSmallStr::from_static(listing::LAT), DataType::Float64),
    (PlSmallStr::from_static(listing::PRODUCT_ID), DataType::String),
    (PlSmallStr::from_static(listing::PRODUCT_NAME), DataType::String),
    (PlSmallStr::from_static(listing::CATEGORY_ID), DataType::String),
    (PlSmallStr::from_static(listing::CATEGORY_NAME), DataType::String),
    (PlSmallStr::from_static(listing::FARMER_NAME), DataType::String),
    (PlSmallStr::from_static(listing::CREATED_AT), DataType::Int64),
];

pub const IMAGES_SCHEMA: [(PlSmallStr, DataType); 3] = [
    (PlSmallStr::from_static(image::LISTING_ID), DataType::String),
    (PlSmallStr::from_static(image::SORT_ORDER), DataType::Int64),
    (PlSmallStr::from_static(image::URL), DataType::String),
];

/// Fails with [`DataError::MissingColumns`] unless every column of `expected`
/// is present in `lf`. Extra columns are fine.
pub fn check_columns(
    lf: &LazyFrame,
    table: &'static str,
    expected: &[(PlSmallStr, DataType)],
) -> Result<()> {
    let schema = lf.clone().collect_schema()?;
    let present: Vec<&str> = schema.iter_names().map(PlSmallStr::as_str).collect();

    let missing: Vec<String> = expected
        .iter()
        .map(|(name, _)| name.as_str())
        .filter(|name| !present.contains(name))
        .map(str::to_owned)
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(DataError::MissingColumns {
            table,
            columns: missing,
        })
    }
}

/// Selects exactly the expected columns, cast to their snapshot types.
///
/// Callers check the columns first; the cast is non-strict so an all-null column
/// of unknown type becomes a typed null column.
pub fn conform(lf: LazyFrame, expected: &[(PlSmallStr, DataType)]) -> LazyFrame {
    lf.select(
        expected
            .iter()
            .map(|(name, dtype)| col(name.clone()).cast(dtype.clone()))
            .collect::<Vec<_>>(),
    )
}
