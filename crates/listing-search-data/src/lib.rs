//! Read-only listing snapshot for the listing search engine.
//!
//! The listing-management side of the marketplace owns the data; this crate only
//! reads what it exports. A snapshot is two tables:
//!
//! - `listings`: one row per listing, already joined with its product, category
//!   and farmer profile (see [`schema::listing`]).
//! - `listing_images`: image URLs per listing with an explicit sort order
//!   (see [`schema::image`]).
//!
//! Both tables are loaded from Parquet or CSV files in a data directory, or
//! handed over as in-memory frames, and exposed as polars [`LazyFrame`]s.
//!
//! [`LazyFrame`]: polars::prelude::LazyFrame
use once_cell::sync::Lazy;
use std::path::PathBuf;
#[cfg(test)]
use tracing::warn;

pub mod schema;
pub mod snapshot;
pub mod test_data;

#[cfg(test)]
static TEST_DATA_DIR: Lazy<tempfile::TempDir> = Lazy::new(|| {
    tempfile::TempDir::new().expect("Failed to create global temporary test data directory")
});

pub const DATA_DIR_DEFAULT: &str = "./listing_data";

/// Global data directory path.
///
/// Unit tests of this crate get a throwaway temporary directory; everything else
/// reads `DATA_DIR` and falls back to [`DATA_DIR_DEFAULT`].
pub static DATA_DIR: Lazy<PathBuf> = Lazy::new(data_dir);

#[cfg(test)]
fn data_dir() -> PathBuf {
    let temp_dir = TEST_DATA_DIR.path().to_path_buf();
    warn!(temp_dir = ?temp_dir, "Using temporary data directory for tests");
    temp_dir
}

#[cfg(not(test))]
fn data_dir() -> PathBuf {
    std::env::var("DATA_DIR").map_or_else(|_| PathBuf::from(DATA_DIR_DEFAULT), PathBuf::from)
}

mod error {
    use polars::prelude::PolarsError;
    use thiserror::Error;

    #[derive(Error, Debug)]
    pub enum DataError {
        #[error("IO error: {0}")]
        Io(#[from] std::io::Error),
        #[error("Polars error: {0}")]
        Polars(#[from] PolarsError),
        #[error("Table '{table}' is missing required columns: {columns:?}")]
        MissingColumns {
            table: &'static str,
            columns: Vec<String>,
        },
        #[error("Required data files not found in {0}")]
        RequiredFilesNotFound(String),
    }

    pub type Result<T> = std::result::Result<T, DataError>;
}

pub use error::{DataError, Result};

pub use snapshot::ListingSnapshotData;
pub use test_data::{SampleDataConfig, create_sample_data, write_sample_data};

#[cfg(test)]
pub(crate) mod tests_utils {
    use polars::prelude::*;

    pub fn assert_has_columns(df: &DataFrame, expected_columns: &[&str]) {
        let actual_columns: Vec<_> = df.get_column_names().iter().map(|s| s.as_str()).collect();
        for expected_col in expected_columns {
            assert!(
                actual_columns.contains(expected_col),
                "Missing column: {}. Available columns: {:?}",
                expected_col,
                actual_columns
            );
        }
    }

    pub fn assert_column_type(df: &DataFrame, column: &str, expected_type: &DataType) {
        let actual_type = df
            .column(column)
            .unwrap_or_else(|_| panic!("Column '{}' not found", column))
            .dtype();
        assert_eq!(
            actual_type, expected_type,
            "Column '{}' has wrong type. Expected: {:?}, Got: {:?}",
            column, expected_type, actual_type
        );
    }

    pub fn assert_no_nulls_in_column(df: &DataFrame, column: &str) {
        let null_count = df
            .column(column)
            .unwrap_or_else(|_| panic!("Column '{}' not found", column))
            .null_count();
        assert_eq!(
            null_count, 0,
            "Column '{}' contains {} null values",
            column, null_count
        );
    }
}
