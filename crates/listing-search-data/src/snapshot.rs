use once_cell::sync::OnceCell;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use super::{
    DataError, Result,
    schema::{IMAGES_SCHEMA, LISTINGS_SCHEMA, check_columns, conform, image, listing},
};

const LISTINGS_PARQUET: &str = "listings.parquet";
const LISTINGS_CSV: &str = "listings.csv";
const IMAGES_PARQUET: &str = "listing_images.parquet";
const IMAGES_CSV: &str = "listing_images.csv";

#[derive(Debug, Clone)]
enum TableFile {
    Parquet(PathBuf),
    /// Header row required, columns in schema order.
    Csv(PathBuf),
    /// No file exported; the table is empty.
    Absent,
}

impl TableFile {
    fn locate(dir: &Path, parquet: &str, csv: &str) -> Self {
        let parquet_path = dir.join(parquet);
        if parquet_path.exists() {
            return Self::Parquet(parquet_path);
        }
        let csv_path = dir.join(csv);
        if csv_path.exists() {
            return Self::Csv(csv_path);
        }
        Self::Absent
    }
}

/// Point-in-time listing snapshot: the `listings` and `listing_images` tables.
///
/// File-backed snapshots load each table on first access and keep it in memory.
/// Clones taken after a table is loaded reuse the in-memory frame.
#[derive(Clone)]
pub struct ListingSnapshotData {
    listings_file: TableFile,
    images_file: TableFile,
    listings_lf: OnceCell<LazyFrame>,
    images_lf: OnceCell<LazyFrame>,
}

impl ListingSnapshotData {
    /// Snapshot from the global data directory ([`crate::DATA_DIR`]).
    pub fn new() -> Result<Self> {
        Self::from_dir(crate::DATA_DIR.as_path())
    }

    /// Snapshot from a directory holding `listings.{parquet,csv}` and optionally
    /// `listing_images.{parquet,csv}`. Parquet wins when both exist.
    #[instrument(name = "Open listing snapshot", level = "info", skip_all, fields(dir = ?dir))]
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let listings_file = TableFile::locate(dir, LISTINGS_PARQUET, LISTINGS_CSV);
        if matches!(listings_file, TableFile::Absent) {
            return Err(DataError::RequiredFilesNotFound(dir.display().to_string()));
        }

        let images_file = TableFile::locate(dir, IMAGES_PARQUET, IMAGES_CSV);
        if matches!(images_file, TableFile::Absent) {
            warn!(dir = ?dir, "No listing images exported, every listing will project without images");
        }

        Ok(Self {
            listings_file,
            images_file,
            listings_lf: OnceCell::new(),
            images_lf: OnceCell::new(),
        })
    }

    /// Snapshot over frames already in memory.
    ///
    /// Columns are checked and cast eagerly, so a malformed frame fails here rather
    /// than on the first query.
    pub fn from_frames(listings: DataFrame, images: DataFrame) -> Result<Self> {
        let listings_lf = Self::conformed(listings.lazy(), listing::TABLE, &LISTINGS_SCHEMA)?;
        let images_lf = Self::conformed(images.lazy(), image::TABLE, &IMAGES_SCHEMA)?;

        Ok(Self {
            listings_file: TableFile::Absent,
            images_file: TableFile::Absent,
            listings_lf: OnceCell::with_value(listings_lf),
            images_lf: OnceCell::with_value(images_lf),
        })
    }

    pub fn listings(&self) -> Result<&LazyFrame> {
        self.listings_lf.get_or_try_init(|| {
            Self::load(&self.listings_file, listing::TABLE, &LISTINGS_SCHEMA)
        })
    }

    pub fn images(&self) -> Result<&LazyFrame> {
        self.images_lf
            .get_or_try_init(|| Self::load(&self.images_file, image::TABLE, &IMAGES_SCHEMA))
    }

    fn conformed(
        lf: LazyFrame,
        table: &'static str,
        expected: &[(PlSmallStr, DataType)],
    ) -> Result<LazyFrame> {
        check_columns(&lf, table, expected)?;
        Ok(conform(lf, expected).collect()?.lazy())
    }

    fn load(
        file: &TableFile,
        table: &'static str,
        expected: &[(PlSmallStr, DataType)],
    ) -> Result<LazyFrame> {
        let t_load = std::time::Instant::now();
        let lf = match file {
            TableFile::Parquet(path) => {
                info!(table, path = ?path.file_name(), "Loading table into memory");
                LazyFrame::scan_parquet(path, Default::default())?
            }
            TableFile::Csv(path) => {
                info!(table, path = ?path.file_name(), "Loading table into memory");
                LazyCsvReader::new(path)
                    .with_has_header(true)
                    .with_schema(Some(Schema::from_iter(expected.iter().cloned()).into()))
                    .finish()?
            }
            TableFile::Absent => {
                return Ok(DataFrame::empty_with_schema(&Schema::from_iter(
                    expected.iter().cloned(),
                ))
                .lazy());
            }
        };

        let lf = Self::conformed(lf, table, expected)?;
        info!(table, elapsed = ?t_load.elapsed(), "Collected into memory");
        Ok(lf)
    }
}
