use thiserror::Error;

#[derive(Error, Debug)]
pub enum ListingSearchError {
    #[error("Search error: {0}")]
    SearchError(#[from] crate::search::SearchError),
    #[error("Data error: {0}")]
    DataError(#[from] listing_search_data::DataError),
    #[error("DataFrame error: {0}")]
    DataFrame(#[from] polars::prelude::PolarsError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Init Logging error: {0}")]
    InitLoggingError(#[from] tracing_subscriber::filter::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, ListingSearchError>;
