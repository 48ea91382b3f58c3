//! Filtered, ranked listing search.
//!
//! Filters are composed into a [`QueryPlan`], lowered to polars expressions and
//! executed against a snapshot as a count followed by a windowed fetch.

pub use error::SearchError;
mod compose;
mod execute;
mod lower;
mod ranking;
pub mod text;

pub use compose::{Predicate, QueryPlan, TextField, compose};
pub(crate) use error::Result;
pub use execute::{count_matches, fetch_all, fetch_window};
pub use lower::{id_equals, predicate_expr};
pub use ranking::{SortKey, recency_order};

mod error {
    use thiserror::Error;

    use crate::filter::ValidationErrors;

    #[derive(Error, Debug)]
    pub enum SearchError {
        #[error("Invalid request: {0}")]
        Validation(#[from] ValidationErrors),
        #[error("Storage error: {0}")]
        Storage(#[from] polars::prelude::PolarsError),
        #[error("Unexpected snapshot layout: {0}")]
        Schema(String),
        #[error("Snapshot error: {0}")]
        Data(#[from] listing_search_data::DataError),
    }
    pub type Result<T> = std::result::Result<T, SearchError>;
}
