//! Errors raised while loading, reshaping and rendering the stunting trend.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StuntingError {
    /// The csv is missing, unreadable, or holds a malformed value in a kept row.
    #[error("could not load data from {}: {source}", .path.display())]
    DataLoad {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("{} is missing required column(s): {}", .path.display(), .missing.join(", "))]
    Schema { path: PathBuf, missing: Vec<String> },

    /// More than one rate for the same year and category under `DuplicatePolicy::Reject`.
    #[error("cannot pivot: {count} rates for year {year}, category '{category}'")]
    Reshape {
        year: i32,
        category: String,
        count: usize,
    },

    #[error("cannot render: {0}")]
    Render(String),

    #[error("could not write {}: {reason}", .path.display())]
    Write { path: PathBuf, reason: String },
}

impl StuntingError {
    pub fn missing_columns(columns: &[&str]) -> StuntingError {
        StuntingError::Render(format!("missing column(s) {}", columns.join(", ")))
    }
}
