//! Error types for catalog parsing and loading

use std::path::PathBuf;
use thiserror::Error;

/// Why a single catalog line was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("no '(' year marker in name field")]
    MissingYear,

    #[error("year '{0}' is not a 4-digit number")]
    InvalidYear(String),

    #[error("expected a tab-separated location field")]
    MissingFields,

    #[error("empty location field")]
    EmptyLocation,

    #[error("empty title")]
    EmptyName,
}

/// Dataset-level failures
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("source file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("missing column '{0}' in dataset header")]
    MissingColumn(&'static str),
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, CatalogError>;
