//! Error types for the collaborator-facing parts of the crate.
//!
//! The scoring pipeline itself never fails; these errors only surface from
//! persistence, configuration and template loading.

use thiserror::Error;

/// Errors raised while talking to storage or loading static data.
#[derive(Debug, Error)]
pub enum Error {
    /// The SQLite backend rejected a statement.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Reading or writing a file failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON document could not be encoded or decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Writing the CSV export failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// The embedded template data is missing or inconsistent.
    #[error("template data: {0}")]
    Template(String),
}

pub type Result<T> = std::result::Result<T, Error>;
