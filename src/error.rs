//! Error types.
//!
//! Configuration and validation errors ([`ReleaseError`], [`AnnotationError::UnknownSection`], [`AnnotationError::InvalidChunkSize`]) are returned to the caller.
//! Per-item errors ([`AnnotationError::UnsupportedVariant`], [`AnnotationError::Cancelled`], adaptor failures) are recovered inside the aggregator.

use std::path::PathBuf;

use thiserror::Error;

//-----------------------------------------------------------------------------

/// Errors from the SQLite-backed document store.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Database {0} already exists")]
    AlreadyExists(PathBuf),

    #[error("Unsupported database version: {found} (expected {expected})")]
    Version { found: String, expected: String },

    #[error("Key not found: {0}")]
    MissingKey(String),

    #[error("Invalid value for key {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Errors from resolving or modifying data releases.
#[derive(Error, Debug)]
pub enum ReleaseError {
    #[error("Unknown database {name}. The available databases are: {available:?}")]
    UnknownDatabase { name: String, available: Vec<String> },

    #[error("Invalid release {release} for database {database}. The available data releases are: {valid:?}")]
    InvalidRelease { database: String, release: usize, valid: Vec<usize> },

    #[error("Invalid data '{data}', it's not present in release {release} of database {database}. The available data are: {available:?}")]
    InvalidData { database: String, release: usize, data: String, available: Vec<String> },

    #[error("Database {0} has no default release")]
    NoDefaultRelease(String),

    #[error("Release {release} of database {database} has no data; no new release created")]
    EmptyRelease { database: String, release: usize },

    #[error("Release {release} of database {database} is sealed; only the latest release can be modified before it becomes the default")]
    SealedRelease { database: String, release: usize },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors from annotating variants.
#[derive(Error, Debug)]
pub enum AnnotationError {
    #[error(transparent)]
    Release(#[from] ReleaseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Unknown annotation section {name}. The valid sections are: {valid:?}")]
    UnknownSection { name: String, valid: Vec<&'static str> },

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("Unsupported variant: {0}")]
    UnsupportedVariant(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<rusqlite::Error> for AnnotationError {
    fn from(error: rusqlite::Error) -> Self {
        AnnotationError::Store(StoreError::Sqlite(error))
    }
}

impl From<rusqlite::Error> for ReleaseError {
    fn from(error: rusqlite::Error) -> Self {
        ReleaseError::Store(StoreError::Sqlite(error))
    }
}

impl From<serde_json::Error> for AnnotationError {
    fn from(error: serde_json::Error) -> Self {
        AnnotationError::Store(StoreError::Json(error))
    }
}

//-----------------------------------------------------------------------------
