//! Error types for dnspipe.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for dnspipe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed subnet or address text
    #[error("invalid address or CIDR: {0}")]
    InvalidAddress(String),

    /// Classifier source file missing/unreadable, or remote lookup failed
    #[error("classifier source unavailable: {0}")]
    ClassifierSourceUnavailable(String),

    /// Leftover metadata sidecar from an aborted run could not be removed
    #[error("stale dataset metadata at {path}: {source}")]
    DatasetStaleState {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Underlying storage rejected dataset creation
    #[error("dataset creation failed: {0}")]
    DatasetCreationFailure(String),

    /// Write attempted on a writer that is not open
    #[error("writer is not open")]
    InvalidState,

    /// GeoIP database error
    #[error("GeoIP error: {0}")]
    GeoIp(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),
}

/// Result type alias for dnspipe operations.
pub type Result<T> = std::result::Result<T, Error>;
