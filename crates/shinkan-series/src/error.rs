//! Series definition error types.

use thiserror::Error;

/// Errors from loading and validating series definitions.
#[derive(Debug, Error)]
pub enum SeriesError {
    /// The definitions directory does not exist.
    #[error("series definitions directory not found: {path}")]
    DirectoryNotFound {
        /// Path that was checked
        path: String,
    },

    /// No definition exists for the requested series.
    #[error("series definition not found: {series_id}")]
    NotFound {
        /// Series that was requested
        series_id: String,
    },

    /// A definition file could not be read.
    #[error("failed to load series definition from {path}: {source}")]
    LoadError {
        /// File that failed
        path: String,
        /// Underlying I/O error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// A definition file is not valid TOML.
    #[error("failed to parse series definition at {path}: {source}")]
    ParseError {
        /// File that failed
        path: String,
        /// Underlying TOML error
        source: toml::de::Error,
    },

    /// A definition fails validation.
    #[error("invalid series definition for {series_id}: {reason}")]
    ValidationError {
        /// Series the definition is for
        series_id: String,
        /// Why validation failed
        reason: String,
    },

    /// I/O error while walking the definitions directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for series operations.
pub type Result<T> = std::result::Result<T, SeriesError>;
