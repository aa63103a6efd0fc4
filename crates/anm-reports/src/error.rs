//! # Errors
//!
//! One error enum for the whole library. Parse errors on `save` inputs are
//! surfaced to the caller as-is; per-row insert failures never reach this type
//! at the public API (see [`crate::reports::SaveOutcome`]).

use std::num::ParseIntError;

use thiserror::Error;

/// Errors produced by the reporting library.
#[derive(Debug, Error)]
pub enum Error {
    /// Underlying SQLite failure (connectivity, constraint violation, ...).
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A report date that is not an ISO `YYYY-MM-DD` calendar date.
    #[error("invalid report date '{value}': {source}")]
    InvalidDate {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    /// A quantity that is not a non-negative decimal integer.
    #[error("invalid report quantity '{value}': {source}")]
    InvalidQuantity {
        value: String,
        #[source]
        source: ParseIntError,
    },

    /// A rule name with no registered implementation.
    #[error("unknown reporting rule '{0}'")]
    UnknownRule(String),

    /// Schema or stored-data inconsistency.
    #[error("schema error: {0}")]
    Schema(String),

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON payload that could not be decoded.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
