//! Error types for meshwd-reconcile
//!
//! Two levels:
//! - [`LookupError`]: one external call failed. Isolated to a single keyword
//!   (or a single enrichment field) and never aborts the batch on its own.
//! - [`ReconcileError`]: run-level failure surfaced to the operator.

use std::time::Duration;
use thiserror::Error;

/// Failure of a single Wikidata API or SPARQL request
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Rate limit exceeded")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Invalid entity id: {0}")]
    InvalidQid(String),
}

impl From<reqwest::Error> for LookupError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LookupError::Parse(err.to_string())
        } else {
            LookupError::Network(err.to_string())
        }
    }
}

/// Run-level error
#[derive(Debug, Error)]
pub enum ReconcileError {
    /// Empty keyword passed to the `Keyword` constructor
    #[error("Invalid keyword: {0:?}")]
    InvalidKeyword(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Candidate lookups are failing across the whole run
    #[error("Lookup service unavailable: {0}")]
    ServiceUnavailable(String),

    /// HTTP client could not be constructed
    #[error("Client setup failed: {0}")]
    Client(#[from] LookupError),
}

/// Result type for reconcile operations
pub type Result<T> = std::result::Result<T, ReconcileError>;
