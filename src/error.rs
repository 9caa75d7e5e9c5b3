//! Unified error handling for the fairway crate
//!
//! Per-task and per-batch failures are recovered locally and surface only
//! as counters in the run outcome. The variants here cover the failures
//! that do cross module boundaries: catalog/config problems that abort a
//! run before scheduling, and the zero-results condition that fails a run
//! after processing completes.

use thiserror::Error;

pub use crate::utils::error::FetchError;

/// Unified error type for the fairway crate
#[derive(Error, Debug)]
pub enum Error {
    /// Fetch-layer errors
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Course catalog could not be loaded, or was empty
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Configuration errors (missing credentials, invalid values)
    #[error("Config error: {0}")]
    Config(String),

    /// Sink rejected a write
    #[error("Sink error: {0}")]
    Sink(String),

    /// The entire run produced zero tee times — systemic upstream or
    /// configuration failure, fatal even when individual fetches succeeded
    #[error("No tee times found for any course/date combination")]
    NoTeeTimes,

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a catalog error
    pub fn catalog(msg: impl Into<String>) -> Self {
        Self::Catalog(msg.into())
    }

    /// Create a sink error
    pub fn sink(msg: impl Into<String>) -> Self {
        Self::Sink(msg.into())
    }

    /// True when the error aborts a run before any task is scheduled
    pub fn is_fatal_before_run(&self) -> bool {
        matches!(self, Self::Catalog(_) | Self::Config(_))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}

/// Result type alias using the unified Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(Error::config("missing key").is_fatal_before_run());
        assert!(Error::catalog("no courses").is_fatal_before_run());
        assert!(!Error::NoTeeTimes.is_fatal_before_run());
        assert!(!Error::Sink("write failed".into()).is_fatal_before_run());
    }

    #[test]
    fn test_fetch_error_conversion() {
        let fetch = FetchError::Timeout;
        let unified: Error = fetch.into();
        assert!(matches!(unified, Error::Fetch(_)));
    }

    #[test]
    fn test_display_no_tee_times() {
        let msg = Error::NoTeeTimes.to_string();
        assert!(msg.contains("No tee times"));
    }
}
