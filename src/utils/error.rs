//! Error types for the fetch layer
//!
//! Low-level failures a single upstream HTTP call can hit. Everything
//! above the fetcher works with the unified [`crate::error::Error`].

use thiserror::Error;

/// Errors that can occur during HTTP fetching operations
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response from the upstream
    #[error("server returned {status} for {url}: {body}")]
    ServerError {
        status: u16,
        url: String,
        /// First 500 bytes of the response body, for diagnostics
        body: String,
    },

    /// Request timeout
    #[error("request timed out")]
    Timeout,

    /// All retry attempts failed
    #[error("failed after {attempts} attempts for {url}: {last_error}")]
    MaxRetriesExceeded {
        attempts: u32,
        url: String,
        last_error: String,
    },

    /// Response body was not the expected JSON shape
    #[error("unexpected response shape: {0}")]
    UnexpectedShape(String),
}
