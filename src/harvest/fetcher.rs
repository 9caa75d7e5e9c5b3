//! HTTP fetcher for upstream tee-time availability queries
//!
//! Wraps a single upstream GET with:
//! - a small pre-request jitter on the first attempt, to desynchronize
//!   concurrent sub-queries against the same host
//! - bounded retries with a flat randomized delay window
//! - recognition of benign "no availability" responses, which yield an
//!   empty result instead of an error

use crate::utils::error::FetchError;
use crate::utils::retry::RetryConfig;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, REFERER, USER_AGENT};
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

/// Production host for the ChronoGolf/Lightspeed marketplace API
const DEFAULT_BASE_URL: &str = "https://www.chronogolf.ca";

/// Browser-like User-Agent; the upstream rejects obvious bot agents
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
     AppleWebKit/605.1.15 (KHTML, like Gecko) Version/18.5 Safari/605.1.15";

/// Pre-request jitter window in milliseconds (first attempt only)
const JITTER_RANGE_MS: (u64, u64) = (200, 500);

/// Upstream body markers that mean "search outside the booking window" —
/// a benign empty result, never an error and never retried
const OUT_OF_RANGE_MARKERS: &[&str] = &["out of your booking range", "booking range"];

/// Object-shaped response marker meaning "no tee times for this search"
const NO_AVAILABILITY_KEY: &str = "NO_TEETIMES";

/// Upstream availability fetcher shared read-only across all workers
pub struct TeeTimeFetcher {
    /// HTTP client with configured timeout and connection reuse
    client: Client,

    /// Retry window for failed attempts
    retry: RetryConfig,

    /// Base URL, overridable for tests with mock servers
    base_url: String,

    /// First-attempt jitter; disabled in tests
    jitter: bool,
}

impl TeeTimeFetcher {
    /// Create a new fetcher talking to the production upstream
    pub fn new(timeout: Duration, retry: RetryConfig) -> Result<Self, FetchError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout, retry)
    }

    /// Create a fetcher with a custom base URL (mock servers in tests)
    pub fn with_base_url(
        base_url: &str,
        timeout: Duration,
        retry: RetryConfig,
    ) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .cookie_store(true)
            .build()?;

        Ok(Self {
            client,
            retry,
            base_url: base_url.trim_end_matches('/').to_string(),
            jitter: true,
        })
    }

    /// Disable the first-attempt jitter sleep
    pub fn without_jitter(mut self) -> Self {
        self.jitter = false;
        self
    }

    /// Fetch one availability sub-query and return the raw JSON entries
    ///
    /// `path_and_query` is the host-relative request; `club_id` feeds the
    /// referer header the upstream widget sends.
    ///
    /// Returns an empty list for the two benign conditions (out of booking
    /// range, explicit no-availability object). All other failures are
    /// retried until the window is exhausted, then surfaced as
    /// [`FetchError::MaxRetriesExceeded`] carrying the request URL.
    pub async fn fetch_availability(
        &self,
        path_and_query: &str,
        club_id: i64,
    ) -> Result<Vec<Value>, FetchError> {
        let url = format!("{}{}", self.base_url, path_and_query);
        let headers = self.build_headers(club_id);

        let mut last_error: Option<FetchError> = None;
        let attempts = self.retry.max_retries.max(1);

        for attempt in 1..=attempts {
            if attempt == 1 {
                if self.jitter {
                    let ms = rand::thread_rng().gen_range(JITTER_RANGE_MS.0..=JITTER_RANGE_MS.1);
                    tokio::time::sleep(Duration::from_millis(ms)).await;
                }
            } else {
                tokio::time::sleep(self.retry.sample_delay()).await;
            }

            match self.attempt(&url, headers.clone()).await {
                Ok(outcome) => return Ok(outcome),
                Err(e) => {
                    tracing::warn!(
                        attempt = attempt,
                        max_retries = attempts,
                        url = %url,
                        error = %e,
                        "Availability fetch failed"
                    );
                    last_error = Some(e);
                }
            }
        }

        Err(FetchError::MaxRetriesExceeded {
            attempts,
            url,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| String::from("no error details")),
        })
    }

    /// One request/response cycle
    async fn attempt(&self, url: &str, headers: HeaderMap) -> Result<Vec<Value>, FetchError> {
        let response = self
            .client
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Http(e)
                }
            })?;

        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let body: String = body.chars().take(500).collect();

            // The upstream answers a date past the course's booking window
            // with an error body; that is a benign empty result.
            if is_out_of_booking_range(&body) {
                tracing::debug!(url = %url, "Search outside booking range, zero results");
                return Ok(Vec::new());
            }

            return Err(FetchError::ServerError {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        let value: Value = response.json().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Http(e)
            }
        })?;

        match value {
            Value::Array(entries) => Ok(entries),
            Value::Object(ref obj) => {
                // An object instead of an array is only valid when it carries
                // the known no-availability marker.
                if obj
                    .get("messageKey")
                    .and_then(Value::as_str)
                    .is_some_and(|key| key == NO_AVAILABILITY_KEY)
                {
                    Ok(Vec::new())
                } else {
                    Err(FetchError::UnexpectedShape(format!(
                        "object response without {NO_AVAILABILITY_KEY} marker"
                    )))
                }
            }
            other => Err(FetchError::UnexpectedShape(format!(
                "expected JSON array, got {other}"
            ))),
        }
    }

    /// Headers the upstream booking widget sends
    fn build_headers(&self, club_id: i64) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-CA,en-US;q=0.9,en;q=0.8"),
        );

        let referer = format!(
            "https://www.chronogolf.com/en/club/{club_id}/widget?medium=widget&source=club"
        );
        if let Ok(value) = HeaderValue::from_str(&referer) {
            headers.insert(REFERER, value);
        }

        headers
    }
}

/// Match the upstream's "outside the allowed booking range" error body
fn is_out_of_booking_range(body: &str) -> bool {
    let lowered = body.to_lowercase();
    OUT_OF_RANGE_MARKERS.iter().any(|m| lowered.contains(m))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_range_detection() {
        assert!(is_out_of_booking_range(
            "{\"error\":\"This date is out of your booking range\"}"
        ));
        assert!(is_out_of_booking_range("Booking Range exceeded"));
        assert!(!is_out_of_booking_range("internal server error"));
        assert!(!is_out_of_booking_range(""));
    }

    #[test]
    fn test_fetcher_creation() {
        let fetcher = TeeTimeFetcher::new(Duration::from_secs(30), RetryConfig::default());
        assert!(fetcher.is_ok());
        assert_eq!(fetcher.unwrap().base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let fetcher = TeeTimeFetcher::with_base_url(
            "http://localhost:8080/",
            Duration::from_secs(5),
            RetryConfig::default(),
        )
        .unwrap();
        assert_eq!(fetcher.base_url, "http://localhost:8080");
    }

    #[test]
    fn test_referer_header() {
        let fetcher = TeeTimeFetcher::new(Duration::from_secs(5), RetryConfig::default()).unwrap();
        let headers = fetcher.build_headers(1234);

        let referer = headers.get(REFERER).unwrap().to_str().unwrap();
        assert!(referer.contains("/club/1234/widget"));
        assert!(headers.contains_key(USER_AGENT));
        assert_eq!(headers.get(ACCEPT).unwrap(), "application/json");
    }
}
