//! Integration tests for TeeTimeFetcher using wiremock
//!
//! These tests validate the HTTP fetcher's retry behavior and its
//! handling of the upstream's benign "no availability" responses.

use std::time::Duration;

use fairway::harvest::TeeTimeFetcher;
use fairway::utils::error::FetchError;
use fairway::utils::retry::RetryConfig;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_retry(max_retries: u32) -> RetryConfig {
    RetryConfig::with_delays(max_retries, 1, 2)
}

fn fetcher_for(server: &MockServer, max_retries: u32) -> TeeTimeFetcher {
    TeeTimeFetcher::with_base_url(&server.uri(), Duration::from_secs(5), fast_retry(max_retries))
        .unwrap()
        .without_jitter()
}

/// A successful availability array comes back as raw entries
#[tokio::test]
async fn test_fetch_availability_array() {
    let mock_server = MockServer::start().await;

    let body = serde_json::json!([
        {"id": 1, "start_time": "07:00", "out_of_capacity": false},
        {"id": 2, "start_time": "07:10", "out_of_capacity": false}
    ]);

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&body))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server, 2);
    let entries = fetcher
        .fetch_availability("/marketplace/clubs/55/teetimes?date=2025-06-01", 55)
        .await
        .unwrap();

    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["start_time"], "07:00");
}

/// The explicit no-availability object is an empty success, not an error
#[tokio::test]
async fn test_no_teetimes_object_is_empty_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messageKey": "NO_TEETIMES"
        })))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server, 2);
    let entries = fetcher
        .fetch_availability("/marketplace/clubs/55/teetimes?date=2025-06-01", 55)
        .await
        .unwrap();

    assert!(entries.is_empty());
}

/// An error body mentioning the booking range is an empty success without retries
#[tokio::test]
async fn test_out_of_booking_range_is_empty_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(
            ResponseTemplate::new(422)
                .set_body_string(r#"{"error": "This date is out of your booking range"}"#),
        )
        .expect(1)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server, 3);
    let entries = fetcher
        .fetch_availability("/marketplace/clubs/55/teetimes?date=2026-06-01", 55)
        .await
        .unwrap();

    assert!(entries.is_empty());
}

/// Server errors are retried until one attempt succeeds
#[tokio::test]
async fn test_server_error_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream hiccup"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 1, "start_time": "08:00"}
        ])))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server, 2);
    let entries = fetcher
        .fetch_availability("/marketplace/clubs/55/teetimes?date=2025-06-01", 55)
        .await
        .unwrap();

    assert_eq!(entries.len(), 1);
}

/// Exhausted retries surface as MaxRetriesExceeded with the request URL
#[tokio::test]
async fn test_retries_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(500).set_body_string("still down"))
        .expect(2)
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server, 2);
    let err = fetcher
        .fetch_availability("/marketplace/clubs/55/teetimes?date=2025-06-01", 55)
        .await
        .unwrap_err();

    match err {
        FetchError::MaxRetriesExceeded { attempts, url, .. } => {
            assert_eq!(attempts, 2);
            assert!(url.contains("/marketplace/clubs/55/teetimes"));
        }
        other => panic!("Expected MaxRetriesExceeded, got {other:?}"),
    }
}

/// A 404 whose body does not mention the booking range is a real error
#[tokio::test]
async fn test_not_found_is_an_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .mount(&mock_server)
        .await;

    let fetcher = fetcher_for(&mock_server, 2);
    let result = fetcher
        .fetch_availability("/marketplace/clubs/55/teetimes?date=2025-06-01", 55)
        .await;

    assert!(result.is_err());
}
