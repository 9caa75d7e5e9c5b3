//! End-to-end harvest pipeline tests against a mock upstream
//!
//! These drive the full Harvester (catalog -> tasks -> fan-out fetch ->
//! merge -> batch -> sink) with wiremock standing in for the Chronogolf
//! widget API and an in-memory sink capturing the upserts.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use fairway::catalog::StaticCatalog;
use fairway::config::Config;
use fairway::harvest::{Harvester, TeeTimeFetcher};
use fairway::models::{Course, SearchTask};
use fairway::storage::MemorySink;
use fairway::utils::retry::RetryConfig;
use wiremock::matchers::{method, path};
use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

/// Matches the per-player-count sub-query by counting how many times the
/// affiliation id is repeated in the query string
struct PlayerCount(usize);

impl Match for PlayerCount {
    fn matches(&self, request: &Request) -> bool {
        request
            .url
            .query()
            .map_or(false, |q| q.matches("affiliation_type_ids").count() == self.0)
    }
}

fn test_course() -> Course {
    serde_json::from_value(serde_json::json!({
        "id": 7,
        "name": "Langara",
        "external_api": "CHRONO_LIGHTSPEED",
        "external_api_attributes": {
            "club_id": 55,
            "course_id": 12,
            "affiliation_type_id": 88,
            "club_link_name": "langara",
            "course_holes": [18]
        },
        "booking_visibility_days": 0,
        "timezone": "America/Vancouver"
    }))
    .unwrap()
}

fn availability(fee_count: usize, price: f64) -> serde_json::Value {
    let fees: Vec<_> = (0..fee_count)
        .map(|_| serde_json::json!({"green_fee": price}))
        .collect();
    serde_json::json!([{
        "id": 9001,
        "date": "2025-06-01",
        "start_time": "14:00",
        "green_fees": fees,
        "out_of_capacity": false,
        "restrictions": []
    }])
}

async fn mount_player_count(server: &MockServer, players: usize, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .and(PlayerCount(players))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

fn fast_config() -> Config {
    let mut config = Config::default();
    config.harvest.min_retry_delay_ms = 1;
    config.harvest.max_retry_delay_ms = 2;
    config
}

fn fetcher_for(server: &MockServer) -> Arc<TeeTimeFetcher> {
    Arc::new(
        TeeTimeFetcher::with_base_url(
            &server.uri(),
            Duration::from_secs(5),
            RetryConfig::with_delays(2, 1, 2),
        )
        .unwrap()
        .without_jitter(),
    )
}

fn single_task(course: Course) -> Vec<SearchTask> {
    vec![SearchTask {
        course: Arc::new(course),
        date: NaiveDate::from_ymd_opt(2025, 6, 1).unwrap(),
    }]
}

/// Four overlapping sub-query views collapse into one canonical record
#[tokio::test]
async fn test_full_harvest_merges_player_counts() {
    let mock_server = MockServer::start().await;

    mount_player_count(&mock_server, 4, availability(4, 45.0)).await;
    mount_player_count(&mock_server, 3, availability(3, 30.0)).await;
    mount_player_count(&mock_server, 2, availability(2, 20.0)).await;
    mount_player_count(&mock_server, 1, availability(1, 10.0)).await;

    let sink = Arc::new(MemorySink::new());
    let harvester = Harvester::new(
        fast_config(),
        Arc::new(StaticCatalog::new(Vec::new())),
        Arc::clone(&sink) as Arc<dyn fairway::storage::TeeTimeSink>,
    );

    let outcome = harvester
        .run_with_fetcher(fetcher_for(&mock_server), single_task(test_course()))
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.total_tee_times, 1);
    assert_eq!(outcome.fetch_errors, 0);

    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let row = sink.get(7, date).expect("row persisted for course 7");
    assert_eq!(row.tee_times_count, 1);

    let slot = &row.tee_times_data[0];
    assert_eq!(slot["players_available"], 4);
    assert_eq!(slot["available_participants"], serde_json::json!([1, 2, 3, 4]));
    assert_eq!(slot["price"], 45.0);
    assert_eq!(slot["start_datetime"], "2025-06-01T14:00");
    assert_eq!(slot["tee_time_id"], "7202506011400-18");
}

/// A run that finds nothing anywhere fails with the zero-results verdict
#[tokio::test]
async fn test_empty_run_is_fatal() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "messageKey": "NO_TEETIMES"
        })))
        .mount(&mock_server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let harvester = Harvester::new(
        fast_config(),
        Arc::new(StaticCatalog::new(Vec::new())),
        Arc::clone(&sink) as Arc<dyn fairway::storage::TeeTimeSink>,
    );

    let err = harvester
        .run_with_fetcher(fetcher_for(&mock_server), single_task(test_course()))
        .await
        .unwrap_err();

    assert!(matches!(err, fairway::error::Error::NoTeeTimes));
    assert!(sink.is_empty());
}

/// One failing sub-query degrades the result instead of dropping the task
#[tokio::test]
async fn test_failed_subquery_keeps_degraded_data() {
    let mock_server = MockServer::start().await;

    mount_player_count(&mock_server, 4, availability(4, 45.0)).await;
    mount_player_count(&mock_server, 2, availability(2, 20.0)).await;
    mount_player_count(&mock_server, 1, availability(1, 10.0)).await;

    // The 3-player view stays broken through every retry
    Mock::given(method("GET"))
        .and(path("/marketplace/clubs/55/teetimes"))
        .and(PlayerCount(3))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&mock_server)
        .await;

    let sink = Arc::new(MemorySink::new());
    let harvester = Harvester::new(
        fast_config(),
        Arc::new(StaticCatalog::new(Vec::new())),
        Arc::clone(&sink) as Arc<dyn fairway::storage::TeeTimeSink>,
    );

    let outcome = harvester
        .run_with_fetcher(fetcher_for(&mock_server), single_task(test_course()))
        .await
        .unwrap();

    // Degraded data persisted, error surfaced in the outcome
    assert!(!outcome.success);
    assert_eq!(outcome.fetch_errors, 1);
    assert_eq!(outcome.total_tee_times, 1);

    let date = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
    let row = sink.get(7, date).expect("degraded row persisted");
    let slot = &row.tee_times_data[0];
    assert_eq!(slot["available_participants"], serde_json::json!([1, 2, 4]));
}
