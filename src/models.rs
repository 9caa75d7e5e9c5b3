// Core data structures for the fairway harvester

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Upstream booking API families
///
/// Each family has its own adapter that knows how to query the upstream
/// and parse its response shape. Unknown discriminators deserialize to
/// `Unsupported` and produce a per-task fetch error at harvest time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpstreamApi {
    #[serde(rename = "CHRONO_LIGHTSPEED")]
    ChronoLightspeed,
    #[serde(other)]
    Unsupported,
}

impl UpstreamApi {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ChronoLightspeed => "CHRONO_LIGHTSPEED",
            Self::Unsupported => "UNSUPPORTED",
        }
    }
}

impl std::fmt::Display for UpstreamApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Golf course as loaded from the catalog
///
/// Immutable for the duration of a run. `external_api_attributes` is an
/// opaque bag whose shape depends on `external_api`; it is parsed into a
/// typed struct at the adapter boundary, never accessed loosely elsewhere.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub club_name: String,
    pub external_api: UpstreamApi,
    #[serde(default)]
    pub external_api_attributes: serde_json::Value,
    /// Days ahead for which tee times are bookable (0 = today only)
    #[serde(default)]
    pub booking_visibility_days: u32,
    /// Local clock time ("HH:MM") at which the final visible day opens
    #[serde(default, deserialize_with = "empty_string_as_none")]
    pub booking_visibility_start_time: Option<String>,
    /// IANA timezone name, e.g. "America/Vancouver"
    #[serde(default)]
    pub timezone: String,
    #[serde(default)]
    pub requires_login: bool,
}

/// Treat `""` and `null` alike for optional string columns
fn empty_string_as_none<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(de)?;
    Ok(opt.filter(|s| !s.is_empty()))
}

/// One (course, date) search to run
///
/// Generated once from the course's visibility window, consumed exactly
/// once by a worker.
#[derive(Debug, Clone)]
pub struct SearchTask {
    pub course: Arc<Course>,
    pub date: NaiveDate,
}

/// Canonical merged tee time slot, the persisted unit
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CanonicalTeeTime {
    /// "YYYY-MM-DDTHH:MM" in the course's local time
    pub start_datetime: String,
    /// Capacity of the canonical (first-seen) occurrence
    pub players_available: u32,
    /// All player counts for which this slot is bookable, ascending
    pub available_participants: Vec<u32>,
    pub holes: u32,
    pub price: f64,
    /// Link for the canonical player count
    pub booking_link: String,
    /// One link per bookable player count
    pub booking_links: BTreeMap<u32, String>,
    /// Composite key: {course_id}{YYYYMMDD}{HHMM}-{holes}
    pub tee_time_id: String,
}

/// Outcome of one search task
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub course_id: i64,
    pub date: NaiveDate,
    pub tee_times: Vec<CanonicalTeeTime>,
    pub success: bool,
    pub error: Option<String>,
    /// Player-count sub-queries that exhausted retries while the task
    /// still produced (degraded) data
    pub subquery_errors: u32,
}

impl TaskResult {
    pub fn ok(course_id: i64, date: NaiveDate, tee_times: Vec<CanonicalTeeTime>) -> Self {
        Self {
            course_id,
            date,
            tee_times,
            success: true,
            error: None,
            subquery_errors: 0,
        }
    }

    pub fn failed(course_id: i64, date: NaiveDate, error: impl Into<String>) -> Self {
        Self {
            course_id,
            date,
            tee_times: Vec::new(),
            success: false,
            error: Some(error.into()),
            subquery_errors: 0,
        }
    }
}

/// Row shape written to the sink, unique on (course_id, date)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeeTimeRow {
    pub course_id: i64,
    pub date: NaiveDate,
    pub tee_times_data: serde_json::Value,
    pub tee_times_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl TeeTimeRow {
    /// Build the upsert row for a successful task result
    pub fn from_result(result: &TaskResult, updated_at: DateTime<Utc>) -> Self {
        Self {
            course_id: result.course_id,
            date: result.date,
            tee_times_data: serde_json::to_value(&result.tee_times)
                .unwrap_or(serde_json::Value::Array(Vec::new())),
            tee_times_count: result.tee_times.len(),
            updated_at,
        }
    }
}

/// Final verdict of a harvest run
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub success: bool,
    pub message: String,
    pub fetch_errors: u64,
    pub write_errors: u64,
    pub total_tee_times: u64,
    pub elapsed_secs: f64,
}
