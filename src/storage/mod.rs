//! Persistence sinks for harvested tee times
//!
//! The production sink writes to Supabase's PostgREST endpoint with
//! upsert-on-conflict semantics so a re-run of the same course/date
//! replaces the previous snapshot. In-memory and always-failing sinks
//! back the batching tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::error::{Error, Result};
use crate::models::TeeTimeRow;

/// Destination for batched tee time rows
#[async_trait]
pub trait TeeTimeSink: Send + Sync {
    /// Upsert one batch of rows, replacing any existing row for the
    /// same (course_id, date) pair
    async fn upsert_batch(&self, rows: &[TeeTimeRow]) -> Result<()>;
}

/// Sink backed by a Supabase PostgREST `tee_times` table
pub struct SupabaseSink {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
}

impl SupabaseSink {
    pub fn new(base_url: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::sink(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key: service_key.to_string(),
        })
    }
}

#[async_trait]
impl TeeTimeSink for SupabaseSink {
    async fn upsert_batch(&self, rows: &[TeeTimeRow]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let url = format!(
            "{}/rest/v1/tee_times?on_conflict=course_id,date",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .header("Content-Type", "application/json")
            .header("Prefer", "resolution=merge-duplicates")
            .json(rows)
            .send()
            .await
            .map_err(|e| Error::sink(format!("Upsert request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::sink(format!(
                "Upsert rejected with {status}: {}",
                body.chars().take(500).collect::<String>()
            )));
        }

        tracing::debug!(rows = rows.len(), "Upserted tee time batch");
        Ok(())
    }
}

/// In-memory sink keyed by (course_id, date), used in tests
pub struct MemorySink {
    rows: Mutex<HashMap<(i64, NaiveDate), TeeTimeRow>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, course_id: i64, date: NaiveDate) -> Option<TeeTimeRow> {
        self.rows.lock().unwrap().get(&(course_id, date)).cloned()
    }
}

impl Default for MemorySink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TeeTimeSink for MemorySink {
    async fn upsert_batch(&self, rows: &[TeeTimeRow]) -> Result<()> {
        let mut stored = self.rows.lock().unwrap();
        for row in rows {
            stored.insert((row.course_id, row.date), row.clone());
        }
        Ok(())
    }
}

/// Sink that rejects every batch, used to test write-error tolerance
pub struct FailingSink;

#[async_trait]
impl TeeTimeSink for FailingSink {
    async fn upsert_batch(&self, _rows: &[TeeTimeRow]) -> Result<()> {
        Err(Error::sink("Sink unavailable"))
    }
}
