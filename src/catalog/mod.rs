//! Course catalog loading
//!
//! The production catalog queries the Supabase `courses` table filtered
//! to the Chronogolf/Lightspeed API family and, optionally, to a set of
//! regions. `StaticCatalog` serves fixed course lists in tests.

use std::time::Duration;

use async_trait::async_trait;

use crate::config::CatalogConfig;
use crate::error::{Error, Result};
use crate::models::Course;
use crate::utils::retry::{with_retry, RetryConfig};

/// Source of harvestable courses
#[async_trait]
pub trait CourseCatalog: Send + Sync {
    async fn fetch_courses(&self) -> Result<Vec<Course>>;
}

/// Catalog backed by the Supabase `courses` table
pub struct SupabaseCatalog {
    client: reqwest::Client,
    base_url: String,
    service_key: String,
    region_ids: Vec<i64>,
    retry: RetryConfig,
}

impl SupabaseCatalog {
    pub fn new(config: &CatalogConfig, timeout: Duration, retry: RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::catalog(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            service_key: config.service_key.clone(),
            region_ids: config.region_ids.clone(),
            retry,
        })
    }

    fn courses_url(&self) -> String {
        let select = "id,name,display_name,club_name,external_api,external_api_attributes,\
                      booking_visibility_days,booking_visibility_start_time,timezone,\
                      requires_login,cities!inner(name,region_id)";

        let mut url = format!(
            "{}/rest/v1/courses?select={select}&external_api=eq.CHRONO_LIGHTSPEED",
            self.base_url
        );

        if !self.region_ids.is_empty() {
            let ids = self
                .region_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(",");
            url.push_str(&format!("&cities.region_id=in.({ids})"));
        }

        url
    }

    async fn fetch_once(&self) -> anyhow::Result<Vec<Course>> {
        let response = self
            .client
            .get(self.courses_url())
            .header("apikey", &self.service_key)
            .header("Authorization", format!("Bearer {}", self.service_key))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!(
                "Catalog query rejected with {status}: {}",
                body.chars().take(500).collect::<String>()
            );
        }

        let courses: Vec<Course> = response.json().await?;
        Ok(courses)
    }
}

#[async_trait]
impl CourseCatalog for SupabaseCatalog {
    async fn fetch_courses(&self) -> Result<Vec<Course>> {
        let courses = with_retry(&self.retry, |_| self.fetch_once())
            .await
            .map_err(|e| Error::catalog(e.to_string()))?;

        tracing::info!(count = courses.len(), "Loaded course catalog");
        Ok(courses)
    }
}

/// Fixed course list, used in tests and for the `tasks` preview command
pub struct StaticCatalog {
    courses: Vec<Course>,
}

impl StaticCatalog {
    pub fn new(courses: Vec<Course>) -> Self {
        Self { courses }
    }
}

#[async_trait]
impl CourseCatalog for StaticCatalog {
    async fn fetch_courses(&self) -> Result<Vec<Course>> {
        Ok(self.courses.clone())
    }
}
