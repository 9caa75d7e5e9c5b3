//! Tee time harvesting pipeline
//!
//! A run loads the course catalog, expands each course's booking window
//! into (course, date) search tasks, fans the tasks out over a bounded
//! worker pool, merges per-player-count availability into canonical
//! records, and upserts them in batches. The pipeline is deliberately
//! error-tolerant in the middle (individual tasks and batches fail
//! without stopping the run) and strict at the edges: missing catalog,
//! bad credentials, or a run that finds zero tee times anywhere all fail
//! the process.

pub mod accumulator;
pub mod chrono_lightspeed;
pub mod fetcher;
pub mod progress;
pub mod scheduler;

pub use accumulator::BatchAccumulator;
pub use fetcher::TeeTimeFetcher;
pub use progress::RunReporter;
pub use scheduler::{expand_tasks, run_tasks};

use std::sync::Arc;

use chrono::Utc;

use crate::catalog::CourseCatalog;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::models::RunOutcome;
use crate::storage::TeeTimeSink;

/// End-to-end harvest run over a catalog and a sink
pub struct Harvester {
    config: Config,
    catalog: Arc<dyn CourseCatalog>,
    sink: Arc<dyn TeeTimeSink>,
}

impl Harvester {
    pub fn new(config: Config, catalog: Arc<dyn CourseCatalog>, sink: Arc<dyn TeeTimeSink>) -> Self {
        Self {
            config,
            catalog,
            sink,
        }
    }

    /// Execute one full harvest run
    ///
    /// Returns the run outcome, or an error when the run could not start
    /// (config/catalog) or produced zero tee times overall.
    pub async fn run(&self) -> Result<RunOutcome> {
        self.config.validate().map_err(|e| Error::config(e.to_string()))?;

        let courses: Vec<Arc<_>> = self
            .catalog
            .fetch_courses()
            .await?
            .into_iter()
            .map(Arc::new)
            .collect();

        if courses.is_empty() {
            return Err(Error::catalog("No harvestable courses in catalog"));
        }

        let tasks = expand_tasks(&courses, Utc::now());
        tracing::info!(
            courses = courses.len(),
            tasks = tasks.len(),
            concurrency = self.config.harvest.concurrency,
            "Starting harvest run"
        );

        let fetcher = Arc::new(TeeTimeFetcher::new(
            self.config.request_timeout(),
            self.config.retry_config(),
        )?);

        self.run_with_fetcher(fetcher, tasks).await
    }

    /// Run the pipeline against an already-built fetcher
    ///
    /// Split out so tests can point the fetcher at a mock server.
    pub async fn run_with_fetcher(
        &self,
        fetcher: Arc<TeeTimeFetcher>,
        tasks: Vec<crate::models::SearchTask>,
    ) -> Result<RunOutcome> {
        let accumulator = Arc::new(BatchAccumulator::new(
            Arc::clone(&self.sink),
            self.config.harvest.flush_threshold,
            self.config.harvest.write_batch_size,
        ));
        let reporter = Arc::new(RunReporter::new(tasks.len()));

        run_tasks(
            tasks,
            fetcher,
            Arc::clone(&accumulator),
            Arc::clone(&reporter),
            self.config.harvest.concurrency,
        )
        .await;

        accumulator.finish().await;

        let outcome = reporter.finish(
            accumulator.total_tee_times(),
            accumulator.write_errors(),
            accumulator.batches_attempted(),
        );

        if outcome.total_tee_times == 0 {
            return Err(Error::NoTeeTimes);
        }

        self.ping_healthcheck().await;

        Ok(outcome)
    }

    /// Best-effort cron healthcheck ping; failures are logged, never fatal
    async fn ping_healthcheck(&self) {
        let Some(url) = self.config.catalog.healthcheck_url.as_deref() else {
            return;
        };

        match reqwest::get(url).await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("Healthcheck pinged");
            }
            Ok(response) => {
                tracing::warn!(status = %response.status(), "Healthcheck ping rejected");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Healthcheck ping failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::storage::MemorySink;

    #[tokio::test]
    async fn test_empty_catalog_is_fatal() {
        let harvester = Harvester::new(
            Config::default(),
            Arc::new(StaticCatalog::new(Vec::new())),
            Arc::new(MemorySink::new()),
        );

        let err = harvester.run().await.unwrap_err();
        assert!(matches!(err, Error::Catalog(_)));
        assert!(err.is_fatal_before_run());
    }

    #[tokio::test]
    async fn test_invalid_config_is_fatal() {
        let mut config = Config::default();
        config.harvest.concurrency = 0;

        let harvester = Harvester::new(
            config,
            Arc::new(StaticCatalog::new(Vec::new())),
            Arc::new(MemorySink::new()),
        );

        let err = harvester.run().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_zero_tasks_yield_no_tee_times() {
        // A catalog whose only course has an unsupported API still expands
        // to tasks; those tasks fail, so the run ends with NoTeeTimes.
        let course = serde_json::from_str(
            r#"{"id": 1, "name": "Mystery", "external_api": "OTHER_VENDOR",
                "timezone": "America/Vancouver"}"#,
        )
        .unwrap();

        let harvester = Harvester::new(
            Config::default(),
            Arc::new(StaticCatalog::new(vec![course])),
            Arc::new(MemorySink::new()),
        );

        let err = harvester.run().await.unwrap_err();
        assert!(matches!(err, Error::NoTeeTimes));
    }
}
