//! Configuration management for the fairway harvester
//!
//! This module handles loading and validating configuration from
//! environment variables and TOML files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::utils::retry::RetryConfig;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Catalog / sink endpoint configuration
    pub catalog: CatalogConfig,

    /// Harvest pipeline tuning
    pub harvest: HarvestConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Catalog and sink endpoint configuration
///
/// Both the course catalog and the tee-time sink live behind the same
/// Supabase REST endpoint, so they share credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Supabase project URL
    pub supabase_url: String,

    /// Service role key for REST access
    pub service_key: String,

    /// Restrict the catalog to these region ids (empty = all regions)
    #[serde(default)]
    pub region_ids: Vec<i64>,

    /// Optional cron healthcheck URL pinged after a run
    #[serde(default)]
    pub healthcheck_url: Option<String>,
}

/// Harvest pipeline tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestConfig {
    /// Number of concurrent task workers
    pub concurrency: usize,

    /// Buffered task results that trigger a flush to the sink
    pub flush_threshold: usize,

    /// Rows per sink upsert call
    pub write_batch_size: usize,

    /// Attempts per upstream sub-query (including the first)
    pub max_retries: u32,

    /// Lower bound of the randomized retry delay, milliseconds
    pub min_retry_delay_ms: u64,

    /// Upper bound of the randomized retry delay, milliseconds
    pub max_retry_delay_ms: u64,

    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (text, json)
    pub format: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let supabase_url = std::env::var("SUPABASE_URL").unwrap_or_default();
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY").unwrap_or_default();

        let region_ids = std::env::var("REGION_ID")
            .ok()
            .map(|raw| {
                raw.split(',')
                    .filter_map(|id| id.trim().parse::<i64>().ok())
                    .collect()
            })
            .unwrap_or_default();

        let healthcheck_url = std::env::var("CRON_CHECK_URL").ok().filter(|u| !u.is_empty());

        let concurrency = std::env::var("FAIRWAY_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(5);

        let flush_threshold = std::env::var("FAIRWAY_FLUSH_THRESHOLD")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(30);

        let write_batch_size = std::env::var("FAIRWAY_WRITE_BATCH_SIZE")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(100);

        let max_retries = std::env::var("FAIRWAY_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(2);

        let request_timeout_secs = std::env::var("FAIRWAY_REQUEST_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let level = std::env::var("FAIRWAY_LOG_LEVEL").unwrap_or_else(|_| String::from("info"));
        let format = std::env::var("FAIRWAY_LOG_FORMAT").unwrap_or_else(|_| String::from("text"));

        Ok(Self {
            catalog: CatalogConfig {
                supabase_url,
                service_key,
                region_ids,
                healthcheck_url,
            },
            harvest: HarvestConfig {
                concurrency,
                flush_threshold,
                write_batch_size,
                max_retries,
                min_retry_delay_ms: 500,
                max_retry_delay_ms: 2000,
                request_timeout_secs,
            },
            logging: LoggingConfig { level, format },
        })
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config file: {}", path.display()))?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.harvest.concurrency == 0 {
            anyhow::bail!("concurrency must be greater than 0");
        }

        if self.harvest.flush_threshold == 0 {
            anyhow::bail!("flush_threshold must be greater than 0");
        }

        if self.harvest.write_batch_size == 0 {
            anyhow::bail!("write_batch_size must be greater than 0");
        }

        if self.harvest.max_retries == 0 {
            anyhow::bail!("max_retries must be at least 1");
        }

        if self.harvest.min_retry_delay_ms > self.harvest.max_retry_delay_ms {
            anyhow::bail!("min_retry_delay_ms must not exceed max_retry_delay_ms");
        }

        Ok(())
    }

    /// Validate that the REST credentials needed for a live run are present
    pub fn validate_credentials(&self) -> Result<()> {
        if self.catalog.supabase_url.is_empty() || self.catalog.service_key.is_empty() {
            anyhow::bail!("SUPABASE_URL and SUPABASE_SERVICE_ROLE_KEY must be set");
        }
        Ok(())
    }

    /// Get request timeout as Duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.harvest.request_timeout_secs)
    }

    /// Retry configuration for upstream sub-queries
    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::with_delays(
            self.harvest.max_retries,
            self.harvest.min_retry_delay_ms,
            self.harvest.max_retry_delay_ms,
        )
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog: CatalogConfig {
                supabase_url: String::new(),
                service_key: String::new(),
                region_ids: Vec::new(),
                healthcheck_url: None,
            },
            harvest: HarvestConfig {
                concurrency: 5,
                flush_threshold: 30,
                write_batch_size: 100,
                max_retries: 2,
                min_retry_delay_ms: 500,
                max_retry_delay_ms: 2000,
                request_timeout_secs: 30,
            },
            logging: LoggingConfig {
                level: String::from("info"),
                format: String::from("text"),
            },
        }
    }
}
