//! fairway - Golf tee time harvester
//!
//! Collects real-time tee time availability from Chronogolf/Lightspeed
//! booking widgets for every course in a Supabase catalog and upserts
//! the merged results back into Supabase.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration from environment variables and TOML
//! - [`catalog`] - Course catalog loading (Supabase or static)
//! - [`harvest`] - The harvesting pipeline: scheduling, fetching,
//!   merging, batching, and run reporting
//! - [`models`] - Core data structures and types
//! - [`storage`] - Tee time sinks (Supabase upserts, in-memory)
//! - [`utils`] - Retry helpers and small shared utilities
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use fairway::catalog::SupabaseCatalog;
//! use fairway::config::Config;
//! use fairway::harvest::Harvester;
//! use fairway::storage::SupabaseSink;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let catalog = Arc::new(SupabaseCatalog::new(
//!         &config.catalog,
//!         config.request_timeout(),
//!         config.retry_config(),
//!     )?);
//!     let sink = Arc::new(SupabaseSink::new(
//!         &config.catalog.supabase_url,
//!         &config.catalog.service_key,
//!         config.request_timeout(),
//!     )?);
//!     let outcome = Harvester::new(config, catalog, sink).run().await?;
//!     println!("{}", outcome.message);
//!     Ok(())
//! }
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod harvest;
pub mod models;
pub mod storage;
pub mod utils;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::catalog::{CourseCatalog, StaticCatalog, SupabaseCatalog};
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::harvest::{Harvester, TeeTimeFetcher};
    pub use crate::models::{CanonicalTeeTime, Course, RunOutcome, SearchTask, TaskResult};
    pub use crate::storage::{SupabaseSink, TeeTimeSink};
}

// Direct re-exports for convenience
pub use models::{CanonicalTeeTime, Course, RunOutcome, SearchTask, TaskResult};
