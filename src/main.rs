use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fairway::catalog::{CourseCatalog, SupabaseCatalog};
use fairway::config::Config;
use fairway::harvest::{expand_tasks, Harvester};
use fairway::storage::SupabaseSink;

#[derive(Parser)]
#[command(
    name = "fairway",
    version,
    about = "Golf tee time harvester for Chronogolf/Lightspeed booking widgets",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log format (text, json)
    #[arg(long, global = true, default_value = "text")]
    log_format: String,

    /// Path to a TOML config file (environment variables used otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a full harvest over the course catalog
    Harvest {
        /// Override the number of concurrent workers
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// List the harvestable courses in the catalog
    Courses,

    /// Preview the (course, date) tasks a harvest would run
    Tasks,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_tracing(&cli.log_format, cli.verbose)?;

    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::from_env()?,
    };

    match cli.command {
        Commands::Harvest { concurrency } => {
            harvest(config, concurrency).await?;
        }
        Commands::Courses => {
            courses(config).await?;
        }
        Commands::Tasks => {
            tasks(config).await?;
        }
    }

    Ok(())
}

fn setup_tracing(format: &str, verbose: bool) -> Result<()> {
    let env_filter = if verbose {
        tracing_subscriber::EnvFilter::new("fairway=debug,info")
    } else {
        tracing_subscriber::EnvFilter::new("fairway=info,warn")
    };

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
    }

    Ok(())
}

fn build_catalog(config: &Config) -> Result<Arc<SupabaseCatalog>> {
    config.validate_credentials()?;
    Ok(Arc::new(SupabaseCatalog::new(
        &config.catalog,
        config.request_timeout(),
        config.retry_config(),
    )?))
}

async fn harvest(mut config: Config, concurrency: Option<usize>) -> Result<()> {
    if let Some(concurrency) = concurrency {
        config.harvest.concurrency = concurrency;
    }

    let catalog = build_catalog(&config)?;
    let sink = Arc::new(SupabaseSink::new(
        &config.catalog.supabase_url,
        &config.catalog.service_key,
        config.request_timeout(),
    )?);

    let outcome = Harvester::new(config, catalog, sink).run().await?;

    if !outcome.success {
        tracing::error!(
            fetch_errors = outcome.fetch_errors,
            write_errors = outcome.write_errors,
            "Harvest completed with errors"
        );
        std::process::exit(1);
    }

    tracing::info!(
        tee_times = outcome.total_tee_times,
        elapsed_secs = format!("{:.2}", outcome.elapsed_secs),
        "Harvest completed successfully"
    );
    Ok(())
}

async fn courses(config: Config) -> Result<()> {
    let catalog = build_catalog(&config)?;
    let courses = catalog.fetch_courses().await?;

    println!("{} harvestable courses:", courses.len());
    for course in &courses {
        println!(
            "  {:>6}  {}  ({}d window, {})",
            course.id, course.name, course.booking_visibility_days, course.timezone
        );
    }
    Ok(())
}

async fn tasks(config: Config) -> Result<()> {
    let catalog = build_catalog(&config)?;
    let courses: Vec<Arc<_>> = catalog
        .fetch_courses()
        .await?
        .into_iter()
        .map(Arc::new)
        .collect();

    let tasks = expand_tasks(&courses, chrono::Utc::now());
    println!("{} search tasks:", tasks.len());
    for task in &tasks {
        println!("  {:>6}  {}  {}", task.course.id, task.course.name, task.date);
    }
    Ok(())
}
