//! `gantry` — run one pipeline cycle from the command line.
//!
//! Reads `config.toml` (or the path given with `--config`), opens the SQLite
//! store, and runs the requested job once. Scheduling is external: point cron
//! or a systemd timer at the subcommand you want on the cadence you want.
//!
//! ```
//! gantry availability
//! gantry rates
//! gantry metadata
//! gantry annotations --csv ev_lots.csv
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use gantry_jobs::{
  AnnotationJob, AvailabilityJob, MetadataJob, PricingJob,
  annotations::CsvFileSource,
  datastore::DatastoreClient,
  feed::HttpFeed,
  publish::DirPublisher,
};
use gantry_store_sqlite::SqliteStore;
use serde::Deserialize;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Parking availability pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Pull the availability feed and refresh mirror, history and view.
  Availability,
  /// Re-run the pricing passes against the current wall clock.
  Rates,
  /// Replace facility metadata wholesale, then re-price and rebuild.
  Metadata,
  /// Merge a curated annotation CSV into the view.
  Annotations {
    /// Path to the annotation CSV file.
    #[arg(long)]
    csv: PathBuf,
  },
}

// ─── Configuration ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
struct GantryConfig {
  #[serde(default = "default_store_path")]
  store_path: PathBuf,

  /// Evict mirror rows not observed in the current cycle.
  #[serde(default = "default_true")]
  strict_mirror: bool,

  /// Required by `availability` only; other subcommands run without it.
  #[serde(default)]
  availability_url: Option<String>,
  #[serde(default)]
  api_key: Option<String>,

  /// Required by `metadata` only, together with the resource id.
  #[serde(default)]
  metadata_base_url: Option<String>,
  #[serde(default)]
  metadata_resource_id: Option<String>,
  #[serde(default = "default_page_size")]
  metadata_page_size: usize,

  /// Local root the audit artifacts are written under.
  #[serde(default = "default_export_root")]
  export_root: PathBuf,
  #[serde(default = "default_availability_prefix")]
  availability_prefix: String,
  #[serde(default = "default_pricing_prefix")]
  pricing_prefix: String,
  #[serde(default = "default_metadata_prefix")]
  metadata_prefix: String,
  #[serde(default = "default_annotation_prefix")]
  annotation_prefix: String,

  /// Text written into view rows with no annotation of their own.
  #[serde(default = "default_annotation_text")]
  annotation_default: String,
}

fn default_store_path() -> PathBuf { PathBuf::from("gantry.db") }
fn default_true() -> bool { true }
fn default_page_size() -> usize { 500 }
fn default_export_root() -> PathBuf { PathBuf::from("exports") }
fn default_availability_prefix() -> String { "availability".to_owned() }
fn default_pricing_prefix() -> String { "pricing".to_owned() }
fn default_metadata_prefix() -> String { "metadata".to_owned() }
fn default_annotation_prefix() -> String { "annotations".to_owned() }
fn default_annotation_text() -> String { "No EV charger".to_owned() }

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("GANTRY"))
    .build()
    .context("failed to read config file")?;

  let cfg: GantryConfig = settings
    .try_deserialize()
    .context("failed to deserialise GantryConfig")?;

  let store_path = expand_tilde(&cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  tracing::info!(store = %store_path.display(), "store opened");

  let publisher = DirPublisher::new(expand_tilde(&cfg.export_root));

  match cli.command {
    Command::Availability => {
      let url = cfg
        .availability_url
        .clone()
        .context("availability_url is not configured")?;
      let feed =
        HttpFeed::new(url, cfg.api_key.clone()).context("building feed client")?;
      let job = AvailabilityJob {
        store,
        feed,
        publisher,
        strict_mirror: cfg.strict_mirror,
        export_prefix: cfg.availability_prefix.clone(),
      };
      let report = job.run().await.context("availability cycle failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Rates => {
      let job = PricingJob {
        store,
        publisher,
        export_prefix: cfg.pricing_prefix.clone(),
      };
      let report = job.run().await.context("pricing pass failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Metadata => {
      let base_url = cfg
        .metadata_base_url
        .clone()
        .context("metadata_base_url is not configured")?;
      let resource_id = cfg
        .metadata_resource_id
        .clone()
        .context("metadata_resource_id is not configured")?;
      let source =
        DatastoreClient::new(base_url, resource_id, cfg.metadata_page_size)
          .context("building metadata client")?;
      let job = MetadataJob {
        store,
        source,
        publisher,
        export_prefix: cfg.metadata_prefix.clone(),
      };
      let report = job.run().await.context("metadata refresh failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Command::Annotations { csv } => {
      let job = AnnotationJob {
        store,
        source: CsvFileSource::new(csv),
        publisher,
        default_text: cfg.annotation_default.clone(),
        export_prefix: cfg.annotation_prefix.clone(),
      };
      let report = job.run().await.context("annotation merge failed")?;
      println!("{}", serde_json::to_string_pretty(&report)?);
    }
  }

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
