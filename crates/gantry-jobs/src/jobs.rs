//! The four pipeline drivers.
//!
//! Each `run` is one scheduled invocation: fetch, apply atomic store
//! transactions, rebuild the view, publish audit artifacts. A fetch failure
//! aborts before any mutation; a store failure rolls back and surfaces as
//! this cycle's error (retry is the scheduler's concern, not ours). Audit
//! publication happens after commit and is best-effort.

use chrono::{DateTime, FixedOffset, Utc};
use gantry_core::{
  availability::IngestStats,
  pricing,
  store::PipelineStore,
  view::{AnnotationStats, RebuildStats},
};
use serde::Serialize;

use crate::{
  annotations::AnnotationSource,
  datastore::MetadataSource,
  error::{Error, Result},
  export,
  feed::AvailabilityFeed,
  publish::BlobPublisher,
};

/// Publish an artifact, logging instead of failing: the cycle's data is
/// already committed by the time exports run.
async fn publish_best_effort<P: BlobPublisher>(
  publisher: &P,
  key: String,
  body: Vec<u8>,
  content_type: &str,
) -> Option<String> {
  match publisher.publish(&key, body, content_type).await {
    Ok(key) => Some(key),
    Err(e) => {
      tracing::warn!(key = %key, error = %e, "audit publish failed");
      None
    }
  }
}

// ─── Availability ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AvailabilityReport {
  pub ingest:   IngestStats,
  pub rebuild:  RebuildStats,
  pub raw_key:  Option<String>,
  pub view_key: Option<String>,
}

/// Periodic availability ingestion: feed → mirror + history → view rebuild.
pub struct AvailabilityJob<S, F, P> {
  pub store:         S,
  pub feed:          F,
  pub publisher:     P,
  pub strict_mirror: bool,
  pub export_prefix: String,
}

impl<S, F, P> AvailabilityJob<S, F, P>
where
  S: PipelineStore,
  F: AvailabilityFeed,
  P: BlobPublisher,
{
  pub async fn run(&self) -> Result<AvailabilityReport> {
    let retrieved_at = Utc::now();

    // Pull before touching the store; a fetch failure leaves no trace.
    let batch = self.feed.pull().await?;
    let raw_body = serde_json::to_vec_pretty(&batch)?;

    let ingest = self
      .store
      .apply_snapshot_batch(batch, retrieved_at, self.strict_mirror)
      .await
      .map_err(Error::store)?;
    let rebuild = self.store.rebuild_view().await.map_err(Error::store)?;

    tracing::info!(
      observed = ingest.observed,
      history_inserted = ingest.history_inserted,
      evicted = ingest.evicted,
      snapshot_rows = ingest.snapshot_rows,
      view_total = rebuild.total,
      "availability cycle committed"
    );

    let raw_key = publish_best_effort(
      &self.publisher,
      export::artifact_key(&self.export_prefix, "observations", "json", retrieved_at),
      raw_body,
      "application/json",
    )
    .await;

    let rows = self.store.view_rows().await.map_err(Error::store)?;
    let view_key = publish_best_effort(
      &self.publisher,
      export::artifact_key(&self.export_prefix, "combined", "csv", retrieved_at),
      export::view_to_csv(&rows).into_bytes(),
      "text/csv",
    )
    .await;

    Ok(AvailabilityReport { ingest, rebuild, raw_key, view_key })
  }
}

// ─── Pricing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct PricingReport {
  pub classified: usize,
  pub repriced:   usize,
  pub rebuild:    RebuildStats,
  pub view_key:   Option<String>,
}

/// Clock-triggered pricing refresh: classification pass, time-window pass,
/// view rebuild.
pub struct PricingJob<S, P> {
  pub store:         S,
  pub publisher:     P,
  pub export_prefix: String,
}

impl<S, P> PricingJob<S, P>
where
  S: PipelineStore,
  P: BlobPublisher,
{
  pub async fn run(&self) -> Result<PricingReport> {
    self.run_at(pricing::civil_now()).await
  }

  /// Run against an explicit civil-clock instant.
  pub async fn run_at(&self, now: DateTime<FixedOffset>) -> Result<PricingReport> {
    let classified =
      self.store.classify_facilities().await.map_err(Error::store)?;
    let repriced = self.store.refresh_rates(now).await.map_err(Error::store)?;
    let rebuild = self.store.rebuild_view().await.map_err(Error::store)?;

    tracing::info!(
      classified,
      repriced,
      view_total = rebuild.total,
      "pricing pass committed"
    );

    let rows = self.store.view_rows().await.map_err(Error::store)?;
    let view_key = publish_best_effort(
      &self.publisher,
      export::artifact_key(&self.export_prefix, "priced", "csv", Utc::now()),
      export::view_to_csv(&rows).into_bytes(),
      "text/csv",
    )
    .await;

    Ok(PricingReport { classified, repriced, rebuild, view_key })
  }
}

// ─── Metadata ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MetadataReport {
  pub records_pulled: usize,
  pub rows_loaded:    usize,
  pub classified:     usize,
  pub repriced:       usize,
  pub rebuild:        RebuildStats,
  pub raw_key:        Option<String>,
  pub view_key:       Option<String>,
}

/// Wholesale metadata refresh. The replace clears pricing columns, so both
/// pricing passes re-run in the same invocation before the rebuild — a
/// metadata refresh alone never guarantees pricing freshness.
pub struct MetadataJob<S, M, P> {
  pub store:         S,
  pub source:        M,
  pub publisher:     P,
  pub export_prefix: String,
}

impl<S, M, P> MetadataJob<S, M, P>
where
  S: PipelineStore,
  M: MetadataSource,
  P: BlobPublisher,
{
  pub async fn run(&self) -> Result<MetadataReport> {
    let pulled_at = Utc::now();
    let pull = self.source.pull().await?;
    let records_pulled = pull.rows.len();
    let raw_body = serde_json::to_vec_pretty(&serde_json::json!({
      "fields":  pull.fields,
      "records": pull.rows,
    }))?;

    let rows_loaded = self
      .store
      .replace_metadata(pull.rows, pulled_at)
      .await
      .map_err(Error::store)?;
    let classified =
      self.store.classify_facilities().await.map_err(Error::store)?;
    let repriced = self
      .store
      .refresh_rates(pricing::civil_now())
      .await
      .map_err(Error::store)?;
    let rebuild = self.store.rebuild_view().await.map_err(Error::store)?;

    tracing::info!(
      records_pulled,
      rows_loaded,
      matched = rebuild.matched,
      unmatched = rebuild.unmatched,
      "metadata refresh committed"
    );

    let raw_key = publish_best_effort(
      &self.publisher,
      export::artifact_key(&self.export_prefix, "info", "json", pulled_at),
      raw_body,
      "application/json",
    )
    .await;

    let rows = self.store.view_rows().await.map_err(Error::store)?;
    let view_key = publish_best_effort(
      &self.publisher,
      export::artifact_key(&self.export_prefix, "combined", "csv", pulled_at),
      export::view_to_csv(&rows).into_bytes(),
      "text/csv",
    )
    .await;

    Ok(MetadataReport {
      records_pulled,
      rows_loaded,
      classified,
      repriced,
      rebuild,
      raw_key,
      view_key,
    })
  }
}

// ─── Annotations ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct AnnotationReport {
  pub mapping_size: usize,
  pub stats:        AnnotationStats,
  pub view_key:     Option<String>,
}

/// One-shot annotation overlay merge into the materialized view.
pub struct AnnotationJob<S, A, P> {
  pub store:         S,
  pub source:        A,
  pub publisher:     P,
  pub default_text:  String,
  pub export_prefix: String,
}

impl<S, A, P> AnnotationJob<S, A, P>
where
  S: PipelineStore,
  A: AnnotationSource,
  P: BlobPublisher,
{
  pub async fn run(&self) -> Result<AnnotationReport> {
    let mapping = self.source.load().await?;
    let mapping_size = mapping.len();

    let stats = self
      .store
      .apply_annotations(mapping, self.default_text.clone())
      .await
      .map_err(Error::store)?;

    tracing::info!(
      mapping_size,
      mapped_applied = stats.mapped_applied,
      defaulted = stats.defaulted,
      "annotation merge committed"
    );

    let rows = self.store.view_rows().await.map_err(Error::store)?;
    let view_key = publish_best_effort(
      &self.publisher,
      export::artifact_key(&self.export_prefix, "view_snapshot", "csv", Utc::now()),
      export::view_to_csv(&rows).into_bytes(),
      "text/csv",
    )
    .await;

    Ok(AnnotationReport { mapping_size, stats, view_key })
  }
}
