//! The `PipelineStore` trait — the contract between the ingestion drivers
//! and a storage backend.
//!
//! The trait is implemented by storage backends (e.g. `gantry-store-sqlite`).
//! Drivers (`gantry-jobs`) depend on this abstraction, not on any concrete
//! backend. A store handle is constructed per driver invocation and passed
//! in; there is no process-wide singleton.
//!
//! Every mutating method is a single all-or-nothing transaction: either the
//! whole batch/pass is durably applied or nothing is. Readers therefore only
//! ever observe a fully-applied epoch.

use std::collections::BTreeMap;
use std::future::Future;

use chrono::{DateTime, FixedOffset, Utc};

use crate::{
  availability::{AvailabilityRecord, IngestStats, Observation},
  facility::FacilityId,
  metadata::MetadataRow,
  view::{AnnotationStats, JoinedRow, RebuildStats},
};

/// Abstraction over the embedded pipeline store.
pub trait PipelineStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Snapshot store ────────────────────────────────────────────────────

  /// Apply one full ingestion cycle: upsert every observation into the
  /// current-state mirror (`total_count` fill-once), append each to history
  /// (insert-or-ignore on `(facility, category, source_update_time)`), and,
  /// when `strict_mirror` is set, evict every mirror row not re-observed in
  /// this cycle (`last_seen_at < retrieved_at`).
  fn apply_snapshot_batch(
    &self,
    batch: Vec<Observation>,
    retrieved_at: DateTime<Utc>,
    strict_mirror: bool,
  ) -> impl Future<Output = Result<IngestStats, Self::Error>> + Send + '_;

  // ── Metadata store ────────────────────────────────────────────────────

  /// Replace all static metadata rows wholesale (delete-all + bulk insert).
  ///
  /// Pricing columns are NULL after a replace; callers must re-run
  /// [`classify_facilities`](Self::classify_facilities) and
  /// [`refresh_rates`](Self::refresh_rates) before the next rebuild is
  /// expected to carry fresh pricing.
  fn replace_metadata(
    &self,
    rows: Vec<MetadataRow>,
    updated_at: DateTime<Utc>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Pricing engine ────────────────────────────────────────────────────

  /// Pass 1: re-tag `is_central` and `base_rate` for every facility from
  /// the fixed central allow-list. Idempotent, time-independent.
  fn classify_facilities(
    &self,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Pass 2: write `current_rate`, cap fields and `rate_updated_at` for
  /// every facility from the rate windows at `now`. One transaction covers
  /// the whole pass.
  fn refresh_rates(
    &self,
    now: DateTime<FixedOffset>,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  // ── Join materializer ─────────────────────────────────────────────────

  /// Transactionally rebuild the denormalized view: snapshot annotations,
  /// delete-all, reinsert from mirror LEFT JOIN metadata, reapply
  /// annotations.
  fn rebuild_view(
    &self,
  ) -> impl Future<Output = Result<RebuildStats, Self::Error>> + Send + '_;

  /// Two-phase annotation overlay on the already-materialized view: default
  /// blank rows, then apply mapping entries by normalized key.
  fn apply_annotations(
    &self,
    mapping: BTreeMap<FacilityId, String>,
    default_text: String,
  ) -> impl Future<Output = Result<AnnotationStats, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  /// All current mirror rows with their `last_seen_at` cycle timestamps,
  /// ordered by `(facility_id, category)`.
  fn mirror_rows(
    &self,
  ) -> impl Future<Output = Result<Vec<AvailabilityRecord>, Self::Error>> + Send + '_;

  /// All view rows, ordered by `(facility_id, category)`. Used for audit
  /// exports and downstream consumers.
  fn view_rows(
    &self,
  ) -> impl Future<Output = Result<Vec<JoinedRow>, Self::Error>> + Send + '_;
}
