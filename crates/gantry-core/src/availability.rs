//! Availability records — the current-state mirror and its append-only
//! history.
//!
//! The mirror holds exactly one row per `(facility, category)`; history is
//! never updated or deleted. `source_update_time` is the timestamp the
//! upstream feed reports and is kept as an opaque string: history identity is
//! defined on the text the feed emitted, not on any parsed interpretation of
//! it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::facility::FacilityId;

/// A single facility/category observation pulled from the external feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
  pub facility_id:        FacilityId,
  /// Lot classification within the facility (e.g. `C` car, `Y` motorcycle).
  pub category:           String,
  pub available_count:    i64,
  /// Only present on some feed payloads; fill-once in the mirror.
  pub total_count:        Option<i64>,
  /// Upstream-reported update timestamp, opaque.
  pub source_update_time: String,
}

/// One current-state mirror row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AvailabilityRecord {
  pub facility_id:        FacilityId,
  pub category:           String,
  pub available_count:    i64,
  pub total_count:        Option<i64>,
  pub source_update_time: String,
  /// Timestamp of the last ingestion cycle that observed this tuple.
  pub last_seen_at:       DateTime<Utc>,
}

/// Aggregate counts reported after a committed ingestion cycle.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct IngestStats {
  /// Observations processed in this batch.
  pub observed:         usize,
  /// History rows actually inserted (duplicates are silently ignored).
  pub history_inserted: usize,
  /// Mirror rows evicted by the strict-mirror pass (0 when disabled).
  pub evicted:          usize,
  /// Mirror size after commit.
  pub snapshot_rows:    u64,
}
