//! The materialized joined view — a derived, fully-rebuildable read model.
//!
//! One row per `(facility, category)` present in the availability mirror,
//! left-joined with metadata and pricing. The `annotation` column has no
//! authoritative source table; it is carried forward across rebuilds.

use serde::{Deserialize, Serialize};

use crate::metadata::CapKind;

/// One denormalized view row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinedRow {
  pub facility_id:        String,
  pub category:           String,
  pub available_count:    i64,
  pub total_count:        Option<i64>,
  pub source_update_time: String,

  // Static attributes, NULL when the facility has no metadata row.
  pub address:            Option<String>,
  pub x_coord:            Option<String>,
  pub y_coord:            Option<String>,
  pub facility_type:      Option<String>,
  pub parking_system:     Option<String>,
  pub short_term_parking: Option<String>,
  pub free_parking:       Option<String>,
  pub night_parking:      Option<String>,
  pub decks:              Option<String>,
  pub gantry_height:      Option<String>,
  pub basement:           Option<String>,

  // Pricing fields copied from metadata at rebuild time.
  pub base_rate:          Option<f64>,
  pub current_rate:       Option<f64>,
  pub cap_kind:           Option<CapKind>,
  pub cap_amount:         Option<f64>,

  /// Carried forward across rebuilds (e.g. charger-location text).
  pub annotation:         Option<String>,
  /// True iff a normalized-key metadata match existed at rebuild time.
  pub has_metadata:       bool,
}

/// Counts reported after a view rebuild. `matched + unmatched == total`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RebuildStats {
  pub total:     u64,
  pub matched:   u64,
  pub unmatched: u64,
}

/// Counts reported after an annotation merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnnotationStats {
  pub total_rows:         u64,
  /// Row updates applied from the mapping (counts rows, not entries).
  pub mapped_applied:     u64,
  /// Blank rows that received the default text this run.
  pub defaulted:          u64,
  /// Rows holding a non-blank, non-default annotation after the merge.
  pub with_annotation:    u64,
  pub without_annotation: u64,
}
