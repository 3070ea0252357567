//! Encoding and decoding helpers between Rust domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings, which compare
//! lexicographically in timestamp order — the strict-mirror eviction relies
//! on that for its `last_seen_at < cutoff` comparison. Cap kinds are stored
//! as their wire names (`NPS_NIGHT_CAP` / `DAY_CAP`).

use chrono::{DateTime, SecondsFormat, Utc};
use gantry_core::{metadata::CapKind, view::JoinedRow};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── CapKind ─────────────────────────────────────────────────────────────────

pub fn decode_cap_kind(s: &str) -> Result<CapKind> {
  Ok(CapKind::parse(s)?)
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from an `availability_view` row.
pub struct RawJoinedRow {
  pub facility_id:        String,
  pub category:           String,
  pub available_count:    i64,
  pub total_count:        Option<i64>,
  pub source_update_time: String,
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
  pub base_rate:          Option<f64>,
  pub current_rate:       Option<f64>,
  pub active_cap_kind:    Option<String>,
  pub active_cap_amount:  Option<f64>,
  pub annotation:         Option<String>,
  pub has_metadata:       i64,
}

impl RawJoinedRow {
  pub fn into_row(self) -> Result<JoinedRow> {
    let cap_kind = self
      .active_cap_kind
      .as_deref()
      .map(decode_cap_kind)
      .transpose()?;

    Ok(JoinedRow {
      facility_id:        self.facility_id,
      category:           self.category,
      available_count:    self.available_count,
      total_count:        self.total_count,
      source_update_time: self.source_update_time,
      address:            self.address,
      x_coord:            self.x_coord,
      y_coord:            self.y_coord,
      facility_type:      self.facility_type,
      parking_system:     self.parking_system,
      short_term_parking: self.short_term_parking,
      free_parking:       self.free_parking,
      night_parking:      self.night_parking,
      decks:              self.decks,
      gantry_height:      self.gantry_height,
      basement:           self.basement,
      base_rate:          self.base_rate,
      current_rate:       self.current_rate,
      cap_kind,
      cap_amount:         self.active_cap_amount,
      annotation:         self.annotation,
      has_metadata:       self.has_metadata != 0,
    })
  }
}
