//! Audit-export builders: the materialized view as a CSV artifact.
//!
//! Exports are for checking, not correctness; consumers of record are the
//! store tables themselves.

use chrono::{DateTime, Utc};
use gantry_core::view::JoinedRow;

pub const VIEW_CSV_HEADER: [&str; 22] = [
  "facility_id",
  "category",
  "available_count",
  "total_count",
  "source_update_time",
  "address",
  "x_coord",
  "y_coord",
  "facility_type",
  "parking_system",
  "short_term_parking",
  "free_parking",
  "night_parking",
  "decks",
  "gantry_height",
  "basement",
  "base_rate",
  "current_rate",
  "cap_kind",
  "cap_amount",
  "annotation",
  "has_metadata",
];

/// Quote a CSV field when it contains a delimiter, quote or newline.
fn csv_field(raw: &str) -> String {
  if raw.contains(',') || raw.contains('"') || raw.contains('\n') {
    format!("\"{}\"", raw.replace('"', "\"\""))
  } else {
    raw.to_owned()
  }
}

fn opt_str(v: &Option<String>) -> String {
  v.as_deref().map(csv_field).unwrap_or_default()
}

fn opt_i64(v: Option<i64>) -> String {
  v.map(|n| n.to_string()).unwrap_or_default()
}

fn opt_f64(v: Option<f64>) -> String {
  v.map(|n| n.to_string()).unwrap_or_default()
}

/// Render the view rows as CSV with a fixed column order.
pub fn view_to_csv(rows: &[JoinedRow]) -> String {
  let mut out = String::new();
  out.push_str(&VIEW_CSV_HEADER.join(","));
  out.push('\n');

  for row in rows {
    let fields = [
      csv_field(&row.facility_id),
      csv_field(&row.category),
      row.available_count.to_string(),
      opt_i64(row.total_count),
      csv_field(&row.source_update_time),
      opt_str(&row.address),
      opt_str(&row.x_coord),
      opt_str(&row.y_coord),
      opt_str(&row.facility_type),
      opt_str(&row.parking_system),
      opt_str(&row.short_term_parking),
      opt_str(&row.free_parking),
      opt_str(&row.night_parking),
      opt_str(&row.decks),
      opt_str(&row.gantry_height),
      opt_str(&row.basement),
      opt_f64(row.base_rate),
      opt_f64(row.current_rate),
      row.cap_kind.map(|k| k.as_str().to_owned()).unwrap_or_default(),
      opt_f64(row.cap_amount),
      opt_str(&row.annotation),
      if row.has_metadata { "1" } else { "0" }.to_owned(),
    ];
    out.push_str(&fields.join(","));
    out.push('\n');
  }

  out
}

/// Timestamped artifact key, e.g. `dumps/view/combined_20250604-081500.csv`.
pub fn artifact_key(
  prefix: &str,
  stem: &str,
  extension: &str,
  at: DateTime<Utc>,
) -> String {
  let ts = at.format("%Y%m%d-%H%M%S");
  format!("{}/{stem}_{ts}.{extension}", prefix.trim_end_matches('/'))
}
