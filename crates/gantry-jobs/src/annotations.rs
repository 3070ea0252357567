//! The annotation source — a curated CSV mapping facility keys to
//! charger-location text.
//!
//! Header names vary across exports of the curated sheet, so both columns
//! are located through alias lists. Multiple rows for the same facility may
//! collide; the first non-blank value wins.

use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;

use gantry_core::facility::FacilityId;

use crate::error::FetchError;

const FACILITY_ALIASES: [&str; 5] =
  ["facility_id", "carpark_number", "car_park_no", "carpark_no", "hdb_ev"];
const LOCATION_ALIASES: [&str; 4] =
  ["annotation", "ev_lot_location", "ev_location", "ev_lots_location"];

/// Pull source for the annotation overlay mapping.
pub trait AnnotationSource: Send + Sync {
  fn load(
    &self,
  ) -> impl Future<Output = Result<BTreeMap<FacilityId, String>, FetchError>>
  + Send
  + '_;
}

// ─── CSV parsing ─────────────────────────────────────────────────────────────

fn normalize_header(raw: &str) -> String {
  let mut out = String::with_capacity(raw.len());
  let mut last_underscore = false;
  for c in raw.trim().chars() {
    if c.is_ascii_alphanumeric() {
      out.push(c.to_ascii_lowercase());
      last_underscore = false;
    } else if !last_underscore && !out.is_empty() {
      out.push('_');
      last_underscore = true;
    }
  }
  out.trim_end_matches('_').to_owned()
}

/// Split CSV text into records, honouring double-quoted fields, `""` escapes
/// and record separators inside quotes. Quote state carries across line
/// breaks, so a quoted field may span several lines.
fn split_csv_records(text: &str) -> Vec<Vec<String>> {
  let mut records = Vec::new();
  let mut record = Vec::new();
  let mut field = String::new();
  let mut in_quotes = false;
  let mut chars = text.chars().peekable();

  while let Some(c) = chars.next() {
    match c {
      '"' if in_quotes && chars.peek() == Some(&'"') => {
        field.push('"');
        chars.next();
      }
      '"' => in_quotes = !in_quotes,
      ',' if !in_quotes => {
        record.push(std::mem::take(&mut field));
      }
      '\r' if !in_quotes => {}
      '\n' if !in_quotes => {
        record.push(std::mem::take(&mut field));
        records.push(std::mem::take(&mut record));
      }
      _ => field.push(c),
    }
  }
  // Final record without a trailing newline.
  if !field.is_empty() || !record.is_empty() {
    record.push(field);
    records.push(record);
  }

  records
}

fn find_column(headers: &[String], aliases: &[&str]) -> Option<usize> {
  headers
    .iter()
    .position(|h| aliases.contains(&h.as_str()))
}

/// Parse the curated CSV into a facility → annotation mapping.
pub fn parse_annotation_csv(
  text: &str,
) -> Result<BTreeMap<FacilityId, String>, FetchError> {
  let text = text.strip_prefix('\u{feff}').unwrap_or(text);
  let mut records = split_csv_records(text)
    .into_iter()
    .filter(|r| r.iter().any(|f| !f.trim().is_empty()));

  let headers: Vec<String> = records
    .next()
    .ok_or_else(|| FetchError::Malformed("empty annotation csv".into()))?
    .iter()
    .map(|h| normalize_header(h))
    .collect();

  let facility_col = find_column(&headers, &FACILITY_ALIASES).ok_or_else(|| {
    FetchError::Malformed(format!(
      "no facility column (tried {FACILITY_ALIASES:?})"
    ))
  })?;
  let location_col = find_column(&headers, &LOCATION_ALIASES).ok_or_else(|| {
    FetchError::Malformed(format!(
      "no annotation column (tried {LOCATION_ALIASES:?})"
    ))
  })?;

  let mut mapping = BTreeMap::new();
  for fields in records {
    let raw_id = fields.get(facility_col).map(String::as_str).unwrap_or("");
    let value = fields
      .get(location_col)
      .map(|v| v.trim())
      .unwrap_or("");

    let Ok(facility_id) = FacilityId::new(raw_id) else { continue };
    if value.is_empty() {
      continue;
    }
    // First non-blank value per facility wins.
    mapping.entry(facility_id).or_insert_with(|| value.to_owned());
  }

  Ok(mapping)
}

// ─── File source ─────────────────────────────────────────────────────────────

/// Annotation mapping loaded from a CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvFileSource {
  path: PathBuf,
}

impl CsvFileSource {
  pub fn new(path: PathBuf) -> Self { Self { path } }
}

impl AnnotationSource for CsvFileSource {
  async fn load(&self) -> Result<BTreeMap<FacilityId, String>, FetchError> {
    let text = tokio::fs::read_to_string(&self.path).await?;
    parse_annotation_csv(&text)
  }
}
