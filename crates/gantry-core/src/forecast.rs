//! Feature assembly for the external availability-forecast model.
//!
//! The regression model itself is an external collaborator; this module only
//! builds the numeric feature row it consumes. Encodings for facility and
//! category come from the model's label encoders and are passed in by the
//! caller.

use chrono::{Datelike, NaiveDate, NaiveDateTime, Timelike};
use serde::Serialize;

/// Fixed enumerated holiday calendar (SG public holidays, 2023–2025).
pub const HOLIDAYS: [&str; 33] = [
  "2023-01-01", "2023-01-02", "2023-01-22", "2023-01-23", "2023-04-07",
  "2023-04-22", "2023-05-01", "2023-06-02", "2023-06-29", "2023-08-09",
  "2023-11-12", "2023-11-13", "2023-12-25", "2024-01-01", "2024-02-10",
  "2024-02-11", "2024-03-29", "2024-04-10", "2024-05-01", "2024-05-22",
  "2024-06-17", "2024-08-09", "2024-10-31", "2024-12-25", "2025-01-01",
  "2025-01-29", "2025-01-30", "2025-04-18", "2025-05-01", "2025-06-07",
  "2025-06-08", "2025-08-09", "2025-12-25",
];

pub fn is_holiday(date: NaiveDate) -> bool {
  let key = date.format("%Y-%m-%d").to_string();
  HOLIDAYS.iter().any(|d| *d == key)
}

/// The feature row consumed by the external regression function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector {
  pub facility_encoding: i64,
  pub total_count:       i64,
  pub category_encoding: i64,
  pub month:             u32,
  /// Monday = 0 .. Sunday = 6, matching the model's training data.
  pub weekday:           u32,
  pub hour:              u32,
  pub is_weekend:        bool,
  pub is_holiday:        bool,
}

impl FeatureVector {
  /// Flatten into the 8-wide numeric row the model expects.
  pub fn to_row(&self) -> [f64; 8] {
    [
      self.facility_encoding as f64,
      self.total_count as f64,
      self.category_encoding as f64,
      f64::from(self.month),
      f64::from(self.weekday),
      f64::from(self.hour),
      if self.is_weekend { 1.0 } else { 0.0 },
      if self.is_holiday { 1.0 } else { 0.0 },
    ]
  }
}

/// Assemble the feature vector for one facility/category at one instant.
pub fn feature_vector(
  facility_encoding: i64,
  total_count: i64,
  category_encoding: i64,
  at: NaiveDateTime,
) -> FeatureVector {
  let weekday = at.weekday().num_days_from_monday();
  FeatureVector {
    facility_encoding,
    total_count,
    category_encoding,
    month: at.month(),
    weekday,
    hour: at.hour(),
    is_weekend: weekday >= 5,
    is_holiday: is_holiday(at.date()),
  }
}
