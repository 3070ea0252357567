//! Facility metadata — slowly-changing static attributes plus derived
//! pricing fields.
//!
//! The two column families have different owners: static attributes belong
//! to the metadata-refresh job (replaced wholesale each run), pricing fields
//! belong to the pricing job. A metadata replace leaves pricing NULL until
//! the follow-up pricing pass runs.

use serde::{Deserialize, Serialize};

use crate::{Error, Result, facility::FacilityId};

/// Static facility attributes from the upstream metadata source.
///
/// The upstream dataset is all text; boolean-ish fields ("YES"/"NO") are kept
/// verbatim and interpreted where needed (see
/// [`night_service`](crate::pricing::night_service)).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StaticAttributes {
  pub address:            String,
  pub x_coord:            String,
  pub y_coord:            String,
  pub facility_type:      String,
  pub parking_system:     String,
  pub short_term_parking: String,
  pub free_parking:       String,
  pub night_parking:      String,
  pub decks:              String,
  pub gantry_height:      String,
  pub basement:           String,
}

/// One row of the metadata store, as loaded from the upstream source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataRow {
  pub facility_id: FacilityId,
  pub attrs:       StaticAttributes,
}

// ─── Pricing fields ──────────────────────────────────────────────────────────

/// Which rate cap is currently in force for a facility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CapKind {
  /// Night-parking-scheme cap, 22:30–07:00 at facilities offering it.
  #[serde(rename = "NPS_NIGHT_CAP")]
  Night,
  /// Daytime cap, 07:00–22:30.
  #[serde(rename = "DAY_CAP")]
  Day,
}

impl CapKind {
  pub fn as_str(&self) -> &'static str {
    match self {
      CapKind::Night => "NPS_NIGHT_CAP",
      CapKind::Day => "DAY_CAP",
    }
  }

  pub fn parse(s: &str) -> Result<Self> {
    match s {
      "NPS_NIGHT_CAP" => Ok(CapKind::Night),
      "DAY_CAP" => Ok(CapKind::Day),
      other => Err(Error::UnknownCapKind(other.to_owned())),
    }
  }
}
