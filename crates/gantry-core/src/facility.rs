//! Facility key — the normalized join key shared by every store.
//!
//! Upstream feeds disagree on casing and padding for the same physical
//! carpark, so the key is normalized (trimmed, uppercased) at every boundary
//! and never stored raw.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A normalized parking-facility identifier.
///
/// Construction trims surrounding whitespace and uppercases; an identifier
/// that is empty after normalization is rejected.
#[derive(
  Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FacilityId(String);

impl FacilityId {
  pub fn new(raw: &str) -> Result<Self> {
    let normalized = raw.trim().to_uppercase();
    if normalized.is_empty() {
      return Err(Error::EmptyFacilityId(raw.to_owned()));
    }
    Ok(Self(normalized))
  }

  pub fn as_str(&self) -> &str { &self.0 }

  pub fn into_string(self) -> String { self.0 }
}

impl fmt::Display for FacilityId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl std::str::FromStr for FacilityId {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> { Self::new(s) }
}
