//! Error types for `gantry-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A facility key was empty (or whitespace-only) after normalization.
  #[error("empty facility id: {0:?}")]
  EmptyFacilityId(String),

  #[error("unknown cap kind: {0:?}")]
  UnknownCapKind(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
