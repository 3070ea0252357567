//! Error types for `gantry-jobs`.
//!
//! A fetch failure aborts a cycle before any mutation; a store failure means
//! the transaction rolled back and the cycle is fatal. Publish failures are
//! handled inline (logged, never fatal) and do not appear here as a job
//! outcome.

use thiserror::Error;

/// External source failures — always pre-mutation, retried by the scheduler
/// on its own cadence.
#[derive(Debug, Error)]
pub enum FetchError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("unexpected status: {0}")]
  Status(reqwest::StatusCode),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),

  #[error("malformed source data: {0}")]
  Malformed(String),
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("fetch error: {0}")]
  Fetch(#[from] FetchError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("encode error: {0}")]
  Encode(#[from] serde_json::Error),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
