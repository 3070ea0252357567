//! Ingestion drivers for the gantry pipeline.
//!
//! Each driver is a short-lived, single-threaded unit of work: pull from an
//! external source, apply one or more atomic store transactions, trigger the
//! view rebuild, publish audit artifacts. Drivers are plain structs over the
//! core traits — the store handle is injected per invocation, never global.

pub mod annotations;
pub mod datastore;
pub mod error;
pub mod export;
pub mod feed;
pub mod jobs;
pub mod publish;

pub use error::{Error, FetchError, Result};
pub use jobs::{
  AnnotationJob, AnnotationReport, AvailabilityJob, AvailabilityReport,
  MetadataJob, MetadataReport, PricingJob, PricingReport,
};

#[cfg(test)]
mod tests;
