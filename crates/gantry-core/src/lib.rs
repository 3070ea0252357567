//! Core types and trait definitions for the gantry parking-data pipeline.
//!
//! Domain records, key normalization, the pure pricing rules and the
//! [`PipelineStore`](store::PipelineStore) contract live here. The crate
//! carries no HTTP or database dependencies; backends and drivers build on
//! top of it.

pub mod availability;
pub mod error;
pub mod facility;
pub mod forecast;
pub mod metadata;
pub mod pricing;
pub mod store;
pub mod view;

pub use error::{Error, Result};
pub use facility::FacilityId;
