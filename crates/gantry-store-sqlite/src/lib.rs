//! SQLite backend for the gantry pipeline store.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. One writer, many readers: WAL journal
//! with a bounded busy timeout; every write path is a single `BEGIN
//! IMMEDIATE` transaction.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;
