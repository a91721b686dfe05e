//! SQLite backend for the Triage defect tracker.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on dedicated
//! connection threads without blocking the async runtime. Every call on the
//! write connection runs to completion before the next starts, which
//! serializes mutations of the same defect. File-backed stores read through a
//! separate read-only connection, so searches do not wait for writers.

mod encode;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::SqliteStore;

#[cfg(test)]
mod tests;
