//! Core types and trait definitions for the Triage defect tracker.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it; it depends on nothing proprietary.

pub mod defect;
pub mod error;
pub mod history;
pub mod lifecycle;
pub mod metrics;
pub mod query;
pub mod store;
pub mod tracker;

pub use error::{Error, Result, TrackerError};
pub use tracker::DefectTracker;
