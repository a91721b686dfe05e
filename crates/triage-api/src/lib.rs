//! JSON REST API for Triage.
//!
//! Exposes an axum [`Router`] backed by any [`triage_core::store::DefectStore`].
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", triage_api::api_router(tracker.clone()))
//! ```

pub mod defects;
pub mod error;
pub mod metrics;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use triage_core::{DefectTracker, store::DefectStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `tracker`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(tracker: Arc<DefectTracker<S>>) -> Router<()>
where
  S: DefectStore + 'static,
{
  Router::new()
    // Defects
    .route("/defects", get(defects::list::<S>).post(defects::create::<S>))
    .route("/defects/{id}", get(defects::get_one::<S>))
    .route("/defects/{id}/status", post(defects::update_status::<S>))
    .route("/defects/{id}/assign", post(defects::assign::<S>))
    .route("/defects/{id}/resolution", post(defects::add_resolution::<S>))
    .route("/defects/{id}/classification", post(defects::reclassify::<S>))
    .route("/defects/{id}/history", get(defects::history::<S>))
    // Metrics
    .route("/metrics", get(metrics::handler::<S>))
    .with_state(tracker)
}
