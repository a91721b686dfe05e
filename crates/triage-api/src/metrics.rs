//! Handler for `GET /metrics`.

use std::sync::Arc;

use axum::{Json, extract::State};
use serde::Serialize;
use triage_core::{DefectTracker, metrics::DefectMetrics, store::DefectStore};

use crate::error::ApiError;

/// Full-precision metrics plus the one-decimal average for display.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
  #[serde(flatten)]
  pub metrics:                         DefectMetrics,
  pub average_resolution_days_display: Option<String>,
}

impl From<DefectMetrics> for MetricsResponse {
  fn from(metrics: DefectMetrics) -> Self {
    let average_resolution_days_display = metrics
      .rounded_average_resolution_days()
      .map(|days| format!("{days:.1}"));
    Self { metrics, average_resolution_days_display }
  }
}

/// `GET /metrics`
pub async fn handler<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
) -> Result<Json<MetricsResponse>, ApiError>
where
  S: DefectStore,
{
  let metrics = tracker.metrics().await?;
  Ok(Json(metrics.into()))
}
