//! Aggregate statistics derived from the live defect collection.
//!
//! Nothing here is persisted; metrics are recomputed from scratch on every
//! call.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::defect::{Defect, Priority, Severity, Status};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// Counts by dimension plus resolution statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DefectMetrics {
  pub total:                   usize,
  pub by_status:               BTreeMap<Status, usize>,
  pub by_severity:             BTreeMap<Severity, usize>,
  pub by_priority:             BTreeMap<Priority, usize>,
  /// Only defects with a module tag are counted.
  pub by_module:               BTreeMap<String, usize>,
  /// Mean days from `found_date` to `closed_date` over closed defects, at
  /// full precision. `None` when no defect qualifies.
  pub average_resolution_days: Option<f64>,
  /// Defects whose current status is `Reopened`.
  pub reopened_count:          usize,
}

impl DefectMetrics {
  pub fn compute<'a>(defects: impl IntoIterator<Item = &'a Defect>) -> Self {
    let mut metrics = Self::default();
    let mut resolution_days_sum = 0.0;
    let mut resolved = 0usize;

    for defect in defects {
      metrics.total += 1;
      *metrics.by_status.entry(defect.status).or_default() += 1;
      *metrics.by_severity.entry(defect.severity).or_default() += 1;
      *metrics.by_priority.entry(defect.priority).or_default() += 1;
      if let Some(module) = &defect.module {
        *metrics.by_module.entry(module.clone()).or_default() += 1;
      }
      if defect.status == Status::Reopened {
        metrics.reopened_count += 1;
      }
      if let (Status::Closed, Some(closed)) = (defect.status, defect.closed_date) {
        let elapsed = closed - defect.found_date;
        resolution_days_sum += elapsed.num_milliseconds() as f64 / MILLIS_PER_DAY;
        resolved += 1;
      }
    }

    if resolved > 0 {
      metrics.average_resolution_days = Some(resolution_days_sum / resolved as f64);
    }
    metrics
  }

  /// The average resolution time rounded to one decimal place, for display.
  pub fn rounded_average_resolution_days(&self) -> Option<f64> {
    self
      .average_resolution_days
      .map(|days| (days * 10.0).round() / 10.0)
  }
}
