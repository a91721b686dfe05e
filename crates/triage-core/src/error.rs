//! Error types for `triage-core`.

use thiserror::Error;

use crate::defect::DefectId;

#[derive(Debug, Error)]
pub enum Error {
  #[error("required field is missing or empty: {0}")]
  MissingField(&'static str),

  #[error("unknown severity: {0:?}")]
  UnknownSeverity(String),

  #[error("unknown priority: {0:?}")]
  UnknownPriority(String),

  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("reclassification must change severity, priority, or both")]
  EmptyReclassification,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An error returned by a [`DefectTracker`](crate::tracker::DefectTracker)
/// operation. Every variant names the operation that failed so callers can
/// log or retry with context.
#[derive(Debug, Error)]
pub enum TrackerError<E> {
  /// The input was rejected before anything was written.
  #[error("{operation}: {source}")]
  Invalid {
    operation: &'static str,
    #[source]
    source:    Error,
  },

  /// The referenced defect does not exist; nothing was written.
  #[error("{operation}: defect {id} not found")]
  NotFound { operation: &'static str, id: DefectId },

  /// The backing store failed. Propagated unchanged; no retry is attempted.
  #[error("{operation}: store error: {source}")]
  Store {
    operation: &'static str,
    #[source]
    source:    E,
  },
}

impl<E> TrackerError<E> {
  pub fn is_not_found(&self) -> bool { matches!(self, Self::NotFound { .. }) }

  pub fn operation(&self) -> &'static str {
    match self {
      Self::Invalid { operation, .. }
      | Self::NotFound { operation, .. }
      | Self::Store { operation, .. } => operation,
    }
  }
}
