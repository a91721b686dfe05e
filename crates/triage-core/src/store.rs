//! The `DefectStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g. `triage-store-sqlite`).
//! Higher layers (`triage-api`, the [`DefectTracker`](crate::DefectTracker))
//! depend on this abstraction, not on any concrete backend.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::{
  defect::{Defect, DefectId, NewDefect},
  history::{HistoryEntry, Mutation},
  query::DefectQuery,
};

/// Abstraction over a durable defect record store.
///
/// Defects are never deleted. Every successful mutation writes the updated
/// row and its history entry in one atomic unit.
///
/// All methods return `Send` futures so the trait can be used in multi-threaded
/// async runtimes (e.g. tokio with `axum`).
pub trait DefectStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a new defect with status `New` together with its creation
  /// history entry. `id` and `found_date` are assigned by the store.
  fn create_defect(
    &self,
    input: NewDefect,
  ) -> impl Future<Output = Result<Defect, Self::Error>> + Send + '_;

  /// Retrieve a defect by id. Returns `None` if not found.
  fn get_defect(
    &self,
    id: DefectId,
  ) -> impl Future<Output = Result<Option<Defect>, Self::Error>> + Send + '_;

  /// Read the current row, let `plan` describe the change, then write the
  /// patched row and the audit entry atomically.
  ///
  /// `plan` receives the row as committed immediately before this write and
  /// the timestamp the store will use for the history entry. Mutations of the
  /// same id are serialized. Returns `None` (and writes nothing) if the defect
  /// does not exist.
  fn update_fields<F>(
    &self,
    id: DefectId,
    plan: F,
  ) -> impl Future<Output = Result<Option<Defect>, Self::Error>> + Send + '_
  where
    F: FnOnce(&Defect, DateTime<Utc>) -> Mutation + Send + 'static;

  /// History entries for a defect, oldest first. Returns `None` if the
  /// defect does not exist.
  fn list_history(
    &self,
    id: DefectId,
  ) -> impl Future<Output = Result<Option<Vec<HistoryEntry>>, Self::Error>> + Send + '_;

  /// All defects matching every criterion in `query`, ordered by id.
  fn search<'a>(
    &'a self,
    query: &'a DefectQuery,
  ) -> impl Future<Output = Result<Vec<Defect>, Self::Error>> + Send + 'a;
}
