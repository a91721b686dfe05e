//! [`DefectTracker`] — the operation surface consumed by the API and any
//! other shell.
//!
//! Writes flow tracker → lifecycle planner → store. Reads (search, history,
//! metrics) go straight to the store. The tracker owns no state besides its
//! store handle.

use tracing::{debug, info, warn};

use crate::{
  defect::{Defect, DefectId, NewDefect, Status},
  error::TrackerError,
  history::HistoryEntry,
  lifecycle::{self, Classification},
  metrics::DefectMetrics,
  query::DefectQuery,
  store::DefectStore,
};

pub type TrackerResult<T, S> = Result<T, TrackerError<<S as DefectStore>::Error>>;

/// Defect lifecycle operations over an injected [`DefectStore`].
///
/// Cloning is as cheap as cloning the store.
#[derive(Debug, Clone)]
pub struct DefectTracker<S> {
  store: S,
}

impl<S: DefectStore> DefectTracker<S> {
  pub fn new(store: S) -> Self { Self { store } }

  pub fn store(&self) -> &S { &self.store }

  // ── Writes ──────────────────────────────────────────────────────────────

  /// Validate and persist a new defect; it starts in `New` with a single
  /// creation history entry.
  pub async fn create_defect(&self, input: NewDefect) -> TrackerResult<Defect, S> {
    const OP: &str = "create_defect";
    input
      .validate()
      .map_err(|source| TrackerError::Invalid { operation: OP, source })?;

    let defect = self
      .store
      .create_defect(input)
      .await
      .map_err(|source| TrackerError::Store { operation: OP, source })?;

    info!(
      id = %defect.id,
      severity = %defect.severity,
      priority = %defect.priority,
      found_by = %defect.found_by,
      "defect created"
    );
    Ok(defect)
  }

  /// Move a defect to `status`. Every transition is allowed, including to
  /// the current status.
  pub async fn update_status(
    &self,
    id: DefectId,
    status: Status,
    actor: &str,
    comment: Option<String>,
  ) -> TrackerResult<Defect, S> {
    let actor_owned = actor.to_owned();
    let defect = self
      .mutate("update_status", id, move |current, now| {
        lifecycle::plan_status_change(current, status, &actor_owned, comment, now)
      })
      .await?;

    info!(%id, %status, actor, "status updated");
    Ok(defect)
  }

  /// Assign a defect; a `New` defect also becomes `Assigned`.
  pub async fn assign(
    &self,
    id: DefectId,
    assignee: &str,
    assigned_by: &str,
    comment: Option<String>,
  ) -> TrackerResult<Defect, S> {
    let assignee_owned = assignee.to_owned();
    let actor_owned = assigned_by.to_owned();
    let defect = self
      .mutate("assign", id, move |current, _| {
        lifecycle::plan_assignment(current, &assignee_owned, &actor_owned, comment)
      })
      .await?;

    info!(%id, assignee, actor = assigned_by, status = %defect.status, "defect assigned");
    Ok(defect)
  }

  /// Record resolution details. When `resolved_by` is `None` the change is
  /// not audited.
  pub async fn add_resolution(
    &self,
    id: DefectId,
    resolution: &str,
    root_cause: Option<String>,
    resolved_by: Option<&str>,
  ) -> TrackerResult<Defect, S> {
    let resolution_owned = resolution.to_owned();
    let actor_owned = resolved_by.map(str::to_owned);
    let defect = self
      .mutate("add_resolution", id, move |current, _| {
        lifecycle::plan_resolution(
          current,
          &resolution_owned,
          root_cause,
          actor_owned.as_deref(),
        )
      })
      .await?;

    match resolved_by {
      Some(actor) => info!(%id, actor, "resolution recorded"),
      None => warn!(%id, "resolution recorded without an actor; no history entry written"),
    }
    Ok(defect)
  }

  /// Change severity and/or priority with a single history entry.
  pub async fn reclassify(
    &self,
    id: DefectId,
    to: Classification,
    actor: &str,
    comment: Option<String>,
  ) -> TrackerResult<Defect, S> {
    const OP: &str = "reclassify";
    if to.is_empty() {
      return Err(TrackerError::Invalid {
        operation: OP,
        source:    crate::Error::EmptyReclassification,
      });
    }

    let actor_owned = actor.to_owned();
    let defect = self
      .mutate(OP, id, move |current, _| {
        lifecycle::plan_reclassification(current, to, &actor_owned, comment)
      })
      .await?;

    info!(%id, severity = %defect.severity, priority = %defect.priority, actor, "defect reclassified");
    Ok(defect)
  }

  async fn mutate<F>(
    &self,
    operation: &'static str,
    id: DefectId,
    plan: F,
  ) -> TrackerResult<Defect, S>
  where
    F: FnOnce(&Defect, chrono::DateTime<chrono::Utc>) -> crate::history::Mutation
      + Send
      + 'static,
  {
    match self.store.update_fields(id, plan).await {
      Ok(Some(defect)) => Ok(defect),
      Ok(None) => {
        warn!(%id, operation, "defect not found");
        Err(TrackerError::NotFound { operation, id })
      }
      Err(source) => Err(TrackerError::Store { operation, source }),
    }
  }

  // ── Reads ───────────────────────────────────────────────────────────────

  pub async fn get_defect(&self, id: DefectId) -> TrackerResult<Defect, S> {
    const OP: &str = "get_defect";
    self
      .store
      .get_defect(id)
      .await
      .map_err(|source| TrackerError::Store { operation: OP, source })?
      .ok_or(TrackerError::NotFound { operation: OP, id })
  }

  /// Defects matching every criterion; all defects for an empty query.
  pub async fn search(&self, query: &DefectQuery) -> TrackerResult<Vec<Defect>, S> {
    let defects = self
      .store
      .search(query)
      .await
      .map_err(|source| TrackerError::Store { operation: "search", source })?;
    debug!(?query, matched = defects.len(), "search");
    Ok(defects)
  }

  /// The audit trail of a defect, oldest first.
  pub async fn history(&self, id: DefectId) -> TrackerResult<Vec<HistoryEntry>, S> {
    const OP: &str = "get_history";
    self
      .store
      .list_history(id)
      .await
      .map_err(|source| TrackerError::Store { operation: OP, source })?
      .ok_or(TrackerError::NotFound { operation: OP, id })
  }

  /// Aggregate statistics over every defect in the store.
  pub async fn metrics(&self) -> TrackerResult<DefectMetrics, S> {
    let all = DefectQuery::default();
    let defects = self
      .store
      .search(&all)
      .await
      .map_err(|source| TrackerError::Store { operation: "metrics", source })?;
    let metrics = DefectMetrics::compute(&defects);
    debug!(total = metrics.total, "metrics computed");
    Ok(metrics)
  }
}
