//! Handlers for `/defects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/defects` | Optional `status`, `severity`, `priority`, `assigned_to`, `module` |
//! | `POST` | `/defects` | Body: [`NewDefect`]; returns 201 + stored defect |
//! | `GET`  | `/defects/:id` | 404 if not found |
//! | `POST` | `/defects/:id/status` | Body: [`StatusBody`] |
//! | `POST` | `/defects/:id/assign` | Body: [`AssignBody`] |
//! | `POST` | `/defects/:id/resolution` | Body: [`ResolutionBody`] |
//! | `POST` | `/defects/:id/classification` | Body: [`ClassificationBody`] |
//! | `GET`  | `/defects/:id/history` | Oldest entry first |
//!
//! Enum fields of a defect serialise as lower/snake-case codes
//! (`"in_progress"`), while history `old_value`/`new_value` carry display
//! labels (`"In Progress"`). Query params accept either; JSON bodies take
//! the code.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use triage_core::{
  DefectTracker,
  defect::{Defect, DefectId, NewDefect, Priority, Severity, Status},
  history::HistoryEntry,
  lifecycle::Classification,
  query::DefectQuery,
  store::DefectStore,
};

use crate::error::ApiError;

// ─── Search ───────────────────────────────────────────────────────────────────

/// Query params for `GET /defects`. Enum values accept labels (`"In
/// Progress"`, `"major"`) or, for severity and priority, ordinal codes.
#[derive(Debug, Deserialize, Default)]
pub struct SearchParams {
  pub status:      Option<String>,
  pub severity:    Option<String>,
  pub priority:    Option<String>,
  pub assigned_to: Option<String>,
  pub module:      Option<String>,
}

impl TryFrom<SearchParams> for DefectQuery {
  type Error = ApiError;

  fn try_from(params: SearchParams) -> Result<Self, ApiError> {
    fn parse<T: std::str::FromStr<Err = triage_core::Error>>(
      raw: Option<String>,
    ) -> Result<Option<T>, ApiError> {
      raw
        .map(|s| s.parse::<T>())
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    Ok(DefectQuery {
      status:      parse::<Status>(params.status)?,
      severity:    parse::<Severity>(params.severity)?,
      priority:    parse::<Priority>(params.priority)?,
      assigned_to: params.assigned_to,
      module:      params.module,
    })
  }
}

/// `GET /defects[?status=...][&severity=...][&priority=...][&assigned_to=...][&module=...]`
pub async fn list<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Defect>>, ApiError>
where
  S: DefectStore,
{
  let query = DefectQuery::try_from(params)?;
  Ok(Json(tracker.search(&query).await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /defects`
pub async fn create<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Json(body): Json<NewDefect>,
) -> Result<impl IntoResponse, ApiError>
where
  S: DefectStore,
{
  let defect = tracker.create_defect(body).await?;
  Ok((StatusCode::CREATED, Json(defect)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /defects/:id`
pub async fn get_one<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Path(id): Path<DefectId>,
) -> Result<Json<Defect>, ApiError>
where
  S: DefectStore,
{
  Ok(Json(tracker.get_defect(id).await?))
}

// ─── Status ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status:  Status,
  pub actor:   String,
  pub comment: Option<String>,
}

/// `POST /defects/:id/status` — body: `{"status":"fixed","actor":"dev"}`
pub async fn update_status<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Path(id): Path<DefectId>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Defect>, ApiError>
where
  S: DefectStore,
{
  let defect = tracker
    .update_status(id, body.status, &body.actor, body.comment)
    .await?;
  Ok(Json(defect))
}

// ─── Assign ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AssignBody {
  pub assignee:    String,
  pub assigned_by: String,
  pub comment:     Option<String>,
}

/// `POST /defects/:id/assign`
pub async fn assign<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Path(id): Path<DefectId>,
  Json(body): Json<AssignBody>,
) -> Result<Json<Defect>, ApiError>
where
  S: DefectStore,
{
  let defect = tracker
    .assign(id, &body.assignee, &body.assigned_by, body.comment)
    .await?;
  Ok(Json(defect))
}

// ─── Resolution ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ResolutionBody {
  pub resolution:  String,
  pub root_cause:  Option<String>,
  /// Omitting this skips the history entry.
  pub resolved_by: Option<String>,
}

/// `POST /defects/:id/resolution`
pub async fn add_resolution<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Path(id): Path<DefectId>,
  Json(body): Json<ResolutionBody>,
) -> Result<Json<Defect>, ApiError>
where
  S: DefectStore,
{
  let defect = tracker
    .add_resolution(
      id,
      &body.resolution,
      body.root_cause,
      body.resolved_by.as_deref(),
    )
    .await?;
  Ok(Json(defect))
}

// ─── Classification ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClassificationBody {
  pub severity: Option<Severity>,
  pub priority: Option<Priority>,
  pub actor:    String,
  pub comment:  Option<String>,
}

/// `POST /defects/:id/classification`
pub async fn reclassify<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Path(id): Path<DefectId>,
  Json(body): Json<ClassificationBody>,
) -> Result<Json<Defect>, ApiError>
where
  S: DefectStore,
{
  let to = Classification { severity: body.severity, priority: body.priority };
  let defect = tracker.reclassify(id, to, &body.actor, body.comment).await?;
  Ok(Json(defect))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /defects/:id/history`
pub async fn history<S>(
  State(tracker): State<Arc<DefectTracker<S>>>,
  Path(id): Path<DefectId>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: DefectStore,
{
  Ok(Json(tracker.history(id).await?))
}
