//! Lifecycle planning: turns an intent ("mark fixed", "assign to dev") into
//! the [`Mutation`] a store applies.
//!
//! The status machine is permissive. Any status may follow any other,
//! including itself; the planner only sequences side effects such as
//! stamping `fixed_date` the first time a defect enters `Fixed`. Every
//! function here is pure and receives the row as it stands inside the
//! store's transaction.

use chrono::{DateTime, Utc};

use crate::{
  defect::{Defect, DefectPatch, Priority, Severity, Status},
  history::{Change, Mutation},
};

pub const CREATED_COMMENT: &str = "Defect created";

/// The history entry written alongside every new defect.
pub fn creation_change(found_by: &str) -> Change {
  Change {
    changed_by:    found_by.to_owned(),
    field_changed: None,
    old_value:     None,
    new_value:     Some(Status::New.label().to_owned()),
    comment:       Some(CREATED_COMMENT.to_owned()),
  }
}

/// Move `current` to `to`, stamping the matching lifecycle date if it has
/// never been set.
pub fn plan_status_change(
  current: &Defect,
  to: Status,
  actor: &str,
  comment: Option<String>,
  now: DateTime<Utc>,
) -> Mutation {
  let mut patch = DefectPatch { status: Some(to), ..Default::default() };
  match to {
    Status::Fixed if current.fixed_date.is_none() => patch.fixed_date = Some(now),
    Status::Verified if current.verified_date.is_none() => {
      patch.verified_date = Some(now)
    }
    Status::Closed if current.closed_date.is_none() => patch.closed_date = Some(now),
    _ => {}
  }

  let audit = Change::field(
    actor,
    "status",
    Some(current.status.label().to_owned()),
    Some(to.label().to_owned()),
  )
  .with_comment(comment);

  Mutation { patch, audit: Some(audit) }
}

/// Hand `current` to `assignee`. A `New` defect also moves to `Assigned`;
/// one history entry covers both fields.
pub fn plan_assignment(
  current: &Defect,
  assignee: &str,
  assigned_by: &str,
  comment: Option<String>,
) -> Mutation {
  let patch = DefectPatch {
    assigned_to: Some(assignee.to_owned()),
    status: (current.status == Status::New).then_some(Status::Assigned),
    ..Default::default()
  };

  let audit = Change::field(
    assigned_by,
    "assigned_to",
    current.assigned_to.clone(),
    Some(assignee.to_owned()),
  )
  .with_comment(comment);

  Mutation { patch, audit: Some(audit) }
}

/// Record the resolution and root cause. Without `resolved_by` the update is
/// applied with no audit row.
pub fn plan_resolution(
  current: &Defect,
  resolution: &str,
  root_cause: Option<String>,
  resolved_by: Option<&str>,
) -> Mutation {
  let audit = resolved_by.map(|actor| {
    Change::field(
      actor,
      "resolution",
      current.resolution.clone(),
      Some(resolution.to_owned()),
    )
    .with_comment(root_cause.as_ref().map(|rc| format!("Root cause: {rc}")))
  });

  let patch = DefectPatch {
    resolution: Some(resolution.to_owned()),
    root_cause: Some(root_cause),
    ..Default::default()
  };

  Mutation { patch, audit }
}

/// New severity and/or priority for a defect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Classification {
  pub severity: Option<Severity>,
  pub priority: Option<Priority>,
}

impl Classification {
  pub fn is_empty(&self) -> bool { self.severity.is_none() && self.priority.is_none() }
}

/// Change severity and/or priority. Severity is the primary field of the
/// history entry when present; a priority change riding along is described in
/// the comment.
pub fn plan_reclassification(
  current: &Defect,
  to: Classification,
  actor: &str,
  comment: Option<String>,
) -> Mutation {
  let patch = DefectPatch {
    severity: to.severity,
    priority: to.priority,
    ..Default::default()
  };

  let priority_delta = to
    .priority
    .map(|p| format!("priority: {} -> {}", current.priority, p));

  let audit = match to.severity {
    Some(severity) => {
      let comment = match (comment, priority_delta) {
        (Some(c), Some(d)) => Some(format!("{c}; {d}")),
        (c, d) => c.or(d),
      };
      Change::field(
        actor,
        "severity",
        Some(current.severity.label().to_owned()),
        Some(severity.label().to_owned()),
      )
      .with_comment(comment)
    }
    None => Change::field(
      actor,
      "priority",
      Some(current.priority.label().to_owned()),
      to.priority.map(|p| p.label().to_owned()),
    )
    .with_comment(comment),
  };

  Mutation { patch, audit: Some(audit) }
}
