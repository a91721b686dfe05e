//! The append-only audit trail.
//!
//! Every tracked mutation of a defect writes exactly one [`HistoryEntry`].
//! Entries are never updated or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::defect::{DefectId, DefectPatch};

/// One persisted row of a defect's change history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
  pub entry_id:      i64,
  pub defect_id:     DefectId,
  pub changed_by:    String,
  /// Store-assigned at insert.
  pub change_date:   DateTime<Utc>,
  /// `None` for the creation marker.
  pub field_changed: Option<String>,
  /// Enum fields are recorded by label (`"In Progress"`, `"Major"`), not by
  /// their JSON code.
  pub old_value:     Option<String>,
  pub new_value:     Option<String>,
  pub comment:       Option<String>,
}

/// The caller-described part of a history row. `defect_id` and `change_date`
/// are filled in by the store.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Change {
  pub changed_by:    String,
  pub field_changed: Option<String>,
  pub old_value:     Option<String>,
  pub new_value:     Option<String>,
  pub comment:       Option<String>,
}

impl Change {
  pub fn field(
    changed_by: impl Into<String>,
    field: &str,
    old_value: Option<String>,
    new_value: Option<String>,
  ) -> Self {
    Self {
      changed_by: changed_by.into(),
      field_changed: Some(field.to_owned()),
      old_value,
      new_value,
      comment: None,
    }
  }

  pub fn with_comment(mut self, comment: Option<String>) -> Self {
    self.comment = comment;
    self
  }
}

/// A planned update: the patch to apply plus the audit row that records it.
///
/// `audit` is `None` only for the untracked resolution path (no actor given).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mutation {
  pub patch: DefectPatch,
  pub audit: Option<Change>,
}
