//! Search criteria for [`DefectStore::search`](crate::store::DefectStore::search).

use crate::defect::{Defect, Priority, Severity, Status};

/// Equality filters over a bounded set of defect fields.
///
/// Criteria are ANDed; an absent criterion imposes no constraint, so the
/// default query matches every defect.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefectQuery {
  pub status:      Option<Status>,
  pub severity:    Option<Severity>,
  pub priority:    Option<Priority>,
  pub assigned_to: Option<String>,
  pub module:      Option<String>,
}

impl DefectQuery {
  pub fn with_status(mut self, status: Status) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_severity(mut self, severity: Severity) -> Self {
    self.severity = Some(severity);
    self
  }

  pub fn with_priority(mut self, priority: Priority) -> Self {
    self.priority = Some(priority);
    self
  }

  pub fn with_assignee(mut self, assignee: impl Into<String>) -> Self {
    self.assigned_to = Some(assignee.into());
    self
  }

  pub fn with_module(mut self, module: impl Into<String>) -> Self {
    self.module = Some(module.into());
    self
  }

  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Whether `defect` satisfies every criterion. Backends may push the
  /// filter down to storage but must agree with this predicate.
  pub fn matches(&self, defect: &Defect) -> bool {
    self.status.is_none_or(|s| defect.status == s)
      && self.severity.is_none_or(|s| defect.severity == s)
      && self.priority.is_none_or(|p| defect.priority == p)
      && self
        .assigned_to
        .as_deref()
        .is_none_or(|a| defect.assigned_to.as_deref() == Some(a))
      && self
        .module
        .as_deref()
        .is_none_or(|m| defect.module.as_deref() == Some(m))
  }
}
