//! Defect types — the unit of record in the tracker.
//!
//! A defect is created once and then only changed through the tracked
//! operations of the [`DefectTracker`](crate::tracker::DefectTracker). Every
//! change is described by a [`DefectPatch`] and applied atomically together
//! with its audit row.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

// ─── Identity ────────────────────────────────────────────────────────────────

/// Store-generated, monotonic identifier. Never reused.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct DefectId(pub i64);

impl fmt::Display for DefectId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<i64> for DefectId {
  fn from(id: i64) -> Self { Self(id) }
}

// ─── Severity ────────────────────────────────────────────────────────────────

/// Impact classification. The ordinal is the stored code; lower is worse.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
  /// System crash, data loss, security breach.
  Critical,
  /// Major functionality broken, workaround difficult.
  Major,
  /// Functionality impaired, workaround exists.
  Moderate,
  /// Cosmetic or minor inconvenience.
  Minor,
  /// Suggestion or enhancement.
  Trivial,
}

impl Severity {
  pub const ALL: [Self; 5] = [
    Self::Critical,
    Self::Major,
    Self::Moderate,
    Self::Minor,
    Self::Trivial,
  ];

  pub fn ordinal(self) -> i64 {
    match self {
      Self::Critical => 1,
      Self::Major => 2,
      Self::Moderate => 3,
      Self::Minor => 4,
      Self::Trivial => 5,
    }
  }

  pub fn from_ordinal(code: i64) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|s| s.ordinal() == code)
      .ok_or_else(|| Error::UnknownSeverity(code.to_string()))
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Critical => "Critical",
      Self::Major => "Major",
      Self::Moderate => "Moderate",
      Self::Minor => "Minor",
      Self::Trivial => "Trivial",
    }
  }
}

impl fmt::Display for Severity {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for Severity {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    if let Ok(code) = s.parse::<i64>() {
      return Self::from_ordinal(code);
    }
    Self::ALL
      .into_iter()
      .find(|v| v.label().eq_ignore_ascii_case(s))
      .ok_or_else(|| Error::UnknownSeverity(s.to_owned()))
  }
}

// ─── Priority ────────────────────────────────────────────────────────────────

/// Scheduling urgency, independent of [`Severity`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
  /// Fix immediately.
  Immediate,
  /// Fix in the current iteration.
  High,
  /// Fix in the next iteration.
  Medium,
  /// Fix when time permits.
  Low,
}

impl Priority {
  pub const ALL: [Self; 4] = [Self::Immediate, Self::High, Self::Medium, Self::Low];

  pub fn ordinal(self) -> i64 {
    match self {
      Self::Immediate => 1,
      Self::High => 2,
      Self::Medium => 3,
      Self::Low => 4,
    }
  }

  pub fn from_ordinal(code: i64) -> Result<Self> {
    Self::ALL
      .into_iter()
      .find(|p| p.ordinal() == code)
      .ok_or_else(|| Error::UnknownPriority(code.to_string()))
  }

  pub fn label(self) -> &'static str {
    match self {
      Self::Immediate => "Immediate",
      Self::High => "High",
      Self::Medium => "Medium",
      Self::Low => "Low",
    }
  }
}

impl fmt::Display for Priority {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for Priority {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self> {
    let s = s.trim();
    if let Ok(code) = s.parse::<i64>() {
      return Self::from_ordinal(code);
    }
    Self::ALL
      .into_iter()
      .find(|v| v.label().eq_ignore_ascii_case(s))
      .ok_or_else(|| Error::UnknownPriority(s.to_owned()))
  }
}

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle state. Transitions are permissive: any status may follow any
/// other.
///
/// Two spellings exist. Serde (the JSON API) uses the snake-case code
/// (`"in_progress"`); the database column and history `old_value` /
/// `new_value` use [`label`](Self::label) (`"In Progress"`). [`FromStr`]
/// accepts both, so either can be mapped back to the variant.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Status {
  New,
  Open,
  Assigned,
  InProgress,
  Fixed,
  Verified,
  Closed,
  Reopened,
  Deferred,
  Rejected,
}

impl Status {
  pub const ALL: [Self; 10] = [
    Self::New,
    Self::Open,
    Self::Assigned,
    Self::InProgress,
    Self::Fixed,
    Self::Verified,
    Self::Closed,
    Self::Reopened,
    Self::Deferred,
    Self::Rejected,
  ];

  /// The label stored in the `status` column and written to history rows.
  pub fn label(self) -> &'static str {
    match self {
      Self::New => "New",
      Self::Open => "Open",
      Self::Assigned => "Assigned",
      Self::InProgress => "In Progress",
      Self::Fixed => "Fixed",
      Self::Verified => "Verified",
      Self::Closed => "Closed",
      Self::Reopened => "Reopened",
      Self::Deferred => "Deferred",
      Self::Rejected => "Rejected",
    }
  }

  /// Closed and rejected defects are dead but stay queryable.
  pub fn is_terminal(self) -> bool { matches!(self, Self::Closed | Self::Rejected) }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.label())
  }
}

impl FromStr for Status {
  type Err = Error;

  /// Accepts the stored label as well as snake-case and kebab-case spellings,
  /// ignoring ASCII case.
  fn from_str(s: &str) -> Result<Self> {
    let normalized: String = s
      .trim()
      .chars()
      .filter(|c| !matches!(c, ' ' | '_' | '-'))
      .collect();
    Self::ALL
      .into_iter()
      .find(|v| v.label().replace(' ', "").eq_ignore_ascii_case(&normalized))
      .ok_or_else(|| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Defect ──────────────────────────────────────────────────────────────────

/// A recorded quality issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Defect {
  pub id:                 DefectId,
  pub title:              String,
  pub description:        String,
  pub severity:           Severity,
  pub priority:           Priority,
  pub status:             Status,
  /// Free-form component tag.
  pub module:             Option<String>,
  pub found_by:           String,
  pub assigned_to:        Option<String>,
  /// Store-assigned at creation; never changes.
  pub found_date:         DateTime<Utc>,
  /// Set the first time the status enters `Fixed`.
  pub fixed_date:         Option<DateTime<Utc>>,
  /// Set the first time the status enters `Verified`.
  pub verified_date:      Option<DateTime<Utc>>,
  /// Set the first time the status enters `Closed`.
  pub closed_date:        Option<DateTime<Utc>>,
  pub environment:        Option<String>,
  pub steps_to_reproduce: Option<String>,
  pub expected_result:    Option<String>,
  pub actual_result:      Option<String>,
  pub root_cause:         Option<String>,
  pub resolution:         Option<String>,
  pub test_case_id:       Option<String>,
  pub build_version:      Option<String>,
}

// ─── NewDefect ───────────────────────────────────────────────────────────────

/// Input to [`crate::store::DefectStore::create_defect`].
///
/// `id`, `found_date` and `status` are always assigned by the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewDefect {
  pub title:              String,
  #[serde(default)]
  pub description:        String,
  pub severity:           Severity,
  pub priority:           Priority,
  pub found_by:           String,
  #[serde(default)]
  pub module:             Option<String>,
  #[serde(default)]
  pub environment:        Option<String>,
  #[serde(default)]
  pub steps_to_reproduce: Option<String>,
  #[serde(default)]
  pub expected_result:    Option<String>,
  #[serde(default)]
  pub actual_result:      Option<String>,
  #[serde(default)]
  pub test_case_id:       Option<String>,
  #[serde(default)]
  pub build_version:      Option<String>,
}

impl NewDefect {
  /// Convenience constructor with all optional fields unset.
  pub fn new(
    title: impl Into<String>,
    description: impl Into<String>,
    severity: Severity,
    priority: Priority,
    found_by: impl Into<String>,
  ) -> Self {
    Self {
      title: title.into(),
      description: description.into(),
      severity,
      priority,
      found_by: found_by.into(),
      module: None,
      environment: None,
      steps_to_reproduce: None,
      expected_result: None,
      actual_result: None,
      test_case_id: None,
      build_version: None,
    }
  }

  pub fn with_module(mut self, module: impl Into<String>) -> Self {
    self.module = Some(module.into());
    self
  }

  /// Reject inputs whose required text fields are blank. Severity and
  /// priority are enforced by their types.
  pub fn validate(&self) -> Result<()> {
    if self.title.trim().is_empty() {
      return Err(Error::MissingField("title"));
    }
    if self.found_by.trim().is_empty() {
      return Err(Error::MissingField("found_by"));
    }
    Ok(())
  }

  /// Build the persisted defect once the store has assigned identity.
  pub fn into_defect(self, id: DefectId, found_date: DateTime<Utc>) -> Defect {
    Defect {
      id,
      title: self.title,
      description: self.description,
      severity: self.severity,
      priority: self.priority,
      status: Status::New,
      module: self.module,
      found_by: self.found_by,
      assigned_to: None,
      found_date,
      fixed_date: None,
      verified_date: None,
      closed_date: None,
      environment: self.environment,
      steps_to_reproduce: self.steps_to_reproduce,
      expected_result: self.expected_result,
      actual_result: self.actual_result,
      root_cause: None,
      resolution: None,
      test_case_id: self.test_case_id,
      build_version: self.build_version,
    }
  }
}

// ─── DefectPatch ─────────────────────────────────────────────────────────────

/// A field-level change to a defect. Only the mutable fields appear here;
/// `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefectPatch {
  pub status:        Option<Status>,
  pub severity:      Option<Severity>,
  pub priority:      Option<Priority>,
  pub assigned_to:   Option<String>,
  pub fixed_date:    Option<DateTime<Utc>>,
  pub verified_date: Option<DateTime<Utc>>,
  pub closed_date:   Option<DateTime<Utc>>,
  pub resolution:    Option<String>,
  /// `Some(None)` clears the root cause.
  pub root_cause:    Option<Option<String>>,
}

impl DefectPatch {
  pub fn is_empty(&self) -> bool { *self == Self::default() }

  /// Apply the patch in place.
  pub fn apply(self, defect: &mut Defect) {
    if let Some(status) = self.status {
      defect.status = status;
    }
    if let Some(severity) = self.severity {
      defect.severity = severity;
    }
    if let Some(priority) = self.priority {
      defect.priority = priority;
    }
    if let Some(assignee) = self.assigned_to {
      defect.assigned_to = Some(assignee);
    }
    if let Some(at) = self.fixed_date {
      defect.fixed_date = Some(at);
    }
    if let Some(at) = self.verified_date {
      defect.verified_date = Some(at);
    }
    if let Some(at) = self.closed_date {
      defect.closed_date = Some(at);
    }
    if let Some(resolution) = self.resolution {
      defect.resolution = Some(resolution);
    }
    if let Some(root_cause) = self.root_cause {
      defect.root_cause = root_cause;
    }
  }
}
