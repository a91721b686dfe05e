//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings. Severity and priority are
//! stored as their ordinal codes, status as its display label.

use chrono::{DateTime, Utc};
use triage_core::{
  defect::{Defect, DefectId, Priority, Severity, Status},
  history::HistoryEntry,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── Status ──────────────────────────────────────────────────────────────────

pub fn encode_status(s: Status) -> &'static str { s.label() }

pub fn decode_status(s: &str) -> Result<Status> { Ok(s.parse()?) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Column list matching [`RawDefect::from_row`].
pub const DEFECT_COLUMNS: &str = "id, title, description, severity, priority, \
   status, module, found_by, assigned_to, found_date, fixed_date, \
   verified_date, closed_date, environment, steps_to_reproduce, \
   expected_result, actual_result, root_cause, resolution, test_case_id, \
   build_version";

/// Raw values read directly from a `defects` row.
pub struct RawDefect {
  pub id:                 i64,
  pub title:              String,
  pub description:        Option<String>,
  pub severity:           i64,
  pub priority:           i64,
  pub status:             String,
  pub module:             Option<String>,
  pub found_by:           String,
  pub assigned_to:        Option<String>,
  pub found_date:         String,
  pub fixed_date:         Option<String>,
  pub verified_date:      Option<String>,
  pub closed_date:        Option<String>,
  pub environment:        Option<String>,
  pub steps_to_reproduce: Option<String>,
  pub expected_result:    Option<String>,
  pub actual_result:      Option<String>,
  pub root_cause:         Option<String>,
  pub resolution:         Option<String>,
  pub test_case_id:       Option<String>,
  pub build_version:      Option<String>,
}

impl RawDefect {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:                 row.get(0)?,
      title:              row.get(1)?,
      description:        row.get(2)?,
      severity:           row.get(3)?,
      priority:           row.get(4)?,
      status:             row.get(5)?,
      module:             row.get(6)?,
      found_by:           row.get(7)?,
      assigned_to:        row.get(8)?,
      found_date:         row.get(9)?,
      fixed_date:         row.get(10)?,
      verified_date:      row.get(11)?,
      closed_date:        row.get(12)?,
      environment:        row.get(13)?,
      steps_to_reproduce: row.get(14)?,
      expected_result:    row.get(15)?,
      actual_result:      row.get(16)?,
      root_cause:         row.get(17)?,
      resolution:         row.get(18)?,
      test_case_id:       row.get(19)?,
      build_version:      row.get(20)?,
    })
  }

  pub fn into_defect(self) -> Result<Defect> {
    Ok(Defect {
      id:                 DefectId(self.id),
      title:              self.title,
      description:        self.description.unwrap_or_default(),
      severity:           Severity::from_ordinal(self.severity)?,
      priority:           Priority::from_ordinal(self.priority)?,
      status:             decode_status(&self.status)?,
      module:             self.module,
      found_by:           self.found_by,
      assigned_to:        self.assigned_to,
      found_date:         decode_dt(&self.found_date)?,
      fixed_date:         decode_opt_dt(self.fixed_date)?,
      verified_date:      decode_opt_dt(self.verified_date)?,
      closed_date:        decode_opt_dt(self.closed_date)?,
      environment:        self.environment,
      steps_to_reproduce: self.steps_to_reproduce,
      expected_result:    self.expected_result,
      actual_result:      self.actual_result,
      root_cause:         self.root_cause,
      resolution:         self.resolution,
      test_case_id:       self.test_case_id,
      build_version:      self.build_version,
    })
  }
}

/// Raw values read directly from a `defect_history` row.
pub struct RawHistoryEntry {
  pub id:            i64,
  pub defect_id:     i64,
  pub changed_by:    String,
  pub change_date:   String,
  pub field_changed: Option<String>,
  pub old_value:     Option<String>,
  pub new_value:     Option<String>,
  pub comment:       Option<String>,
}

impl RawHistoryEntry {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      defect_id:     row.get(1)?,
      changed_by:    row.get(2)?,
      change_date:   row.get(3)?,
      field_changed: row.get(4)?,
      old_value:     row.get(5)?,
      new_value:     row.get(6)?,
      comment:       row.get(7)?,
    })
  }

  pub fn into_entry(self) -> Result<HistoryEntry> {
    Ok(HistoryEntry {
      entry_id:      self.id,
      defect_id:     DefectId(self.defect_id),
      changed_by:    self.changed_by,
      change_date:   decode_dt(&self.change_date)?,
      field_changed: self.field_changed,
      old_value:     self.old_value,
      new_value:     self.new_value,
      comment:       self.comment,
    })
  }
}
