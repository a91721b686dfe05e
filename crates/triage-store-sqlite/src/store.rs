//! [`SqliteStore`] — the SQLite implementation of [`DefectStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OpenFlags, OptionalExtension as _, TransactionBehavior, types::Value};

use triage_core::{
  defect::{Defect, DefectId, NewDefect, Status},
  history::{Change, HistoryEntry, Mutation},
  lifecycle::creation_change,
  query::DefectQuery,
  store::DefectStore,
};

use crate::{
  Result,
  encode::{DEFECT_COLUMNS, RawDefect, RawHistoryEntry, encode_dt, encode_status},
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A defect store backed by a single SQLite file.
///
/// Writes go through `conn`; reads go through `reader`, a second read-only
/// connection, so a full-table search never queues behind a mutation. WAL
/// mode lets the reader see the last committed state while a write is in
/// flight. In-memory stores share one connection for both.
///
/// Cloning is cheap — the inner connections are reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn:   tokio_rusqlite::Connection,
  reader: tokio_rusqlite::Connection,
}

impl std::fmt::Debug for SqliteStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SqliteStore").finish_non_exhaustive()
  }
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let path = path.as_ref();
    tracing::debug!(path = %path.display(), "opening defect store");
    let conn = tokio_rusqlite::Connection::open(path).await?;
    init_schema(&conn).await?;

    // Opened after the schema exists; a read-only handle cannot create it.
    let reader = tokio_rusqlite::Connection::open_with_flags(
      path,
      OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .await?;
    Ok(Self { conn, reader })
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    init_schema(&conn).await?;
    Ok(Self { reader: conn.clone(), conn })
  }

  /// Total rows in `defect_history` across all defects.
  #[cfg(test)]
  pub(crate) async fn history_row_count(&self) -> i64 {
    self
      .conn
      .call(|conn| {
        Ok(conn.query_row("SELECT COUNT(*) FROM defect_history", [], |r| r.get(0))?)
      })
      .await
      .expect("count history rows")
  }

  /// Run arbitrary SQL on the write connection, e.g. to install a trigger
  /// that makes the next write fail.
  #[cfg(test)]
  pub(crate) async fn execute_batch(&self, sql: &'static str) {
    self
      .conn
      .call(move |conn| Ok(conn.execute_batch(sql)?))
      .await
      .expect("execute test sql")
  }
}

async fn init_schema(conn: &tokio_rusqlite::Connection) -> Result<()> {
  conn
    .call(|conn| {
      conn.execute_batch(SCHEMA)?;
      Ok(())
    })
    .await?;
  Ok(())
}

// ─── Row helpers (run on the connection thread) ─────────────────────────────

fn select_defect(
  conn: &rusqlite::Connection,
  id: i64,
) -> rusqlite::Result<Option<RawDefect>> {
  conn
    .query_row(
      &format!("SELECT {DEFECT_COLUMNS} FROM defects WHERE id = ?1"),
      rusqlite::params![id],
      RawDefect::from_row,
    )
    .optional()
}

/// Write back the columns a [`triage_core::defect::DefectPatch`] can touch.
fn write_mutable_columns(
  conn: &rusqlite::Connection,
  defect: &Defect,
) -> rusqlite::Result<()> {
  conn.execute(
    "UPDATE defects SET
       severity = ?1, priority = ?2, status = ?3, assigned_to = ?4,
       fixed_date = ?5, verified_date = ?6, closed_date = ?7,
       root_cause = ?8, resolution = ?9
     WHERE id = ?10",
    rusqlite::params![
      defect.severity.ordinal(),
      defect.priority.ordinal(),
      encode_status(defect.status),
      defect.assigned_to,
      defect.fixed_date.map(encode_dt),
      defect.verified_date.map(encode_dt),
      defect.closed_date.map(encode_dt),
      defect.root_cause,
      defect.resolution,
      defect.id.0,
    ],
  )?;
  Ok(())
}

fn insert_history(
  conn: &rusqlite::Connection,
  defect_id: i64,
  change: &Change,
  change_date: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO defect_history (
       defect_id, changed_by, change_date, field_changed,
       old_value, new_value, comment
     ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
    rusqlite::params![
      defect_id,
      change.changed_by,
      change_date,
      change.field_changed,
      change.old_value,
      change.new_value,
      change.comment,
    ],
  )?;
  Ok(())
}

/// Translate a query into a WHERE clause with numbered parameters.
fn where_clause(query: &DefectQuery) -> (String, Vec<Value>) {
  let mut conds: Vec<String> = vec![];
  let mut params: Vec<Value> = vec![];

  let mut push = |column: &str, value: Value| {
    params.push(value);
    conds.push(format!("{column} = ?{}", params.len()));
  };

  if let Some(status) = query.status {
    push("status", Value::Text(encode_status(status).to_owned()));
  }
  if let Some(severity) = query.severity {
    push("severity", Value::Integer(severity.ordinal()));
  }
  if let Some(priority) = query.priority {
    push("priority", Value::Integer(priority.ordinal()));
  }
  if let Some(assignee) = &query.assigned_to {
    push("assigned_to", Value::Text(assignee.clone()));
  }
  if let Some(module) = &query.module {
    push("module", Value::Text(module.clone()));
  }

  let clause = if conds.is_empty() {
    String::new()
  } else {
    format!("WHERE {}", conds.join(" AND "))
  };
  (clause, params)
}

// ─── DefectStore impl ────────────────────────────────────────────────────────

impl DefectStore for SqliteStore {
  type Error = crate::Error;

  async fn create_defect(&self, input: NewDefect) -> Result<Defect> {
    input.validate()?;

    let creation = creation_change(&input.found_by);

    let defect = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        // Stamped under the write lock so found_date follows id order.
        let found_date = Utc::now();
        let found_str = encode_dt(found_date);
        tx.execute(
          "INSERT INTO defects (
             title, description, severity, priority, status,
             module, found_by, found_date, environment,
             steps_to_reproduce, expected_result, actual_result,
             test_case_id, build_version
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
          rusqlite::params![
            input.title,
            input.description,
            input.severity.ordinal(),
            input.priority.ordinal(),
            encode_status(Status::New),
            input.module,
            input.found_by,
            found_str,
            input.environment,
            input.steps_to_reproduce,
            input.expected_result,
            input.actual_result,
            input.test_case_id,
            input.build_version,
          ],
        )?;
        let id = tx.last_insert_rowid();
        insert_history(&tx, id, &creation, &found_str)?;
        tx.commit()?;
        Ok(input.into_defect(DefectId(id), found_date))
      })
      .await?;

    Ok(defect)
  }

  async fn get_defect(&self, id: DefectId) -> Result<Option<Defect>> {
    let raw = self
      .reader
      .call(move |conn| Ok(select_defect(conn, id.0)?))
      .await?;

    raw.map(RawDefect::into_defect).transpose()
  }

  async fn update_fields<F>(&self, id: DefectId, plan: F) -> Result<Option<Defect>>
  where
    F: FnOnce(&Defect, DateTime<Utc>) -> Mutation + Send + 'static,
  {
    // The inner result carries decode failures; the transaction is dropped
    // (rolled back) on every early return.
    let outcome: Result<Option<Defect>> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let Some(raw) = select_defect(&tx, id.0)? else {
          return Ok(Ok(None));
        };
        let current = match raw.into_defect() {
          Ok(defect) => defect,
          Err(e) => return Ok(Err(e)),
        };

        let now = Utc::now();
        let Mutation { patch, audit } = plan(&current, now);
        let mut updated = current;
        patch.apply(&mut updated);

        write_mutable_columns(&tx, &updated)?;
        if let Some(change) = audit {
          insert_history(&tx, id.0, &change, &encode_dt(now))?;
        }
        tx.commit()?;
        Ok(Ok(Some(updated)))
      })
      .await?;

    outcome
  }

  async fn list_history(&self, id: DefectId) -> Result<Option<Vec<HistoryEntry>>> {
    let raws: Option<Vec<RawHistoryEntry>> = self
      .reader
      .call(move |conn| {
        // One read transaction so the existence check and the rows agree.
        let tx = conn.transaction()?;
        let exists = tx
          .query_row(
            "SELECT 1 FROM defects WHERE id = ?1",
            rusqlite::params![id.0],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !exists {
          return Ok(None);
        }

        let rows = {
          let mut stmt = tx.prepare(
            "SELECT id, defect_id, changed_by, change_date, field_changed,
                    old_value, new_value, comment
             FROM defect_history
             WHERE defect_id = ?1
             ORDER BY id",
          )?;
          stmt
            .query_map(rusqlite::params![id.0], RawHistoryEntry::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        tx.commit()?;
        Ok(Some(rows))
      })
      .await?;

    raws
      .map(|rows| rows.into_iter().map(RawHistoryEntry::into_entry).collect())
      .transpose()
  }

  async fn search(&self, query: &DefectQuery) -> Result<Vec<Defect>> {
    let (clause, params) = where_clause(query);
    let sql = format!("SELECT {DEFECT_COLUMNS} FROM defects {clause} ORDER BY id");

    let raws: Vec<RawDefect> = self
      .reader
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params.iter()), RawDefect::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawDefect::into_defect).collect()
  }
}
