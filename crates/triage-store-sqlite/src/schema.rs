//! SQL schema for the Triage SQLite store.
//!
//! Executed once at connection startup. `PRAGMA user_version` records the
//! schema revision; future migrations will be gated on it.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- AUTOINCREMENT guarantees ids are never reused.
-- Rows are never deleted; only the lifecycle columns are ever updated.
CREATE TABLE IF NOT EXISTS defects (
    id                 INTEGER PRIMARY KEY AUTOINCREMENT,
    title              TEXT NOT NULL,
    description        TEXT,
    severity           INTEGER NOT NULL,   -- 1 (critical) .. 5 (trivial)
    priority           INTEGER NOT NULL,   -- 1 (immediate) .. 4 (low)
    status             TEXT NOT NULL,      -- label, e.g. 'In Progress'
    module             TEXT,
    found_by           TEXT NOT NULL,
    assigned_to        TEXT,
    found_date         TEXT NOT NULL,      -- RFC 3339 UTC; store-assigned
    fixed_date         TEXT,
    verified_date      TEXT,
    closed_date        TEXT,
    environment        TEXT,
    steps_to_reproduce TEXT,
    expected_result    TEXT,
    actual_result      TEXT,
    root_cause         TEXT,
    resolution         TEXT,
    test_case_id       TEXT,
    build_version      TEXT
);

-- Strictly append-only. No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS defect_history (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    defect_id     INTEGER NOT NULL REFERENCES defects(id),
    changed_by    TEXT NOT NULL,
    change_date   TEXT NOT NULL,           -- RFC 3339 UTC; store-assigned
    field_changed TEXT,
    old_value     TEXT,
    new_value     TEXT,
    comment       TEXT
);

CREATE INDEX IF NOT EXISTS history_defect_idx    ON defect_history(defect_id);
CREATE INDEX IF NOT EXISTS defects_status_idx    ON defects(status);
CREATE INDEX IF NOT EXISTS defects_severity_idx  ON defects(severity);
CREATE INDEX IF NOT EXISTS defects_assignee_idx  ON defects(assigned_to);
CREATE INDEX IF NOT EXISTS defects_module_idx    ON defects(module);

PRAGMA user_version = 1;
";
