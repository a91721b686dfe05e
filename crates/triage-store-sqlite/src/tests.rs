//! Integration tests for `SqliteStore` and the `DefectTracker` running on it.

use std::{path::PathBuf, time::Duration};

use triage_core::{
  DefectTracker, TrackerError,
  defect::{DefectId, DefectPatch, NewDefect, Priority, Severity, Status},
  history::Mutation,
  lifecycle::{CREATED_COMMENT, Classification},
  query::DefectQuery,
  store::DefectStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn tracker() -> DefectTracker<SqliteStore> { DefectTracker::new(store().await) }

fn temp_db_path(tag: &str) -> PathBuf {
  std::env::temp_dir().join(format!(
    "triage-store-{tag}-{}-{}.db",
    std::process::id(),
    chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
  ))
}

fn remove_db(path: &PathBuf) {
  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}

/// Makes every history insert fail, so the write half of a mutation lands
/// and the append half aborts.
const FAIL_HISTORY_INSERTS: &str = "
CREATE TRIGGER fail_history_insert BEFORE INSERT ON defect_history
BEGIN
  SELECT RAISE(ABORT, 'history unavailable');
END;
";

fn crash(severity: Severity) -> NewDefect {
  NewDefect::new(
    "Crash on save",
    "Saving a draft crashes the editor",
    severity,
    Priority::High,
    "qa-alice",
  )
}

// ─── Creation ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_defect_starts_new_with_one_history_entry() {
  let t = tracker().await;
  let mut input = crash(Severity::Major).with_module("editor");
  input.environment = Some("linux x86_64".into());
  input.build_version = Some("1.4.2".into());

  let defect = t.create_defect(input).await.unwrap();
  assert_eq!(defect.status, Status::New);
  assert!(defect.fixed_date.is_none());

  let fetched = t.get_defect(defect.id).await.unwrap();
  assert_eq!(fetched.title, "Crash on save");
  assert_eq!(fetched.module.as_deref(), Some("editor"));
  assert_eq!(fetched.environment.as_deref(), Some("linux x86_64"));
  assert_eq!(fetched.build_version.as_deref(), Some("1.4.2"));
  assert_eq!(fetched.found_date, defect.found_date);

  let history = t.history(defect.id).await.unwrap();
  assert_eq!(history.len(), 1);
  let created = &history[0];
  assert_eq!(created.defect_id, defect.id);
  assert_eq!(created.changed_by, "qa-alice");
  assert_eq!(created.field_changed, None);
  assert_eq!(created.new_value.as_deref(), Some("New"));
  assert_eq!(created.comment.as_deref(), Some(CREATED_COMMENT));
}

#[tokio::test]
async fn ids_are_monotonic() {
  let t = tracker().await;
  let a = t.create_defect(crash(Severity::Minor)).await.unwrap();
  let b = t.create_defect(crash(Severity::Minor)).await.unwrap();
  assert!(b.id > a.id);
}

#[tokio::test]
async fn create_rejects_missing_required_fields_without_writing() {
  let t = tracker().await;
  let mut input = crash(Severity::Minor);
  input.found_by = "  ".into();

  let err = t.create_defect(input).await.unwrap_err();
  assert!(matches!(err, TrackerError::Invalid { operation: "create_defect", .. }));
  assert!(t.search(&DefectQuery::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn store_validates_on_its_own() {
  let s = store().await;
  let mut input = crash(Severity::Minor);
  input.title = String::new();
  assert!(matches!(
    s.create_defect(input).await,
    Err(crate::Error::Core(triage_core::Error::MissingField("title")))
  ));
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn every_mutation_appends_exactly_one_history_entry() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Critical)).await.unwrap().id;

  t.assign(id, "dev-bob", "lead", None).await.unwrap();
  t.update_status(id, Status::InProgress, "dev-bob", None).await.unwrap();
  t.update_status(id, Status::Fixed, "dev-bob", Some("patched".into()))
    .await
    .unwrap();
  t.add_resolution(id, "null check", Some("race".into()), Some("dev-bob"))
    .await
    .unwrap();
  let classification = Classification { severity: Some(Severity::Major), priority: None };
  t.reclassify(id, classification, "lead", None).await.unwrap();

  let history = t.history(id).await.unwrap();
  assert_eq!(history.len(), 6);
  assert!(history.windows(2).all(|w| w[0].change_date <= w[1].change_date));
  assert!(history.windows(2).all(|w| w[0].entry_id < w[1].entry_id));

  let fields: Vec<_> = history
    .iter()
    .map(|h| h.field_changed.as_deref())
    .collect();
  assert_eq!(fields, [
    None,
    Some("assigned_to"),
    Some("status"),
    Some("status"),
    Some("resolution"),
    Some("severity"),
  ]);
  assert_eq!(history[3].old_value.as_deref(), Some("In Progress"));
  assert_eq!(history[3].comment.as_deref(), Some("patched"));
  assert_eq!(history[4].comment.as_deref(), Some("Root cause: race"));
}

#[tokio::test]
async fn permissive_transition_new_to_closed() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Trivial)).await.unwrap().id;

  let closed = t.update_status(id, Status::Closed, "lead", None).await.unwrap();
  assert_eq!(closed.status, Status::Closed);
  assert!(closed.closed_date.is_some());
  assert!(closed.status.is_terminal());
}

#[tokio::test]
async fn fixed_date_survives_reopen_and_refix() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Major)).await.unwrap().id;

  let first = t.update_status(id, Status::Fixed, "dev", None).await.unwrap();
  let fixed_at = first.fixed_date.expect("fixed date set");
  t.update_status(id, Status::Reopened, "qa", None).await.unwrap();
  let refixed = t.update_status(id, Status::Fixed, "dev", None).await.unwrap();

  assert_eq!(refixed.fixed_date, Some(fixed_at));
  assert_eq!(t.get_defect(id).await.unwrap().fixed_date, Some(fixed_at));
  assert_eq!(t.history(id).await.unwrap().len(), 4);
}

#[tokio::test]
async fn repeating_the_same_status_is_legal() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Minor)).await.unwrap().id;

  t.update_status(id, Status::Open, "qa", None).await.unwrap();
  t.update_status(id, Status::Open, "qa", None).await.unwrap();

  assert_eq!(t.get_defect(id).await.unwrap().status, Status::Open);
  let history = t.history(id).await.unwrap();
  assert_eq!(history.len(), 3);
  assert_eq!(history[2].old_value.as_deref(), Some("Open"));
  assert_eq!(history[2].new_value.as_deref(), Some("Open"));
}

#[tokio::test]
async fn assign_moves_new_to_assigned_only() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Minor)).await.unwrap().id;

  let assigned = t.assign(id, "dev-bob", "lead", None).await.unwrap();
  assert_eq!(assigned.status, Status::Assigned);

  t.update_status(id, Status::InProgress, "dev-bob", None).await.unwrap();
  let reassigned = t.assign(id, "dev-carol", "lead", Some("handover".into())).await.unwrap();
  assert_eq!(reassigned.status, Status::InProgress);
  assert_eq!(reassigned.assigned_to.as_deref(), Some("dev-carol"));

  let last = t.history(id).await.unwrap().pop().unwrap();
  assert_eq!(last.old_value.as_deref(), Some("dev-bob"));
  assert_eq!(last.new_value.as_deref(), Some("dev-carol"));
  assert_eq!(last.comment.as_deref(), Some("handover"));
}

#[tokio::test]
async fn resolution_without_actor_writes_no_history() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Minor)).await.unwrap().id;

  let resolved = t
    .add_resolution(id, "config fix", Some("bad default".into()), None)
    .await
    .unwrap();
  assert_eq!(resolved.resolution.as_deref(), Some("config fix"));
  assert_eq!(resolved.root_cause.as_deref(), Some("bad default"));
  assert_eq!(resolved.status, Status::New);

  // Untracked mutation path: the update lands but the audit trail is silent.
  assert_eq!(t.history(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn reclassify_requires_a_change() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Minor)).await.unwrap().id;

  let err = t
    .reclassify(id, Classification::default(), "lead", None)
    .await
    .unwrap_err();
  assert!(matches!(err, TrackerError::Invalid { operation: "reclassify", .. }));
  assert_eq!(t.history(id).await.unwrap().len(), 1);

  let both = Classification {
    severity: Some(Severity::Critical),
    priority: Some(Priority::Immediate),
  };
  let updated = t.reclassify(id, both, "lead", None).await.unwrap();
  assert_eq!(updated.severity, Severity::Critical);
  assert_eq!(updated.priority, Priority::Immediate);
  assert_eq!(t.history(id).await.unwrap().len(), 2);
}

// ─── NotFound ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn operations_on_unknown_id_report_not_found_and_write_nothing() {
  let t = tracker().await;
  let existing = t.create_defect(crash(Severity::Minor)).await.unwrap().id;
  let missing = DefectId(999_999);

  let err = t.update_status(missing, Status::Closed, "qa", None).await.unwrap_err();
  assert!(err.is_not_found());
  assert_eq!(err.operation(), "update_status");

  assert!(t.assign(missing, "dev", "lead", None).await.unwrap_err().is_not_found());
  assert!(
    t.add_resolution(missing, "x", None, Some("dev"))
      .await
      .unwrap_err()
      .is_not_found()
  );
  assert!(t.get_defect(missing).await.unwrap_err().is_not_found());
  assert!(t.history(missing).await.unwrap_err().is_not_found());

  assert_eq!(t.history(existing).await.unwrap().len(), 1);
  assert_eq!(t.store().history_row_count().await, 1);
}

// ─── Atomicity ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn failed_history_append_rolls_back_the_field_update() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Major)).await.unwrap().id;
  t.store().execute_batch(FAIL_HISTORY_INSERTS).await;

  let err = t.update_status(id, Status::Closed, "lead", None).await.unwrap_err();
  assert!(matches!(err, TrackerError::Store { operation: "update_status", .. }));

  let err = t.assign(id, "dev-bob", "lead", None).await.unwrap_err();
  assert!(matches!(err, TrackerError::Store { operation: "assign", .. }));

  let defect = t.get_defect(id).await.unwrap();
  assert_eq!(defect.status, Status::New);
  assert_eq!(defect.closed_date, None);
  assert_eq!(defect.assigned_to, None);
  assert_eq!(t.history(id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn failed_creation_history_leaves_no_defect_row() {
  let t = tracker().await;
  let existing = t.create_defect(crash(Severity::Minor)).await.unwrap();
  t.store().execute_batch(FAIL_HISTORY_INSERTS).await;

  let err = t.create_defect(crash(Severity::Critical)).await.unwrap_err();
  assert!(matches!(err, TrackerError::Store { operation: "create_defect", .. }));

  let all = t.search(&DefectQuery::default()).await.unwrap();
  assert_eq!(all, vec![existing]);
  assert_eq!(t.store().history_row_count().await, 1);

  t.store().execute_batch("DROP TRIGGER fail_history_insert;").await;
  let next = t.create_defect(crash(Severity::Critical)).await.unwrap();
  assert_eq!(t.history(next.id).await.unwrap().len(), 1);
}

// ─── Search ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn search_filters_by_equality_and_ands_criteria() {
  let t = tracker().await;
  let a = t.create_defect(crash(Severity::Critical).with_module("auth")).await.unwrap().id;
  let b = t.create_defect(crash(Severity::Major).with_module("auth")).await.unwrap().id;
  let c = t.create_defect(crash(Severity::Major).with_module("billing")).await.unwrap().id;
  let mut low = crash(Severity::Minor);
  low.priority = Priority::Low;
  let d = t.create_defect(low).await.unwrap().id;

  t.assign(b, "dev-bob", "lead", None).await.unwrap();
  t.assign(c, "dev-bob", "lead", None).await.unwrap();
  t.update_status(c, Status::Fixed, "dev-bob", None).await.unwrap();

  let ids = |defects: Vec<triage_core::defect::Defect>| {
    defects.into_iter().map(|d| d.id).collect::<Vec<_>>()
  };

  let all = t.search(&DefectQuery::default()).await.unwrap();
  assert_eq!(ids(all.clone()), [a, b, c, d]);

  let queries = [
    DefectQuery::default().with_severity(Severity::Major),
    DefectQuery::default().with_module("auth"),
    DefectQuery::default().with_assignee("dev-bob"),
    DefectQuery::default().with_assignee("dev-bob").with_status(Status::Assigned),
    DefectQuery::default().with_priority(Priority::Low),
    DefectQuery::default().with_module("auth").with_severity(Severity::Minor),
    DefectQuery::default().with_status(Status::New),
  ];
  for query in queries {
    let expected: Vec<_> = all
      .iter()
      .filter(|d| query.matches(d))
      .map(|d| d.id)
      .collect();
    assert_eq!(ids(t.search(&query).await.unwrap()), expected, "{query:?}");
  }

  assert_eq!(
    ids(t.search(&DefectQuery::default().with_assignee("dev-bob")).await.unwrap()),
    [b, c]
  );
  assert!(
    t.search(&DefectQuery::default().with_module("auth").with_severity(Severity::Minor))
      .await
      .unwrap()
      .is_empty()
  );
}

// ─── Metrics ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn metrics_over_live_collection() {
  let t = tracker().await;
  let empty = t.metrics().await.unwrap();
  assert_eq!(empty.total, 0);
  assert_eq!(empty.average_resolution_days, None);

  t.create_defect(crash(Severity::Critical).with_module("auth")).await.unwrap();
  let b = t.create_defect(crash(Severity::Major)).await.unwrap().id;
  let c = t.create_defect(crash(Severity::Major)).await.unwrap().id;

  t.update_status(b, Status::Closed, "lead", None).await.unwrap();
  t.update_status(c, Status::Closed, "lead", None).await.unwrap();
  t.update_status(c, Status::Reopened, "qa", None).await.unwrap();

  let m = t.metrics().await.unwrap();
  assert_eq!(m.total, 3);
  assert_eq!(m.by_severity.get(&Severity::Critical), Some(&1));
  assert_eq!(m.by_severity.get(&Severity::Major), Some(&2));
  assert_eq!(m.by_status.get(&Status::Closed), Some(&1));
  assert_eq!(m.by_status.get(&Status::Reopened), Some(&1));
  assert_eq!(m.by_module.len(), 1);
  assert_eq!(m.reopened_count, 1);
  let avg = m.average_resolution_days.expect("one closed defect");
  assert!((0.0..1.0).contains(&avg));
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignments_are_serialized() {
  let t = tracker().await;
  let id = t.create_defect(crash(Severity::Major)).await.unwrap().id;

  let (first, second) = tokio::join!(
    {
      let t = t.clone();
      async move { t.assign(id, "dev-bob", "lead-1", None).await }
    },
    {
      let t = t.clone();
      async move { t.assign(id, "dev-carol", "lead-2", None).await }
    }
  );
  first.unwrap();
  second.unwrap();

  let history = t.history(id).await.unwrap();
  assert_eq!(history.len(), 3);
  let (earlier, later) = (&history[1], &history[2]);
  assert_eq!(earlier.old_value, None);
  // The later commit saw the earlier one as its preceding state.
  assert_eq!(later.old_value, earlier.new_value);

  let defect = t.get_defect(id).await.unwrap();
  assert_eq!(defect.assigned_to, later.new_value);
  assert_eq!(defect.status, Status::Assigned);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_mutations_on_different_ids_all_land() {
  let t = tracker().await;
  let mut ids = vec![];
  for _ in 0..8 {
    ids.push(t.create_defect(crash(Severity::Minor)).await.unwrap().id);
  }

  let handles: Vec<_> = ids
    .iter()
    .map(|&id| {
      let t = t.clone();
      tokio::spawn(async move { t.update_status(id, Status::Open, "qa", None).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  for id in ids {
    assert_eq!(t.history(id).await.unwrap().len(), 2);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_creates_stamp_found_date_in_id_order() {
  let t = tracker().await;
  let handles: Vec<_> = (0..16)
    .map(|_| {
      let t = t.clone();
      tokio::spawn(async move { t.create_defect(crash(Severity::Minor)).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let all = t.search(&DefectQuery::default()).await.unwrap();
  assert_eq!(all.len(), 16);
  for pair in all.windows(2) {
    assert!(pair[0].id < pair[1].id);
    assert!(pair[0].found_date <= pair[1].found_date);
  }
  for defect in &all {
    let history = t.history(defect.id).await.unwrap();
    assert_eq!(history[0].change_date, defect.found_date);
  }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn reads_do_not_wait_for_an_open_write() {
  let path = temp_db_path("reader");
  let store = SqliteStore::open(&path).await.unwrap();
  let id = store.create_defect(crash(Severity::Major)).await.unwrap().id;

  let (started_tx, started_rx) = tokio::sync::oneshot::channel();
  let (release_tx, release_rx) = std::sync::mpsc::channel::<()>();
  let writer = {
    let store = store.clone();
    tokio::spawn(async move {
      store
        .update_fields(id, move |_, _| {
          let _ = started_tx.send(());
          // Hold the write transaction open until the reads are done.
          let _ = release_rx.recv();
          Mutation {
            patch: DefectPatch { status: Some(Status::Open), ..Default::default() },
            audit: None,
          }
        })
        .await
    })
  };
  started_rx.await.unwrap();

  let seen = tokio::time::timeout(
    Duration::from_secs(5),
    store.search(&DefectQuery::default()),
  )
  .await
  .expect("search blocked by the in-flight write")
  .unwrap();
  assert_eq!(seen[0].status, Status::New);

  let history = tokio::time::timeout(Duration::from_secs(5), store.list_history(id))
    .await
    .expect("history read blocked by the in-flight write")
    .unwrap()
    .unwrap();
  assert_eq!(history.len(), 1);

  release_tx.send(()).unwrap();
  let updated = writer.await.unwrap().unwrap().unwrap();
  assert_eq!(updated.status, Status::Open);
  assert_eq!(store.get_defect(id).await.unwrap().unwrap().status, Status::Open);

  drop(store);
  remove_db(&path);
}

// ─── Persistence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn reopening_a_file_store_keeps_defects_and_history() {
  let path = temp_db_path("reopen");

  let id = {
    let t = DefectTracker::new(SqliteStore::open(&path).await.unwrap());
    let id = t.create_defect(crash(Severity::Major)).await.unwrap().id;
    t.update_status(id, Status::Fixed, "dev", None).await.unwrap();
    id
  };

  let t = DefectTracker::new(SqliteStore::open(&path).await.unwrap());
  let defect = t.get_defect(id).await.unwrap();
  assert_eq!(defect.status, Status::Fixed);
  assert!(defect.fixed_date.is_some());
  assert_eq!(t.history(id).await.unwrap().len(), 2);

  let next = t.create_defect(crash(Severity::Minor)).await.unwrap().id;
  assert!(next > id);

  drop(t);
  remove_db(&path);
}
