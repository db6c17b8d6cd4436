//! The per-session sync driver.
//!
//! [`Orchestrator::bootstrap`] runs once at session start and
//! [`Orchestrator::refetch`] on every explicit curriculum refresh. Each call
//! takes a start-order ticket; results are committed under a lock, and a
//! result whose ticket is older than the last committed one is discarded.
//! That keeps the local store on "last started wins" even when network calls
//! complete out of order.

use std::sync::{
  Arc,
  atomic::{AtomicBool, AtomicU64, Ordering},
};

use chrono::Utc;
use syllabus_core::{
  curriculum::RawCurriculumData,
  hash::content_hash,
  remote::{RemoteCurriculum, RunBackupResult},
  state::{AppState, CurriculumBaseSnapshot},
  store::{BackupSink, BackupSource, CurriculumSource, StateStore},
};
use syllabus_merge::{Ambiguity, normalize};
use tokio::sync::{Mutex, MutexGuard, watch};
use tracing::{debug, info, warn};

use crate::{
  reconcile::{Strategy, reconcile},
  report::{SessionState, SyncOutcome, SyncReport},
  slots,
};

/// Clears the in-flight flag when a bootstrap ends, however it ends.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self(flag))
  }
}

impl Drop for InFlight<'_> {
  fn drop(&mut self) { self.0.store(false, Ordering::Release); }
}

/// What to do about the server backup once a state is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Upload {
  /// Upload in the background unless unchanged since the last upload.
  Spawn,
  /// The server already holds this state; only remember its fingerprint.
  Seed,
  /// The server's latest backup is unknown; uploading could overwrite
  /// progress this device never saw.
  Skip,
}

/// A resolved state waiting to be committed.
struct Resolution {
  outcome:     SyncOutcome,
  state:       AppState,
  strategy:    Option<Strategy>,
  ambiguities: Vec<Ambiguity>,
  base:        Option<CurriculumBaseSnapshot>,
  upload:      Upload,
}

/// Hash of a state ignoring its sync timestamp, so that re-syncing an
/// unchanged state does not trigger another upload.
fn upload_fingerprint(state: &AppState) -> Option<String> {
  let mut probe = state.clone();
  probe.curriculum_synced_at = None;
  content_hash(&probe).ok()
}

fn base_snapshot(remote: &RemoteCurriculum, data: RawCurriculumData) -> CurriculumBaseSnapshot {
  CurriculumBaseSnapshot {
    curriculum_id: remote.id.clone(),
    version: remote.version,
    updated_at: remote.updated_at,
    data,
  }
}

/// Drives bootstrap and refetch for one user session.
///
/// `S` is the device-local store; `R` is the remote side (curriculum
/// service plus backup service).
pub struct Orchestrator<S, R> {
  store:       S,
  remote:      Arc<R>,
  owner:       Option<String>,
  session:     watch::Sender<SessionState>,
  in_flight:   AtomicBool,
  next_ticket: AtomicU64,
  committed:   Mutex<u64>,
  last_upload: Arc<Mutex<Option<String>>>,
}

impl<S, R> Orchestrator<S, R>
where
  S: StateStore,
  R: CurriculumSource + BackupSource + BackupSink + 'static,
{
  pub fn new(store: S, remote: Arc<R>) -> Self {
    let (session, _) = watch::channel(SessionState::NoSession);
    Self {
      store,
      remote,
      owner: None,
      session,
      in_flight: AtomicBool::new(false),
      next_ticket: AtomicU64::new(0),
      committed: Mutex::new(0),
      last_upload: Arc::new(Mutex::new(None)),
    }
  }

  /// Stamp restored and freshly built states with `user_id`. Blank ids are
  /// ignored.
  pub fn with_owner(mut self, user_id: impl Into<String>) -> Self {
    let user_id = user_id.into();
    let user_id = user_id.trim();
    self.owner = (!user_id.is_empty()).then(|| user_id.to_string());
    self
  }

  pub fn session_state(&self) -> SessionState { *self.session.borrow() }

  /// Watch session state transitions.
  pub fn subscribe(&self) -> watch::Receiver<SessionState> { self.session.subscribe() }

  /// The currently stored local state, if it is valid.
  pub async fn local_state(&self) -> Option<AppState> {
    slots::read_state(&self.store, Utc::now().date_naive()).await
  }

  fn take_ticket(&self) -> u64 { self.next_ticket.fetch_add(1, Ordering::SeqCst) + 1 }

  // ─── Entry points ──────────────────────────────────────────────────────────

  /// Session start: fetch the selected curriculum and the latest backup
  /// concurrently and resolve a state from them.
  ///
  /// A second call while one is running returns [`SyncOutcome::Skipped`].
  pub async fn bootstrap(&self) -> SyncReport {
    let Some(_guard) = InFlight::acquire(&self.in_flight) else {
      debug!("bootstrap already in flight; skipping");
      return self.report(SyncOutcome::Skipped, None, false);
    };
    let ticket = self.take_ticket();
    let previous = self.session.send_replace(SessionState::Bootstrapping);

    let (curriculum, backup) = tokio::join!(
      self.remote.fetch_curriculum(),
      self.remote.fetch_latest_backup()
    );

    let backup_failed = backup.is_err();
    let (curriculum, backup) = match (curriculum, backup) {
      (Err(curriculum), Err(backup)) => {
        let error = syllabus_core::Error::SyncUnavailable(format!(
          "curriculum: {curriculum}; backup: {backup}"
        ));
        warn!(%error, "bootstrap failed; keeping local state");
        self.session.send_replace(previous);
        return self.unchanged(SyncOutcome::Offline).await;
      }
      (curriculum, backup) => (
        curriculum.unwrap_or_else(|e| {
          warn!(error = %e, "curriculum fetch failed; treating as absent");
          None
        }),
        backup.unwrap_or_else(|e| {
          warn!(error = %e, "backup fetch failed; treating as absent");
          None
        }),
      ),
    };

    let committed = self.committed.lock().await;
    if *committed > ticket {
      drop(committed);
      return self.superseded(ticket).await;
    }

    let now = Utc::now();
    let today = now.date_naive();
    let backup_state = backup.and_then(|payload| {
      let state = syllabus_merge::coerce_app_state(&payload.state, today);
      if state.is_none() {
        warn!(backup_id = %payload.id, "latest backup is not a valid app state");
      }
      state
    });

    let resolution = match curriculum {
      Some(remote) => {
        let remote_raw = normalize(&remote.data);
        let base = slots::read_base(&self.store).await;
        let restorable = backup_state.filter(|state| {
          state.curriculum_id.as_deref() == Some(remote.id.as_str())
        });

        // Without the backup, the stored local state is the best copy of
        // the learner's progress.
        let (existing, restored) = match restorable {
          Some(state) => (Some(state), true),
          None if backup_failed => (slots::read_state(&self.store, today).await, false),
          None => (None, false),
        };

        let reconciled =
          reconcile(existing.as_ref(), base.as_ref(), &remote, &remote_raw, now);
        let outcome = match (restored, reconciled.strategy) {
          (true, _) => SyncOutcome::RestoredBackup,
          (false, Strategy::Fresh) => SyncOutcome::FreshCurriculum,
          (false, _) => SyncOutcome::Merged,
        };
        let upload = match (restored, reconciled.strategy) {
          _ if backup_failed => Upload::Skip,
          (true, Strategy::KeepLocal) => Upload::Seed,
          _ => Upload::Spawn,
        };

        Resolution {
          outcome,
          state: reconciled.state,
          strategy: Some(reconciled.strategy),
          ambiguities: reconciled.ambiguities,
          base: Some(base_snapshot(&remote, remote_raw)),
          upload,
        }
      }
      None => match backup_state {
        Some(mut state) => {
          state.repair_weekly_data(today);
          Resolution {
            outcome: SyncOutcome::BackupOnly,
            state,
            strategy: None,
            ambiguities: Vec::new(),
            base: None,
            upload: Upload::Seed,
          }
        }
        None => {
          drop(committed);
          info!("no curriculum or backup on the server; keeping local state");
          self.session.send_replace(SessionState::Synced);
          return self.unchanged(SyncOutcome::NothingRemote).await;
        }
      },
    };

    self.commit(committed, ticket, resolution).await
  }

  /// Explicit refresh: fetch the selected curriculum and reconcile the
  /// stored local state with it.
  pub async fn refetch(&self) -> SyncReport {
    let ticket = self.take_ticket();

    let remote = match self.remote.fetch_curriculum().await {
      Ok(Some(remote)) => remote,
      Ok(None) => {
        info!("no curriculum selected; keeping local state");
        return self.unchanged(SyncOutcome::NothingRemote).await;
      }
      Err(e) => {
        let error = syllabus_core::Error::SyncUnavailable(e.to_string());
        warn!(%error, "refetch failed; keeping local state");
        return self.unchanged(SyncOutcome::Offline).await;
      }
    };

    let committed = self.committed.lock().await;
    if *committed > ticket {
      drop(committed);
      return self.superseded(ticket).await;
    }

    let now = Utc::now();
    let existing = slots::read_state(&self.store, now.date_naive()).await;
    let base = slots::read_base(&self.store).await;
    let remote_raw = normalize(&remote.data);

    let reconciled = reconcile(existing.as_ref(), base.as_ref(), &remote, &remote_raw, now);
    let outcome = match reconciled.strategy {
      Strategy::Fresh => SyncOutcome::FreshCurriculum,
      _ => SyncOutcome::Merged,
    };

    let resolution = Resolution {
      outcome,
      state: reconciled.state,
      strategy: Some(reconciled.strategy),
      ambiguities: reconciled.ambiguities,
      base: Some(base_snapshot(&remote, remote_raw)),
      upload: Upload::Spawn,
    };
    self.commit(committed, ticket, resolution).await
  }

  /// Upload the stored local state now and wait for the result.
  pub async fn upload_now(&self) -> Option<RunBackupResult> {
    let state = self.local_state().await?;
    let fingerprint = upload_fingerprint(&state);

    match self.remote.upload_backup(state).await {
      Ok(result) => {
        info!(stored = result.stored, deduped = result.deduped, "backup uploaded");
        *self.last_upload.lock().await = fingerprint;
        Some(result)
      }
      Err(e) => {
        warn!(error = %e, "backup upload failed");
        None
      }
    }
  }

  // ─── Commit ────────────────────────────────────────────────────────────────

  async fn commit(
    &self,
    mut committed: MutexGuard<'_, u64>,
    ticket: u64,
    resolution: Resolution,
  ) -> SyncReport {
    let Resolution {
      outcome,
      mut state,
      strategy,
      ambiguities,
      base,
      upload,
    } = resolution;

    if let Some(owner) = &self.owner {
      state.owner_user_id = Some(owner.clone());
    }
    for ambiguity in &ambiguities {
      warn!(%ambiguity, "curriculum merge ambiguity");
    }

    let persisted = slots::write_state(&self.store, &state).await;
    if let Some(base) = &base {
      slots::write_base(&self.store, base).await;
    }
    *committed = ticket;
    drop(committed);

    self.session.send_replace(SessionState::Synced);
    info!(
      ?outcome,
      ?strategy,
      ambiguities = ambiguities.len(),
      persisted,
      "sync committed"
    );

    match upload {
      Upload::Spawn => self.spawn_upload(state.clone()),
      Upload::Seed => *self.last_upload.lock().await = upload_fingerprint(&state),
      Upload::Skip => debug!("latest server backup unknown; not uploading"),
    }

    SyncReport {
      session: self.session_state(),
      outcome,
      strategy,
      ambiguities,
      state: Some(state),
      persisted,
    }
  }

  /// Fire-and-forget backup upload, skipped when the state matches the last
  /// successful upload.
  fn spawn_upload(&self, state: AppState) {
    let Some(fingerprint) = upload_fingerprint(&state) else {
      return;
    };
    let remote = Arc::clone(&self.remote);
    let last_upload = Arc::clone(&self.last_upload);

    // The fingerprint lock is never held across the network call.
    tokio::spawn(async move {
      if last_upload.lock().await.as_deref() == Some(fingerprint.as_str()) {
        debug!("state unchanged since last upload; skipping backup");
        return;
      }
      match remote.upload_backup(state).await {
        Ok(result) => {
          debug!(stored = result.stored, deduped = result.deduped, "background backup finished");
          *last_upload.lock().await = Some(fingerprint);
        }
        Err(e) => warn!(error = %e, "background backup failed"),
      }
    });
  }

  // ─── Reports ───────────────────────────────────────────────────────────────

  fn report(&self, outcome: SyncOutcome, state: Option<AppState>, persisted: bool) -> SyncReport {
    SyncReport {
      session: self.session_state(),
      outcome,
      strategy: None,
      ambiguities: Vec::new(),
      state,
      persisted,
    }
  }

  /// A report carrying the stored state as-is.
  async fn unchanged(&self, outcome: SyncOutcome) -> SyncReport {
    let state = self.local_state().await;
    self.report(outcome, state, false)
  }

  async fn superseded(&self, ticket: u64) -> SyncReport {
    info!(ticket, "a newer sync already committed; discarding result");
    self.unchanged(SyncOutcome::Superseded).await
  }
}

#[cfg(test)]
mod tests {
  use std::{collections::VecDeque, io, sync::Mutex as StdMutex, time::Duration};

  use chrono::TimeZone;
  use serde_json::json;
  use syllabus_core::{
    learner::LessonStatus,
    remote::{BackupHistoryItem, BackupPayload},
    state::{BASE_SNAPSHOT_KEY, STATE_KEY},
  };
  use syllabus_store_sqlite::SqliteStore;
  use tokio::sync::oneshot;

  use super::*;

  type Fetch<T> = Result<Option<T>, &'static str>;

  /// In-memory remote side. Curriculum responses are queued; the first
  /// curriculum fetch and the first upload can each be held back on a gate to
  /// simulate a slow request.
  #[derive(Default)]
  struct FakeRemote {
    curricula:   StdMutex<VecDeque<Fetch<RemoteCurriculum>>>,
    gate:        StdMutex<Option<oneshot::Receiver<()>>>,
    backup:      StdMutex<Option<Fetch<BackupPayload>>>,
    upload_gate: StdMutex<Option<oneshot::Receiver<()>>>,
    uploads:     StdMutex<Vec<AppState>>,
  }

  impl FakeRemote {
    fn curriculum(self, response: Fetch<RemoteCurriculum>) -> Self {
      self.curricula.lock().unwrap().push_back(response);
      self
    }

    fn backup(self, response: Fetch<BackupPayload>) -> Self {
      *self.backup.lock().unwrap() = Some(response);
      self
    }

    fn uploads(&self) -> usize { self.uploads.lock().unwrap().len() }
  }

  fn offline(msg: &'static str) -> io::Error { io::Error::other(msg) }

  impl CurriculumSource for FakeRemote {
    type Error = io::Error;

    async fn fetch_curriculum(&self) -> Result<Option<RemoteCurriculum>, io::Error> {
      let next = self.curricula.lock().unwrap().pop_front().unwrap_or(Ok(None));
      let gate = self.gate.lock().unwrap().take();
      if let Some(gate) = gate {
        let _ = gate.await;
      }
      next.map_err(offline)
    }
  }

  impl BackupSource for FakeRemote {
    type Error = io::Error;

    async fn fetch_latest_backup(&self) -> Result<Option<BackupPayload>, io::Error> {
      let next = self.backup.lock().unwrap().clone().unwrap_or(Ok(None));
      next.map_err(offline)
    }
  }

  impl BackupSink for FakeRemote {
    type Error = io::Error;

    async fn upload_backup(&self, state: AppState) -> Result<RunBackupResult, io::Error> {
      let gate = self.upload_gate.lock().unwrap().take();
      if let Some(gate) = gate {
        let _ = gate.await;
      }
      self.uploads.lock().unwrap().push(state);
      Ok(RunBackupResult {
        item:    BackupHistoryItem {
          id:         "bkp_test".into(),
          created_at: Utc::now(),
          bytes:      1,
          state_hash: "0".repeat(64),
        },
        stored:  true,
        deduped: false,
      })
    }
  }

  fn remote(version: u64, data: serde_json::Value) -> RemoteCurriculum {
    RemoteCurriculum {
      id: "cur_1".into(),
      title: "Grade 10".into(),
      version,
      updated_at: Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
      data,
    }
  }

  fn math_v1() -> serde_json::Value {
    json!([{ "id": "s1", "name": "Math", "units": [
      { "id": "u1", "name": "Algebra", "lessons": [{ "id": "l1", "title": "Linear eq" }] }
    ]}])
  }

  fn math_v2() -> serde_json::Value {
    json!([{ "id": "s1", "name": "Mathematics", "units": [
      { "id": "u1", "name": "Algebra", "lessons": [
        { "id": "l1", "title": "Linear eq" },
        { "id": "l2", "title": "Quadratics" }
      ]}
    ]}])
  }

  fn backup_of(state: &AppState) -> BackupPayload {
    BackupPayload {
      id:         "bkp_1".into(),
      created_at: Utc::now(),
      state:      serde_json::to_value(state).unwrap(),
    }
  }

  /// A local store that reads empty and refuses every write.
  struct ReadOnlyStore;

  impl StateStore for ReadOnlyStore {
    type Error = io::Error;

    async fn get(&self, _key: &str) -> Result<Option<serde_json::Value>, io::Error> { Ok(None) }

    async fn set(&self, _key: &str, _value: serde_json::Value) -> Result<(), io::Error> {
      Err(io::Error::other("disk full"))
    }
  }

  async fn orchestrator(remote: FakeRemote) -> (Orchestrator<SqliteStore, FakeRemote>, Arc<FakeRemote>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let remote = Arc::new(remote);
    (Orchestrator::new(store, Arc::clone(&remote)), remote)
  }

  async fn settle() {
    for _ in 0..20 {
      tokio::task::yield_now().await;
    }
  }

  #[tokio::test]
  async fn bootstrap_builds_fresh_state_and_base() {
    let (o, remote) = orchestrator(FakeRemote::default().curriculum(Ok(Some(remote(1, math_v1()))))).await;
    let o = o.with_owner(" user-1 ");

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::FreshCurriculum);
    assert_eq!(report.strategy, Some(Strategy::Fresh));
    assert_eq!(report.session, SessionState::Synced);
    assert!(report.persisted);

    let state = report.state.unwrap();
    assert_eq!(state.owner_user_id.as_deref(), Some("user-1"));
    assert_eq!(state.curriculum_version, Some(1));
    assert_eq!(state.subjects[0].units[0].lessons[0].status, LessonStatus::Pending);

    assert_eq!(o.local_state().await.unwrap().subjects, state.subjects);
    let base = o.store.get(BASE_SNAPSHOT_KEY).await.unwrap().unwrap();
    assert_eq!(base["curriculumId"], "cur_1");
    assert_eq!(base["version"], 1);

    settle().await;
    assert_eq!(remote.uploads(), 1);
  }

  #[tokio::test]
  async fn bootstrap_restores_matching_backup() {
    let mut saved = AppState::initial(Utc::now().date_naive());
    saved.curriculum_id = Some("cur_1".into());
    saved.curriculum_version = Some(1);
    saved.xp = 120;
    saved.owner_user_id = Some("someone".into());
    saved.weekly_data.truncate(3);
    saved.subjects = syllabus_merge::hydrate(&normalize(&math_v1()), &[]);
    saved.subjects[0].units[0].lessons[0].status = LessonStatus::Done;

    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .backup(Ok(Some(backup_of(&saved))));
    let (o, remote) = orchestrator(fake).await;

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::RestoredBackup);
    assert_eq!(report.strategy, Some(Strategy::KeepLocal));

    let state = report.state.unwrap();
    assert_eq!(state.xp, 120);
    assert_eq!(state.owner_user_id.as_deref(), Some("someone"));
    assert_eq!(state.weekly_data.len(), 7);
    assert!(state.curriculum_synced_at.is_some());
    assert_eq!(state.subjects[0].units[0].lessons[0].status, LessonStatus::Done);

    settle().await;
    assert_eq!(remote.uploads(), 0, "an unchanged restore is not re-uploaded");
  }

  #[tokio::test]
  async fn restored_backup_is_merged_with_newer_remote() {
    let mut saved = AppState::initial(Utc::now().date_naive());
    saved.curriculum_id = Some("cur_1".into());
    saved.curriculum_version = Some(1);
    saved.subjects = syllabus_merge::hydrate(&normalize(&math_v1()), &[]);
    saved.subjects[0].units[0].lessons[0].status = LessonStatus::Done;

    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(2, math_v2()))))
      .backup(Ok(Some(backup_of(&saved))));
    let (o, _remote) = orchestrator(fake).await;

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::RestoredBackup);
    assert_eq!(report.strategy, Some(Strategy::PreferLocal));
    let lessons = &report.state.unwrap().subjects[0].units[0].lessons;
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].status, LessonStatus::Done);
    assert_eq!(lessons[1].id, "l2");
  }

  #[tokio::test]
  async fn backup_without_curriculum_is_restored_as_is() {
    let mut saved = AppState::initial(Utc::now().date_naive());
    saved.curriculum_id = Some("cur_gone".into());
    saved.streak = 4;

    let (o, _remote) = orchestrator(FakeRemote::default().backup(Ok(Some(backup_of(&saved))))).await;
    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::BackupOnly);
    assert_eq!(report.state.unwrap().streak, 4);
    assert!(o.store.get(BASE_SNAPSHOT_KEY).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn total_fetch_failure_keeps_local_state() {
    let fake = FakeRemote::default()
      .curriculum(Err("curriculum down"))
      .backup(Err("backup down"));
    let (o, _remote) = orchestrator(fake).await;

    let mut local = AppState::initial(Utc::now().date_naive());
    local.xp = 7;
    o.store.set(STATE_KEY, serde_json::to_value(&local).unwrap()).await.unwrap();

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::Offline);
    assert_eq!(report.session, SessionState::NoSession);
    assert_eq!(report.state.unwrap().xp, 7);
    assert!(!report.persisted);
  }

  #[tokio::test]
  async fn one_failed_fetch_is_treated_as_absent() {
    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .backup(Err("backup down"));
    let (o, _remote) = orchestrator(fake).await;

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::FreshCurriculum);
  }

  #[tokio::test]
  async fn failed_backup_fetch_keeps_local_progress() {
    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .backup(Err("backup down"));
    let (o, remote) = orchestrator(fake).await;

    let mut local = AppState::initial(Utc::now().date_naive());
    local.curriculum_id = Some("cur_1".into());
    local.curriculum_version = Some(1);
    local.xp = 300;
    local.subjects = syllabus_merge::hydrate(&normalize(&math_v1()), &[]);
    local.subjects[0].units[0].lessons[0].status = LessonStatus::Done;
    o.store.set(STATE_KEY, serde_json::to_value(&local).unwrap()).await.unwrap();

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert_eq!(report.strategy, Some(Strategy::KeepLocal));

    let stored = o.local_state().await.unwrap();
    assert_eq!(stored.xp, 300);
    assert_eq!(stored.subjects[0].units[0].lessons[0].status, LessonStatus::Done);

    settle().await;
    assert_eq!(remote.uploads(), 0, "the server backup may be newer than this device");
  }

  #[tokio::test]
  async fn failed_local_write_still_reports_state() {
    let fake = Arc::new(FakeRemote::default().curriculum(Ok(Some(remote(1, math_v1())))));
    let o = Orchestrator::new(ReadOnlyStore, Arc::clone(&fake));

    let report = o.bootstrap().await;
    assert_eq!(report.outcome, SyncOutcome::FreshCurriculum);
    assert_eq!(report.session, SessionState::Synced);
    assert!(!report.persisted);

    let state = report.state.unwrap();
    assert_eq!(state.curriculum_version, Some(1));
    assert_eq!(state.subjects[0].units[0].lessons[0].id, "l1");
    assert!(o.local_state().await.is_none());
  }

  #[tokio::test]
  async fn refetch_runs_three_way_merge() {
    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .curriculum(Ok(Some(remote(2, math_v2()))));
    let (o, _remote) = orchestrator(fake).await;
    o.bootstrap().await;

    let mut local = o.local_state().await.unwrap();
    local.subjects[0].units[0].name = "Algebra I".into();
    local.subjects[0].units[0].lessons[0].status = LessonStatus::Done;
    o.store.set(STATE_KEY, serde_json::to_value(&local).unwrap()).await.unwrap();

    let report = o.refetch().await;
    assert_eq!(report.outcome, SyncOutcome::Merged);
    assert_eq!(report.strategy, Some(Strategy::ThreeWay));

    let subject = &report.state.unwrap().subjects[0];
    assert_eq!(subject.name, "Mathematics");
    assert_eq!(subject.units[0].name, "Algebra I");
    assert_eq!(subject.units[0].lessons[0].status, LessonStatus::Done);
    assert_eq!(subject.units[0].lessons[1].status, LessonStatus::Pending);

    let base = o.store.get(BASE_SNAPSHOT_KEY).await.unwrap().unwrap();
    assert_eq!(base["version"], 2);
  }

  #[tokio::test]
  async fn refetch_without_selection_is_a_no_op() {
    let (o, _remote) = orchestrator(FakeRemote::default()).await;
    let report = o.refetch().await;
    assert_eq!(report.outcome, SyncOutcome::NothingRemote);
    assert!(report.state.is_none());
    assert_eq!(report.session, SessionState::NoSession);
  }

  #[tokio::test]
  async fn reentrant_bootstrap_is_skipped() {
    let (tx, rx) = oneshot::channel();
    let fake = FakeRemote::default().curriculum(Ok(Some(remote(1, math_v1()))));
    *fake.gate.lock().unwrap() = Some(rx);
    let (o, _remote) = orchestrator(fake).await;

    let (first, second) = tokio::join!(o.bootstrap(), async {
      let second = o.bootstrap().await;
      let _ = tx.send(());
      second
    });

    assert_eq!(second.outcome, SyncOutcome::Skipped);
    assert_eq!(first.outcome, SyncOutcome::FreshCurriculum);
  }

  #[tokio::test]
  async fn slow_older_refetch_is_discarded() {
    let (tx, rx) = oneshot::channel();
    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .curriculum(Ok(Some(remote(2, math_v2()))));
    *fake.gate.lock().unwrap() = Some(rx);
    let (o, _remote) = orchestrator(fake).await;

    let (older, newer) = tokio::join!(o.refetch(), async {
      let newer = o.refetch().await;
      let _ = tx.send(());
      newer
    });

    assert_eq!(newer.outcome, SyncOutcome::FreshCurriculum);
    assert_eq!(older.outcome, SyncOutcome::Superseded);
    assert_eq!(older.state.unwrap().curriculum_version, Some(2));
    assert_eq!(o.local_state().await.unwrap().curriculum_version, Some(2));
  }

  #[tokio::test]
  async fn unchanged_state_is_uploaded_once() {
    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .curriculum(Ok(Some(remote(1, math_v1()))));
    let (o, remote) = orchestrator(fake).await;

    o.bootstrap().await;
    settle().await;
    let report = o.refetch().await;
    assert_eq!(report.strategy, Some(Strategy::KeepLocal));
    settle().await;

    assert_eq!(remote.uploads(), 1);
  }

  #[tokio::test]
  async fn slow_upload_does_not_block_commit() {
    let (tx, rx) = oneshot::channel();
    let mut saved = AppState::initial(Utc::now().date_naive());
    saved.curriculum_id = Some("cur_gone".into());
    let fake = FakeRemote::default()
      .curriculum(Ok(Some(remote(1, math_v1()))))
      .backup(Ok(Some(backup_of(&saved))));
    *fake.upload_gate.lock().unwrap() = Some(rx);
    let (o, remote) = orchestrator(fake).await;

    // The fresh state's background upload hangs on the gate.
    let first = o.refetch().await;
    assert_eq!(first.outcome, SyncOutcome::FreshCurriculum);
    settle().await;

    // No curriculum left, so the backup is restored and its fingerprint
    // recorded while the upload is still pending.
    let second = tokio::time::timeout(Duration::from_secs(5), o.bootstrap())
      .await
      .expect("commit waited on the pending upload");
    assert_eq!(second.outcome, SyncOutcome::BackupOnly);

    let _ = tx.send(());
    settle().await;
    assert_eq!(remote.uploads(), 1);
  }
}
