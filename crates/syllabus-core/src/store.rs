//! Collaborator traits.
//!
//! The device side of sync talks to a local [`StateStore`] and to remote
//! [`CurriculumSource`], [`BackupSource`] and [`BackupSink`] implementations.
//! The server side is a [`CurriculumRegistry`] plus a [`BackupStore`].
//! Backends (e.g. `syllabus-store-sqlite`) implement these; the sync engine
//! and the API depend only on the traits.
//!
//! All methods return `Send` futures so implementations can be driven from a
//! multi-threaded tokio runtime.

use std::future::Future;

use serde_json::Value;

use crate::{
  registry::{
    CurriculumDetails, CurriculumRecord, CurriculumStatus, CurriculumVersion,
    NewCurriculum, PublicCurriculum,
  },
  remote::{
    BackupFrequency, BackupHistoryItem, BackupPayload, BackupProfile,
    BackupSettings, RemoteCurriculum, RunBackupResult,
  },
  state::AppState,
};

// ─── Device side ─────────────────────────────────────────────────────────────

/// A thin async key/value store holding JSON documents.
///
/// The sync engine uses two slots: [`crate::state::STATE_KEY`] and
/// [`crate::state::BASE_SNAPSHOT_KEY`].
pub trait StateStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn get<'a>(
    &'a self,
    key: &'a str,
  ) -> impl Future<Output = Result<Option<Value>, Self::Error>> + Send + 'a;

  fn set<'a>(
    &'a self,
    key: &'a str,
    value: Value,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

/// Fetches the curriculum currently selected for the session's user.
pub trait CurriculumSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// `None` when nothing is selected or the selection is no longer published.
  fn fetch_curriculum(
    &self,
  ) -> impl Future<Output = Result<Option<RemoteCurriculum>, Self::Error>> + Send + '_;
}

/// Fetches the session user's latest server backup.
pub trait BackupSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn fetch_latest_backup(
    &self,
  ) -> impl Future<Output = Result<Option<BackupPayload>, Self::Error>> + Send + '_;
}

/// Accepts a full state for server-side backup.
pub trait BackupSink: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn upload_backup(
    &self,
    state: AppState,
  ) -> impl Future<Output = Result<RunBackupResult, Self::Error>> + Send + '_;
}

// ─── Server side ─────────────────────────────────────────────────────────────

/// Admin-authored curricula and per-user selection.
pub trait CurriculumRegistry: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Store a new draft curriculum at version 1. `input.data` is normalized
  /// first.
  fn create_curriculum(
    &self,
    input: NewCurriculum,
  ) -> impl Future<Output = Result<CurriculumDetails, Self::Error>> + Send + '_;

  /// Store `input` as the next version of curriculum `id`.
  ///
  /// Fails with [`crate::Error::CurriculumNotFound`] for unknown ids.
  fn update_curriculum<'a>(
    &'a self,
    id: &'a str,
    input: NewCurriculum,
  ) -> impl Future<Output = Result<CurriculumDetails, Self::Error>> + Send + 'a;

  /// A curriculum joined with its active version, or `None`.
  fn get_curriculum<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Option<CurriculumDetails>, Self::Error>> + Send + 'a;

  /// Every saved revision of curriculum `id`, newest first.
  fn list_versions<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<Vec<CurriculumVersion>, Self::Error>> + Send + 'a;

  /// Publish or unpublish curriculum `id`.
  fn set_curriculum_status<'a>(
    &'a self,
    id: &'a str,
    status: CurriculumStatus,
  ) -> impl Future<Output = Result<CurriculumRecord, Self::Error>> + Send + 'a;

  /// Remove curriculum `id`, its versions and any selections of it.
  fn delete_curriculum<'a>(
    &'a self,
    id: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// All curricula regardless of status, most recently updated first.
  fn list_curricula(
    &self,
  ) -> impl Future<Output = Result<Vec<CurriculumRecord>, Self::Error>> + Send + '_;

  /// Published curricula only, by title.
  fn list_published(
    &self,
  ) -> impl Future<Output = Result<Vec<PublicCurriculum>, Self::Error>> + Send + '_;

  /// Point `user_id` at a published curriculum.
  ///
  /// Fails with [`crate::Error::CurriculumNotFound`] or
  /// [`crate::Error::NotPublished`].
  fn select_curriculum<'a>(
    &'a self,
    user_id: &'a str,
    curriculum_id: &'a str,
  ) -> impl Future<Output = Result<CurriculumRecord, Self::Error>> + Send + 'a;

  /// The user's selected curriculum at its active version, if it is still
  /// published.
  fn selected_curriculum<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<RemoteCurriculum>, Self::Error>> + Send + 'a;
}

/// Per-user backup history with content-hash dedup and rate limiting.
pub trait BackupStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn latest_backup<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Option<BackupPayload>, Self::Error>> + Send + 'a;

  /// Store `state` unless it hashes identically to the latest backup.
  ///
  /// Fails with [`crate::Error::BackupRateLimited`] when the latest backup is
  /// too recent.
  fn run_backup<'a>(
    &'a self,
    user_id: &'a str,
    state: Value,
  ) -> impl Future<Output = Result<RunBackupResult, Self::Error>> + Send + 'a;

  /// Newest first.
  fn backup_history<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<Vec<BackupHistoryItem>, Self::Error>> + Send + 'a;

  fn backup_profile<'a>(
    &'a self,
    user_id: &'a str,
  ) -> impl Future<Output = Result<BackupProfile, Self::Error>> + Send + 'a;

  fn set_backup_frequency<'a>(
    &'a self,
    user_id: &'a str,
    frequency: BackupFrequency,
  ) -> impl Future<Output = Result<BackupSettings, Self::Error>> + Send + 'a;
}
