//! What a sync attempt did, for callers and logs.

use serde::Serialize;
use syllabus_core::state::AppState;
use syllabus_merge::Ambiguity;

use crate::reconcile::Strategy;

/// Per-session lifecycle. `Synced` is re-entered on every successful refetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
  #[default]
  NoSession,
  Bootstrapping,
  Synced,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncOutcome {
  /// A server backup for the remote curriculum was restored and reconciled.
  RestoredBackup,
  /// A new state was hydrated from the remote curriculum with zero progress.
  FreshCurriculum,
  /// The stored local tree was reconciled with the fetched curriculum.
  Merged,
  /// No curriculum is available; the server backup was restored as-is.
  BackupOnly,
  /// Neither a curriculum nor a backup exists; local state is untouched.
  NothingRemote,
  /// Every fetch failed; local state is untouched.
  Offline,
  /// Another bootstrap was already running.
  Skipped,
  /// A sync started later already committed; this result was discarded.
  Superseded,
}

impl SyncOutcome {
  /// Whether this outcome wrote a new local state.
  pub fn is_commit(self) -> bool {
    matches!(
      self,
      Self::RestoredBackup | Self::FreshCurriculum | Self::Merged | Self::BackupOnly
    )
  }
}

/// The result of one orchestrator entry point. Never an error: on failure it
/// describes the local state the session keeps using.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
  pub session:     SessionState,
  pub outcome:     SyncOutcome,
  /// Set when a remote curriculum was reconciled.
  pub strategy:    Option<Strategy>,
  pub ambiguities: Vec<Ambiguity>,
  /// The state the session should use from now on, if there is one.
  pub state:       Option<AppState>,
  /// `false` when the state could not be written to the local store; the
  /// in-memory `state` is still authoritative for this session.
  pub persisted:   bool,
}
