//! Payloads exchanged with the curriculum and backup services.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── Curriculum ──────────────────────────────────────────────────────────────

/// An admin-published curriculum as fetched by a learner device.
///
/// `data` is left untyped: it may be in the canonical shape or a legacy one
/// and is only trusted after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteCurriculum {
  pub id:         String,
  pub title:      String,
  /// Bumped by the admin on every save; starts at 1.
  pub version:    u64,
  pub updated_at: DateTime<Utc>,
  pub data:       serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectedCurriculumResponse {
  pub curriculum: Option<RemoteCurriculum>,
}

// ─── Backups ─────────────────────────────────────────────────────────────────

/// The most recent server-side copy of a user's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupPayload {
  pub id:         String,
  pub created_at: DateTime<Utc>,
  /// `AppState`-shaped, unvalidated.
  pub state:      serde_json::Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LatestBackupResponse {
  pub backup: Option<BackupPayload>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunBackupRequest {
  pub state: serde_json::Value,
}

/// One entry of a user's backup history, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupHistoryItem {
  pub id:         String,
  pub created_at: DateTime<Utc>,
  pub bytes:      u64,
  /// SHA-256 hex digest of the sorted-key JSON of the state.
  pub state_hash: String,
}

/// Result of asking the backup service to store a state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunBackupResult {
  pub item:    BackupHistoryItem,
  pub stored:  bool,
  /// `true` when the state hashed identically to the latest backup.
  pub deduped: bool,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackupFrequency {
  Daily,
  #[default]
  Weekly,
  Monthly,
}

impl BackupFrequency {
  pub fn interval(self) -> Duration {
    match self {
      Self::Daily => Duration::days(1),
      Self::Weekly => Duration::days(7),
      Self::Monthly => Duration::days(30),
    }
  }

  /// Whether a new backup is due given the time of the last one.
  pub fn is_due(self, last_backup_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_backup_at {
      None => true,
      Some(last) => now - last >= self.interval(),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
  pub user_id:    String,
  pub frequency:  BackupFrequency,
  pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupProfile {
  pub settings:      BackupSettings,
  pub latest_backup: Option<BackupHistoryItem>,
  pub history:       Vec<BackupHistoryItem>,
  pub due_now:       bool,
}

// ─── Bootstrap ───────────────────────────────────────────────────────────────

/// Everything a device needs at session start, fetched in one round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BootstrapPayload {
  pub curriculum: Option<RemoteCurriculum>,
  pub backup:     Option<BackupPayload>,
}
