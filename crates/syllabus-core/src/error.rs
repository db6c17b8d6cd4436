//! Error types for `syllabus-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Curriculum or state JSON was missing fields it cannot be defaulted from.
  #[error("malformed input: {0}")]
  MalformedInput(String),

  /// A network or backend fetch failed during a sync.
  #[error("sync unavailable: {0}")]
  SyncUnavailable(String),

  /// Node ids collide in a way the merge cannot interpret.
  #[error("merge ambiguity: {0}")]
  MergeAmbiguity(String),

  #[error("persistence failure: {0}")]
  Persistence(String),

  #[error("curriculum not found: {0}")]
  CurriculumNotFound(String),

  #[error("curriculum {0} is not published")]
  NotPublished(String),

  #[error("backup was just created; retry in {wait_secs}s")]
  BackupRateLimited { wait_secs: u64 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
