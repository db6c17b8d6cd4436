//! Error type for `syllabus-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Domain failures such as unknown curricula or rate-limited backups.
  #[error("core error: {0}")]
  Core(#[from] syllabus_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A column held a value outside its expected domain.
  #[error("invalid column value: {0}")]
  InvalidColumn(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
