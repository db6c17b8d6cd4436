//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::{StatusCode, header},
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("too many requests: {message}")]
  TooManyRequests { message: String, retry_after: u64 },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error by the first [`syllabus_core::Error`] in its
  /// source chain. Domain failures map to client errors; everything else is
  /// a 500.
  pub fn store<E>(error: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(&error);
    while let Some(e) = current {
      if let Some(core) = e.downcast_ref::<syllabus_core::Error>() {
        use syllabus_core::Error as Core;
        match core {
          Core::CurriculumNotFound(_) => return Self::NotFound(core.to_string()),
          Core::NotPublished(_) | Core::MalformedInput(_) => {
            return Self::BadRequest(core.to_string());
          }
          Core::BackupRateLimited { wait_secs } => {
            return Self::TooManyRequests {
              message:     core.to_string(),
              retry_after: *wait_secs,
            };
          }
          _ => break,
        }
      }
      current = e.source();
    }
    Self::Store(Box::new(error))
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::TooManyRequests {
        message,
        retry_after,
      } => {
        return (
          StatusCode::TOO_MANY_REQUESTS,
          [(header::RETRY_AFTER, retry_after.to_string())],
          Json(json!({ "error": message, "retryAfterSeconds": retry_after })),
        )
          .into_response();
      }
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store error");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[derive(Debug, Error)]
  #[error("backend failed")]
  struct Wrapper(#[source] syllabus_core::Error);

  #[test]
  fn classifies_through_source_chain() {
    let err = ApiError::store(Wrapper(syllabus_core::Error::CurriculumNotFound("cur_x".into())));
    assert!(matches!(err, ApiError::NotFound(_)));

    let err = ApiError::store(Wrapper(syllabus_core::Error::BackupRateLimited { wait_secs: 12 }));
    assert!(matches!(err, ApiError::TooManyRequests { retry_after: 12, .. }));

    let err = ApiError::store(Wrapper(syllabus_core::Error::Persistence("disk".into())));
    assert!(matches!(err, ApiError::Store(_)));
  }

  #[test]
  fn rate_limit_sets_retry_after() {
    let resp = ApiError::TooManyRequests {
      message:     "slow down".into(),
      retry_after: 5,
    }
    .into_response();
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(resp.headers()[header::RETRY_AFTER], "5");
  }
}
