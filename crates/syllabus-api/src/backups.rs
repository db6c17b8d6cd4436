//! Handlers for `/users/{user_id}/backups` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/{user_id}/backups` | History, newest first |
//! | `POST` | `/users/{user_id}/backups` | Body: `{"state":{…}}`; 201 when stored, 200 when deduped, 429 when too soon |
//! | `GET`  | `/users/{user_id}/backups/latest` | `{"backup": …}` |
//! | `GET`  | `/users/{user_id}/backups/profile` | Settings, history and `dueNow` |
//! | `PUT`  | `/users/{user_id}/backups/settings` | Body: `{"frequency":"daily"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use syllabus_core::{
  remote::{
    BackupFrequency, BackupHistoryItem, BackupProfile, BackupSettings,
    LatestBackupResponse, RunBackupRequest,
  },
  store::BackupStore,
};

use crate::error::ApiError;

/// `GET /users/{user_id}/backups`
pub async fn history<S: BackupStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
) -> Result<Json<Vec<BackupHistoryItem>>, ApiError> {
  let items = store.backup_history(&user_id).await.map_err(ApiError::store)?;
  Ok(Json(items))
}

/// `POST /users/{user_id}/backups`
pub async fn run<S: BackupStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
  Json(body): Json<RunBackupRequest>,
) -> Result<impl IntoResponse, ApiError> {
  if !body.state.is_object() {
    return Err(ApiError::BadRequest("state must be an object".into()));
  }
  let result = store
    .run_backup(&user_id, body.state)
    .await
    .map_err(ApiError::store)?;
  let status = if result.stored { StatusCode::CREATED } else { StatusCode::OK };
  Ok((status, Json(result)))
}

/// `GET /users/{user_id}/backups/latest`
pub async fn latest<S: BackupStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
) -> Result<Json<LatestBackupResponse>, ApiError> {
  let backup = store.latest_backup(&user_id).await.map_err(ApiError::store)?;
  Ok(Json(LatestBackupResponse { backup }))
}

/// `GET /users/{user_id}/backups/profile`
pub async fn profile<S: BackupStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
) -> Result<Json<BackupProfile>, ApiError> {
  let profile = store.backup_profile(&user_id).await.map_err(ApiError::store)?;
  Ok(Json(profile))
}

#[derive(Debug, Deserialize)]
pub struct SettingsBody {
  pub frequency: BackupFrequency,
}

/// `PUT /users/{user_id}/backups/settings`
pub async fn set_settings<S: BackupStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
  Json(body): Json<SettingsBody>,
) -> Result<Json<BackupSettings>, ApiError> {
  let settings = store
    .set_backup_frequency(&user_id, body.frequency)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(settings))
}
