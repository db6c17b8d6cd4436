//! Handlers for a learner's curriculum selection and session bootstrap.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/users/{user_id}/curriculum` | `{"curriculum": …}`, `null` when none or unpublished |
//! | `PUT`  | `/users/{user_id}/curriculum` | Body: `{"curriculumId":"cur_…"}`; must be published |
//! | `GET`  | `/users/{user_id}/bootstrap` | Selected curriculum and latest backup in one call |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
};
use serde::Deserialize;
use syllabus_core::{
  registry::CurriculumRecord,
  remote::{BootstrapPayload, SelectedCurriculumResponse},
  store::{BackupStore, CurriculumRegistry},
};

use crate::error::ApiError;

/// `GET /users/{user_id}/curriculum`
pub async fn selected<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
) -> Result<Json<SelectedCurriculumResponse>, ApiError> {
  let curriculum = store
    .selected_curriculum(&user_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(SelectedCurriculumResponse { curriculum }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectBody {
  pub curriculum_id: String,
}

/// `PUT /users/{user_id}/curriculum`
pub async fn select<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
  Json(body): Json<SelectBody>,
) -> Result<Json<CurriculumRecord>, ApiError> {
  let curriculum_id = body.curriculum_id.trim();
  if curriculum_id.is_empty() {
    return Err(ApiError::BadRequest("curriculumId is required".into()));
  }
  let record = store
    .select_curriculum(&user_id, curriculum_id)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(record))
}

/// `GET /users/{user_id}/bootstrap`
pub async fn bootstrap<S: CurriculumRegistry + BackupStore>(
  State(store): State<Arc<S>>,
  Path(user_id): Path<String>,
) -> Result<Json<BootstrapPayload>, ApiError> {
  let (curriculum, backup) = tokio::join!(
    store.selected_curriculum(&user_id),
    store.latest_backup(&user_id)
  );
  Ok(Json(BootstrapPayload {
    curriculum: curriculum.map_err(ApiError::store)?,
    backup:     backup.map_err(ApiError::store)?,
  }))
}
