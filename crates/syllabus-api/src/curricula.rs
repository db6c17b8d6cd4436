//! Handlers for `/curricula` endpoints (authoring and the public catalogue).
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/curricula` | All curricula, most recently updated first |
//! | `POST`   | `/curricula` | Body: `{"title":"…","data":{…}}`; creates a draft at version 1 |
//! | `GET`    | `/curricula/public` | Published curricula, by title |
//! | `GET`    | `/curricula/{id}` | Record plus active tree; 404 if not found |
//! | `PUT`    | `/curricula/{id}` | Same body as `POST`; stores the next version |
//! | `DELETE` | `/curricula/{id}` | Also clears user selections |
//! | `GET`    | `/curricula/{id}/versions` | Newest first |
//! | `PUT`    | `/curricula/{id}/status` | Body: `{"status":"published"}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use syllabus_core::{
  registry::{
    CurriculumDetails, CurriculumRecord, CurriculumStatus, CurriculumVersion,
    NewCurriculum, PublicCurriculum,
  },
  store::CurriculumRegistry,
};

use crate::error::ApiError;

// ─── Catalogue ───────────────────────────────────────────────────────────────

/// `GET /curricula`
pub async fn list<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<CurriculumRecord>>, ApiError> {
  let items = store.list_curricula().await.map_err(ApiError::store)?;
  Ok(Json(items))
}

/// `GET /curricula/public`
pub async fn list_public<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<PublicCurriculum>>, ApiError> {
  let items = store.list_published().await.map_err(ApiError::store)?;
  Ok(Json(items))
}

// ─── Authoring ───────────────────────────────────────────────────────────────

/// `POST /curricula`
pub async fn create<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewCurriculum>,
) -> Result<impl IntoResponse, ApiError> {
  let created = store.create_curriculum(body).await.map_err(ApiError::store)?;
  Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /curricula/{id}`
pub async fn get_one<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<CurriculumDetails>, ApiError> {
  let details = store
    .get_curriculum(&id)
    .await
    .map_err(ApiError::store)?
    .ok_or_else(|| ApiError::NotFound(format!("curriculum {id} not found")))?;
  Ok(Json(details))
}

/// `PUT /curricula/{id}`
pub async fn update<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  Json(body): Json<NewCurriculum>,
) -> Result<Json<CurriculumDetails>, ApiError> {
  let updated = store
    .update_curriculum(&id, body)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(updated))
}

/// `DELETE /curricula/{id}`
pub async fn delete<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
  store.delete_curriculum(&id).await.map_err(ApiError::store)?;
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /curricula/{id}/versions`
pub async fn versions<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<CurriculumVersion>>, ApiError> {
  let versions = store.list_versions(&id).await.map_err(ApiError::store)?;
  Ok(Json(versions))
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: CurriculumStatus,
}

/// `PUT /curricula/{id}/status`
pub async fn set_status<S: CurriculumRegistry>(
  State(store): State<Arc<S>>,
  Path(id): Path<String>,
  Json(body): Json<StatusBody>,
) -> Result<Json<CurriculumRecord>, ApiError> {
  let record = store
    .set_curriculum_status(&id, body.status)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(record))
}
