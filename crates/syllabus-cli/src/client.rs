//! Async HTTP client for the Syllabus JSON API.
//!
//! [`ApiClient`] is bound to one user and implements the remote-side traits
//! the sync orchestrator is written against.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{Serialize, de::DeserializeOwned};
use syllabus_core::{
  registry::{CurriculumRecord, PublicCurriculum},
  remote::{
    BackupPayload, LatestBackupResponse, RemoteCurriculum, RunBackupRequest,
    RunBackupResult, SelectedCurriculumResponse,
  },
  state::AppState,
  store::{BackupSink, BackupSource, CurriculumSource},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("{method} {path} → {status}: {message}")]
  Status {
    method:  &'static str,
    path:    String,
    status:  u16,
    message: String,
  },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),
}

/// Connection settings for the Syllabus API.
#[derive(Debug, Clone)]
pub struct ApiConfig {
  pub base_url: String,
  pub user_id:  String,
}

/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client: Client,
  config: ApiConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SelectBody<'a> {
  curriculum_id: &'a str,
}

impl ApiClient {
  pub fn new(config: ApiConfig) -> Result<Self, ClientError> {
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    Ok(Self { client, config })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.config.base_url.trim_end_matches('/'), path)
  }

  fn user_path(&self, rest: &str) -> String { format!("/users/{}{rest}", self.config.user_id) }

  /// Send `req` and decode a JSON body, turning non-2xx statuses into
  /// [`ClientError::Status`] with the server's `error` message.
  async fn send<T: DeserializeOwned>(
    &self,
    method: &'static str,
    path: String,
    req: RequestBuilder,
  ) -> Result<T, ClientError> {
    let resp = req.send().await?;
    let resp = check(method, path, resp).await?;
    Ok(resp.json().await?)
  }

  async fn get<T: DeserializeOwned>(&self, path: String) -> Result<T, ClientError> {
    let req = self.client.get(self.url(&path));
    self.send("GET", path, req).await
  }

  // ── Catalogue ─────────────────────────────────────────────────────────────

  /// `GET /api/curricula/public`
  pub async fn list_public(&self) -> Result<Vec<PublicCurriculum>, ClientError> {
    self.get("/curricula/public".to_string()).await
  }

  /// `PUT /api/users/{user}/curriculum`
  pub async fn select(&self, curriculum_id: &str) -> Result<CurriculumRecord, ClientError> {
    let path = self.user_path("/curriculum");
    let req = self
      .client
      .put(self.url(&path))
      .json(&SelectBody { curriculum_id });
    self.send("PUT", path, req).await
  }
}

async fn check(method: &'static str, path: String, resp: Response) -> Result<Response, ClientError> {
  let status = resp.status();
  if status.is_success() {
    return Ok(resp);
  }
  let body: serde_json::Value = resp.json().await.unwrap_or_default();
  let message = body
    .get("error")
    .and_then(serde_json::Value::as_str)
    .unwrap_or_else(|| status.canonical_reason().unwrap_or("request failed"))
    .to_string();
  Err(ClientError::Status {
    method,
    path,
    status: status.as_u16(),
    message,
  })
}

// ─── Sync traits ─────────────────────────────────────────────────────────────

impl CurriculumSource for ApiClient {
  type Error = ClientError;

  /// `GET /api/users/{user}/curriculum`
  async fn fetch_curriculum(&self) -> Result<Option<RemoteCurriculum>, ClientError> {
    let resp: SelectedCurriculumResponse = self.get(self.user_path("/curriculum")).await?;
    Ok(resp.curriculum)
  }
}

impl BackupSource for ApiClient {
  type Error = ClientError;

  /// `GET /api/users/{user}/backups/latest`
  async fn fetch_latest_backup(&self) -> Result<Option<BackupPayload>, ClientError> {
    let resp: LatestBackupResponse = self.get(self.user_path("/backups/latest")).await?;
    Ok(resp.backup)
  }
}

impl BackupSink for ApiClient {
  type Error = ClientError;

  /// `POST /api/users/{user}/backups`
  async fn upload_backup(&self, state: AppState) -> Result<RunBackupResult, ClientError> {
    let body = RunBackupRequest {
      state: serde_json::to_value(&state)?,
    };
    let path = self.user_path("/backups");
    let req = self.client.post(self.url(&path)).json(&body);
    self.send("POST", path, req).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn urls_are_scoped_to_user() {
    let client = ApiClient::new(ApiConfig {
      base_url: "http://localhost:8080/".into(),
      user_id:  "u-42".into(),
    })
    .unwrap();
    assert_eq!(
      client.url(&client.user_path("/backups/latest")),
      "http://localhost:8080/api/users/u-42/backups/latest"
    );
  }
}
