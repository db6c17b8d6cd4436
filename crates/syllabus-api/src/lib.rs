//! JSON REST API for Syllabus.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`CurriculumRegistry`] and [`BackupStore`]. Users are identified by the
//! `{user_id}` path segment; authentication, TLS and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", syllabus_api::api_router(store.clone()))
//! ```

pub mod backups;
pub mod curricula;
pub mod error;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, put},
};
use syllabus_core::store::{BackupStore, CurriculumRegistry};

pub use error::ApiError;

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: CurriculumRegistry + BackupStore + 'static,
{
  Router::new()
    // Authoring and catalogue
    .route("/curricula", get(curricula::list::<S>).post(curricula::create::<S>))
    .route("/curricula/public", get(curricula::list_public::<S>))
    .route(
      "/curricula/{id}",
      get(curricula::get_one::<S>)
        .put(curricula::update::<S>)
        .delete(curricula::delete::<S>),
    )
    .route("/curricula/{id}/versions", get(curricula::versions::<S>))
    .route("/curricula/{id}/status", put(curricula::set_status::<S>))
    // Learner session
    .route(
      "/users/{user_id}/curriculum",
      get(users::selected::<S>).put(users::select::<S>),
    )
    .route("/users/{user_id}/bootstrap", get(users::bootstrap::<S>))
    // Backups
    .route(
      "/users/{user_id}/backups",
      get(backups::history::<S>).post(backups::run::<S>),
    )
    .route("/users/{user_id}/backups/latest", get(backups::latest::<S>))
    .route("/users/{user_id}/backups/profile", get(backups::profile::<S>))
    .route("/users/{user_id}/backups/settings", put(backups::set_settings::<S>))
    .with_state(store)
}
