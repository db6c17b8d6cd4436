//! Typed access to the two local store slots.
//!
//! Reads are lenient: a slot that is missing, unreadable or fails validation
//! reads as `None`. Writes report success as a `bool` because persistence is
//! best-effort; the caller keeps its in-memory state either way.

use chrono::NaiveDate;
use serde::Serialize;
use syllabus_core::{
  state::{AppState, BASE_SNAPSHOT_KEY, CurriculumBaseSnapshot, STATE_KEY},
  store::StateStore,
};
use syllabus_merge::{coerce_app_state, coerce_base_snapshot};
use tracing::warn;

async fn read_slot<S: StateStore>(store: &S, key: &str) -> Option<serde_json::Value> {
  match store.get(key).await {
    Ok(value) => value,
    Err(e) => {
      warn!(key, error = %e, "failed to read local slot");
      None
    }
  }
}

pub(crate) async fn read_state<S: StateStore>(store: &S, today: NaiveDate) -> Option<AppState> {
  let value = read_slot(store, STATE_KEY).await?;
  let state = coerce_app_state(&value, today);
  if state.is_none() {
    warn!("stored state is not a valid app state; ignoring it");
  }
  state
}

pub(crate) async fn read_base<S: StateStore>(store: &S) -> Option<CurriculumBaseSnapshot> {
  let value = read_slot(store, BASE_SNAPSHOT_KEY).await?;
  let snapshot = coerce_base_snapshot(&value);
  if snapshot.is_none() {
    warn!("stored base snapshot is invalid; treating it as absent");
  }
  snapshot
}

async fn write_slot<S: StateStore, T: Serialize>(store: &S, key: &str, value: &T) -> bool {
  let json = match serde_json::to_value(value) {
    Ok(json) => json,
    Err(e) => {
      warn!(key, error = %e, "failed to serialize local slot");
      return false;
    }
  };
  match store.set(key, json).await {
    Ok(()) => true,
    Err(e) => {
      warn!(key, error = %e, "failed to persist local slot");
      false
    }
  }
}

pub(crate) async fn write_state<S: StateStore>(store: &S, state: &AppState) -> bool {
  write_slot(store, STATE_KEY, state).await
}

pub(crate) async fn write_base<S: StateStore>(
  store: &S,
  snapshot: &CurriculumBaseSnapshot,
) -> bool {
  write_slot(store, BASE_SNAPSHOT_KEY, snapshot).await
}
