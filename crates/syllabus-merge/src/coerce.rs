//! Lenient parsing of persisted learner state and base snapshots.
//!
//! Stored and backed-up documents are trusted only after they pass through
//! here. Structure goes through [`normalize`]; scalar fields that fail to
//! parse fall back to their defaults instead of rejecting the document.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::{Map, Value};
use syllabus_core::{
  learner::{LessonProgress, LessonStatus, Subject},
  state::{AppState, CurriculumBaseSnapshot, Session, WeeklyEntry},
};

use crate::{
  hydrate::hydrate_with,
  normalize::{array_field, normalize, read_string, subjects_source},
};

// ─── Subjects ────────────────────────────────────────────────────────────────

/// Learner subjects from arbitrary JSON: structure is normalized and progress
/// is read from the same document by lesson id.
pub fn coerce_subjects(value: &Value) -> Vec<Subject> {
  let raw = normalize(value);
  hydrate_with(&raw, &read_progress(value))
}

fn read_progress(value: &Value) -> HashMap<String, LessonProgress> {
  let mut progress = HashMap::new();
  for subject in subjects_source(value).iter().filter_map(Value::as_object) {
    let units = array_field(subject, "units");
    let lesson_lists: Vec<&[Value]> = if units.is_empty() {
      vec![array_field(subject, "lessons")]
    } else {
      units
        .iter()
        .filter_map(Value::as_object)
        .map(|unit| array_field(unit, "lessons"))
        .collect()
    };

    for lesson in lesson_lists.into_iter().flatten().filter_map(Value::as_object) {
      if let Some(id) = read_string(lesson, "id") {
        progress.insert(id, read_lesson_progress(lesson));
      }
    }
  }
  progress
}

fn read_lesson_progress(lesson: &Map<String, Value>) -> LessonProgress {
  let defaults = LessonProgress::default();
  LessonProgress {
    status:       lesson
      .get("status")
      .and_then(Value::as_str)
      .and_then(|s| s.parse::<LessonStatus>().ok())
      .unwrap_or(defaults.status),
    xp:           read_u32(lesson, "xp").unwrap_or(defaults.xp),
    completed_at: lesson
      .get("completedAt")
      .and_then(Value::as_str)
      .map(str::to_string),
  }
}

// ─── AppState ────────────────────────────────────────────────────────────────

/// Accept any object whose `subjects` is an array; reject everything else.
///
/// `today` anchors the replacement chart when `weeklyData` is not a valid
/// seven-entry sequence.
pub fn coerce_app_state(value: &Value, today: NaiveDate) -> Option<AppState> {
  let record = value.as_object()?;
  let subjects = record.get("subjects").filter(|s| s.is_array())?;

  let mut state = AppState::initial(today);
  state.subjects = coerce_subjects(subjects);
  state.xp = read_u32(record, "xp").unwrap_or(0);
  state.streak = read_u32(record, "streak").unwrap_or(0);
  state.completed_today = read_u32(record, "completedToday").unwrap_or(0);
  state.last_active = read_string(record, "lastActive");
  state.earned_badges = array_field(record, "earnedBadges")
    .iter()
    .filter_map(Value::as_str)
    .map(str::to_string)
    .collect();
  state.sessions = array_field(record, "sessions")
    .iter()
    .filter_map(|s| serde_json::from_value::<Session>(s.clone()).ok())
    .collect();
  if let Some(weekly) = record
    .get("weeklyData")
    .and_then(|w| serde_json::from_value::<Vec<WeeklyEntry>>(w.clone()).ok())
    .filter(|w| w.len() == 7)
  {
    state.weekly_data = weekly;
  }
  state.owner_user_id = read_string(record, "ownerUserId");
  state.curriculum_id = read_string(record, "curriculumId");
  state.curriculum_version = record.get("curriculumVersion").and_then(read_integer);
  state.curriculum_synced_at = read_timestamp(record, "curriculumSyncedAt");

  Some(state)
}

// ─── Base snapshot ───────────────────────────────────────────────────────────

/// A stored base snapshot, or `None` if it is missing its curriculum id, an
/// integral version, a parseable `updatedAt` or its data. The data is
/// re-normalized.
pub fn coerce_base_snapshot(value: &Value) -> Option<CurriculumBaseSnapshot> {
  let record = value.as_object()?;
  let data = record.get("data").filter(|d| !d.is_null())?;
  Some(CurriculumBaseSnapshot {
    curriculum_id: read_string(record, "curriculumId")?,
    version:       record.get("version").and_then(read_integer)?,
    updated_at:    read_timestamp(record, "updatedAt")?,
    data:          normalize(data),
  })
}

// ─── Scalars ─────────────────────────────────────────────────────────────────

/// Non-negative integers, including integral floats such as `3.0`.
fn read_integer(value: &Value) -> Option<u64> {
  if let Some(n) = value.as_u64() {
    return Some(n);
  }
  let f = value.as_f64()?;
  (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}

fn read_u32(map: &Map<String, Value>, key: &str) -> Option<u32> {
  map
    .get(key)
    .and_then(read_integer)
    .and_then(|n| u32::try_from(n).ok())
}

fn read_timestamp(map: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
  let raw = map.get(key)?.as_str()?;
  DateTime::parse_from_rfc3339(raw)
    .ok()
    .map(|t| t.with_timezone(&Utc))
}
