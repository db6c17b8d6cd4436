//! The learner's copy of the curriculum.
//!
//! Same structure as [`crate::curriculum`], but every lesson carries mutable
//! progress. Progress is keyed by lesson id and never appears in the
//! authoring copy.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::curriculum::RawLesson;

/// XP credited for a lesson that has no recorded progress yet.
pub const DEFAULT_LESSON_XP: u32 = 10;

// ─── Progress ────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum LessonStatus {
  #[default]
  Pending,
  Explained,
  Solved,
  Done,
}

/// The mutable part of a lesson, detached from its position in the tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonProgress {
  pub status:       LessonStatus,
  pub xp:           u32,
  /// Day name or date tag recorded when the lesson was completed.
  pub completed_at: Option<String>,
}

impl Default for LessonProgress {
  fn default() -> Self {
    Self {
      status:       LessonStatus::Pending,
      xp:           DEFAULT_LESSON_XP,
      completed_at: None,
    }
  }
}

// ─── Tree ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lesson {
  pub id:           String,
  pub title:        String,
  #[serde(default)]
  pub status:       LessonStatus,
  #[serde(default = "default_xp")]
  pub xp:           u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub completed_at: Option<String>,
}

fn default_xp() -> u32 { DEFAULT_LESSON_XP }

impl Lesson {
  pub fn from_raw(raw: &RawLesson, progress: LessonProgress) -> Self {
    Self {
      id:           raw.id.clone(),
      title:        raw.title.clone(),
      status:       progress.status,
      xp:           progress.xp,
      completed_at: progress.completed_at,
    }
  }

  pub fn progress(&self) -> LessonProgress {
    LessonProgress {
      status:       self.status,
      xp:           self.xp,
      completed_at: self.completed_at.clone(),
    }
  }

  pub fn is_done(&self) -> bool { self.status == LessonStatus::Done }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
  pub id:      String,
  pub name:    String,
  pub lessons: Vec<Lesson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subject {
  pub id:            String,
  pub name:          String,
  pub color:         String,
  pub schedule_days: Vec<u8>,
  pub units:         Vec<Unit>,
}

/// Every lesson across `subjects`, in tree order.
pub fn all_lessons(subjects: &[Subject]) -> impl Iterator<Item = &Lesson> {
  subjects
    .iter()
    .flat_map(|s| s.units.iter())
    .flat_map(|u| u.lessons.iter())
}
