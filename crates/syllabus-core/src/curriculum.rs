//! The authoring-side curriculum tree.
//!
//! This is the shape admins publish and the merge engine operates on. It
//! carries structure only: learner progress is attached afterwards by
//! hydration (see [`crate::learner`]).

use serde::{Deserialize, Serialize};

// ─── Nodes ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLesson {
  pub id:    String,
  pub title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawUnit {
  pub id:      String,
  pub name:    String,
  pub lessons: Vec<RawLesson>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSubject {
  pub id:            String,
  pub name:          String,
  /// Display token, usually a hex colour.
  pub color:         String,
  /// Weekdays this subject is studied on; `0` is Sunday. Kept ascending and
  /// de-duplicated by normalization.
  pub schedule_days: Vec<u8>,
  pub units:         Vec<RawUnit>,
}

// ─── Tree ────────────────────────────────────────────────────────────────────

/// A whole curriculum document.
///
/// Invariant: every node has a non-empty `id`, and ids are unique within
/// their parent's sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCurriculumData {
  pub subjects: Vec<RawSubject>,
}

impl RawCurriculumData {
  pub fn lessons(&self) -> impl Iterator<Item = &RawLesson> {
    self
      .subjects
      .iter()
      .flat_map(|s| s.units.iter())
      .flat_map(|u| u.lessons.iter())
  }
}

/// Reduce arbitrary day numbers to an ascending, de-duplicated set within
/// `0..=6`. Out-of-range values are dropped.
pub fn canonical_schedule_days(days: impl IntoIterator<Item = i64>) -> Vec<u8> {
  let mut out: Vec<u8> = days
    .into_iter()
    .filter(|d| (0..=6).contains(d))
    .map(|d| d as u8)
    .collect();
  out.sort_unstable();
  out.dedup();
  out
}
