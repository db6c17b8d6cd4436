//! Learner-local application state and the base snapshot used as the merge
//! pivot.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{curriculum::RawCurriculumData, learner::Subject};

// ─── Storage keys ────────────────────────────────────────────────────────────

/// Local store slot holding the serialized [`AppState`].
pub const STATE_KEY: &str = "state";

/// Local store slot holding the serialized [`CurriculumBaseSnapshot`].
pub const BASE_SNAPSHOT_KEY: &str = "curriculum.base";

// ─── Display defaults ────────────────────────────────────────────────────────

/// Palette cycled through for subjects without a colour, by subject index.
pub const SUBJECT_COLORS: [&str; 9] = [
  "#f59e0b", "#818cf8", "#34d399", "#f87171", "#38bdf8", "#fb923c", "#a78bfa",
  "#4ade80", "#f472b6",
];

/// Indexed by `Weekday::num_days_from_sunday`.
pub const DAY_NAMES: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];

// ─── Activity ────────────────────────────────────────────────────────────────

/// One day of the rolling seven-day activity chart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyEntry {
  pub day:     String,
  pub xp:      u32,
  pub lessons: u32,
}

/// A logged focus session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub id:         String,
  pub subject_id: String,
  /// Minutes.
  pub duration:   u32,
  pub date:       String,
}

/// Seven zeroed entries covering the six days before `today` plus `today`.
pub fn empty_weekly_data(today: NaiveDate) -> Vec<WeeklyEntry> {
  (0..7u64)
    .map(|i| {
      let date = today.checked_sub_days(Days::new(6 - i)).unwrap_or(today);
      WeeklyEntry {
        day:     DAY_NAMES[date.weekday().num_days_from_sunday() as usize]
          .to_string(),
        xp:      0,
        lessons: 0,
      }
    })
    .collect()
}

// ─── AppState ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
  pub subjects:             Vec<Subject>,
  pub xp:                   u32,
  pub streak:               u32,
  pub last_active:          Option<String>,
  pub completed_today:      u32,
  pub earned_badges:        BTreeSet<String>,
  pub sessions:             Vec<Session>,
  pub weekly_data:          Vec<WeeklyEntry>,
  pub owner_user_id:        Option<String>,
  pub curriculum_id:        Option<String>,
  /// Admin version the subjects were last synced against.
  pub curriculum_version:   Option<u64>,
  pub curriculum_synced_at: Option<DateTime<Utc>>,
}

impl AppState {
  /// A blank state with a valid seven-day chart ending on `today`.
  pub fn initial(today: NaiveDate) -> Self {
    Self {
      subjects:             Vec::new(),
      xp:                   0,
      streak:               0,
      last_active:          None,
      completed_today:      0,
      earned_badges:        BTreeSet::new(),
      sessions:             Vec::new(),
      weekly_data:          empty_weekly_data(today),
      owner_user_id:        None,
      curriculum_id:        None,
      curriculum_version:   None,
      curriculum_synced_at: None,
    }
  }

  /// Replace `weekly_data` with a zeroed chart unless it has exactly seven
  /// entries.
  pub fn repair_weekly_data(&mut self, today: NaiveDate) {
    if self.weekly_data.len() != 7 {
      self.weekly_data = empty_weekly_data(today);
    }
  }
}

// ─── Base snapshot ───────────────────────────────────────────────────────────

/// The last remote tree this device successfully synchronized against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumBaseSnapshot {
  pub curriculum_id: String,
  pub version:       u64,
  pub updated_at:    DateTime<Utc>,
  pub data:          RawCurriculumData,
}
