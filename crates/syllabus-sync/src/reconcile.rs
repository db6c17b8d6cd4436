//! Choosing and applying a merge strategy for one remote curriculum.
//!
//! Everything here is synchronous and free of I/O; the orchestrator reads the
//! inputs from the local store and writes the result back.

use chrono::{DateTime, Utc};
use serde::Serialize;
use syllabus_core::{
  curriculum::RawCurriculumData,
  remote::RemoteCurriculum,
  state::{AppState, CurriculumBaseSnapshot},
};
use syllabus_merge::{
  Ambiguity, find_ambiguities, hydrate, merge_prefer_local, merge_with_base,
  strip_progress,
};

/// How a local tree is reconciled with a freshly fetched remote tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Strategy {
  /// The local tree was already synced against this remote version.
  KeepLocal,
  /// Merge against the stored base snapshot.
  ThreeWay,
  /// No verified ancestor; merge two-way, local scalars winning.
  PreferLocal,
  /// No local state for this curriculum; hydrate the remote tree from
  /// scratch.
  Fresh,
}

impl std::fmt::Display for Strategy {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::KeepLocal => "keep-local",
      Self::ThreeWay => "three-way",
      Self::PreferLocal => "prefer-local",
      Self::Fresh => "fresh",
    })
  }
}

/// Pick a strategy for reconciling `existing` with `remote`.
///
/// A base snapshot only counts when it belongs to the same curriculum, and
/// it is only trusted as the ancestor of the local tree when the local tree
/// records no version or records the snapshot's version.
pub fn choose_strategy(
  existing: Option<&AppState>,
  base: Option<&CurriculumBaseSnapshot>,
  remote: &RemoteCurriculum,
) -> Strategy {
  let Some(existing) = existing
    .filter(|state| state.curriculum_id.as_deref() == Some(remote.id.as_str()))
  else {
    return Strategy::Fresh;
  };
  let base = base.filter(|snapshot| snapshot.curriculum_id == remote.id);

  match (existing.curriculum_version, base) {
    (Some(version), _) if version == remote.version => Strategy::KeepLocal,
    (None, Some(snapshot)) if snapshot.version == remote.version => Strategy::KeepLocal,
    (None, Some(_)) => Strategy::ThreeWay,
    (Some(version), Some(snapshot)) if version == snapshot.version => Strategy::ThreeWay,
    _ => Strategy::PreferLocal,
  }
}

/// The outcome of [`reconcile`].
#[derive(Debug, Clone)]
pub struct Reconciled {
  pub state:       AppState,
  pub strategy:    Strategy,
  pub ambiguities: Vec<Ambiguity>,
}

/// Reconcile `existing` with `remote` (whose normalized tree is `remote_raw`)
/// and stamp the result as synced at `now`.
///
/// Non-curriculum fields of `existing` carry over untouched; a fresh state
/// starts from [`AppState::initial`]. Lesson progress is re-attached by id.
pub fn reconcile(
  existing: Option<&AppState>,
  base: Option<&CurriculumBaseSnapshot>,
  remote: &RemoteCurriculum,
  remote_raw: &RawCurriculumData,
  now: DateTime<Utc>,
) -> Reconciled {
  let today = now.date_naive();
  let strategy = choose_strategy(existing, base, remote);

  let (mut state, ambiguities) = match existing {
    Some(existing) if strategy != Strategy::Fresh => {
      let local_raw = strip_progress(&existing.subjects);
      let (merged, ambiguities) = match (strategy, base) {
        (Strategy::ThreeWay, Some(base)) => (
          merge_with_base(&base.data, &local_raw, remote_raw),
          find_ambiguities(&base.data, &local_raw, remote_raw),
        ),
        (Strategy::KeepLocal, _) => (local_raw, Vec::new()),
        _ => (
          merge_prefer_local(remote_raw, &local_raw),
          find_ambiguities(&RawCurriculumData::default(), &local_raw, remote_raw),
        ),
      };

      let mut state = existing.clone();
      state.subjects = hydrate(&merged, &existing.subjects);
      state.repair_weekly_data(today);
      (state, ambiguities)
    }
    _ => {
      let mut state = AppState::initial(today);
      state.subjects = hydrate(remote_raw, &[]);
      let ambiguities = find_ambiguities(
        &RawCurriculumData::default(),
        &RawCurriculumData::default(),
        remote_raw,
      );
      (state, ambiguities)
    }
  };

  state.curriculum_id = Some(remote.id.clone());
  state.curriculum_version = Some(remote.version);
  state.curriculum_synced_at = Some(now);

  Reconciled {
    state,
    strategy,
    ambiguities,
  }
}
