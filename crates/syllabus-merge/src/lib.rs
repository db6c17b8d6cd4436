//! The curriculum merge engine.
//!
//! Pure, synchronous functions from `(base, local, remote)` snapshots to a
//! merged tree. Nothing here performs I/O or owns storage; the sync
//! orchestrator decides which inputs to feed in and persists the result.
//!
//! Pipeline for one sync:
//!
//! 1. [`normalize()`] the remote document into a [`RawCurriculumData`].
//! 2. [`strip_progress`] the learner tree to get the local structure.
//! 3. [`merge_with_base`] against the stored base snapshot, or
//!    [`merge_prefer_local`] when there is none.
//! 4. [`hydrate`] the merged structure with the learner's previous progress.
//!
//! [`RawCurriculumData`]: syllabus_core::curriculum::RawCurriculumData

pub mod ambiguity;
pub mod coerce;
pub mod detect;
pub mod hydrate;
pub mod merge;
pub mod normalize;

pub use ambiguity::{Ambiguity, Side, find_ambiguities};
pub use coerce::{coerce_app_state, coerce_base_snapshot, coerce_subjects};
pub use detect::{lesson_changed, same_day_set, subject_changed, unit_changed};
pub use hydrate::{hydrate, project_progress, strip_progress};
pub use merge::{merge_prefer_local, merge_with_base, resolve_three_way};
pub use normalize::{NodeKind, generate_id, normalize};
