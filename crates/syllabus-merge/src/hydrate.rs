//! Progress projection: detaching learner progress from a tree and
//! re-attaching it to another tree by lesson id.

use std::collections::HashMap;

use syllabus_core::{
  curriculum::{
    RawCurriculumData, RawLesson, RawSubject, RawUnit, canonical_schedule_days,
  },
  learner::{Lesson, LessonProgress, Subject, Unit, all_lessons},
};

/// Lesson id → progress, over every lesson in `subjects`.
///
/// If an id occurs more than once the last occurrence wins.
pub fn project_progress(subjects: &[Subject]) -> HashMap<String, LessonProgress> {
  all_lessons(subjects)
    .map(|lesson| (lesson.id.clone(), lesson.progress()))
    .collect()
}

/// Give `raw`'s structure the progress recorded in `previous`.
///
/// Lessons whose id is not found in `previous` start from
/// [`LessonProgress::default`].
pub fn hydrate(raw: &RawCurriculumData, previous: &[Subject]) -> Vec<Subject> {
  hydrate_with(raw, &project_progress(previous))
}

/// [`hydrate`] against an already-projected progress map.
pub fn hydrate_with(
  raw: &RawCurriculumData,
  progress: &HashMap<String, LessonProgress>,
) -> Vec<Subject> {
  raw
    .subjects
    .iter()
    .map(|subject| Subject {
      id:            subject.id.clone(),
      name:          subject.name.clone(),
      color:         subject.color.clone(),
      schedule_days: subject.schedule_days.clone(),
      units:         subject
        .units
        .iter()
        .map(|unit| Unit {
          id:      unit.id.clone(),
          name:    unit.name.clone(),
          lessons: unit
            .lessons
            .iter()
            .map(|lesson| {
              let carried = progress.get(&lesson.id).cloned().unwrap_or_default();
              Lesson::from_raw(lesson, carried)
            })
            .collect(),
        })
        .collect(),
    })
    .collect()
}

/// The structural part of a learner tree, as the merge engine sees it.
pub fn strip_progress(subjects: &[Subject]) -> RawCurriculumData {
  RawCurriculumData {
    subjects: subjects
      .iter()
      .map(|subject| RawSubject {
        id:            subject.id.clone(),
        name:          subject.name.clone(),
        color:         subject.color.clone(),
        schedule_days: canonical_schedule_days(
          subject.schedule_days.iter().map(|d| i64::from(*d)),
        ),
        units:         subject
          .units
          .iter()
          .map(|unit| RawUnit {
            id:      unit.id.clone(),
            name:    unit.name.clone(),
            lessons: unit
              .lessons
              .iter()
              .map(|lesson| RawLesson {
                id:    lesson.id.clone(),
                title: lesson.title.clone(),
              })
              .collect(),
          })
          .collect(),
      })
      .collect(),
  }
}
