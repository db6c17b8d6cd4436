//! Structural change detection between a local node and its base counterpart.
//!
//! Only consulted for nodes the remote side no longer contains: a changed
//! node is a user edit worth keeping, an unchanged one was simply deleted
//! upstream.

use std::collections::HashMap;

use syllabus_core::curriculum::{RawLesson, RawSubject, RawUnit};

/// Set equality for schedule days; order and duplicates are ignored.
pub fn same_day_set(a: &[u8], b: &[u8]) -> bool {
  let mut left = a.to_vec();
  let mut right = b.to_vec();
  left.sort_unstable();
  left.dedup();
  right.sort_unstable();
  right.dedup();
  left == right
}

pub fn lesson_changed(local: &RawLesson, base: &RawLesson) -> bool {
  local.title != base.title
}

pub fn unit_changed(local: &RawUnit, base: &RawUnit) -> bool {
  if local.name != base.name || local.lessons.len() != base.lessons.len() {
    return true;
  }
  let base_lessons = index_by_id(&base.lessons, |l| l.id.as_str());
  local.lessons.iter().any(|lesson| {
    base_lessons
      .get(lesson.id.as_str())
      .is_none_or(|base| lesson_changed(lesson, base))
  })
}

pub fn subject_changed(local: &RawSubject, base: &RawSubject) -> bool {
  if local.name != base.name || local.color != base.color {
    return true;
  }
  if !same_day_set(&local.schedule_days, &base.schedule_days) {
    return true;
  }
  if local.units.len() != base.units.len() {
    return true;
  }
  let base_units = index_by_id(&base.units, |u| u.id.as_str());
  local.units.iter().any(|unit| {
    base_units
      .get(unit.id.as_str())
      .is_none_or(|base| unit_changed(unit, base))
  })
}

/// Index `items` by id. The first occurrence of a duplicated id wins.
pub(crate) fn index_by_id<'a, T>(
  items: &'a [T],
  id: impl Fn(&'a T) -> &'a str,
) -> HashMap<&'a str, &'a T> {
  let mut map = HashMap::with_capacity(items.len());
  for item in items {
    map.entry(id(item)).or_insert(item);
  }
  map
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::{subject, unit};

  #[test]
  fn day_sets_ignore_order() {
    assert!(same_day_set(&[1, 3, 5], &[5, 1, 3]));
    assert!(same_day_set(&[1, 1, 3], &[3, 1]));
    assert!(!same_day_set(&[1, 3], &[1, 4]));
  }

  #[test]
  fn unit_change_cases() {
    let base = unit("u1", "Algebra", &[("l1", "Linear"), ("l2", "Quad")]);
    assert!(!unit_changed(&base.clone(), &base));

    let renamed = unit("u1", "Algebra I", &[("l1", "Linear"), ("l2", "Quad")]);
    assert!(unit_changed(&renamed, &base));

    let retitled = unit("u1", "Algebra", &[("l1", "Linear"), ("l2", "Quadratics")]);
    assert!(unit_changed(&retitled, &base));

    let shorter = unit("u1", "Algebra", &[("l1", "Linear")]);
    assert!(unit_changed(&shorter, &base));

    let swapped_id = unit("u1", "Algebra", &[("l1", "Linear"), ("l9", "Quad")]);
    assert!(unit_changed(&swapped_id, &base));

    let reordered = unit("u1", "Algebra", &[("l2", "Quad"), ("l1", "Linear")]);
    assert!(!unit_changed(&reordered, &base));
  }

  #[test]
  fn subject_change_cases() {
    let base = subject("s1", "Math", vec![unit("u1", "Algebra", &[("l1", "A")])]);
    assert!(!subject_changed(&base.clone(), &base));

    let mut recolored = base.clone();
    recolored.color = "#000000".into();
    assert!(subject_changed(&recolored, &base));

    let mut rescheduled = base.clone();
    rescheduled.schedule_days = vec![2];
    assert!(subject_changed(&rescheduled, &base));

    let mut reordered_days = base.clone();
    reordered_days.schedule_days.reverse();
    assert!(!subject_changed(&reordered_days, &base));

    let mut added_unit = base.clone();
    added_unit.units.push(unit("u2", "Geometry", &[]));
    assert!(subject_changed(&added_unit, &base));

    let replaced_unit =
      subject("s1", "Math", vec![unit("u7", "Algebra", &[("l1", "A")])]);
    assert!(subject_changed(&replaced_unit, &base));

    let nested_edit = subject("s1", "Math", vec![unit("u1", "Algebra", &[("l1", "B")])]);
    assert!(subject_changed(&nested_edit, &base));
  }
}
