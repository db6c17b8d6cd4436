//! Detection of id collisions the merge cannot interpret.
//!
//! The merge matches nodes by id within a parent, and progress is re-attached
//! by lesson id across the whole tree. Two situations break those
//! assumptions: an id occurring twice in one tree, and a unit or lesson that
//! sits under different parents in `base` and `remote` (typically an id
//! reused upstream after a delete and re-create). Both are reported, never
//! repaired; the merge still runs and keeps every node it would otherwise
//! keep.

use std::collections::HashMap;

use serde::Serialize;
use syllabus_core::curriculum::RawCurriculumData;

use crate::normalize::NodeKind;

/// Which input tree an ambiguity was found in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
  Base,
  Local,
  Remote,
}

impl std::fmt::Display for Side {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Base => "base",
      Self::Local => "local",
      Self::Remote => "remote",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Ambiguity {
  /// `id` is used by more than one node of `kind` within one tree.
  DuplicateId {
    side: Side,
    kind: NodeKind,
    id:   String,
  },
  /// A unit or lesson moved to a different parent between base and remote.
  Reparented {
    kind:          NodeKind,
    id:            String,
    base_parent:   String,
    remote_parent: String,
  },
}

impl std::fmt::Display for Ambiguity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::DuplicateId { side, kind, id } => {
        write!(f, "{kind} id {id} occurs more than once in the {side} tree")
      }
      Self::Reparented { kind, id, base_parent, remote_parent } => write!(
        f,
        "{kind} {id} moved from {base_parent} to {remote_parent} upstream"
      ),
    }
  }
}

impl From<Ambiguity> for syllabus_core::Error {
  fn from(value: Ambiguity) -> Self { Self::MergeAmbiguity(value.to_string()) }
}

/// Every ambiguity across the three merge inputs, in a stable order.
pub fn find_ambiguities(
  base: &RawCurriculumData,
  local: &RawCurriculumData,
  remote: &RawCurriculumData,
) -> Vec<Ambiguity> {
  let mut found = Vec::new();
  for (side, tree) in [(Side::Base, base), (Side::Local, local), (Side::Remote, remote)] {
    found.extend(duplicate_ids(side, tree));
  }

  let base_parents = parents(base);
  let remote_parents = parents(remote);
  for (kind, id, remote_parent) in &remote_parents.ordered {
    let Some(base_parent) = base_parents.by_node.get(&(*kind, *id)) else {
      continue;
    };
    if base_parent != remote_parent {
      found.push(Ambiguity::Reparented {
        kind:          *kind,
        id:            (*id).to_string(),
        base_parent:   (*base_parent).to_string(),
        remote_parent: (*remote_parent).to_string(),
      });
    }
  }

  found
}

fn duplicate_ids<'a>(side: Side, tree: &'a RawCurriculumData) -> Vec<Ambiguity> {
  let mut seen: HashMap<(NodeKind, &'a str), usize> = HashMap::new();
  let mut order = Vec::new();

  let mut visit = |kind: NodeKind, id: &'a str| {
    let count = seen.entry((kind, id)).or_insert(0);
    *count += 1;
    if *count == 2 {
      order.push((kind, id.to_string()));
    }
  };

  for subject in &tree.subjects {
    visit(NodeKind::Subject, &subject.id);
    for unit in &subject.units {
      visit(NodeKind::Unit, &unit.id);
      for lesson in &unit.lessons {
        visit(NodeKind::Lesson, &lesson.id);
      }
    }
  }

  order
    .into_iter()
    .map(|(kind, id)| Ambiguity::DuplicateId { side, kind, id })
    .collect()
}

struct Parents<'a> {
  ordered: Vec<(NodeKind, &'a str, &'a str)>,
  by_node: HashMap<(NodeKind, &'a str), &'a str>,
}

fn parents(tree: &RawCurriculumData) -> Parents<'_> {
  let mut ordered = Vec::new();
  for subject in &tree.subjects {
    for unit in &subject.units {
      ordered.push((NodeKind::Unit, unit.id.as_str(), subject.id.as_str()));
      for lesson in &unit.lessons {
        ordered.push((NodeKind::Lesson, lesson.id.as_str(), unit.id.as_str()));
      }
    }
  }
  let mut by_node = HashMap::with_capacity(ordered.len());
  for (kind, id, parent) in &ordered {
    by_node.entry((*kind, *id)).or_insert(*parent);
  }
  Parents { ordered, by_node }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::fixtures::{subject, tree, unit};

  #[test]
  fn clean_trees_report_nothing() {
    let t = tree(vec![subject("s1", "Math", vec![unit("u1", "A", &[("l1", "x")])])]);
    assert!(find_ambiguities(&t, &t, &t).is_empty());
  }

  #[test]
  fn duplicate_lesson_ids_are_reported_once_per_side() {
    let dup = tree(vec![subject("s1", "Math", vec![
      unit("u1", "A", &[("l1", "x")]),
      unit("u2", "B", &[("l1", "y"), ("l1", "z")]),
    ])]);
    let clean = tree(vec![]);

    let found = find_ambiguities(&clean, &dup, &clean);
    assert_eq!(found, vec![Ambiguity::DuplicateId {
      side: Side::Local,
      kind: NodeKind::Lesson,
      id:   "l1".into(),
    }]);
  }

  #[test]
  fn upstream_move_is_reported() {
    let base = tree(vec![subject("s1", "Math", vec![
      unit("u1", "A", &[("l1", "x")]),
      unit("u2", "B", &[]),
    ])]);
    let remote = tree(vec![subject("s1", "Math", vec![
      unit("u1", "A", &[]),
      unit("u2", "B", &[("l1", "x")]),
    ])]);

    let found = find_ambiguities(&base, &base, &remote);
    assert_eq!(found, vec![Ambiguity::Reparented {
      kind:          NodeKind::Lesson,
      id:            "l1".into(),
      base_parent:   "u1".into(),
      remote_parent: "u2".into(),
    }]);
    assert!(found[0].to_string().contains("moved from u1 to u2"));
  }
}
