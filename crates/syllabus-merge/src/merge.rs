//! Three-way and prefer-local curriculum merges.
//!
//! Every level of the tree (subjects, units, lessons) is merged by the same
//! generic routine over [`TreeNode`]; the levels differ only in which scalar
//! fields they resolve and whether they have children.
//!
//! All merges are pure and deterministic: identical inputs produce identical
//! output, which keeps content-hash dedup of backups effective.

use std::collections::{HashMap, HashSet, VecDeque};

use syllabus_core::curriculum::{RawCurriculumData, RawLesson, RawSubject, RawUnit};

use crate::detect::{
  index_by_id, lesson_changed, same_day_set, subject_changed, unit_changed,
};

// ─── Scalar resolution ───────────────────────────────────────────────────────

/// Resolve one field of a node against its common ancestor.
///
/// - no local value: take remote
/// - local value but no base value: take local (a local addition)
/// - local differs from base (per `same`): take local
/// - otherwise: take remote
pub fn resolve_three_way<T: Clone>(
  local: Option<&T>,
  base: Option<&T>,
  remote: &T,
  same: impl Fn(&T, &T) -> bool,
) -> T {
  match (local, base) {
    (None, _) => remote.clone(),
    (Some(local), None) => local.clone(),
    (Some(local), Some(base)) if same(local, base) => remote.clone(),
    (Some(local), Some(_)) => local.clone(),
  }
}

fn resolve_string(local: &String, base: Option<&String>, remote: &String) -> String {
  resolve_three_way(Some(local), base, remote, |a, b| a == b)
}

/// Local wins whenever it carries a non-empty value.
fn prefer_non_empty(local: &str, remote: &str) -> String {
  let value = if local.is_empty() { remote } else { local };
  value.to_string()
}

// ─── Tree nodes ──────────────────────────────────────────────────────────────

pub(crate) trait TreeNode: Clone {
  fn id(&self) -> &str;

  /// Whether this (local) node carries an edit relative to `base`.
  fn changed_from(&self, base: &Self) -> bool;

  /// Merge a node present both locally and remotely.
  fn merge_three_way(base: Option<&Self>, local: &Self, remote: &Self) -> Self;

  fn merge_prefer_local(remote: &Self, local: &Self) -> Self;
}

impl TreeNode for RawLesson {
  fn id(&self) -> &str { &self.id }

  fn changed_from(&self, base: &Self) -> bool { lesson_changed(self, base) }

  fn merge_three_way(base: Option<&Self>, local: &Self, remote: &Self) -> Self {
    Self {
      id:    remote.id.clone(),
      title: resolve_string(&local.title, base.map(|b| &b.title), &remote.title),
    }
  }

  fn merge_prefer_local(remote: &Self, local: &Self) -> Self {
    Self {
      id:    remote.id.clone(),
      title: prefer_non_empty(&local.title, &remote.title),
    }
  }
}

impl TreeNode for RawUnit {
  fn id(&self) -> &str { &self.id }

  fn changed_from(&self, base: &Self) -> bool { unit_changed(self, base) }

  fn merge_three_way(base: Option<&Self>, local: &Self, remote: &Self) -> Self {
    Self {
      id:      remote.id.clone(),
      name:    resolve_string(&local.name, base.map(|b| &b.name), &remote.name),
      lessons: merge_children(
        base.map(|b| b.lessons.as_slice()).unwrap_or_default(),
        &local.lessons,
        &remote.lessons,
      ),
    }
  }

  fn merge_prefer_local(remote: &Self, local: &Self) -> Self {
    Self {
      id:      remote.id.clone(),
      name:    prefer_non_empty(&local.name, &remote.name),
      lessons: merge_children_prefer_local(&remote.lessons, &local.lessons),
    }
  }
}

impl TreeNode for RawSubject {
  fn id(&self) -> &str { &self.id }

  fn changed_from(&self, base: &Self) -> bool { subject_changed(self, base) }

  fn merge_three_way(base: Option<&Self>, local: &Self, remote: &Self) -> Self {
    Self {
      id:            remote.id.clone(),
      name:          resolve_string(&local.name, base.map(|b| &b.name), &remote.name),
      color:         resolve_string(
        &local.color,
        base.map(|b| &b.color),
        &remote.color,
      ),
      schedule_days: resolve_three_way(
        Some(&local.schedule_days),
        base.map(|b| &b.schedule_days),
        &remote.schedule_days,
        |a, b| same_day_set(a, b),
      ),
      units:         merge_children(
        base.map(|b| b.units.as_slice()).unwrap_or_default(),
        &local.units,
        &remote.units,
      ),
    }
  }

  fn merge_prefer_local(remote: &Self, local: &Self) -> Self {
    Self {
      id:            remote.id.clone(),
      name:          prefer_non_empty(&local.name, &remote.name),
      color:         prefer_non_empty(&local.color, &remote.color),
      schedule_days: if local.schedule_days.is_empty() {
        remote.schedule_days.clone()
      } else {
        local.schedule_days.clone()
      },
      units:         merge_children_prefer_local(&remote.units, &local.units),
    }
  }
}

// ─── Sequences ───────────────────────────────────────────────────────────────

/// Local siblings grouped by id and handed out in order, so each local node
/// is matched at most once even when an id repeats.
struct LocalSlots<'a, T> {
  nodes:    &'a [T],
  by_id:    HashMap<&'a str, VecDeque<usize>>,
  consumed: Vec<bool>,
}

impl<'a, T: TreeNode> LocalSlots<'a, T> {
  fn new(nodes: &'a [T]) -> Self {
    let mut by_id: HashMap<&str, VecDeque<usize>> = HashMap::with_capacity(nodes.len());
    for (index, node) in nodes.iter().enumerate() {
      by_id.entry(node.id()).or_default().push_back(index);
    }
    Self {
      nodes,
      by_id,
      consumed: vec![false; nodes.len()],
    }
  }

  /// Whether `id` occurs locally at all, matched or not.
  fn contains(&self, id: &str) -> bool { self.by_id.contains_key(id) }

  /// Claim the next unmatched local node with `id`.
  fn take(&mut self, id: &str) -> Option<usize> {
    let index = self.by_id.get_mut(id)?.pop_front()?;
    self.consumed[index] = true;
    Some(index)
  }

  /// Unmatched local nodes, in local order.
  fn remaining(&self) -> impl Iterator<Item = (usize, &'a T)> + '_ {
    let nodes = self.nodes;
    nodes
      .iter()
      .enumerate()
      .filter(|(index, _)| !self.consumed[*index])
  }
}

/// Three-way merge of one sibling sequence.
///
/// Remote nodes survive in remote order, merged with their local counterpart
/// when one exists. A remote node the user deleted locally is dropped unless
/// the remote side changed it since `base`. Local-only nodes are appended if
/// they are new or were edited since `base`; a local node repeating an id
/// that was already matched is always appended. When the remote sequence has
/// the same ids in the same order as `base`, the result takes local order
/// instead, with nodes missing locally keeping their remote position.
pub(crate) fn merge_children<T: TreeNode>(base: &[T], local: &[T], remote: &[T]) -> Vec<T> {
  let base_by_id = index_by_id(base, TreeNode::id);
  let remote_ids: HashSet<&str> = remote.iter().map(TreeNode::id).collect();
  let mut slots = LocalSlots::new(local);

  // Each node carries its sort key for the local-order case.
  let mut merged: Vec<(usize, T)> = Vec::with_capacity(remote.len().max(local.len()));

  for (position, remote_node) in remote.iter().enumerate() {
    let base_node = base_by_id.get(remote_node.id()).copied();
    if let Some(index) = slots.take(remote_node.id()) {
      merged.push((index, T::merge_three_way(base_node, &local[index], remote_node)));
      continue;
    }
    match base_node {
      // Deleted locally and untouched upstream.
      Some(base_node)
        if !slots.contains(remote_node.id()) && !remote_node.changed_from(base_node) => {}
      _ => merged.push((position, remote_node.clone())),
    }
  }

  for (index, local_node) in slots.remaining() {
    let keep = remote_ids.contains(local_node.id())
      || base_by_id
        .get(local_node.id())
        .is_none_or(|base_node| local_node.changed_from(base_node));
    if keep {
      merged.push((index, local_node.clone()));
    }
  }

  let remote_order_unchanged =
    remote.iter().map(TreeNode::id).eq(base.iter().map(TreeNode::id));
  if remote_order_unchanged {
    merged.sort_by_key(|(key, _)| *key);
  }

  merged.into_iter().map(|(_, node)| node).collect()
}

/// Two-way merge of one sibling sequence with no common ancestor.
pub(crate) fn merge_children_prefer_local<T: TreeNode>(remote: &[T], local: &[T]) -> Vec<T> {
  let mut slots = LocalSlots::new(local);

  let mut merged: Vec<T> = remote
    .iter()
    .map(|remote_node| match slots.take(remote_node.id()) {
      Some(index) => T::merge_prefer_local(remote_node, &local[index]),
      None => remote_node.clone(),
    })
    .collect();
  merged.extend(slots.remaining().map(|(_, node)| node.clone()));
  merged
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Merge `local` and `remote` against their common ancestor `base`.
///
/// If `local == base` the result equals `remote`; if `remote == base` the
/// result equals `local`. Lesson progress is not touched here: hydrate the
/// result against the previous learner tree afterwards.
pub fn merge_with_base(
  base: &RawCurriculumData,
  local: &RawCurriculumData,
  remote: &RawCurriculumData,
) -> RawCurriculumData {
  RawCurriculumData {
    subjects: merge_children(&base.subjects, &local.subjects, &remote.subjects),
  }
}

/// Merge without a usable ancestor.
///
/// Matched nodes keep local scalar values whenever they are non-empty;
/// structure follows remote with local-only nodes appended.
pub fn merge_prefer_local(
  remote: &RawCurriculumData,
  local: &RawCurriculumData,
) -> RawCurriculumData {
  RawCurriculumData {
    subjects: merge_children_prefer_local(&remote.subjects, &local.subjects),
  }
}
