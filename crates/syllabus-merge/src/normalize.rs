//! Coercion of arbitrary curriculum JSON into [`RawCurriculumData`].
//!
//! Normalization never fails. Missing ids are generated, missing names fall
//! back to positional defaults, and the legacy flat `lessons` shape is wrapped
//! in a single `"General"` unit. Running it over its own output changes
//! nothing.

use serde::Serialize;
use serde_json::{Map, Value};
use syllabus_core::{
  curriculum::{
    RawCurriculumData, RawLesson, RawSubject, RawUnit, canonical_schedule_days,
  },
  state::SUBJECT_COLORS,
};
use uuid::Uuid;

/// Name given to the unit synthesized around a legacy flat lesson list.
pub const LEGACY_UNIT_NAME: &str = "General";

// ─── Ids ─────────────────────────────────────────────────────────────────────

/// Node kinds, used for id prefixes and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
  Subject,
  Unit,
  Lesson,
}

impl NodeKind {
  pub fn id_prefix(self) -> &'static str {
    match self {
      Self::Subject => "sub",
      Self::Unit => "uni",
      Self::Lesson => "les",
    }
  }
}

impl std::fmt::Display for NodeKind {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(match self {
      Self::Subject => "subject",
      Self::Unit => "unit",
      Self::Lesson => "lesson",
    })
  }
}

/// A fresh id such as `les_3f9a0c1b2d`.
pub fn generate_id(kind: NodeKind) -> String {
  let hex = Uuid::new_v4().simple().to_string();
  format!("{}_{}", kind.id_prefix(), &hex[..10])
}

// ─── Entry point ─────────────────────────────────────────────────────────────

/// Normalize `input`, which may be a bare array of subjects or an object with
/// a `subjects` array. Anything else yields an empty curriculum.
pub fn normalize(input: &Value) -> RawCurriculumData {
  let subjects = subjects_source(input)
    .iter()
    .enumerate()
    .map(|(index, value)| normalize_subject(value, index))
    .collect();
  RawCurriculumData { subjects }
}

pub(crate) fn subjects_source(input: &Value) -> &[Value] {
  match input {
    Value::Array(items) => items,
    Value::Object(map) => array_field(map, "subjects"),
    _ => &[],
  }
}

// ─── Nodes ───────────────────────────────────────────────────────────────────

fn normalize_subject(value: &Value, index: usize) -> RawSubject {
  let empty = Map::new();
  let record = value.as_object().unwrap_or(&empty);

  RawSubject {
    id:            read_string(record, "id")
      .unwrap_or_else(|| generate_id(NodeKind::Subject)),
    name:          read_string(record, "name")
      .unwrap_or_else(|| format!("Subject {}", index + 1)),
    color:         read_string(record, "color").unwrap_or_else(|| {
      SUBJECT_COLORS[index % SUBJECT_COLORS.len()].to_string()
    }),
    schedule_days: schedule_days(record.get("scheduleDays")),
    units:         normalize_units(record),
  }
}

fn normalize_units(subject: &Map<String, Value>) -> Vec<RawUnit> {
  let units = array_field(subject, "units");
  if !units.is_empty() {
    return units
      .iter()
      .enumerate()
      .map(|(index, value)| normalize_unit(value, index))
      .collect();
  }

  let legacy = array_field(subject, "lessons");
  if legacy.is_empty() {
    return Vec::new();
  }

  vec![RawUnit {
    id:      generate_id(NodeKind::Unit),
    name:    LEGACY_UNIT_NAME.to_string(),
    lessons: normalize_lessons(legacy),
  }]
}

fn normalize_unit(value: &Value, index: usize) -> RawUnit {
  let empty = Map::new();
  let record = value.as_object().unwrap_or(&empty);

  RawUnit {
    id:      read_string(record, "id")
      .unwrap_or_else(|| generate_id(NodeKind::Unit)),
    name:    read_string(record, "name")
      .unwrap_or_else(|| format!("Unit {}", index + 1)),
    lessons: normalize_lessons(array_field(record, "lessons")),
  }
}

fn normalize_lessons(values: &[Value]) -> Vec<RawLesson> {
  values
    .iter()
    .enumerate()
    .map(|(index, value)| {
      let empty = Map::new();
      let record = value.as_object().unwrap_or(&empty);
      RawLesson {
        id:    read_string(record, "id")
          .unwrap_or_else(|| generate_id(NodeKind::Lesson)),
        title: read_string(record, "title")
          .unwrap_or_else(|| format!("Lesson {}", index + 1)),
      }
    })
    .collect()
}

// ─── Field readers ───────────────────────────────────────────────────────────

pub(crate) fn array_field<'a>(map: &'a Map<String, Value>, key: &str) -> &'a [Value] {
  map
    .get(key)
    .and_then(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or(&[])
}

/// A trimmed, non-empty string field.
pub(crate) fn read_string(map: &Map<String, Value>, key: &str) -> Option<String> {
  map
    .get(key)
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|s| !s.is_empty())
    .map(str::to_string)
}

/// Integral numbers and numeric strings are accepted; everything else is
/// dropped.
fn schedule_days(value: Option<&Value>) -> Vec<u8> {
  let Some(Value::Array(items)) = value else {
    return Vec::new();
  };
  canonical_schedule_days(items.iter().filter_map(integral_day))
}

fn integral_day(value: &Value) -> Option<i64> {
  let number = match value {
    Value::Number(n) => n.as_f64()?,
    Value::String(s) => s.trim().parse::<f64>().ok()?,
    _ => return None,
  };
  (number.fract() == 0.0 && (0.0..=6.0).contains(&number)).then_some(number as i64)
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn accepts_bare_array_and_object_forms() {
    let array = json!([{ "id": "s1", "name": "Math" }]);
    let object = json!({ "subjects": [{ "id": "s1", "name": "Math" }] });
    assert_eq!(normalize(&array), normalize(&object));
    assert_eq!(normalize(&json!("nonsense")).subjects.len(), 0);
    assert_eq!(normalize(&json!({ "subjects": 4 })).subjects.len(), 0);
  }

  #[test]
  fn fills_defaults_by_position() {
    let raw = normalize(&json!([
      {},
      { "name": "  ", "units": [{ "lessons": [{}, { "title": " Recap " }] }] }
    ]));

    let first = &raw.subjects[0];
    assert!(first.id.starts_with("sub_"));
    assert_eq!(first.id.len(), 14);
    assert_eq!(first.name, "Subject 1");
    assert_eq!(first.color, SUBJECT_COLORS[0]);
    assert!(first.units.is_empty());

    let second = &raw.subjects[1];
    assert_eq!(second.name, "Subject 2");
    assert_eq!(second.color, SUBJECT_COLORS[1]);
    let unit = &second.units[0];
    assert!(unit.id.starts_with("uni_"));
    assert_eq!(unit.name, "Unit 1");
    assert_eq!(unit.lessons[0].title, "Lesson 1");
    assert!(unit.lessons[0].id.starts_with("les_"));
    assert_eq!(unit.lessons[1].title, "Recap");
  }

  #[test]
  fn palette_cycles() {
    let subjects: Vec<Value> = (0..10).map(|_| json!({})).collect();
    let raw = normalize(&Value::Array(subjects));
    assert_eq!(raw.subjects[9].color, SUBJECT_COLORS[0]);
  }

  #[test]
  fn legacy_lessons_wrapped_in_general_unit() {
    let raw = normalize(&json!([{
      "id": "s1",
      "units": [],
      "lessons": [{ "id": "l1", "title": "Intro" }, { "id": "l2" }]
    }]));
    let units = &raw.subjects[0].units;
    assert_eq!(units.len(), 1);
    assert_eq!(units[0].name, LEGACY_UNIT_NAME);
    assert_eq!(units[0].lessons[0].title, "Intro");
    assert_eq!(units[0].lessons[1].title, "Lesson 2");
  }

  #[test]
  fn units_take_precedence_over_legacy_lessons() {
    let raw = normalize(&json!([{
      "units": [{ "id": "u1", "name": "Algebra" }],
      "lessons": [{ "id": "l1" }]
    }]));
    assert_eq!(raw.subjects[0].units.len(), 1);
    assert_eq!(raw.subjects[0].units[0].id, "u1");
    assert!(raw.subjects[0].units[0].lessons.is_empty());
  }

  #[test]
  fn schedule_days_are_coerced() {
    let raw = normalize(&json!([{
      "scheduleDays": [5, "2", 2, 7, -1, 1.5, 3.0, null, "x"]
    }]));
    assert_eq!(raw.subjects[0].schedule_days, vec![2, 3, 5]);
  }

  #[test]
  fn normalization_is_idempotent() {
    let input = json!({ "subjects": [
      { "name": "Math", "scheduleDays": [3, 1, 1], "lessons": [{ "title": "A" }] },
      { "id": "s2", "units": [{ "name": "U", "lessons": [{}] }] },
      "garbage"
    ]});
    let once = normalize(&input);
    let twice = normalize(&serde_json::to_value(&once).unwrap());
    assert_eq!(once, twice);
  }

  #[test]
  fn existing_ids_are_preserved() {
    let raw = normalize(&json!([{
      "id": " s1 ",
      "units": [{ "id": "u1", "lessons": [{ "id": "l1", "title": "T" }] }]
    }]));
    assert_eq!(raw.subjects[0].id, "s1");
    assert_eq!(raw.subjects[0].units[0].id, "u1");
    assert_eq!(raw.subjects[0].units[0].lessons[0].id, "l1");
  }
}
