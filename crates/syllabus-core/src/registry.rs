//! Server-side curriculum authoring records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{curriculum::RawCurriculumData, remote::RemoteCurriculum};

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
pub enum CurriculumStatus {
  #[default]
  Draft,
  Published,
}

/// Registry row describing a curriculum, without its tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumRecord {
  pub id:             String,
  pub title:          String,
  pub status:         CurriculumStatus,
  pub active_version: u64,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// One immutable saved revision of a curriculum tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumVersion {
  pub curriculum_id: String,
  pub version:       u64,
  pub data:          RawCurriculumData,
  pub created_at:    DateTime<Utc>,
}

/// A record joined with its active revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CurriculumDetails {
  pub record: CurriculumRecord,
  pub data:   RawCurriculumData,
}

impl CurriculumDetails {
  /// The shape a learner device receives.
  pub fn to_remote(&self) -> crate::Result<RemoteCurriculum> {
    Ok(RemoteCurriculum {
      id:         self.record.id.clone(),
      title:      self.record.title.clone(),
      version:    self.record.active_version,
      updated_at: self.record.updated_at,
      data:       serde_json::to_value(&self.data)?,
    })
  }
}

/// Input for creating or updating a curriculum. `data` is normalized by the
/// registry before it is stored; `title` is trimmed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewCurriculum {
  pub title: String,
  #[serde(default)]
  pub data:  serde_json::Value,
}

/// Listing entry for the public catalogue of published curricula.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicCurriculum {
  pub id:            String,
  pub title:         String,
  pub version:       u64,
  pub updated_at:    DateTime<Utc>,
  pub subject_count: usize,
  pub lesson_count:  usize,
}

impl From<&CurriculumDetails> for PublicCurriculum {
  fn from(details: &CurriculumDetails) -> Self {
    Self {
      id:            details.record.id.clone(),
      title:         details.record.title.clone(),
      version:       details.record.active_version,
      updated_at:    details.record.updated_at,
      subject_count: details.data.subjects.len(),
      lesson_count:  details.data.lessons().count(),
    }
  }
}
