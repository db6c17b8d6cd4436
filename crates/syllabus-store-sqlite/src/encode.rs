//! Conversions between domain types and the plain-text representations
//! stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`
//! suffix) so that lexical order in SQL matches chronological order.
//! Curriculum trees and backup states are stored as compact JSON.

use chrono::{DateTime, SecondsFormat, Utc};
use syllabus_core::{
  curriculum::RawCurriculumData,
  registry::{CurriculumRecord, CurriculumStatus, CurriculumVersion},
  remote::{BackupFrequency, BackupHistoryItem, BackupPayload},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Enums ───────────────────────────────────────────────────────────────────

pub fn decode_status(s: &str) -> Result<CurriculumStatus> {
  s.parse()
    .map_err(|_| Error::InvalidColumn(format!("unknown curriculum status: {s:?}")))
}

/// Unknown values read as the default frequency.
pub fn decode_frequency(s: &str) -> BackupFrequency { s.parse().unwrap_or_default() }

fn decode_count(value: i64, column: &str) -> Result<u64> {
  u64::try_from(value)
    .map_err(|_| Error::InvalidColumn(format!("negative {column}: {value}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values from a `curricula` row.
pub struct RawRecord {
  pub curriculum_id:  String,
  pub title:          String,
  pub status:         String,
  pub active_version: i64,
  pub created_at:     String,
  pub updated_at:     String,
}

/// Column list matching [`RawRecord::from_row`].
pub const RECORD_COLUMNS: &str =
  "curriculum_id, title, status, active_version, created_at, updated_at";

impl RawRecord {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      curriculum_id:  row.get(0)?,
      title:          row.get(1)?,
      status:         row.get(2)?,
      active_version: row.get(3)?,
      created_at:     row.get(4)?,
      updated_at:     row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<CurriculumRecord> {
    Ok(CurriculumRecord {
      id:             self.curriculum_id,
      title:          self.title,
      status:         decode_status(&self.status)?,
      active_version: decode_count(self.active_version, "active_version")?,
      created_at:     decode_dt(&self.created_at)?,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values from a `curriculum_versions` row.
pub struct RawVersion {
  pub curriculum_id: String,
  pub version:       i64,
  pub data_json:     String,
  pub created_at:    String,
}

impl RawVersion {
  pub fn into_version(self) -> Result<CurriculumVersion> {
    Ok(CurriculumVersion {
      curriculum_id: self.curriculum_id,
      version:       decode_count(self.version, "version")?,
      data:          decode_data(&self.data_json)?,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

pub fn decode_data(json: &str) -> Result<RawCurriculumData> {
  Ok(serde_json::from_str(json)?)
}

/// Raw values from a `backups` row, without the state payload.
pub struct RawBackupItem {
  pub backup_id:  String,
  pub created_at: String,
  pub bytes:      i64,
  pub state_hash: String,
}

pub const BACKUP_ITEM_COLUMNS: &str = "backup_id, created_at, bytes, state_hash";

impl RawBackupItem {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      backup_id:  row.get(0)?,
      created_at: row.get(1)?,
      bytes:      row.get(2)?,
      state_hash: row.get(3)?,
    })
  }

  pub fn into_item(self) -> Result<BackupHistoryItem> {
    Ok(BackupHistoryItem {
      id:         self.backup_id,
      created_at: decode_dt(&self.created_at)?,
      bytes:      decode_count(self.bytes, "bytes")?,
      state_hash: self.state_hash,
    })
  }
}

/// Raw values for a full backup payload.
pub struct RawBackupPayload {
  pub backup_id:  String,
  pub created_at: String,
  pub state_json: String,
}

impl RawBackupPayload {
  pub fn into_payload(self) -> Result<BackupPayload> {
    Ok(BackupPayload {
      id:         self.backup_id,
      created_at: decode_dt(&self.created_at)?,
      state:      serde_json::from_str(&self.state_json)?,
    })
  }
}
