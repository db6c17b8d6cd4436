//! [`SqliteStore`]: the SQLite implementation of the Syllabus store traits.

use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use syllabus_core::{
  hash::{canonical_json, content_hash},
  registry::{
    CurriculumDetails, CurriculumRecord, CurriculumStatus, CurriculumVersion,
    NewCurriculum, PublicCurriculum,
  },
  remote::{
    BackupFrequency, BackupHistoryItem, BackupPayload, BackupProfile,
    BackupSettings, RemoteCurriculum, RunBackupResult,
  },
  store::{BackupStore, CurriculumRegistry, StateStore},
};
use syllabus_merge::normalize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  encode::{
    BACKUP_ITEM_COLUMNS, RECORD_COLUMNS, RawBackupItem, RawBackupPayload,
    RawRecord, RawVersion, decode_data, decode_dt, decode_frequency, encode_dt,
  },
  schema::SCHEMA,
};

/// Minimum spacing between two stored backups of the same user.
pub const MIN_BACKUP_INTERVAL_SECS: i64 = 60;

/// Backups kept per user; older ones are pruned on insert.
pub const BACKUP_HISTORY_LIMIT: usize = 20;

/// `prefix_` followed by 16 hex characters.
fn prefixed_id(prefix: &str) -> String {
  let hex = Uuid::new_v4().simple().to_string();
  format!("{prefix}_{}", &hex[..16])
}

fn not_found(id: &str) -> Error {
  syllabus_core::Error::CurriculumNotFound(id.to_owned()).into()
}

fn validated_title(title: &str) -> Result<String> {
  let title = title.trim();
  if title.is_empty() {
    return Err(
      syllabus_core::Error::MalformedInput("curriculum title is required".into())
        .into(),
    );
  }
  Ok(title.to_owned())
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Syllabus store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests and one-shot CLI runs.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// A curriculum row joined with the data of its active version.
  async fn details(&self, id: &str) -> Result<Option<CurriculumDetails>> {
    let id = id.to_owned();
    let raw: Option<(RawRecord, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT c.curriculum_id, c.title, c.status, c.active_version,
                      c.created_at, c.updated_at, v.data_json
               FROM curricula c
               JOIN curriculum_versions v
                 ON v.curriculum_id = c.curriculum_id AND v.version = c.active_version
               WHERE c.curriculum_id = ?1",
              rusqlite::params![id],
              |row| Ok((RawRecord::from_row(row)?, row.get(6)?)),
            )
            .optional()?,
        )
      })
      .await?;

    raw
      .map(|(record, data)| {
        Ok(CurriculumDetails {
          record: record.into_record()?,
          data:   decode_data(&data)?,
        })
      })
      .transpose()
  }

  async fn record(&self, id: &str) -> Result<Option<CurriculumRecord>> {
    let id = id.to_owned();
    let raw: Option<RawRecord> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {RECORD_COLUMNS} FROM curricula WHERE curriculum_id = ?1"),
              rusqlite::params![id],
              RawRecord::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawRecord::into_record).transpose()
  }

  // ── Backups with an explicit clock ────────────────────────────────────────

  /// [`BackupStore::run_backup`] as of `now`.
  pub async fn run_backup_at(
    &self,
    user_id: &str,
    state: Value,
    now: DateTime<Utc>,
  ) -> Result<RunBackupResult> {
    let state_hash = content_hash(&state)?;
    let state_json = canonical_json(&state)?;
    let bytes = state_json.len() as i64;
    let backup_id = prefixed_id("bkp");
    let created_at = encode_dt(now);
    let user = user_id.to_owned();

    enum Outcome {
      Deduped(RawBackupItem),
      TooSoon(Duration),
      Stored(RawBackupItem),
    }

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let latest = tx
          .query_row(
            &format!(
              "SELECT {BACKUP_ITEM_COLUMNS} FROM backups WHERE user_id = ?1
               ORDER BY created_at DESC, rowid DESC LIMIT 1"
            ),
            rusqlite::params![user],
            RawBackupItem::from_row,
          )
          .optional()?;

        if let Some(latest) = latest {
          if latest.state_hash == state_hash {
            return Ok(Outcome::Deduped(latest));
          }
          if let Ok(at) = DateTime::parse_from_rfc3339(&latest.created_at) {
            let elapsed = now - at.with_timezone(&Utc);
            if elapsed < Duration::seconds(MIN_BACKUP_INTERVAL_SECS) {
              return Ok(Outcome::TooSoon(elapsed));
            }
          }
        }

        tx.execute(
          "INSERT INTO backups (backup_id, user_id, created_at, bytes, state_hash, state_json)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![backup_id, user, created_at, bytes, state_hash, state_json],
        )?;
        tx.execute(
          "DELETE FROM backups
           WHERE user_id = ?1 AND backup_id NOT IN (
             SELECT backup_id FROM backups WHERE user_id = ?1
             ORDER BY created_at DESC, rowid DESC LIMIT ?2
           )",
          rusqlite::params![user, BACKUP_HISTORY_LIMIT as i64],
        )?;
        tx.commit()?;

        Ok(Outcome::Stored(RawBackupItem {
          backup_id,
          created_at,
          bytes,
          state_hash,
        }))
      })
      .await?;

    match outcome {
      Outcome::Deduped(item) => {
        debug!(user_id, "backup identical to latest; skipped");
        Ok(RunBackupResult {
          item:    item.into_item()?,
          stored:  false,
          deduped: true,
        })
      }
      Outcome::TooSoon(elapsed) => {
        let remaining = Duration::seconds(MIN_BACKUP_INTERVAL_SECS) - elapsed;
        let wait_secs = ((remaining.num_milliseconds() + 999) / 1000).max(1) as u64;
        Err(syllabus_core::Error::BackupRateLimited { wait_secs }.into())
      }
      Outcome::Stored(item) => {
        let item = item.into_item()?;
        info!(user_id, backup_id = %item.id, bytes = item.bytes, "backup stored");
        Ok(RunBackupResult {
          item,
          stored: true,
          deduped: false,
        })
      }
    }
  }

  /// [`BackupStore::backup_profile`] as of `now`.
  pub async fn backup_profile_at(
    &self,
    user_id: &str,
    now: DateTime<Utc>,
  ) -> Result<BackupProfile> {
    let user = user_id.to_owned();
    let stored: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT frequency, updated_at FROM backup_settings WHERE user_id = ?1",
              rusqlite::params![user],
              |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    let settings = match stored {
      Some((frequency, updated_at)) => BackupSettings {
        user_id:    user_id.to_owned(),
        frequency:  decode_frequency(&frequency),
        updated_at: decode_dt(&updated_at)?,
      },
      None => BackupSettings {
        user_id:    user_id.to_owned(),
        frequency:  BackupFrequency::default(),
        updated_at: now,
      },
    };

    let history = self.backup_history(user_id).await?;
    let latest_backup = history.first().cloned();
    let due_now = settings
      .frequency
      .is_due(latest_backup.as_ref().map(|b| b.created_at), now);

    Ok(BackupProfile {
      settings,
      latest_backup,
      history,
      due_now,
    })
  }
}

// ─── StateStore impl ─────────────────────────────────────────────────────────

impl StateStore for SqliteStore {
  type Error = Error;

  async fn get(&self, key: &str) -> Result<Option<Value>> {
    let key = key.to_owned();
    let raw: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT value_json FROM kv WHERE key = ?1",
              rusqlite::params![key],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(raw.map(|json| serde_json::from_str::<Value>(&json)).transpose()?)
  }

  async fn set(&self, key: &str, value: Value) -> Result<()> {
    let key = key.to_owned();
    let json = value.to_string();
    let at = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO kv (key, value_json, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(key) DO UPDATE
             SET value_json = excluded.value_json, updated_at = excluded.updated_at",
          rusqlite::params![key, json, at],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── CurriculumRegistry impl ─────────────────────────────────────────────────

impl CurriculumRegistry for SqliteStore {
  type Error = Error;

  async fn create_curriculum(&self, input: NewCurriculum) -> Result<CurriculumDetails> {
    let title = validated_title(&input.title)?;
    let data = normalize(&input.data);
    let data_json = serde_json::to_string(&data)?;
    let now = Utc::now();

    let record = CurriculumRecord {
      id: prefixed_id("cur"),
      title,
      status: CurriculumStatus::Draft,
      active_version: 1,
      created_at: now,
      updated_at: now,
    };

    let id = record.id.clone();
    let title = record.title.clone();
    let status = record.status.to_string();
    let at = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO curricula
             (curriculum_id, title, status, active_version, created_at, updated_at)
           VALUES (?1, ?2, ?3, 1, ?4, ?4)",
          rusqlite::params![id, title, status, at],
        )?;
        tx.execute(
          "INSERT INTO curriculum_versions (curriculum_id, version, data_json, created_at)
           VALUES (?1, 1, ?2, ?3)",
          rusqlite::params![id, data_json, at],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(curriculum_id = %record.id, "curriculum created");
    Ok(CurriculumDetails { record, data })
  }

  async fn update_curriculum(
    &self,
    id: &str,
    input: NewCurriculum,
  ) -> Result<CurriculumDetails> {
    let title = validated_title(&input.title)?;
    let data = normalize(&input.data);
    let data_json = serde_json::to_string(&data)?;
    let at = encode_dt(Utc::now());
    let key = id.to_owned();

    let next_version: Option<i64> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let current: Option<i64> = tx
          .query_row(
            "SELECT active_version FROM curricula WHERE curriculum_id = ?1",
            rusqlite::params![key],
            |row| row.get(0),
          )
          .optional()?;
        let Some(current) = current else {
          return Ok(None);
        };

        let next = current + 1;
        tx.execute(
          "INSERT INTO curriculum_versions (curriculum_id, version, data_json, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![key, next, data_json, at],
        )?;
        tx.execute(
          "UPDATE curricula SET title = ?2, active_version = ?3, updated_at = ?4
           WHERE curriculum_id = ?1",
          rusqlite::params![key, title, next, at],
        )?;
        tx.commit()?;
        Ok(Some(next))
      })
      .await?;

    let Some(version) = next_version else {
      return Err(not_found(id));
    };
    info!(curriculum_id = id, version, "curriculum updated");

    let record = self.record(id).await?.ok_or_else(|| not_found(id))?;
    Ok(CurriculumDetails { record, data })
  }

  async fn get_curriculum(&self, id: &str) -> Result<Option<CurriculumDetails>> {
    self.details(id).await
  }

  async fn list_versions(&self, id: &str) -> Result<Vec<CurriculumVersion>> {
    let key = id.to_owned();
    let raws: Vec<RawVersion> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT curriculum_id, version, data_json, created_at
           FROM curriculum_versions WHERE curriculum_id = ?1
           ORDER BY version DESC",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![key], |row| {
            Ok(RawVersion {
              curriculum_id: row.get(0)?,
              version:       row.get(1)?,
              data_json:     row.get(2)?,
              created_at:    row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    // Every curriculum has at least version 1.
    if raws.is_empty() {
      return Err(not_found(id));
    }
    raws.into_iter().map(RawVersion::into_version).collect()
  }

  async fn set_curriculum_status(
    &self,
    id: &str,
    status: CurriculumStatus,
  ) -> Result<CurriculumRecord> {
    let key = id.to_owned();
    let status_str = status.to_string();
    let at = encode_dt(Utc::now());

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE curricula SET status = ?2, updated_at = ?3 WHERE curriculum_id = ?1",
          rusqlite::params![key, status_str, at],
        )?)
      })
      .await?;

    if changed == 0 {
      return Err(not_found(id));
    }
    info!(curriculum_id = id, %status, "curriculum status changed");
    self.record(id).await?.ok_or_else(|| not_found(id))
  }

  async fn delete_curriculum(&self, id: &str) -> Result<()> {
    let key = id.to_owned();
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "DELETE FROM curricula WHERE curriculum_id = ?1",
          rusqlite::params![key],
        )?)
      })
      .await?;

    if deleted == 0 {
      return Err(not_found(id));
    }
    info!(curriculum_id = id, "curriculum deleted");
    Ok(())
  }

  async fn list_curricula(&self) -> Result<Vec<CurriculumRecord>> {
    let raws: Vec<RawRecord> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {RECORD_COLUMNS} FROM curricula ORDER BY updated_at DESC, curriculum_id"
        ))?;
        let rows = stmt
          .query_map([], RawRecord::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRecord::into_record).collect()
  }

  async fn list_published(&self) -> Result<Vec<PublicCurriculum>> {
    let published = CurriculumStatus::Published.to_string();
    let raws: Vec<(RawRecord, String)> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT c.curriculum_id, c.title, c.status, c.active_version,
                  c.created_at, c.updated_at, v.data_json
           FROM curricula c
           JOIN curriculum_versions v
             ON v.curriculum_id = c.curriculum_id AND v.version = c.active_version
           WHERE c.status = ?1
           ORDER BY c.title, c.curriculum_id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![published], |row| {
            Ok((RawRecord::from_row(row)?, row.get(6)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(record, data)| {
        let details = CurriculumDetails {
          record: record.into_record()?,
          data:   decode_data(&data)?,
        };
        Ok(PublicCurriculum::from(&details))
      })
      .collect()
  }

  async fn select_curriculum(
    &self,
    user_id: &str,
    curriculum_id: &str,
  ) -> Result<CurriculumRecord> {
    let record = self
      .record(curriculum_id)
      .await?
      .ok_or_else(|| not_found(curriculum_id))?;
    if record.status != CurriculumStatus::Published {
      return Err(syllabus_core::Error::NotPublished(curriculum_id.to_owned()).into());
    }

    let user = user_id.to_owned();
    let key = curriculum_id.to_owned();
    let at = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO selections (user_id, curriculum_id, selected_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(user_id) DO UPDATE
             SET curriculum_id = excluded.curriculum_id, selected_at = excluded.selected_at",
          rusqlite::params![user, key, at],
        )?;
        Ok(())
      })
      .await?;

    info!(user_id, curriculum_id, "curriculum selected");
    Ok(record)
  }

  async fn selected_curriculum(&self, user_id: &str) -> Result<Option<RemoteCurriculum>> {
    let user = user_id.to_owned();
    let selected: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT curriculum_id FROM selections WHERE user_id = ?1",
              rusqlite::params![user],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    let Some(curriculum_id) = selected else {
      return Ok(None);
    };
    match self.details(&curriculum_id).await? {
      Some(details) if details.record.status == CurriculumStatus::Published => {
        Ok(Some(details.to_remote()?))
      }
      _ => Ok(None),
    }
  }
}

// ─── BackupStore impl ────────────────────────────────────────────────────────

impl BackupStore for SqliteStore {
  type Error = Error;

  async fn latest_backup(&self, user_id: &str) -> Result<Option<BackupPayload>> {
    let user = user_id.to_owned();
    let raw: Option<RawBackupPayload> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT backup_id, created_at, state_json FROM backups
               WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT 1",
              rusqlite::params![user],
              |row| {
                Ok(RawBackupPayload {
                  backup_id:  row.get(0)?,
                  created_at: row.get(1)?,
                  state_json: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawBackupPayload::into_payload).transpose()
  }

  async fn run_backup(&self, user_id: &str, state: Value) -> Result<RunBackupResult> {
    self.run_backup_at(user_id, state, Utc::now()).await
  }

  async fn backup_history(&self, user_id: &str) -> Result<Vec<BackupHistoryItem>> {
    let user = user_id.to_owned();
    let raws: Vec<RawBackupItem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {BACKUP_ITEM_COLUMNS} FROM backups WHERE user_id = ?1
           ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        ))?;
        let rows = stmt
          .query_map(
            rusqlite::params![user, BACKUP_HISTORY_LIMIT as i64],
            RawBackupItem::from_row,
          )?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawBackupItem::into_item).collect()
  }

  async fn backup_profile(&self, user_id: &str) -> Result<BackupProfile> {
    self.backup_profile_at(user_id, Utc::now()).await
  }

  async fn set_backup_frequency(
    &self,
    user_id: &str,
    frequency: BackupFrequency,
  ) -> Result<BackupSettings> {
    let now = Utc::now();
    let user = user_id.to_owned();
    let freq = frequency.to_string();
    let at = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO backup_settings (user_id, frequency, updated_at) VALUES (?1, ?2, ?3)
           ON CONFLICT(user_id) DO UPDATE
             SET frequency = excluded.frequency, updated_at = excluded.updated_at",
          rusqlite::params![user, freq, at],
        )?;
        Ok(())
      })
      .await?;

    Ok(BackupSettings {
      user_id: user_id.to_owned(),
      frequency,
      updated_at: now,
    })
  }
}
