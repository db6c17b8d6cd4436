//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use serde_json::json;
use syllabus_core::{
  registry::{CurriculumStatus, NewCurriculum},
  remote::BackupFrequency,
  store::{BackupStore, CurriculumRegistry, StateStore},
};

use crate::{BACKUP_HISTORY_LIMIT, Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn algebra() -> NewCurriculum {
  NewCurriculum {
    title: "  Algebra I ".into(),
    data:  json!({ "subjects": [{
      "id": "s1",
      "name": "Math",
      "scheduleDays": [3, 1],
      "units": [{ "id": "u1", "name": "Linear", "lessons": [
        { "id": "l1", "title": "Slope" },
        { "id": "l2", "title": "Intercept" }
      ]}]
    }]}),
  }
}

fn core_error(err: &Error) -> Option<&syllabus_core::Error> {
  match err {
    Error::Core(inner) => Some(inner),
    _ => None,
  }
}

// ─── Key/value ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn kv_roundtrip_and_overwrite() {
  let s = store().await;
  assert!(s.get("state").await.unwrap().is_none());

  s.set("state", json!({ "xp": 10 })).await.unwrap();
  s.set("state", json!({ "xp": 25 })).await.unwrap();

  assert_eq!(s.get("state").await.unwrap(), Some(json!({ "xp": 25 })));
  assert!(s.get("curriculum.base").await.unwrap().is_none());
}

// ─── Registry ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_normalizes_and_starts_as_draft() {
  let s = store().await;
  let created = s.create_curriculum(algebra()).await.unwrap();

  assert!(created.record.id.starts_with("cur_"));
  assert_eq!(created.record.id.len(), 20);
  assert_eq!(created.record.title, "Algebra I");
  assert_eq!(created.record.status, CurriculumStatus::Draft);
  assert_eq!(created.record.active_version, 1);
  assert_eq!(created.data.subjects[0].schedule_days, vec![1, 3]);

  let fetched = s.get_curriculum(&created.record.id).await.unwrap().unwrap();
  assert_eq!(fetched, created);
}

#[tokio::test]
async fn blank_title_is_rejected() {
  let s = store().await;
  let err = s
    .create_curriculum(NewCurriculum { title: "   ".into(), data: json!([]) })
    .await
    .unwrap_err();
  assert!(matches!(
    core_error(&err),
    Some(syllabus_core::Error::MalformedInput(_))
  ));
}

#[tokio::test]
async fn updates_append_versions() {
  let s = store().await;
  let id = s.create_curriculum(algebra()).await.unwrap().record.id;

  let mut next = algebra();
  next.title = "Algebra I (revised)".into();
  next.data["subjects"][0]["name"] = json!("Mathematics");
  let updated = s.update_curriculum(&id, next).await.unwrap();

  assert_eq!(updated.record.active_version, 2);
  assert_eq!(updated.record.title, "Algebra I (revised)");
  assert_eq!(updated.data.subjects[0].name, "Mathematics");

  let versions = s.list_versions(&id).await.unwrap();
  assert_eq!(versions.iter().map(|v| v.version).collect::<Vec<_>>(), vec![2, 1]);
  assert_eq!(versions[1].data.subjects[0].name, "Math");
}

#[tokio::test]
async fn unknown_curriculum_operations_fail() {
  let s = store().await;
  assert!(s.get_curriculum("cur_missing").await.unwrap().is_none());

  for err in [
    s.update_curriculum("cur_missing", algebra()).await.unwrap_err(),
    s.list_versions("cur_missing").await.unwrap_err(),
    s.delete_curriculum("cur_missing").await.unwrap_err(),
    s.set_curriculum_status("cur_missing", CurriculumStatus::Published)
      .await
      .unwrap_err(),
  ] {
    assert!(matches!(
      core_error(&err),
      Some(syllabus_core::Error::CurriculumNotFound(_))
    ));
  }
}

#[tokio::test]
async fn listings_respect_status() {
  let s = store().await;
  let draft = s.create_curriculum(algebra()).await.unwrap().record.id;
  let public = s
    .create_curriculum(NewCurriculum {
      title: "Biology".into(),
      data:  json!([{ "name": "Cells", "lessons": [{ "title": "Membrane" }] }]),
    })
    .await
    .unwrap()
    .record
    .id;
  s.set_curriculum_status(&public, CurriculumStatus::Published)
    .await
    .unwrap();

  let all = s.list_curricula().await.unwrap();
  assert_eq!(all.len(), 2);
  assert_eq!(all[0].id, public, "most recently updated first");
  assert_eq!(all[1].id, draft);

  let published = s.list_published().await.unwrap();
  assert_eq!(published.len(), 1);
  assert_eq!(published[0].id, public);
  assert_eq!(published[0].subject_count, 1);
  assert_eq!(published[0].lesson_count, 1);
}

#[tokio::test]
async fn selection_requires_published_curriculum() {
  let s = store().await;
  let id = s.create_curriculum(algebra()).await.unwrap().record.id;

  let err = s.select_curriculum("user-1", &id).await.unwrap_err();
  assert!(matches!(core_error(&err), Some(syllabus_core::Error::NotPublished(_))));

  let err = s.select_curriculum("user-1", "cur_missing").await.unwrap_err();
  assert!(matches!(
    core_error(&err),
    Some(syllabus_core::Error::CurriculumNotFound(_))
  ));

  s.set_curriculum_status(&id, CurriculumStatus::Published)
    .await
    .unwrap();
  s.select_curriculum("user-1", &id).await.unwrap();

  let remote = s.selected_curriculum("user-1").await.unwrap().unwrap();
  assert_eq!(remote.id, id);
  assert_eq!(remote.version, 1);
  assert_eq!(remote.data["subjects"][0]["id"], "s1");
  assert!(s.selected_curriculum("user-2").await.unwrap().is_none());
}

#[tokio::test]
async fn unpublishing_hides_selection() {
  let s = store().await;
  let id = s.create_curriculum(algebra()).await.unwrap().record.id;
  s.set_curriculum_status(&id, CurriculumStatus::Published)
    .await
    .unwrap();
  s.select_curriculum("user-1", &id).await.unwrap();

  s.set_curriculum_status(&id, CurriculumStatus::Draft)
    .await
    .unwrap();
  assert!(s.selected_curriculum("user-1").await.unwrap().is_none());
}

#[tokio::test]
async fn delete_cascades_to_versions_and_selections() {
  let s = store().await;
  let id = s.create_curriculum(algebra()).await.unwrap().record.id;
  s.set_curriculum_status(&id, CurriculumStatus::Published)
    .await
    .unwrap();
  s.select_curriculum("user-1", &id).await.unwrap();

  s.delete_curriculum(&id).await.unwrap();
  assert!(s.get_curriculum(&id).await.unwrap().is_none());
  assert!(s.selected_curriculum("user-1").await.unwrap().is_none());
  assert!(s.list_versions(&id).await.is_err());
}

// ─── Backups ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn identical_state_is_deduped() {
  let s = store().await;
  let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

  let first = s
    .run_backup_at("user-1", json!({ "xp": 10, "streak": 1 }), t0)
    .await
    .unwrap();
  assert!(first.stored);
  assert!(first.item.id.starts_with("bkp_"));
  assert_eq!(first.item.state_hash.len(), 64);

  // Same content with a different key order, well past the rate limit.
  let second = s
    .run_backup_at("user-1", json!({ "streak": 1, "xp": 10 }), t0 + Duration::hours(1))
    .await
    .unwrap();
  assert!(!second.stored);
  assert!(second.deduped);
  assert_eq!(second.item, first.item);
  assert_eq!(s.backup_history("user-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn rapid_backups_are_rate_limited() {
  let s = store().await;
  let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
  s.run_backup_at("user-1", json!({ "xp": 1 }), t0).await.unwrap();

  let err = s
    .run_backup_at(
      "user-1",
      json!({ "xp": 2 }),
      t0 + Duration::milliseconds(20_500),
    )
    .await
    .unwrap_err();
  assert!(matches!(
    core_error(&err),
    Some(syllabus_core::Error::BackupRateLimited { wait_secs: 40 })
  ));

  let later = s
    .run_backup_at("user-1", json!({ "xp": 2 }), t0 + Duration::seconds(60))
    .await
    .unwrap();
  assert!(later.stored);

  // Other users are unaffected.
  s.run_backup_at("user-2", json!({ "xp": 3 }), t0 + Duration::seconds(1))
    .await
    .unwrap();
}

#[tokio::test]
async fn history_is_capped_newest_first() {
  let s = store().await;
  let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
  for i in 0..(BACKUP_HISTORY_LIMIT as i64 + 3) {
    s.run_backup_at("user-1", json!({ "xp": i }), t0 + Duration::minutes(i * 2))
      .await
      .unwrap();
  }

  let history = s.backup_history("user-1").await.unwrap();
  assert_eq!(history.len(), BACKUP_HISTORY_LIMIT);
  assert!(history.windows(2).all(|w| w[0].created_at > w[1].created_at));

  let latest = s.latest_backup("user-1").await.unwrap().unwrap();
  assert_eq!(latest.id, history[0].id);
  assert_eq!(latest.state, json!({ "xp": BACKUP_HISTORY_LIMIT as i64 + 2 }));
}

#[tokio::test]
async fn profile_reports_due_state() {
  let s = store().await;
  let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

  let empty = s.backup_profile_at("user-1", t0).await.unwrap();
  assert_eq!(empty.settings.frequency, BackupFrequency::Weekly);
  assert!(empty.latest_backup.is_none());
  assert!(empty.due_now);

  s.run_backup_at("user-1", json!({ "xp": 1 }), t0).await.unwrap();
  let fresh = s
    .backup_profile_at("user-1", t0 + Duration::days(2))
    .await
    .unwrap();
  assert!(!fresh.due_now);
  assert_eq!(fresh.history.len(), 1);

  let settings = s
    .set_backup_frequency("user-1", BackupFrequency::Daily)
    .await
    .unwrap();
  assert_eq!(settings.frequency, BackupFrequency::Daily);
  let daily = s
    .backup_profile_at("user-1", t0 + Duration::days(2))
    .await
    .unwrap();
  assert_eq!(daily.settings.frequency, BackupFrequency::Daily);
  assert!(daily.due_now);
}
