//! SQL schema for the Syllabus SQLite store.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Device-local JSON slots ('state', 'curriculum.base').
CREATE TABLE IF NOT EXISTS kv (
    key         TEXT PRIMARY KEY,
    value_json  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS curricula (
    curriculum_id   TEXT PRIMARY KEY,
    title           TEXT NOT NULL,
    status          TEXT NOT NULL DEFAULT 'draft',   -- 'draft' | 'published'
    active_version  INTEGER NOT NULL,
    created_at      TEXT NOT NULL,
    updated_at      TEXT NOT NULL
);

-- Saved revisions are never rewritten; an update adds the next version.
CREATE TABLE IF NOT EXISTS curriculum_versions (
    curriculum_id  TEXT NOT NULL REFERENCES curricula(curriculum_id) ON DELETE CASCADE,
    version        INTEGER NOT NULL,
    data_json      TEXT NOT NULL,   -- normalized RawCurriculumData
    created_at     TEXT NOT NULL,
    PRIMARY KEY (curriculum_id, version),
    CHECK (version >= 1)
);

CREATE TABLE IF NOT EXISTS selections (
    user_id        TEXT PRIMARY KEY,
    curriculum_id  TEXT NOT NULL REFERENCES curricula(curriculum_id) ON DELETE CASCADE,
    selected_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS backups (
    backup_id   TEXT PRIMARY KEY,
    user_id     TEXT NOT NULL,
    created_at  TEXT NOT NULL,   -- fixed-width RFC 3339, sorts lexically
    bytes       INTEGER NOT NULL,
    state_hash  TEXT NOT NULL,   -- SHA-256 of sorted-key JSON
    state_json  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS backup_settings (
    user_id     TEXT PRIMARY KEY,
    frequency   TEXT NOT NULL,   -- 'daily' | 'weekly' | 'monthly'
    updated_at  TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS backups_user_idx ON backups(user_id, created_at);

PRAGMA user_version = 1;
";
