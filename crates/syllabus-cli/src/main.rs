//! `syllabus`: command-line client for Syllabus curriculum sync.
//!
//! # Usage
//!
//! ```text
//! syllabus --url http://localhost:8080 --user alice sync
//! syllabus --config ~/.config/syllabus/config.toml refresh
//! syllabus merge --base base.json --local local.json --remote remote.json
//! ```

mod client;

use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use client::{ApiClient, ApiConfig};
use serde::{Deserialize, Serialize};
use syllabus_core::curriculum::RawCurriculumData;
use syllabus_merge::{
  coerce_subjects, find_ambiguities, hydrate, merge_prefer_local, merge_with_base,
  normalize, strip_progress,
};
use syllabus_store_sqlite::SqliteStore;
use syllabus_sync::{Orchestrator, SyncReport};
use tracing::{level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;

// ─── CLI args ─────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "syllabus", about = "Sync a study curriculum with a Syllabus server")]
struct Args {
  /// Path to a TOML config file (url, user, state).
  #[arg(short, long, value_name = "FILE", global = true)]
  config: Option<PathBuf>,

  /// Base URL of the server (default: http://localhost:8080).
  #[arg(long, env = "SYLLABUS_URL", global = true)]
  url: Option<String>,

  /// User id to sync as.
  #[arg(long, env = "SYLLABUS_USER", global = true)]
  user: Option<String>,

  /// Local SQLite state file (default: syllabus-state.db).
  #[arg(long, env = "SYLLABUS_STATE", global = true)]
  state: Option<PathBuf>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Start a session: restore or build local state from the server.
  Sync,
  /// Refetch the selected curriculum and merge it into local state.
  Refresh,
  /// Upload the local state as a server backup.
  Backup,
  /// List published curricula.
  Catalogue,
  /// Select a published curriculum for this user.
  Select { curriculum_id: String },
  /// Merge curriculum files offline and print the result.
  Merge {
    /// Last synced remote tree. Without it the merge is two-way.
    #[arg(long)]
    base:   Option<PathBuf>,
    /// Local tree; lesson progress in it is preserved.
    #[arg(long)]
    local:  PathBuf,
    /// Newly fetched remote tree.
    #[arg(long)]
    remote: PathBuf,
  },
}

// ─── Config file ──────────────────────────────────────────────────────────────

/// Shape of the optional TOML config file.
#[derive(Deserialize, Default)]
struct ConfigFile {
  #[serde(default)]
  url:   String,
  #[serde(default)]
  user:  String,
  #[serde(default)]
  state: Option<PathBuf>,
}

struct Settings {
  api:        ApiConfig,
  state_path: PathBuf,
}

fn resolve(args: &Args) -> Result<Settings> {
  let file_cfg: ConfigFile = if let Some(path) = &args.config {
    let raw = std::fs::read_to_string(path)
      .with_context(|| format!("reading config file {}", path.display()))?;
    toml::from_str(&raw).context("parsing config file")?
  } else {
    ConfigFile::default()
  };

  // CLI flags and env override the config file, which overrides defaults.
  let base_url = args
    .url
    .clone()
    .or_else(|| (!file_cfg.url.is_empty()).then(|| file_cfg.url.clone()))
    .unwrap_or_else(|| "http://localhost:8080".to_string());
  let user_id = args
    .user
    .clone()
    .or_else(|| (!file_cfg.user.is_empty()).then(|| file_cfg.user.clone()))
    .unwrap_or_default();
  let state_path = args
    .state
    .clone()
    .or(file_cfg.state)
    .unwrap_or_else(|| PathBuf::from("syllabus-state.db"));

  Ok(Settings {
    api: ApiConfig { base_url, user_id },
    state_path,
  })
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_writer(std::io::stderr)
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let args = Args::parse();

  if let Command::Merge { base, local, remote } = &args.command {
    return merge_files(base.as_deref(), local, remote);
  }

  let settings = resolve(&args)?;
  if settings.api.user_id.trim().is_empty() {
    return Err(anyhow!("a user id is required (--user or SYLLABUS_USER)"));
  }
  let user_id = settings.api.user_id.clone();
  let client = ApiClient::new(settings.api)?;

  match args.command {
    Command::Catalogue => {
      let items = client.list_public().await.context("listing curricula")?;
      print_json(&items)
    }
    Command::Select { curriculum_id } => {
      let record = client
        .select(&curriculum_id)
        .await
        .context("selecting curriculum")?;
      print_json(&record)
    }
    command => {
      let store = SqliteStore::open(&settings.state_path)
        .await
        .with_context(|| format!("opening local state at {}", settings.state_path.display()))?;
      let orchestrator = Orchestrator::new(store, Arc::new(client)).with_owner(user_id);

      match command {
        Command::Sync => finish(orchestrator.bootstrap().await),
        Command::Refresh => finish(orchestrator.refetch().await),
        Command::Backup => {
          let result = orchestrator
            .upload_now()
            .await
            .ok_or_else(|| anyhow!("backup failed; see log for details"))?;
          print_json(&result)
        }
        _ => Ok(()),
      }
    }
  }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}

/// Print the report; a sync that could not reach the server still exits 0
/// because local state stays usable.
fn finish(report: SyncReport) -> Result<()> {
  if !report.outcome.is_commit() {
    warn!(outcome = ?report.outcome, "local state unchanged");
  }
  print_json(&report)
}

// ─── Offline merge ────────────────────────────────────────────────────────────

fn read_json(path: &std::path::Path) -> Result<serde_json::Value> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading {}", path.display()))?;
  serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}

fn merge_files(
  base: Option<&std::path::Path>,
  local: &std::path::Path,
  remote: &std::path::Path,
) -> Result<()> {
  let local = coerce_subjects(&read_json(local)?);
  let local_raw = strip_progress(&local);
  let remote = normalize(&read_json(remote)?);

  let (merged, ambiguities) = match base {
    Some(path) => {
      let base = normalize(&read_json(path)?);
      (
        merge_with_base(&base, &local_raw, &remote),
        find_ambiguities(&base, &local_raw, &remote),
      )
    }
    None => (
      merge_prefer_local(&remote, &local_raw),
      find_ambiguities(&RawCurriculumData::default(), &local_raw, &remote),
    ),
  };

  for ambiguity in &ambiguities {
    warn!(%ambiguity, "curriculum merge ambiguity");
  }
  print_json(&serde_json::json!({ "subjects": hydrate(&merged, &local) }))
}
