//! DirtCloud persistence: one capability trait per resource kind and a
//! SQLite-backed store implementing all three.
//! Simple, synchronous; callers on an async runtime use `spawn_blocking`.

#![forbid(unsafe_code)]

use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use anyhow::{Context, Result};
use dirt_core::prelude::*;
use metrics::{counter, histogram};
use tracing::debug;

mod instances;
mod metadata;
mod projects;

pub trait ProjectStore: Send + Sync {
    /// Insert a new project; a name clash surfaces as `AlreadyExists`.
    fn create(&self, project: &Project) -> DirtResult<()>;
    fn get_by_id(&self, id: &str) -> DirtResult<Project>;
    fn get_by_name(&self, name: &str) -> DirtResult<Project>;
    fn list(&self, filter: &ProjectFilter) -> DirtResult<Vec<Project>>;
    fn update(&self, id: &str, req: &UpdateProjectRequest) -> DirtResult<Project>;
    fn delete(&self, id: &str) -> DirtResult<()>;
}

pub trait InstanceStore: Send + Sync {
    fn create(&self, instance: &Instance) -> DirtResult<()>;
    fn get_by_id(&self, id: &str) -> DirtResult<Instance>;
    fn list(&self, filter: &InstanceFilter) -> DirtResult<Vec<Instance>>;
    /// Apply an already validated patch and bump `updated_at`.
    fn update(&self, id: &str, patch: &InstancePatch) -> DirtResult<Instance>;
    fn delete(&self, id: &str) -> DirtResult<()>;
}

/// Flat key/value namespace keyed by canonical path. Implementations
/// normalize every incoming path, so surface forms are accepted too.
pub trait MetadataStore: Send + Sync {
    /// Upsert; replaces value and timestamp of an existing entry.
    fn set(&self, path: &str, value: &str) -> DirtResult<MetadataEntry>;
    fn get(&self, path: &str) -> DirtResult<MetadataEntry>;
    /// Canonical paths sorted ascending. `None` or an empty prefix lists
    /// everything; otherwise the normalized prefix is matched as a literal
    /// string prefix (`/config/app` matches `/config/app.yaml`).
    fn list(&self, prefix: Option<&str>) -> DirtResult<Vec<String>>;
    /// Fails `NotFound` when no entry exists at the canonical path.
    fn delete(&self, path: &str) -> DirtResult<()>;
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS projects (
    id         TEXT PRIMARY KEY,
    name       TEXT NOT NULL UNIQUE,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS instances (
    id         TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name       TEXT NOT NULL,
    cpu        INTEGER NOT NULL,
    memory_mb  INTEGER NOT NULL,
    image      TEXT NOT NULL,
    status     TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project_id, name)
);
CREATE INDEX IF NOT EXISTS idx_instances_project ON instances(project_id);
CREATE TABLE IF NOT EXISTS metadata (
    path       TEXT PRIMARY KEY,
    value      TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
";

/// SQLite-backed store for projects, instances and metadata.
///
/// `project_id` on instances is deliberately not a declared foreign key:
/// deleting a project neither cascades nor is blocked by its instances.
pub struct SqliteStore {
    db: Mutex<rusqlite::Connection>,
}

impl SqliteStore {
    /// Open `dsn`; an empty string selects the default file under `$HOME/.dirt`.
    pub fn open_dsn(dsn: &str) -> Result<Self> {
        if dsn.is_empty() { Self::open(&default_db_path()?) } else { Self::open(dsn) }
    }

    pub fn open(path: &str) -> Result<Self> {
        let started = Instant::now();
        let db = rusqlite::Connection::open(path).with_context(|| format!("opening sqlite db at {}", path))?;
        Self::init(db, started).with_context(|| format!("initializing schema in {}", path))
    }

    pub fn open_in_memory() -> Result<Self> {
        let started = Instant::now();
        let db = rusqlite::Connection::open_in_memory().context("opening in-memory sqlite db")?;
        Self::init(db, started)
    }

    fn init(db: rusqlite::Connection, started: Instant) -> Result<Self> {
        db.pragma_update(None, "journal_mode", "WAL").ok();
        db.pragma_update(None, "synchronous", "NORMAL").ok();
        db.execute_batch(SCHEMA).context("creating tables")?;
        histogram!("persist_open_ms", started.elapsed().as_secs_f64() * 1000.0);
        debug!(took_ms = %started.elapsed().as_millis(), "persist: schema ready");
        Ok(Self { db: Mutex::new(db) })
    }

    fn conn(&self) -> DirtResult<MutexGuard<'_, rusqlite::Connection>> {
        self.db.lock().map_err(|_| DirtError::internal("sqlite connection mutex poisoned"))
    }
}

/// Record latency and a count for one store operation.
pub(crate) fn observe(op: &'static str, started: Instant) {
    histogram!("persist_op_ms", started.elapsed().as_secs_f64() * 1000.0, "op" => op);
    counter!("persist_ops_total", 1u64, "op" => op);
}

pub(crate) fn is_unique_violation(e: &rusqlite::Error) -> bool {
    match e {
        rusqlite::Error::SqliteFailure(err, _) => {
            err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                || err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
        }
        _ => false,
    }
}

/// Wrap an unexpected driver error, keeping only its text.
pub(crate) fn internal(action: &str, e: rusqlite::Error) -> DirtError {
    DirtError::internal(format!("failed to {}: {}", action, e))
}

/// `$HOME/.dirt/dirt.db`, creating the directory; `dirt.db` in the working directory without `HOME`.
fn default_db_path() -> Result<String> {
    db_path_under(std::env::var_os("HOME"))
}

fn db_path_under(home: Option<std::ffi::OsString>) -> Result<String> {
    let Some(home) = home else {
        return Ok("dirt.db".to_string());
    };
    let dir = std::path::PathBuf::from(home).join(".dirt");
    std::fs::create_dir_all(&dir).with_context(|| format!("creating data directory {}", dir.display()))?;
    Ok(dir.join("dirt.db").to_string_lossy().into_owned())
}
