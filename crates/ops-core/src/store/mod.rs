//! SQLite persistence for OPS Center.
//!
//! [`Store`] holds only the database location. Every operation opens its own
//! connection and closes it when done, so a `Store` is cheap to clone into
//! blocking tasks and never shares a connection across threads.
//!
//! Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`
//! suffix) so that lexicographic comparison in SQL matches time order.
//! JSON columns are stored as serialized text.

mod agents;
mod records;
mod tasks;
mod workbench;

pub use agents::{
    completion_rate, AgentInfo, AgentList, AgentStats, AgentStatsReport, AgentSummary,
    CompletedCount, RecentTask, StatsSummary,
};
pub use tasks::generate_task_id;
pub(crate) use workbench::fetch_workbench;

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, Row};
use serde_json::Value;

use crate::error::{OpsError, Result};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tenant (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS tag (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id   INTEGER NOT NULL,
    tag_name    TEXT NOT NULL,
    tag_info    TEXT,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tag_tenant ON tag(tenant_id);

CREATE TABLE IF NOT EXISTS taskqueuemapping (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    tenant_id           INTEGER NOT NULL,
    workbench_id        INTEGER NOT NULL,
    task_id             INTEGER NOT NULL,
    queue_id            INTEGER NOT NULL,
    potential_queue_id  INTEGER,
    criteria            TEXT,
    attributes          TEXT
);

CREATE TABLE IF NOT EXISTS agent (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    name        TEXT NOT NULL UNIQUE,
    created_at  TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS usertaskinfo (
    id                   INTEGER PRIMARY KEY AUTOINCREMENT,
    agent                TEXT NOT NULL,
    task_id              INTEGER NOT NULL,
    status               TEXT NOT NULL,
    created_at           TEXT NOT NULL,
    completed_at         TEXT,
    process_instance_id  INTEGER,
    workbench_id         INTEGER
);
CREATE INDEX IF NOT EXISTS idx_usertaskinfo_agent ON usertaskinfo(agent);
CREATE INDEX IF NOT EXISTS idx_usertaskinfo_task ON usertaskinfo(task_id);

CREATE TABLE IF NOT EXISTS historytaskinfo (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    task_id     INTEGER NOT NULL,
    event_type  TEXT NOT NULL,
    timestamp   TEXT NOT NULL,
    details     TEXT
);

CREATE TABLE IF NOT EXISTS workbench (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL UNIQUE,
    description  TEXT,
    created_at   TEXT NOT NULL,
    updated_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS workbench_roles (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    workbench_id  INTEGER NOT NULL REFERENCES workbench(id),
    agent         TEXT NOT NULL,
    role          TEXT NOT NULL CHECK (role IN ('Assessor', 'Reviewer', 'Team Lead', 'Viewer')),
    assigned_at   TEXT NOT NULL,
    assigned_by   TEXT NOT NULL DEFAULT 'system',
    is_active     INTEGER NOT NULL DEFAULT 1
);
-- At most one active assignment per (workbench, agent, role). Inactive rows
-- are history and may repeat.
CREATE UNIQUE INDEX IF NOT EXISTS idx_workbench_roles_active
    ON workbench_roles(workbench_id, agent, role) WHERE is_active = 1;
";

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Handle to the OPS Center database.
#[derive(Debug, Clone)]
pub struct Store {
    path: PathBuf,
}

impl Store {
    /// Open (or create) the database file at `path` and apply the schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
        };
        let conn = store.conn()?;
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = %store.path.display(), "database schema ready");
        Ok(store)
    }

    /// Open the database named by a `DATABASE_URL`-style string.
    ///
    /// Accepts `sqlite:///relative/or/abs.db`, `sqlite://file.db`,
    /// `sqlite:file.db` and bare filesystem paths.
    pub fn from_database_url(url: &str) -> Result<Self> {
        Self::open(database_path(url)?)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection for one unit of work.
    pub(crate) fn conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Run `SELECT 1` against the database.
    pub fn health_check(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

/// Resolve a `DATABASE_URL` to a filesystem path.
pub fn database_path(url: &str) -> Result<PathBuf> {
    let url = url.trim();
    if url.is_empty() {
        return Err(OpsError::Config("DATABASE_URL is empty".into()));
    }
    if url.contains(":memory:") {
        return Err(OpsError::Config(
            "in-memory databases are not supported; use a file path".into(),
        ));
    }
    if let Some(rest) = url.strip_prefix("sqlite:") {
        // sqlite:///rel.db   -> rel.db
        // sqlite:////abs.db  -> /abs.db
        // sqlite://x.db      -> x.db
        let rest = rest.strip_prefix("//").unwrap_or(rest);
        let rest = rest.strip_prefix('/').unwrap_or(rest);
        return Ok(PathBuf::from(rest));
    }
    if url.contains("://") {
        return Err(OpsError::Config(format!(
            "unsupported DATABASE_URL scheme: {url}"
        )));
    }
    Ok(PathBuf::from(url))
}

// ---------------------------------------------------------------------------
// Column helpers
// ---------------------------------------------------------------------------

pub(crate) fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn now_ts() -> String {
    ts(&Utc::now())
}

fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_ts(idx, &raw)
}

pub(crate) fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| parse_ts(idx, &r)).transpose()
}

pub(crate) fn json_text(value: &Option<Value>) -> Result<Option<String>> {
    value
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(OpsError::from)
}

pub(crate) fn get_opt_json(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<Value>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|r| {
        serde_json::from_str(&r)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
    })
    .transpose()
}

/// Open a fresh database in a temp directory. Test-only.
#[cfg(test)]
pub(crate) fn test_store() -> (tempfile::TempDir, Store) {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Store::open(dir.path().join("ops_center.db")).unwrap();
    (dir, store)
}
