//! SQLite-backed checkpoint storage.
//!
//! One `trailmark.db` per user, WAL mode, every entry tagged with the
//! workspace it was recorded in.

use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeSet;
use std::path::Path;
use time::OffsetDateTime;
use tracing::warn;
use trailmark_core::clock::{format_ts, normalize_ts};
use trailmark_core::{Entry, EntryFilter, EntrySource, EntryType, WorkspaceScope};

use crate::StoreError;

const SCHEMA_SQL: &str = "
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS entries (
    rowid INTEGER PRIMARY KEY,
    entry_id TEXT UNIQUE NOT NULL,
    workspace TEXT NOT NULL,
    ts TEXT NOT NULL,
    description TEXT NOT NULL,
    project TEXT,
    git_branch TEXT,
    git_commit TEXT,
    tags TEXT NOT NULL DEFAULT '[]',
    files TEXT NOT NULL DEFAULT '[]',
    session_id TEXT,
    entry_type TEXT,
    confidence_score REAL
);

CREATE INDEX IF NOT EXISTS idx_entries_ts ON entries(ts);
CREATE INDEX IF NOT EXISTS idx_entries_workspace_ts ON entries(workspace, ts DESC);

CREATE TABLE IF NOT EXISTS schema_meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
";

const SELECT_COLUMNS: &str = "entry_id, ts, description, project, git_branch, git_commit,
                              tags, files, session_id, entry_type, confidence_score";

/// SQLite-backed checkpoint store.
pub struct CheckpointStore {
    conn: Connection,
}

impl CheckpointStore {
    /// Open or create the database with full schema.
    pub fn open_or_create(db_path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(db_path)?;
        let store = Self { conn };
        store.apply_pragmas()?;
        store.apply_schema()?;
        Ok(store)
    }

    fn apply_pragmas(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    fn apply_schema(&self) -> anyhow::Result<()> {
        self.conn.execute_batch(SCHEMA_SQL)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('version', '1')",
            [],
        )?;
        Ok(())
    }

    pub fn schema_version(&self) -> anyhow::Result<u32> {
        let version: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM schema_meta WHERE key = 'version'",
                [],
                |row| row.get(0),
            )
            .optional()?;
        Ok(version.and_then(|v| v.parse().ok()).unwrap_or(1))
    }

    // ── Writes ──────────────────────────────────────────────────────

    /// Append an entry to a workspace. Parseable timestamps are stored in
    /// normalized UTC form so they sort lexicographically.
    pub fn append_entry(&self, workspace: &str, entry: &Entry) -> anyhow::Result<()> {
        let ts = match normalize_ts(&entry.ts) {
            Some(ts) => ts,
            None => {
                warn!(id = %entry.id, ts = %entry.ts, "storing entry with unparseable timestamp");
                entry.ts.clone()
            }
        };
        let tags = serde_json::to_string(&entry.tags)?;
        let files = serde_json::to_string(&entry.files)?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO entries (
                entry_id, workspace, ts, description, project, git_branch,
                git_commit, tags, files, session_id, entry_type, confidence_score
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                entry.id,
                workspace,
                ts,
                entry.description,
                entry.project,
                entry.git_branch,
                entry.git_commit,
                tags,
                files,
                entry.session_id,
                entry.entry_type.map(|t| t.as_str()),
                entry.confidence_score,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────

    pub fn get_entry(&self, id: &str) -> anyhow::Result<Option<Entry>> {
        let sql = format!("SELECT {SELECT_COLUMNS} FROM entries WHERE entry_id = ?1");
        let row = self
            .conn
            .query_row(&sql, params![id], map_entry_row)
            .optional()?;
        match row {
            Some(row) => Ok(Some(row_to_entry(row)?)),
            None => Ok(None),
        }
    }

    /// Number of entries, in one workspace or across all of them.
    pub fn count(&self, workspace: Option<&str>) -> anyhow::Result<usize> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM entries WHERE ?1 IS NULL OR workspace = ?1",
            params![workspace],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Newest entries first.
    pub fn recent(&self, workspace: Option<&str>, limit: usize) -> anyhow::Result<Vec<Entry>> {
        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM entries
             WHERE ?1 IS NULL OR workspace = ?1
             ORDER BY ts DESC, rowid DESC
             LIMIT ?2"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![workspace, limit], map_entry_row)?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|r| row_to_entry(r).map_err(Into::into))
            .collect()
    }

    /// Entries matching a filter, oldest first. `now` resolves relative windows.
    pub fn fetch_at(&self, filter: &EntryFilter, now: OffsetDateTime) -> anyhow::Result<Vec<Entry>> {
        let workspace = match &filter.workspace {
            WorkspaceScope::Workspace(id) => Some(id.as_str()),
            WorkspaceScope::All => None,
        };
        let (from, to) = filter.bounds(now);
        let from = from.map(format_ts);
        let to = to.map(format_ts);
        let pattern = filter
            .query
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        let sql = format!(
            "SELECT {SELECT_COLUMNS} FROM entries
             WHERE (?1 IS NULL OR workspace = ?1)
               AND (?2 IS NULL OR project = ?2)
               AND (?3 IS NULL OR description LIKE ?3 ESCAPE '\\' OR tags LIKE ?3 ESCAPE '\\')
               AND (?4 IS NULL OR ts >= ?4)
               AND (?5 IS NULL OR ts <= ?5)
             ORDER BY ts, rowid"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![workspace, filter.project, pattern, from, to],
                map_entry_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        rows.into_iter()
            .map(|r| row_to_entry(r).map_err(Into::into))
            .collect()
    }
}

impl EntrySource for CheckpointStore {
    fn fetch_entries(&self, filter: &EntryFilter) -> anyhow::Result<Vec<Entry>> {
        self.fetch_at(filter, OffsetDateTime::now_utc())
    }
}

impl Drop for CheckpointStore {
    fn drop(&mut self) {
        // Merge WAL back into main DB so users see a single file when idle.
        let _ = self
            .conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);");
    }
}

// ── Row helpers ─────────────────────────────────────────────────────

struct EntryRow {
    id: String,
    ts: String,
    description: String,
    project: Option<String>,
    git_branch: Option<String>,
    git_commit: Option<String>,
    tags_str: String,
    files_str: String,
    session_id: Option<String>,
    entry_type: Option<String>,
    confidence_score: Option<f64>,
}

fn map_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EntryRow> {
    Ok(EntryRow {
        id: row.get(0)?,
        ts: row.get(1)?,
        description: row.get(2)?,
        project: row.get(3)?,
        git_branch: row.get(4)?,
        git_commit: row.get(5)?,
        tags_str: row.get(6)?,
        files_str: row.get(7)?,
        session_id: row.get(8)?,
        entry_type: row.get(9)?,
        confidence_score: row.get(10)?,
    })
}

fn row_to_entry(row: EntryRow) -> Result<Entry, StoreError> {
    let tags: BTreeSet<String> =
        serde_json::from_str(&row.tags_str).map_err(|source| StoreError::CorruptEntry {
            id: row.id.clone(),
            column: "tags",
            source,
        })?;
    let files: Vec<String> =
        serde_json::from_str(&row.files_str).map_err(|source| StoreError::CorruptEntry {
            id: row.id.clone(),
            column: "files",
            source,
        })?;
    let entry_type = row.entry_type.as_deref().and_then(|t| {
        let parsed = EntryType::from_tag(t);
        if parsed.is_none() {
            warn!(id = %row.id, entry_type = t, "ignoring unknown stored entry type");
        }
        parsed
    });

    Ok(Entry {
        id: row.id,
        ts: row.ts,
        description: row.description,
        project: row.project,
        git_branch: row.git_branch,
        git_commit: row.git_commit,
        tags,
        files,
        session_id: row.session_id,
        entry_type,
        confidence_score: row.confidence_score,
        consolidation: None,
    })
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
