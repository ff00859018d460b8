use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use wayfarer_core::error::{Result, WayfarerError};
use wayfarer_core::state::{Checkpoint, NodeId};
use wayfarer_core::traits::CheckpointStore;
use wayfarer_core::types::ThreadId;

/// Durable checkpoint history backed by SQLite.
///
/// Rows are never updated. Each append gets the next `seq` for its thread
/// inside a transaction, so concurrent writers cannot interleave.
pub struct SqliteCheckpointStore {
    conn: Mutex<Connection>,
}

fn db_err(e: impl std::fmt::Display) -> WayfarerError {
    WayfarerError::Database(e.to_string())
}

impl SqliteCheckpointStore {
    /// Open or create the checkpoint database.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(db_err)?;
        Self::init(conn)
    }

    /// A private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory().map_err(db_err)?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;

             CREATE TABLE IF NOT EXISTS checkpoints (
                 thread_id TEXT NOT NULL,
                 seq INTEGER NOT NULL,
                 parent_seq INTEGER,
                 suspended_at TEXT,
                 prompt TEXT,
                 state_json TEXT NOT NULL,
                 created_at TEXT NOT NULL,
                 PRIMARY KEY (thread_id, seq)
             );",
        )
        .map_err(db_err)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(db_err)
    }

    fn append_sync(&self, mut cp: Checkpoint) -> Result<Checkpoint> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(db_err)?;

        let latest: Option<u64> = tx
            .query_row(
                "SELECT MAX(seq) FROM checkpoints WHERE thread_id = ?1",
                params![cp.thread_id.as_str()],
                |row| row.get::<_, Option<i64>>(0),
            )
            .map_err(db_err)?
            .map(|s| s as u64);

        if cp.parent_seq.is_some() && cp.parent_seq != latest {
            return Err(WayfarerError::CheckpointConflict {
                thread_id: cp.thread_id.to_string(),
                expected: cp.parent_seq,
                latest,
            });
        }

        cp.seq = latest.map_or(1, |s| s + 1);
        let state_json = serde_json::to_string(&cp.state)?;
        tx.execute(
            "INSERT INTO checkpoints (thread_id, seq, parent_seq, suspended_at, prompt, state_json, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                cp.thread_id.as_str(),
                cp.seq as i64,
                cp.parent_seq.map(|s| s as i64),
                cp.suspended_at.map(|n| n.as_str()),
                cp.prompt,
                state_json,
                cp.created_at.to_rfc3339(),
            ],
        )
        .map_err(db_err)?;
        tx.commit().map_err(db_err)?;

        debug!(thread_id = %cp.thread_id, seq = cp.seq, "Checkpoint appended");
        Ok(cp)
    }
}

const COLUMNS: &str = "thread_id, seq, parent_seq, suspended_at, prompt, state_json, created_at";

struct RawRow {
    thread_id: String,
    seq: i64,
    parent_seq: Option<i64>,
    suspended_at: Option<String>,
    prompt: Option<String>,
    state_json: String,
    created_at: String,
}

impl RawRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            thread_id: row.get(0)?,
            seq: row.get(1)?,
            parent_seq: row.get(2)?,
            suspended_at: row.get(3)?,
            prompt: row.get(4)?,
            state_json: row.get(5)?,
            created_at: row.get(6)?,
        })
    }

    fn into_checkpoint(self) -> Result<Checkpoint> {
        let suspended_at = self
            .suspended_at
            .map(|s| s.parse::<NodeId>())
            .transpose()
            .map_err(WayfarerError::Database)?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(db_err)?;
        Ok(Checkpoint {
            thread_id: ThreadId(self.thread_id),
            seq: self.seq as u64,
            parent_seq: self.parent_seq.map(|s| s as u64),
            state: serde_json::from_str(&self.state_json)?,
            suspended_at,
            prompt: self.prompt,
            created_at,
        })
    }
}

impl CheckpointStore for SqliteCheckpointStore {
    fn load_latest(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Option<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let raw = {
                let conn = self.lock()?;
                conn.query_row(
                    &format!(
                        "SELECT {} FROM checkpoints WHERE thread_id = ?1 ORDER BY seq DESC LIMIT 1",
                        COLUMNS
                    ),
                    params![thread_id.as_str()],
                    RawRow::read,
                )
                .optional()
                .map_err(db_err)?
            };
            raw.map(RawRow::into_checkpoint).transpose()
        })
    }

    fn append(&self, checkpoint: Checkpoint) -> BoxFuture<'_, Result<Checkpoint>> {
        Box::pin(async move { self.append_sync(checkpoint) })
    }

    fn history(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<Vec<Checkpoint>>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let rows = {
                let conn = self.lock()?;
                let mut stmt = conn
                    .prepare(&format!(
                        "SELECT {} FROM checkpoints WHERE thread_id = ?1 ORDER BY seq ASC",
                        COLUMNS
                    ))
                    .map_err(db_err)?;
                let rows = stmt
                    .query_map(params![thread_id.as_str()], RawRow::read)
                    .map_err(db_err)?
                    .collect::<rusqlite::Result<Vec<_>>>()
                    .map_err(db_err)?;
                rows
            };
            rows.into_iter().map(RawRow::into_checkpoint).collect()
        })
    }

    fn delete_thread(&self, thread_id: &ThreadId) -> BoxFuture<'_, Result<usize>> {
        let thread_id = thread_id.clone();
        Box::pin(async move {
            let conn = self.lock()?;
            conn.execute(
                "DELETE FROM checkpoints WHERE thread_id = ?1",
                params![thread_id.as_str()],
            )
            .map_err(db_err)
        })
    }

    fn list_threads(&self, limit: usize) -> BoxFuture<'_, Result<Vec<ThreadId>>> {
        Box::pin(async move {
            let conn = self.lock()?;
            let mut stmt = conn
                .prepare(
                    "SELECT thread_id FROM checkpoints
                     GROUP BY thread_id
                     ORDER BY MAX(rowid) DESC
                     LIMIT ?1",
                )
                .map_err(db_err)?;
            let ids = stmt
                .query_map(params![limit as i64], |row| row.get::<_, String>(0))
                .map_err(db_err)?
                .collect::<rusqlite::Result<Vec<_>>>()
                .map_err(db_err)?;
            Ok(ids.into_iter().map(ThreadId).collect())
        })
    }
}
