//! Embedded SQLite work queue backend.

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection};

use super::{DispatchAck, DispatchError, WorkItem, WorkQueue};
use crate::pipeline::Stage;

/// SQLite-backed work queue.
///
/// Jobs live in a table keyed by job id; out-of-process workers sharing the
/// database file pull work with [`claim_next`](Self::claim_next). Suitable
/// for single-host deployments; multi-host setups point the dispatcher at a
/// remote queue service instead.
pub struct SqliteWorkQueue {
    conn: Mutex<Connection>,
}

impl SqliteWorkQueue {
    /// Open (or create) the queue database at the given path.
    pub fn new(path: &Path) -> Result<Self, DispatchError> {
        let conn = Connection::open(path).map_err(|e| DispatchError::Backend(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory queue (useful for testing).
    pub fn in_memory() -> Result<Self, DispatchError> {
        let conn =
            Connection::open_in_memory().map_err(|e| DispatchError::Backend(e.to_string()))?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), DispatchError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS queue_jobs (
                job_id TEXT PRIMARY KEY,
                queue TEXT NOT NULL,
                stage TEXT NOT NULL,
                article_id TEXT NOT NULL,
                timeout_secs INTEGER NOT NULL,
                enqueued_at TEXT NOT NULL,
                claimed_at TEXT,
                completed_at TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_queue_jobs_queue ON queue_jobs(queue, claimed_at);
            "#,
        )
        .map_err(|e| DispatchError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Claim the oldest unclaimed job on a queue.
    ///
    /// This is the worker-facing side of the queue: the job stays visible to
    /// a single claimer until completed or until its advisory timeout lapses.
    pub fn claim_next(&self, queue: &str) -> Result<Option<WorkItem>, DispatchError> {
        let conn = self.conn.lock().unwrap();

        let job = conn
            .query_row(
                "SELECT job_id, queue, stage, article_id, timeout_secs FROM queue_jobs \
                 WHERE queue = ? AND claimed_at IS NULL AND completed_at IS NULL \
                 ORDER BY enqueued_at ASC, job_id ASC LIMIT 1",
                params![queue],
                |row| {
                    let job_id: String = row.get(0)?;
                    let queue: String = row.get(1)?;
                    let stage_str: String = row.get(2)?;
                    let article_id: String = row.get(3)?;
                    let timeout_secs: u32 = row.get(4)?;
                    Ok((job_id, queue, stage_str, article_id, timeout_secs))
                },
            );

        let (job_id, queue, stage_str, article_id, timeout_secs) = match job {
            Ok(row) => row,
            Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
            Err(e) => return Err(DispatchError::Backend(e.to_string())),
        };

        let stage: Stage = stage_str
            .parse()
            .map_err(DispatchError::Backend)?;

        conn.execute(
            "UPDATE queue_jobs SET claimed_at = ? WHERE job_id = ?",
            params![Utc::now().to_rfc3339(), job_id],
        )
        .map_err(|e| DispatchError::Backend(e.to_string()))?;

        Ok(Some(WorkItem {
            job_id,
            queue,
            stage,
            article_id,
            timeout_secs,
        }))
    }

    /// Mark a claimed job as completed.
    pub fn complete(&self, job_id: &str) -> Result<(), DispatchError> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "UPDATE queue_jobs SET completed_at = ? WHERE job_id = ?",
            params![Utc::now().to_rfc3339(), job_id],
        )
        .map_err(|e| DispatchError::Backend(e.to_string()))?;

        Ok(())
    }

    /// Number of jobs waiting (unclaimed) on a queue.
    pub fn depth(&self, queue: &str) -> Result<i64, DispatchError> {
        let conn = self.conn.lock().unwrap();

        conn.query_row(
            "SELECT COUNT(*) FROM queue_jobs WHERE queue = ? AND claimed_at IS NULL AND completed_at IS NULL",
            params![queue],
            |row| row.get(0),
        )
        .map_err(|e| DispatchError::Backend(e.to_string()))
    }
}

#[async_trait]
impl WorkQueue for SqliteWorkQueue {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn enqueue(&self, item: &WorkItem) -> Result<DispatchAck, DispatchError> {
        let conn = self.conn.lock().unwrap();

        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO queue_jobs (job_id, queue, stage, article_id, timeout_secs, enqueued_at) VALUES (?, ?, ?, ?, ?, ?)",
                params![
                    item.job_id,
                    item.queue,
                    item.stage.name(),
                    item.article_id,
                    item.timeout_secs,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| DispatchError::Backend(e.to_string()))?;

        Ok(DispatchAck {
            job_id: item.job_id.clone(),
            deduplicated: inserted == 0,
        })
    }

    async fn ping(&self) -> Result<(), DispatchError> {
        let conn = self.conn.lock().unwrap();
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| DispatchError::Unreachable(e.to_string()))
    }
}
