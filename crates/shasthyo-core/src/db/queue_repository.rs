//! Sync queue repository implementation

#![allow(clippy::cast_possible_wrap)] // SQLite uses i64 for LIMIT/OFFSET

use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::models::{ActionPayload, QueueStatus, SyncQueueItem};
use crate::util::unix_millis_now;

/// Trait for durable sync queue operations.
///
/// The queue is FIFO by `sequence_no` and append-only except for status
/// transitions and terminal removal.
pub trait QueueRepository {
    /// Durably append an action. Assigns the sequence number and mints
    /// the idempotency key; the row is committed before this returns.
    fn enqueue(&self, payload: &ActionPayload) -> Result<SyncQueueItem>;

    /// Get a queued item by sequence number
    fn get(&self, sequence_no: i64) -> Result<Option<SyncQueueItem>>;

    /// Pending items, oldest first
    fn peek_batch(&self, max_n: usize) -> Result<Vec<SyncQueueItem>>;

    /// Atomically update an item's status, attempt count, retry schedule,
    /// and last error
    fn mark(
        &self,
        sequence_no: i64,
        status: QueueStatus,
        attempt_count: u32,
        next_attempt_at: i64,
        last_error: Option<&str>,
    ) -> Result<()>;

    /// Remove an item (terminal removal after acknowledgment)
    fn remove(&self, sequence_no: i64) -> Result<()>;

    /// Number of items still waiting for a drain pass
    fn pending_count(&self) -> Result<usize>;

    /// Items the user may still care about: pending, in-flight, and
    /// permanently failed, oldest first
    fn list_unresolved(&self, limit: usize) -> Result<Vec<SyncQueueItem>>;
}

/// `SQLite` implementation of [`QueueRepository`]
pub struct SqliteQueueRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteQueueRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn read_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawItem> {
        Ok(RawItem {
            sequence_no: row.get(0)?,
            idempotency_key: row.get(1)?,
            payload: row.get(2)?,
            status: row.get(3)?,
            attempt_count: row.get(4)?,
            enqueued_at: row.get(5)?,
            next_attempt_at: row.get(6)?,
            last_error: row.get(7)?,
        })
    }
}

const SELECT_COLUMNS: &str = "sequence_no, idempotency_key, payload, status, \
     attempt_count, enqueued_at, next_attempt_at, last_error";

/// Raw column values, parsed into a model outside the rusqlite closure
struct RawItem {
    sequence_no: i64,
    idempotency_key: String,
    payload: String,
    status: String,
    attempt_count: u32,
    enqueued_at: i64,
    next_attempt_at: i64,
    last_error: Option<String>,
}

impl RawItem {
    fn into_item(self) -> Result<SyncQueueItem> {
        let idempotency_key = Uuid::parse_str(&self.idempotency_key)
            .map_err(|error| Error::Database(format!("bad idempotency key: {error}")))?;
        let status = self
            .status
            .parse::<QueueStatus>()
            .map_err(Error::Database)?;
        let payload: ActionPayload = serde_json::from_str(&self.payload)?;

        Ok(SyncQueueItem {
            sequence_no: self.sequence_no,
            idempotency_key,
            payload,
            status,
            attempt_count: self.attempt_count,
            enqueued_at: self.enqueued_at,
            next_attempt_at: self.next_attempt_at,
            last_error: self.last_error,
        })
    }
}

impl QueueRepository for SqliteQueueRepository<'_> {
    fn enqueue(&self, payload: &ActionPayload) -> Result<SyncQueueItem> {
        let idempotency_key = Uuid::now_v7();
        let enqueued_at = unix_millis_now();
        let payload_json = serde_json::to_string(payload)?;

        self.conn.execute(
            "INSERT INTO sync_queue \
             (idempotency_key, action, payload, status, attempt_count, enqueued_at, next_attempt_at) \
             VALUES (?, ?, ?, 'pending', 0, ?, 0)",
            params![
                idempotency_key.to_string(),
                payload.kind().as_str(),
                payload_json,
                enqueued_at,
            ],
        )?;
        let sequence_no = self.conn.last_insert_rowid();

        Ok(SyncQueueItem {
            sequence_no,
            idempotency_key,
            payload: payload.clone(),
            status: QueueStatus::Pending,
            attempt_count: 0,
            enqueued_at,
            next_attempt_at: 0,
            last_error: None,
        })
    }

    fn get(&self, sequence_no: i64) -> Result<Option<SyncQueueItem>> {
        let raw = self
            .conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM sync_queue WHERE sequence_no = ?"),
                params![sequence_no],
                Self::read_item,
            )
            .optional()?;
        raw.map(RawItem::into_item).transpose()
    }

    fn peek_batch(&self, max_n: usize) -> Result<Vec<SyncQueueItem>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue \
             WHERE status = 'pending' ORDER BY sequence_no ASC LIMIT ?"
        ))?;
        let rows = statement.query_map(params![max_n as i64], Self::read_item)?;

        let mut items = Vec::new();
        for raw in rows {
            items.push(raw?.into_item()?);
        }
        Ok(items)
    }

    fn mark(
        &self,
        sequence_no: i64,
        status: QueueStatus,
        attempt_count: u32,
        next_attempt_at: i64,
        last_error: Option<&str>,
    ) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE sync_queue \
             SET status = ?, attempt_count = ?, next_attempt_at = ?, last_error = ? \
             WHERE sequence_no = ?",
            params![
                status.as_str(),
                attempt_count,
                next_attempt_at,
                last_error,
                sequence_no
            ],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("queue item {sequence_no}")));
        }
        Ok(())
    }

    fn remove(&self, sequence_no: i64) -> Result<()> {
        self.conn.execute(
            "DELETE FROM sync_queue WHERE sequence_no = ?",
            params![sequence_no],
        )?;
        Ok(())
    }

    fn pending_count(&self) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM sync_queue WHERE status IN ('pending', 'in_flight')",
            [],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    fn list_unresolved(&self, limit: usize) -> Result<Vec<SyncQueueItem>> {
        let mut statement = self.conn.prepare(&format!(
            "SELECT {SELECT_COLUMNS} FROM sync_queue \
             WHERE status != 'acknowledged' ORDER BY sequence_no ASC LIMIT ?"
        ))?;
        let rows = statement.query_map(params![limit as i64], Self::read_item)?;

        let mut items = Vec::new();
        for raw in rows {
            items.push(raw?.into_item()?);
        }
        Ok(items)
    }
}
