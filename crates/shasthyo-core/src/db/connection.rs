//! Database connection management

use std::path::Path;

use rusqlite::Connection;

use crate::error::{Error, Result};

use super::migrations;

/// Database wrapper for the durable local store.
///
/// Holds the sync queue, the cached symptom catalog, and the local
/// profile. Everything in it must survive a process restart.
#[derive(Debug)]
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the given path, creating it if it doesn't exist.
    ///
    /// Verifies integrity before use and runs migrations. A corrupted
    /// file is reported as [`Error::Corrupted`] rather than opened: a
    /// store that can silently lose queued actions is worse than one
    /// that refuses to start.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        let database = Self { conn };
        database.configure()?;
        database.check_integrity()?;
        database.migrate()?;
        database.recover_interrupted_drain()?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let database = Self { conn };
        database.configure()?;
        database.migrate()?;
        Ok(database)
    }

    /// Configure `SQLite` for durability and concurrent access
    fn configure(&self) -> Result<()> {
        // WAL keeps enqueue fast while a drain pass reads concurrently
        self.conn.pragma_update(None, "journal_mode", "WAL").ok();
        self.conn
            .pragma_update(None, "synchronous", "NORMAL")
            .ok();
        self.conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(())
    }

    /// Startup integrity check for the durability guarantee
    fn check_integrity(&self) -> Result<()> {
        let verdict: String = self
            .conn
            .query_row("PRAGMA quick_check", [], |row| row.get(0))
            .map_err(|error| Error::Corrupted(error.to_string()))?;
        if verdict == "ok" {
            Ok(())
        } else {
            Err(Error::Corrupted(verdict))
        }
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn)
    }

    /// A drain pass marks the item it is submitting `in_flight`. If the
    /// process dies before the acknowledgment or deferral is recorded,
    /// the row would stay invisible to future drains, so it is reset to
    /// `pending` on startup.
    fn recover_interrupted_drain(&self) -> Result<()> {
        let restored = self.conn.execute(
            "UPDATE sync_queue SET status = 'pending' WHERE status = 'in_flight'",
            [],
        )?;
        if restored > 0 {
            tracing::warn!(restored, "requeued in-flight items from an interrupted sync");
        }
        Ok(())
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
