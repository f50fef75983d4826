//! Shared store service wrapper.
//!
//! Serializes every store operation behind one mutex so UI-triggered
//! enqueues and the coordinator's drain can interleave freely without
//! corrupting ordering. Each operation is a single short critical
//! section; the lock is never held across an await point.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::db::{
    Database, ProfileRepository, QueueRepository, SqliteProfileRepository, SqliteQueueRepository,
    SqliteSymptomRepository, SymptomRepository,
};
use crate::error::Result;
use crate::models::{ActionPayload, QueueStatus, Symptom, SyncQueueItem, UserProfile};

/// Thread-safe service over the durable local store
#[derive(Clone)]
pub struct StoreService {
    db: Arc<Mutex<Database>>,
}

impl StoreService {
    /// Open the store at the given filesystem path
    pub fn open_path(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let db = Database::open(&db_path)?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    /// Open an in-memory store (primarily for tests)
    pub fn open_in_memory() -> Result<Self> {
        let db = Database::open_in_memory()?;
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Durably append an action to the sync queue
    pub fn enqueue(&self, payload: &ActionPayload) -> Result<SyncQueueItem> {
        let db = self.lock();
        SqliteQueueRepository::new(db.connection()).enqueue(payload)
    }

    /// Pending queue items, oldest first
    pub fn peek_batch(&self, max_n: usize) -> Result<Vec<SyncQueueItem>> {
        let db = self.lock();
        SqliteQueueRepository::new(db.connection()).peek_batch(max_n)
    }

    /// Atomic status transition for one queue item
    pub fn mark(
        &self,
        sequence_no: i64,
        status: QueueStatus,
        attempt_count: u32,
        next_attempt_at: i64,
        last_error: Option<&str>,
    ) -> Result<()> {
        let db = self.lock();
        SqliteQueueRepository::new(db.connection()).mark(
            sequence_no,
            status,
            attempt_count,
            next_attempt_at,
            last_error,
        )
    }

    /// Terminal removal of an acknowledged item
    pub fn remove(&self, sequence_no: i64) -> Result<()> {
        let db = self.lock();
        SqliteQueueRepository::new(db.connection()).remove(sequence_no)
    }

    /// Items still awaiting acknowledgment
    pub fn pending_count(&self) -> Result<usize> {
        let db = self.lock();
        SqliteQueueRepository::new(db.connection()).pending_count()
    }

    /// Pending plus permanently failed items, for UI surfacing
    pub fn list_unresolved(&self, limit: usize) -> Result<Vec<SyncQueueItem>> {
        let db = self.lock();
        SqliteQueueRepository::new(db.connection()).list_unresolved(limit)
    }

    /// Cached symptom catalog
    pub fn cached_symptoms(&self) -> Result<Vec<Symptom>> {
        let db = self.lock();
        SqliteSymptomRepository::new(db.connection()).list()
    }

    /// Replace the symptom cache with a freshly fetched catalog
    pub fn replace_symptoms(&self, symptoms: &[Symptom]) -> Result<()> {
        let db = self.lock();
        SqliteSymptomRepository::new(db.connection()).replace_all(symptoms)
    }

    /// The local user profile, if created
    pub fn profile(&self) -> Result<Option<UserProfile>> {
        let db = self.lock();
        SqliteProfileRepository::new(db.connection()).get()
    }

    /// Insert or update the local user profile
    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        let db = self.lock();
        SqliteProfileRepository::new(db.connection()).save(profile)
    }
}
