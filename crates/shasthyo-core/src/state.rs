//! Engine status surfaced to the UI layer

use serde::{Deserialize, Serialize};

/// Coarse synchronization state for a status indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Backend unreachable; actions are being queued
    Offline,
    /// Online with queued actions still awaiting acknowledgment
    Syncing,
    /// Online and fully reconciled
    Synced,
    /// Online but some actions were permanently rejected
    Error,
}

impl SyncState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time snapshot of engine health
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSnapshot {
    /// Current connectivity reading
    pub online: bool,
    /// Actions still awaiting acknowledgment
    pub pending_actions: usize,
    /// Actions permanently rejected or out of retries
    pub failed_actions: usize,
}

impl EngineSnapshot {
    /// Collapse the snapshot into the state shown by the UI indicator.
    ///
    /// Permanent failures take precedence over pending work so the user
    /// is never shown a calm "syncing" while actions are silently stuck.
    pub const fn sync_state(&self) -> SyncState {
        if !self.online {
            SyncState::Offline
        } else if self.failed_actions > 0 {
            SyncState::Error
        } else if self.pending_actions > 0 {
            SyncState::Syncing
        } else {
            SyncState::Synced
        }
    }
}
