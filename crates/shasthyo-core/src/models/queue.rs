//! Durable sync queue item model

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profile::UserProfile;
use super::triage::{Consultation, ResultId, TriageRequest};

/// The bounded set of action kinds the engine queues while offline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    TriageSubmit,
    ConsultationCreate,
    ProfileUpdate,
}

impl ActionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TriageSubmit => "triage_submit",
            Self::ConsultationCreate => "consultation_create",
            Self::ProfileUpdate => "profile_update",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "triage_submit" => Ok(Self::TriageSubmit),
            "consultation_create" => Ok(Self::ConsultationCreate),
            "profile_update" => Ok(Self::ProfileUpdate),
            other => Err(format!("unknown action kind: {other}")),
        }
    }
}

/// Strongly-typed queued action payload.
///
/// One variant per known action kind, so reconciliation never handles a
/// loosely-shaped `{action, payload}` blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionPayload {
    /// A triage submission the server has not seen yet
    TriageSubmit {
        request: TriageRequest,
        /// ID of the provisional local result, so the server-confirmed
        /// record can be linked to the same logical submission
        local_result_id: ResultId,
    },
    /// A consultation record created while offline. Part of the `/sync`
    /// wire contract; the server materializes consultations from triage
    /// submissions, so the engine itself never queues this variant.
    ConsultationCreate { consultation: Consultation },
    /// A profile create-or-update
    ProfileUpdate { profile: UserProfile },
}

impl ActionPayload {
    pub const fn kind(&self) -> ActionKind {
        match self {
            Self::TriageSubmit { .. } => ActionKind::TriageSubmit,
            Self::ConsultationCreate { .. } => ActionKind::ConsultationCreate,
            Self::ProfileUpdate { .. } => ActionKind::ProfileUpdate,
        }
    }
}

/// Lifecycle status of a queued action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    /// Waiting for a drain pass
    Pending,
    /// Currently being submitted by the coordinator
    InFlight,
    /// Confirmed by the server; removal follows immediately
    Acknowledged,
    /// Rejected by the server or out of retry attempts; retained so the
    /// UI can surface it, never silently dropped
    FailedPermanent,
}

impl QueueStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Acknowledged => "acknowledged",
            Self::FailedPermanent => "failed_permanent",
        }
    }

    /// Terminal statuses are surfaced but no longer drained
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Acknowledged | Self::FailedPermanent)
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_flight" => Ok(Self::InFlight),
            "acknowledged" => Ok(Self::Acknowledged),
            "failed_permanent" => Ok(Self::FailedPermanent),
            other => Err(format!("unknown queue status: {other}")),
        }
    }
}

/// One durable entry in the sync queue.
///
/// `sequence_no` is assigned by the store at enqueue time and is strictly
/// increasing; the queue is FIFO by it. `idempotency_key` is minted once
/// at enqueue and carried on every retry so the server can deduplicate a
/// resubmission whose acknowledgment was lost.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncQueueItem {
    pub sequence_no: i64,
    pub idempotency_key: Uuid,
    pub payload: ActionPayload,
    pub status: QueueStatus,
    pub attempt_count: u32,
    /// Unix ms
    pub enqueued_at: i64,
    /// Unix ms; 0 means immediately eligible
    pub next_attempt_at: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl SyncQueueItem {
    pub const fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}
