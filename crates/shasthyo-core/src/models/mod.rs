//! Data models for Shasthyo

mod profile;
mod queue;
mod symptom;
mod triage;

pub use profile::{Gender, ProfileDraft, UserId, UserProfile};
pub use queue::{ActionKind, ActionPayload, QueueStatus, SyncQueueItem};
pub use symptom::{Symptom, SymptomRef};
pub use triage::{
    Consultation, ResultId, SeverityLevel, SymptomDuration, TriageRequest, TriageResult,
};
