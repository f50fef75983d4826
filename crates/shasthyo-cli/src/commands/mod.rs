pub mod common;
pub mod consultations;
pub mod profile;
pub mod queue;
pub mod status;
pub mod symptoms;
pub mod sync;
pub mod triage;
