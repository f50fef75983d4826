//! shasthyo-core - Core library for Shasthyo
//!
//! This crate contains the offline-first triage engine shared by all
//! Shasthyo clients: the local rule engine, the durable sync queue, the
//! connectivity monitor, and the reconciliation coordinator that drains
//! queued actions to the backend.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod rpc;
pub mod services;
pub mod state;
pub mod sync;
pub mod triage;
pub mod util;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use models::{SeverityLevel, SymptomDuration, TriageRequest, TriageResult};
pub use services::{StoreService, TriageService};
pub use state::{EngineSnapshot, SyncState};
