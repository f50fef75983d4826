//! Database layer for Shasthyo

mod connection;
mod migrations;
mod profile_repository;
mod queue_repository;
mod symptom_repository;

pub use connection::Database;
pub use profile_repository::{ProfileRepository, SqliteProfileRepository};
pub use queue_repository::{QueueRepository, SqliteQueueRepository};
pub use symptom_repository::{SqliteSymptomRepository, SymptomRepository};
