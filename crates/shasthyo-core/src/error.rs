//! Error types for shasthyo-core

use thiserror::Error;

/// Result type alias using shasthyo-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in shasthyo-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Local store failed its startup integrity check. Queued actions can
    /// no longer be guaranteed durable, so this is surfaced instead of
    /// silently continuing.
    #[error("Local store corrupted: {0}")]
    Corrupted(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// RPC error from the backend client
    #[error("RPC error: {0}")]
    Rpc(#[from] crate::rpc::RpcError),
}
