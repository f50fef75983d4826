use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] shasthyo_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("HTTP client initialization failed: {0}")]
    Http(String),
    #[error("Invalid gender '{0}'. Use female, male, or other.")]
    InvalidGender(String),
    #[error("No profile found. Run `shasthyo profile set --age <N> --gender <G>` first.")]
    ProfileMissing,
    #[error("Symptom catalog is empty. Run `shasthyo symptoms --refresh` while online.")]
    EmptyCatalog,
}
