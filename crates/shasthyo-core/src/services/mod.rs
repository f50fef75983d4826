//! Service layer for Shasthyo

mod store;
mod triage;

pub use store::StoreService;
pub use triage::TriageService;
