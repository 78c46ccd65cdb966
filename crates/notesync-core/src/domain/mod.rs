//! Domain entities and invariants
//!
//! This module contains the core domain types for Notesync:
//! - Note identity and the synchronized note record
//! - Engine connection status and its state machine
//! - Per-pass sync results and per-item outcomes
//! - Conflict resolution types
//! - Domain-specific error types

pub mod conflict;
pub mod errors;
pub mod note;
pub mod result;
pub mod status;

// Re-export commonly used types
pub use conflict::{SyncConflict, SyncConflictResolution};
pub use errors::DomainError;
pub use note::{Note, NoteId};
pub use result::{ItemOutcome, ItemStatus, SyncResult, SyncTally};
pub use status::SyncStatus;
