//! Error types for the conflict engine

use notesync_core::domain::NoteId;
use thiserror::Error;

/// Errors that can occur during conflict detection and resolution
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConflictError {
    /// Local and remote notes do not share an identity
    #[error("cannot resolve notes with different ids (local {local}, remote {remote})")]
    MismatchedNotes { local: NoteId, remote: NoteId },

    /// Invalid strategy name in configuration
    #[error("invalid conflict strategy '{0}'")]
    InvalidStrategy(String),
}
