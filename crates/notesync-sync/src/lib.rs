//! Notesync Sync - Bidirectional note synchronization engine
//!
//! Provides:
//! - Full and single-note reconciliation between a local note store and a
//!   remote object store
//! - A pending change queue with exponential backoff
//! - Conflict arbitration through an observer request/response channel
//! - Debounced autosave scheduling
//!
//! ## Modules
//!
//! - [`engine`] - Sync orchestrator and connection state machine
//! - [`queue`] - Pending change queue and backoff
//! - [`payload`] - Remote naming convention and note (de)serialization
//! - [`arbiter`] - Conflict decision round-trip with timeout
//! - [`scheduler`] - Autosave debouncing and periodic full passes

pub mod arbiter;
pub mod engine;
pub mod payload;
pub mod queue;
pub mod scheduler;

use thiserror::Error;

pub use engine::SyncEngine;
pub use queue::{backoff_delay, ChangeQueue, ChangeType, PendingSyncChange, RetryPolicy};

/// Errors that can occur during synchronization operations
#[derive(Debug, Error)]
pub enum SyncError {
    /// No authenticated provider is connected
    #[error("not connected")]
    NotConnected,

    /// A full pass is already running
    #[error("already syncing")]
    AlreadySyncing,

    /// The pass was cancelled cooperatively
    #[error("sync cancelled")]
    Cancelled,

    /// A remote store operation failed
    #[error("remote store error: {0:#}")]
    Remote(anyhow::Error),

    /// A local note store operation failed
    #[error("note store error: {0:#}")]
    NoteStore(anyhow::Error),

    /// A remote payload could not be parsed or produced
    #[error("invalid note payload: {0}")]
    Payload(#[from] serde_json::Error),

    /// Encryption or decryption failed
    #[error("encryption error: {0}")]
    Encryption(String),

    /// The provider accepted the request but returned no identifier
    #[error("upload of {path} was not accepted")]
    UploadRefused { path: String },

    /// A remote file is missing or does not match its name
    #[error("remote file {path} is not retrievable: {reason}")]
    NotRetrievable { path: String, reason: String },

    /// Conflict resolution failed
    #[error("conflict error: {0}")]
    Conflict(#[from] notesync_conflict::ConflictError),

    /// A domain-level error propagated from notesync-core
    #[error("domain error: {0}")]
    Domain(#[from] notesync_core::domain::DomainError),
}
