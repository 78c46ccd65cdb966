//! Sync observer port (progress and conflict signals)
//!
//! The host application (usually a UI) observes the engine through this
//! trait. Progress is fire-and-forget. Conflict resolution is an explicit
//! request/response: the observer receives a [`ConflictRequest`] and answers
//! through its [`ResolutionResponder`], possibly from another task and
//! much later. The engine waits with a bounded timeout and falls back to a
//! configured default if no answer arrives.

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::domain::conflict::{SyncConflict, SyncConflictResolution};

/// Kind of operation a progress signal refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOperation {
    /// Full reconciliation pass
    FullSync,
    /// Single-note reconciliation
    NoteSync,
    /// Draining the pending change queue
    QueueDrain,
}

impl std::fmt::Display for SyncOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SyncOperation::FullSync => "full_sync",
            SyncOperation::NoteSync => "note_sync",
            SyncOperation::QueueDrain => "queue_drain",
        };
        write!(f, "{}", s)
    }
}

/// Coarse progress milestone of a pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncProgress {
    pub operation: SyncOperation,
    /// Completion percentage (0.0 to 100.0)
    pub percent_complete: f64,
    pub items_processed: usize,
    pub total_items: usize,
    pub message: String,
}

impl SyncProgress {
    pub fn new(
        operation: SyncOperation,
        percent_complete: f64,
        items_processed: usize,
        total_items: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            percent_complete: percent_complete.clamp(0.0, 100.0),
            items_processed,
            total_items,
            message: message.into(),
        }
    }
}

/// One-shot answer channel for a conflict request
#[derive(Debug)]
pub struct ResolutionResponder {
    tx: oneshot::Sender<SyncConflictResolution>,
}

impl ResolutionResponder {
    /// Creates a responder and the receiving end the engine waits on
    pub fn channel() -> (Self, oneshot::Receiver<SyncConflictResolution>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    /// Sends the decision; returns false if the engine stopped waiting
    pub fn respond(self, resolution: SyncConflictResolution) -> bool {
        self.tx.send(resolution).is_ok()
    }
}

/// A conflict raised to the observer for a decision
#[derive(Debug)]
pub struct ConflictRequest {
    pub conflict: SyncConflict,
    pub responder: ResolutionResponder,
}

impl ConflictRequest {
    /// Answers the request, consuming it
    pub fn resolve(self, resolution: SyncConflictResolution) -> bool {
        self.responder.respond(resolution)
    }
}

/// Port trait for progress and conflict observers
///
/// All methods have no-op defaults. Dropping a `ConflictRequest` without
/// answering makes the engine apply its timeout default immediately.
pub trait ISyncObserver: Send + Sync {
    /// Called at coarse milestones of a pass (not per file)
    fn on_progress(&self, _progress: &SyncProgress) {}

    /// Called when a conflict needs a decision
    fn on_conflict(&self, _request: ConflictRequest) {}

    /// Called after a resolution has been applied (manually or by policy)
    fn on_conflict_resolved(&self, _conflict: &SyncConflict, _resolution: SyncConflictResolution) {}
}

/// Observer that ignores every signal
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl ISyncObserver for NullObserver {}
