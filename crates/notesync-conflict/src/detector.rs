//! Conflict detection logic
//!
//! Determines whether both replicas of a note diverged from their last
//! common sync point by comparing modification timestamps against the
//! local `last_synced_date`.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use notesync_core::domain::{Note, SyncConflict};

/// Result of a conflict check
#[derive(Debug, Clone)]
pub enum DetectionResult {
    /// No conflict: at most one side changed
    NoConflict,
    /// Both sides changed since the last sync
    Conflicted(Box<SyncConflict>),
}

/// Detects divergence between local and remote notes
pub struct ConflictDetector;

impl ConflictDetector {
    /// Returns true if both replicas changed after the last common sync point
    ///
    /// A never-synced local note has no baseline and is never in conflict.
    pub fn has_conflict(local: &Note, remote: &Note) -> bool {
        let Some(synced) = local.last_synced_date() else {
            return false;
        };
        local.modified_date() > synced && remote.modified_date() > synced
    }

    /// Runs [`has_conflict`](Self::has_conflict) and packages the pair on conflict
    pub fn check(local: &Note, remote: &Note) -> DetectionResult {
        if !Self::has_conflict(local, remote) {
            debug!(note_id = %local.id(), "No conflict between replicas");
            return DetectionResult::NoConflict;
        }

        info!(
            note_id = %local.id(),
            last_synced = ?local.last_synced_date(),
            local_modified = %local.modified_date(),
            remote_modified = %remote.modified_date(),
            "Conflict detected: both local and remote versions changed"
        );
        DetectionResult::Conflicted(Box::new(SyncConflict::new(local.clone(), remote.clone())))
    }

    /// Returns true if a remote file modified at `remote_modified` may carry
    /// changes the local replica has not seen yet
    pub fn remote_changed_since_sync(local: &Note, remote_modified: DateTime<Utc>) -> bool {
        match local.last_synced_date() {
            Some(synced) => remote_modified > synced,
            None => true,
        }
    }

    /// Returns true if a non-conflicting remote replica should replace the local one
    ///
    /// The higher `sync_version` wins; on a tie the later `modified_date` does.
    pub fn remote_supersedes(local: &Note, remote: &Note) -> bool {
        match remote.sync_version().cmp(&local.sync_version()) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Equal => remote.modified_date() > local.modified_date(),
            std::cmp::Ordering::Less => false,
        }
    }
}
