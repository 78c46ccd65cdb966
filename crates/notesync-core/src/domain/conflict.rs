//! Conflict domain types
//!
//! A conflict exists when both the local and the remote replica of a note
//! were modified after their last common sync point.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::note::{Note, NoteId};

/// How a conflict should be or was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncConflictResolution {
    /// No resolution applied; the note is left as-is for this pass
    None,
    /// Keep the local content, overwriting remote
    KeepLocal,
    /// Keep the remote content, overwriting local
    KeepRemote,
    /// Interleave both contents with conflict markers
    Merge,
}

impl SyncConflictResolution {
    /// Returns true if applying this resolution changes anything
    pub fn is_resolution(&self) -> bool {
        !matches!(self, SyncConflictResolution::None)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncConflictResolution::None => "none",
            SyncConflictResolution::KeepLocal => "keep_local",
            SyncConflictResolution::KeepRemote => "keep_remote",
            SyncConflictResolution::Merge => "merge",
        }
    }
}

impl std::fmt::Display for SyncConflictResolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SyncConflictResolution {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(SyncConflictResolution::None),
            "keep_local" => Ok(SyncConflictResolution::KeepLocal),
            "keep_remote" => Ok(SyncConflictResolution::KeepRemote),
            "merge" => Ok(SyncConflictResolution::Merge),
            other => Err(DomainError::UnknownStrategy(other.to_string())),
        }
    }
}

/// A detected conflict awaiting a decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConflict {
    local: Note,
    remote: Note,
    detected_at: DateTime<Utc>,
}

impl SyncConflict {
    pub fn new(local: Note, remote: Note) -> Self {
        Self {
            local,
            remote,
            detected_at: Utc::now(),
        }
    }

    pub fn note_id(&self) -> &NoteId {
        self.local.id()
    }

    pub fn local(&self) -> &Note {
        &self.local
    }

    pub fn remote(&self) -> &Note {
        &self.remote
    }

    pub fn detected_at(&self) -> DateTime<Utc> {
        self.detected_at
    }

    /// Splits the conflict back into its `(local, remote)` notes
    pub fn into_parts(self) -> (Note, Note) {
        (self.local, self.remote)
    }
}
