//! Note domain entity
//!
//! The note record is owned by the external note store; the sync engine
//! reads it, stamps sync bookkeeping onto it and writes it back. The only
//! invariant enforced here is that `sync_version` never decreases.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;

// ============================================================================
// NoteId
// ============================================================================

/// Identity of a note, stable across replicas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(Uuid);

impl NoteId {
    /// Create a new random NoteId
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a NoteId from an existing UUID
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID value
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NoteId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NoteId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| DomainError::InvalidNoteId(format!("{s}: {e}")))
    }
}

impl From<Uuid> for NoteId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

// ============================================================================
// Note
// ============================================================================

/// A synchronized note
///
/// Serialized as camelCase JSON with null fields omitted; this is also the
/// wire format stored remotely under `notes/{id}.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    id: NoteId,
    #[serde(default)]
    title: String,
    content: String,
    created_date: DateTime<Utc>,
    modified_date: DateTime<Utc>,
    /// `None` means the note has never been synced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    last_synced_date: Option<DateTime<Utc>>,
    #[serde(default)]
    sync_version: u64,
}

impl Note {
    /// Creates a new, never-synced note
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: NoteId::new(),
            title: title.into(),
            content: content.into(),
            created_date: now,
            modified_date: now,
            last_synced_date: None,
            sync_version: 0,
        }
    }

    /// Rebuilds a note from stored fields (for note store adapters and tests)
    pub fn from_parts(
        id: NoteId,
        title: impl Into<String>,
        content: impl Into<String>,
        created_date: DateTime<Utc>,
        modified_date: DateTime<Utc>,
        last_synced_date: Option<DateTime<Utc>>,
        sync_version: u64,
    ) -> Self {
        Self {
            id,
            title: title.into(),
            content: content.into(),
            created_date,
            modified_date,
            last_synced_date,
            sync_version,
        }
    }

    // --- Getters ---

    pub fn id(&self) -> &NoteId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn created_date(&self) -> DateTime<Utc> {
        self.created_date
    }

    pub fn modified_date(&self) -> DateTime<Utc> {
        self.modified_date
    }

    pub fn last_synced_date(&self) -> Option<DateTime<Utc>> {
        self.last_synced_date
    }

    pub fn sync_version(&self) -> u64 {
        self.sync_version
    }

    /// Returns true if the note has been synced at least once
    pub fn is_synced(&self) -> bool {
        self.last_synced_date.is_some()
    }

    /// Returns true if the note was modified after its last sync
    ///
    /// A never-synced note always has unsynced changes.
    pub fn has_unsynced_changes(&self) -> bool {
        match self.last_synced_date {
            Some(synced) => self.modified_date > synced,
            None => true,
        }
    }

    // --- Mutators ---

    /// Replaces the content as a local edit at `at`
    pub fn edit(&mut self, content: impl Into<String>, at: DateTime<Utc>) {
        self.content = content.into();
        self.modified_date = at;
    }

    /// Sets the title
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// Overrides the modification timestamp
    pub fn set_modified_date(&mut self, at: DateTime<Utc>) {
        self.modified_date = at;
    }

    /// Stamps the last-synced timestamp
    pub fn mark_synced(&mut self, at: DateTime<Utc>) {
        self.last_synced_date = Some(at);
    }

    /// Advances `sync_version` to `max(current, floor) + 1`
    pub fn advance_sync_version(&mut self, floor: u64) {
        self.sync_version = self.sync_version.max(floor).saturating_add(1);
    }

    /// Takes over the user-visible fields of `remote`
    ///
    /// `sync_version` becomes the larger of the two; it is never lowered.
    pub fn adopt(&mut self, remote: &Note) {
        self.title = remote.title.clone();
        self.content = remote.content.clone();
        self.modified_date = remote.modified_date;
        self.sync_version = self.sync_version.max(remote.sync_version);
    }
}
