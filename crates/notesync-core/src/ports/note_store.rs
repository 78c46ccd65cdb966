//! Local note store port (driven/secondary port)
//!
//! The note store is the source of truth for local state and the sink for
//! notes that were downloaded or resolved during a pass.

use crate::domain::note::{Note, NoteId};

/// Port trait for local note persistence
#[async_trait::async_trait]
pub trait INoteStore: Send + Sync {
    /// Returns every local note
    async fn get_all_notes(&self) -> anyhow::Result<Vec<Note>>;

    /// Returns a single note, or `None` if it does not exist locally
    async fn get_note_by_id(&self, id: &NoteId) -> anyhow::Result<Option<Note>>;

    /// Inserts or replaces a note
    async fn update_note(&self, note: &Note) -> anyhow::Result<()>;
}
