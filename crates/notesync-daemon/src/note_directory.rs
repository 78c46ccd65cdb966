//! Directory-backed note store
//!
//! Keeps one `{id}.json` file per note in a single directory. Files that do
//! not parse are skipped with a warning rather than failing the listing.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use notesync_core::domain::{Note, NoteId};
use notesync_core::ports::INoteStore;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct NoteDirectory {
    dir: PathBuf,
}

impl NoteDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn note_file(&self, id: &NoteId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait::async_trait]
impl INoteStore for NoteDirectory {
    async fn get_all_notes(&self) -> anyhow::Result<Vec<Note>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.dir.display()))
            }
        };

        let mut notes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = tokio::fs::read(&path).await?;
            match serde_json::from_slice::<Note>(&data) {
                Ok(note) => notes.push(note),
                Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable note"),
            }
        }
        debug!(count = notes.len(), "Loaded local notes");
        Ok(notes)
    }

    async fn get_note_by_id(&self, id: &NoteId) -> anyhow::Result<Option<Note>> {
        match tokio::fs::read(self.note_file(id)).await {
            Ok(data) => Ok(Some(serde_json::from_slice(&data)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_note(&self, note: &Note) -> anyhow::Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let target = self.note_file(note.id());
        let tmp_path = target.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, serde_json::to_vec_pretty(note)?).await?;
        tokio::fs::rename(&tmp_path, &target)
            .await
            .with_context(|| format!("Failed to write {}", target.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = NoteDirectory::new(dir.path().join("nope"));
        assert!(store.get_all_notes().await.unwrap().is_empty());
        assert!(store.get_note_by_id(&NoteId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_then_read_back() {
        let dir = TempDir::new().unwrap();
        let store = NoteDirectory::new(dir.path().join("notes"));
        let note = Note::new("Todo", "water plants");

        store.update_note(&note).await.unwrap();

        assert_eq!(store.get_note_by_id(note.id()).await.unwrap(), Some(note.clone()));
        assert_eq!(store.get_all_notes().await.unwrap(), vec![note]);
    }

    #[tokio::test]
    async fn test_unreadable_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = NoteDirectory::new(dir.path());
        store.update_note(&Note::new("ok", "ok")).await.unwrap();
        std::fs::write(dir.path().join("broken.json"), b"{").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"ignored").unwrap();

        assert_eq!(store.get_all_notes().await.unwrap().len(), 1);
    }
}
