//! Remote naming convention and note payload codec
//!
//! Every note lives remotely at `notes/{id}.json`. The payload is the
//! note's camelCase JSON, optionally wrapped by an [`IPayloadCipher`] when a
//! passphrase is configured.

use std::sync::Arc;

use notesync_core::domain::{Note, NoteId};
use notesync_core::ports::IPayloadCipher;

use crate::SyncError;

/// Remote folder holding all note payloads
pub const NOTES_FOLDER: &str = "notes";

const NOTE_EXTENSION: &str = ".json";

/// Provider-relative path of a note's payload
pub fn note_path(note_id: &NoteId) -> String {
    format!("{NOTES_FOLDER}/{note_id}{NOTE_EXTENSION}")
}

/// Recovers a note id from a remote file name such as `{id}.json`
///
/// Returns `None` for anything that does not follow the convention.
pub fn parse_note_file_name(name: &str) -> Option<NoteId> {
    name.strip_suffix(NOTE_EXTENSION)?.parse().ok()
}

/// Serializes notes for upload and parses downloaded payloads
#[derive(Clone, Default)]
pub struct NoteCodec {
    cipher: Option<Arc<dyn IPayloadCipher>>,
}

impl NoteCodec {
    pub fn new(cipher: Option<Arc<dyn IPayloadCipher>>) -> Self {
        Self { cipher }
    }

    pub fn has_cipher(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn encode(&self, note: &Note, passphrase: Option<&str>) -> Result<Vec<u8>, SyncError> {
        let json = serde_json::to_vec(note)?;
        match passphrase {
            Some(passphrase) => self
                .cipher()?
                .encrypt(&json, passphrase)
                .map_err(|e| SyncError::Encryption(format!("{e:#}"))),
            None => Ok(json),
        }
    }

    pub fn decode(&self, data: &[u8], passphrase: Option<&str>) -> Result<Note, SyncError> {
        let note = match passphrase {
            Some(passphrase) => {
                let plain = self
                    .cipher()?
                    .decrypt(data, passphrase)
                    .map_err(|e| SyncError::Encryption(format!("{e:#}")))?;
                serde_json::from_slice(&plain)?
            }
            None => serde_json::from_slice(data)?,
        };
        Ok(note)
    }

    fn cipher(&self) -> Result<&dyn IPayloadCipher, SyncError> {
        self.cipher
            .as_deref()
            .ok_or_else(|| SyncError::Encryption("passphrase set but no cipher available".into()))
    }
}

impl std::fmt::Debug for NoteCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoteCodec")
            .field("encrypted", &self.has_cipher())
            .finish()
    }
}
