//! Conflict resolution
//!
//! Produces the resolved note for a decision. Resolution is pure: the
//! orchestrator is responsible for persisting and uploading the result.
//!
//! - `KeepLocal`: local content wins, version advances past both replicas
//! - `KeepRemote`: remote content is adopted verbatim
//! - `Merge`: both contents are interleaved between conflict markers for
//!   the user to edit by hand
//! - `None`: the local note is returned unchanged

use chrono::{DateTime, Utc};
use tracing::debug;

use notesync_core::domain::{Note, SyncConflictResolution};

use crate::error::ConflictError;

/// Opens the local section of a merged note
pub const LOCAL_MARKER: &str = "<<<<<<< LOCAL";
/// Separates the local and remote sections
pub const SEPARATOR_MARKER: &str = "=======";
/// Closes the remote section
pub const REMOTE_MARKER: &str = ">>>>>>> REMOTE";

/// Applies conflict resolutions to note pairs
pub struct ConflictResolver;

impl ConflictResolver {
    /// Resolves `local` against `remote` at time `now`
    pub fn resolve(
        resolution: SyncConflictResolution,
        local: &Note,
        remote: &Note,
        now: DateTime<Utc>,
    ) -> Result<Note, ConflictError> {
        if local.id() != remote.id() {
            return Err(ConflictError::MismatchedNotes {
                local: *local.id(),
                remote: *remote.id(),
            });
        }

        debug!(note_id = %local.id(), resolution = %resolution, "Resolving conflict");

        let resolved = match resolution {
            SyncConflictResolution::None => local.clone(),
            SyncConflictResolution::KeepLocal => {
                let mut note = local.clone();
                note.advance_sync_version(remote.sync_version());
                note
            }
            SyncConflictResolution::KeepRemote => {
                let mut note = local.clone();
                note.adopt(remote);
                note
            }
            SyncConflictResolution::Merge => {
                let mut note = local.clone();
                note.edit(merge_content(local.content(), remote.content()), now);
                note.advance_sync_version(remote.sync_version());
                note.mark_synced(now);
                note
            }
        };

        Ok(resolved)
    }
}

/// Interleaves both contents between conflict markers
pub fn merge_content(local: &str, remote: &str) -> String {
    format!("{LOCAL_MARKER}\n{local}\n{SEPARATOR_MARKER}\n{remote}\n{REMOTE_MARKER}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use notesync_core::domain::NoteId;

    fn pair(local_version: u64, remote_version: u64) -> (Note, Note) {
        let id = NoteId::new();
        let synced = Utc::now() - Duration::hours(1);
        let local = Note::from_parts(
            id,
            "Local title",
            "local text",
            synced - Duration::days(1),
            synced + Duration::minutes(10),
            Some(synced),
            local_version,
        );
        let remote = Note::from_parts(
            id,
            "Remote title",
            "remote text",
            synced - Duration::days(1),
            synced + Duration::minutes(20),
            Some(synced),
            remote_version,
        );
        (local, remote)
    }

    #[test]
    fn test_keep_local_preserves_content_and_bumps_version() {
        let (local, remote) = pair(3, 7);
        let resolved =
            ConflictResolver::resolve(SyncConflictResolution::KeepLocal, &local, &remote, Utc::now())
                .unwrap();

        assert_eq!(resolved.content(), "local text");
        assert_eq!(resolved.sync_version(), 8);
    }

    #[test]
    fn test_keep_local_when_local_version_is_higher() {
        let (local, remote) = pair(9, 2);
        let resolved =
            ConflictResolver::resolve(SyncConflictResolution::KeepLocal, &local, &remote, Utc::now())
                .unwrap();
        assert_eq!(resolved.sync_version(), 10);
    }

    #[test]
    fn test_keep_remote_adopts_remote_content() {
        let (local, remote) = pair(3, 7);
        let resolved = ConflictResolver::resolve(
            SyncConflictResolution::KeepRemote,
            &local,
            &remote,
            Utc::now(),
        )
        .unwrap();

        assert_eq!(resolved.content(), "remote text");
        assert_eq!(resolved.title(), "Remote title");
        assert_eq!(resolved.modified_date(), remote.modified_date());
        assert!(resolved.sync_version() >= local.sync_version());
    }

    #[test]
    fn test_merge_contains_both_contents_in_order() {
        let (local, remote) = pair(4, 6);
        let now = Utc::now();
        let resolved =
            ConflictResolver::resolve(SyncConflictResolution::Merge, &local, &remote, now).unwrap();

        let content = resolved.content();
        let positions: Vec<usize> = [
            LOCAL_MARKER,
            "local text",
            SEPARATOR_MARKER,
            "remote text",
            REMOTE_MARKER,
        ]
        .iter()
        .map(|needle| content.find(needle).expect("marker present"))
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        assert_eq!(resolved.sync_version(), 7);
        assert_eq!(resolved.modified_date(), now);
        assert_eq!(resolved.last_synced_date(), Some(now));
    }

    #[test]
    fn test_none_returns_local_unchanged() {
        let (local, remote) = pair(4, 6);
        let resolved =
            ConflictResolver::resolve(SyncConflictResolution::None, &local, &remote, Utc::now())
                .unwrap();
        assert_eq!(resolved, local);
    }

    #[test]
    fn test_mismatched_ids_rejected() {
        let (local, _) = pair(1, 1);
        let (_, other) = pair(1, 1);
        let err =
            ConflictResolver::resolve(SyncConflictResolution::Merge, &local, &other, Utc::now())
                .unwrap_err();
        assert!(matches!(err, ConflictError::MismatchedNotes { .. }));
    }
}
