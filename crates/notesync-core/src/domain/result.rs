//! Reconciliation pass results
//!
//! A [`SyncTally`] is the mutable accumulator used while a pass runs; it is
//! consumed into an immutable [`SyncResult`] when the pass returns.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::note::NoteId;

/// What happened to a single remote file or local note during a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum ItemStatus {
    /// The item was transferred or resolved
    Ok,
    /// The item was deliberately left alone
    Skipped(String),
    /// The item failed; the pass continued without it
    Failed(String),
}

/// Per-item outcome, keyed by remote path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemOutcome {
    pub path: String,
    pub status: ItemStatus,
}

/// Immutable record of one reconciliation pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    success: bool,
    error_message: Option<String>,
    notes_uploaded: u32,
    notes_downloaded: u32,
    conflicts_detected: u32,
    conflicts_resolved: u32,
    completed_at: DateTime<Utc>,
    outcomes: Vec<ItemOutcome>,
    abandoned: Vec<NoteId>,
}

impl SyncResult {
    /// A pass that never started (precondition failed)
    pub fn rejected(message: impl Into<String>) -> Self {
        SyncTally::new().fail(message)
    }

    pub fn success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn notes_uploaded(&self) -> u32 {
        self.notes_uploaded
    }

    pub fn notes_downloaded(&self) -> u32 {
        self.notes_downloaded
    }

    pub fn conflicts_detected(&self) -> u32 {
        self.conflicts_detected
    }

    pub fn conflicts_resolved(&self) -> u32 {
        self.conflicts_resolved
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }

    /// Per-item outcomes in the order they were produced
    pub fn outcomes(&self) -> &[ItemOutcome] {
        &self.outcomes
    }

    /// Queued changes dropped after exhausting their retries
    pub fn abandoned(&self) -> &[NoteId] {
        &self.abandoned
    }

    /// Outcomes that ended in [`ItemStatus::Failed`]; skips are not failures
    pub fn failures(&self) -> impl Iterator<Item = &ItemOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, ItemStatus::Failed(_)))
    }
}

/// Mutable counters for a pass in progress
#[derive(Debug, Clone, Default)]
pub struct SyncTally {
    notes_uploaded: u32,
    notes_downloaded: u32,
    conflicts_detected: u32,
    conflicts_resolved: u32,
    outcomes: Vec<ItemOutcome>,
    abandoned: Vec<NoteId>,
}

impl SyncTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn uploaded(&mut self, path: impl Into<String>) {
        self.notes_uploaded += 1;
        self.push(path, ItemStatus::Ok);
    }

    pub fn downloaded(&mut self, path: impl Into<String>) {
        self.notes_downloaded += 1;
        self.push(path, ItemStatus::Ok);
    }

    pub fn conflict_detected(&mut self) {
        self.conflicts_detected += 1;
    }

    pub fn conflict_resolved(&mut self, path: impl Into<String>) {
        self.conflicts_resolved += 1;
        self.push(path, ItemStatus::Ok);
    }

    /// Records a remote delete that went through
    pub fn deleted(&mut self, path: impl Into<String>) {
        self.push(path, ItemStatus::Ok);
    }

    pub fn skipped(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.push(path, ItemStatus::Skipped(reason.into()));
    }

    pub fn failed(&mut self, path: impl Into<String>, reason: impl Into<String>) {
        self.push(path, ItemStatus::Failed(reason.into()));
    }

    pub fn abandoned(&mut self, note_id: NoteId) {
        self.abandoned.push(note_id);
    }

    pub fn notes_uploaded(&self) -> u32 {
        self.notes_uploaded
    }

    /// Seals the tally as a successful pass
    pub fn finish(self) -> SyncResult {
        self.seal(true, None)
    }

    /// Seals the tally as a failed pass, keeping the counts gathered so far
    pub fn fail(self, message: impl Into<String>) -> SyncResult {
        self.seal(false, Some(message.into()))
    }

    fn push(&mut self, path: impl Into<String>, status: ItemStatus) {
        self.outcomes.push(ItemOutcome {
            path: path.into(),
            status,
        });
    }

    fn seal(self, success: bool, error_message: Option<String>) -> SyncResult {
        SyncResult {
            success,
            error_message,
            notes_uploaded: self.notes_uploaded,
            notes_downloaded: self.notes_downloaded,
            conflicts_detected: self.conflicts_detected,
            conflicts_resolved: self.conflicts_resolved,
            completed_at: Utc::now(),
            outcomes: self.outcomes,
            abandoned: self.abandoned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejected_result() {
        let result = SyncResult::rejected("not connected");
        assert!(!result.success());
        assert_eq!(result.error_message(), Some("not connected"));
        assert_eq!(result.notes_uploaded(), 0);
        assert!(result.outcomes().is_empty());
    }

    #[test]
    fn test_tally_counts() {
        let mut tally = SyncTally::new();
        tally.uploaded("notes/a.json");
        tally.downloaded("notes/b.json");
        tally.conflict_detected();
        tally.conflict_resolved("notes/c.json");
        tally.skipped("notes/readme.txt", "not a note file");
        tally.failed("notes/d.json", "corrupt JSON");

        let result = tally.finish();
        assert!(result.success());
        assert_eq!(result.notes_uploaded(), 1);
        assert_eq!(result.notes_downloaded(), 1);
        assert_eq!(result.conflicts_detected(), 1);
        assert_eq!(result.conflicts_resolved(), 1);
        assert_eq!(result.outcomes().len(), 5);
        assert_eq!(result.failures().count(), 1);
    }

    #[test]
    fn test_fail_keeps_partial_counts() {
        let mut tally = SyncTally::new();
        tally.uploaded("notes/a.json");
        let result = tally.fail("listing failed");
        assert!(!result.success());
        assert_eq!(result.notes_uploaded(), 1);
        assert_eq!(result.error_message(), Some("listing failed"));
    }
}
