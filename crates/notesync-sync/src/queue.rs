//! Pending change queue with exponential backoff
//!
//! Holds at most one pending change per note. A newer change for the same
//! note replaces the older one and resets its retry bookkeeping. Entries
//! carry a generation number so that the outcome of an attempt made with a
//! superseded entry cannot clobber the entry that replaced it.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use chrono::{DateTime, Utc};
use notesync_core::config::RetryConfig;
use notesync_core::domain::NoteId;
use tracing::{debug, warn};

// ============================================================================
// Types
// ============================================================================

/// Kind of change waiting to be pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeType {
    CreateOrUpdate,
    Delete,
}

/// A change that has not reached the remote store yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingSyncChange {
    pub note_id: NoteId,
    pub change_type: ChangeType,
    pub queued_at: DateTime<Utc>,
    pub retry_count: u32,
    /// `None` means the change is due immediately
    pub next_retry_at: Option<DateTime<Utc>>,
    generation: u64,
}

impl PendingSyncChange {
    /// Returns true if the change may be attempted at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_retry_at.map_or(true, |at| at <= now)
    }
}

/// What happened to a queued change after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Another attempt is scheduled
    Rescheduled {
        retry_count: u32,
        next_retry_at: DateTime<Utc>,
    },
    /// Retry budget exhausted; the entry was removed
    Abandoned,
    /// The entry had been replaced or cancelled in the meantime
    Superseded,
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Retry budget and backoff shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            config.initial_delay(),
            config.max_delay(),
        )
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before the attempt following `retry_count` failures
    ///
    /// `min(initial * 2^retry_count, max)`; saturates at `max` on overflow.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        1u32.checked_shl(retry_count)
            .and_then(|factor| self.initial_delay.checked_mul(factor))
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// Backoff delay with the default policy (1s base, 60s ceiling)
pub fn backoff_delay(retry_count: u32) -> Duration {
    RetryPolicy::default().delay_for(retry_count)
}

// ============================================================================
// ChangeQueue
// ============================================================================

/// Per-note pending change queue
#[derive(Debug, Default)]
pub struct ChangeQueue {
    entries: HashMap<NoteId, PendingSyncChange>,
    policy: RetryPolicy,
    next_generation: u64,
}

impl ChangeQueue {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            entries: HashMap::new(),
            policy,
            next_generation: 0,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Queues a change, replacing any pending change for the same note
    ///
    /// Returns true if an older entry was replaced.
    pub fn enqueue(&mut self, note_id: NoteId, change_type: ChangeType, now: DateTime<Utc>) -> bool {
        self.next_generation += 1;
        let entry = PendingSyncChange {
            note_id,
            change_type,
            queued_at: now,
            retry_count: 0,
            next_retry_at: None,
            generation: self.next_generation,
        };
        let replaced = self.entries.insert(note_id, entry).is_some();
        debug!(note_id = %note_id, ?change_type, replaced, "Queued change");
        replaced
    }

    /// Drops the pending change for a note, if any
    pub fn cancel(&mut self, note_id: &NoteId) -> bool {
        self.entries.remove(note_id).is_some()
    }

    pub fn get(&self, note_id: &NoteId) -> Option<&PendingSyncChange> {
        self.entries.get(note_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All pending entries, oldest first
    pub fn snapshot(&self) -> Vec<PendingSyncChange> {
        let mut entries: Vec<_> = self.entries.values().cloned().collect();
        entries.sort_by_key(|e| (e.queued_at, e.generation));
        entries
    }

    /// Entries due at `now`, oldest first
    ///
    /// The entries stay queued until [`record_success`](Self::record_success)
    /// or an abandoning [`record_failure`](Self::record_failure).
    pub fn drain_due(&self, now: DateTime<Utc>) -> Vec<PendingSyncChange> {
        let mut due: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|e| (e.queued_at, e.generation));
        due
    }

    /// Notes with a pending delete
    pub fn pending_deletes(&self) -> HashSet<NoteId> {
        self.entries
            .values()
            .filter(|e| e.change_type == ChangeType::Delete)
            .map(|e| e.note_id)
            .collect()
    }

    /// Removes `attempted` if it is still the current entry for its note
    pub fn record_success(&mut self, attempted: &PendingSyncChange) -> bool {
        if self.is_current(attempted) {
            self.entries.remove(&attempted.note_id);
            true
        } else {
            false
        }
    }

    /// Books a failed attempt against `attempted`
    pub fn record_failure(
        &mut self,
        attempted: &PendingSyncChange,
        now: DateTime<Utc>,
    ) -> FailureOutcome {
        if !self.is_current(attempted) {
            return FailureOutcome::Superseded;
        }
        let policy = self.policy;
        let Some(entry) = self.entries.get_mut(&attempted.note_id) else {
            return FailureOutcome::Superseded;
        };

        entry.retry_count = entry.retry_count.saturating_add(1);
        if entry.retry_count >= policy.max_attempts() {
            warn!(
                note_id = %entry.note_id,
                attempts = entry.retry_count,
                "Abandoning queued change"
            );
            self.entries.remove(&attempted.note_id);
            return FailureOutcome::Abandoned;
        }

        let delay = policy.delay_for(entry.retry_count);
        let next_retry_at = chrono::Duration::from_std(delay)
            .ok()
            .and_then(|d| now.checked_add_signed(d))
            .unwrap_or(now);
        entry.next_retry_at = Some(next_retry_at);
        FailureOutcome::Rescheduled {
            retry_count: entry.retry_count,
            next_retry_at,
        }
    }

    fn is_current(&self, attempted: &PendingSyncChange) -> bool {
        self.entries
            .get(&attempted.note_id)
            .is_some_and(|e| e.generation == attempted.generation)
    }
}
