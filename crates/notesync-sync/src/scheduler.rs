//! Sync scheduler - turns note edits into debounced single-note syncs
//!
//! The [`SyncScheduler`] receives [`SchedulerEvent`]s from the host (usually
//! the editor's autosave hook), coalesces edits per note through an
//! [`AutosaveDebouncer`], and calls [`SyncEngine::sync_note`] once a note has
//! been quiet for the debounce window. It also runs a full pass on a fixed
//! interval and on explicit "sync now" requests.
//!
//! ```text
//! editor ──→ mpsc::Sender<SchedulerEvent> ──→ SyncScheduler ──→ SyncEngine
//!                                                  │
//!                                           AutosaveDebouncer
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use notesync_core::domain::NoteId;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::engine::SyncEngine;

// ============================================================================
// AutosaveDebouncer
// ============================================================================

/// Coalesces rapid edits of the same note
///
/// Each edit resets the note's quiet timer; a note is released by
/// [`poll`](AutosaveDebouncer::poll) only after no edit arrived for the
/// whole debounce window.
#[derive(Debug)]
pub struct AutosaveDebouncer {
    pending: HashMap<NoteId, Instant>,
    quiet_period: Duration,
}

impl AutosaveDebouncer {
    pub fn new(quiet_period: Duration) -> Self {
        Self {
            pending: HashMap::new(),
            quiet_period,
        }
    }

    /// Records an edit of `note_id`, restarting its quiet timer
    pub fn touch(&mut self, note_id: NoteId) {
        debug!(%note_id, "Note edited");
        self.pending.insert(note_id, Instant::now());
    }

    /// Removes and returns the notes that have been quiet long enough
    pub fn poll(&mut self) -> Vec<NoteId> {
        let now = Instant::now();
        let quiet_period = self.quiet_period;
        let mut settled: Vec<(NoteId, Instant)> = self
            .pending
            .iter()
            .filter(|(_, touched)| now.duration_since(**touched) >= quiet_period)
            .map(|(id, touched)| (*id, *touched))
            .collect();
        for (id, _) in &settled {
            self.pending.remove(id);
        }
        settled.sort_by_key(|(_, touched)| *touched);
        settled.into_iter().map(|(id, _)| id).collect()
    }

    /// Removes and returns everything still pending, regardless of age
    pub fn flush(&mut self) -> Vec<NoteId> {
        let mut all: Vec<(NoteId, Instant)> = self.pending.drain().collect();
        all.sort_by_key(|(_, touched)| *touched);
        all.into_iter().map(|(id, _)| id).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// SyncScheduler
// ============================================================================

/// Input to the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerEvent {
    /// A note was created, edited, or deleted locally
    NoteChanged(NoteId),
    /// Run a full pass now
    SyncNow,
}

/// Drives the engine from note edits and a periodic timer
pub struct SyncScheduler {
    engine: Arc<SyncEngine>,
    events: mpsc::Receiver<SchedulerEvent>,
    debouncer: AutosaveDebouncer,
    full_sync_interval: Duration,
    poll_interval: Duration,
}

impl SyncScheduler {
    /// Creates a scheduler
    ///
    /// # Arguments
    /// * `debounce` - How long a note must stay untouched before it is pushed
    /// * `full_sync_interval` - Period between full passes
    pub fn new(
        engine: Arc<SyncEngine>,
        events: mpsc::Receiver<SchedulerEvent>,
        debounce: Duration,
        full_sync_interval: Duration,
    ) -> Self {
        let poll_interval = (debounce / 4).max(Duration::from_millis(50));
        info!(
            debounce_ms = debounce.as_millis() as u64,
            full_sync_secs = full_sync_interval.as_secs(),
            "Creating sync scheduler"
        );
        Self {
            engine,
            events,
            debouncer: AutosaveDebouncer::new(debounce),
            full_sync_interval,
            poll_interval,
        }
    }

    /// Main loop
    ///
    /// Runs until `shutdown` fires or every event sender is dropped. Notes
    /// still waiting in the debouncer are pushed before returning.
    pub async fn run(mut self, shutdown: CancellationToken) {
        info!("Sync scheduler starting");

        let mut full_sync = tokio::time::interval(self.full_sync_interval);
        full_sync.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_timer = tokio::time::interval(self.poll_interval);
        poll_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, scheduler stopping");
                    break;
                }

                event = self.events.recv() => match event {
                    Some(SchedulerEvent::NoteChanged(note_id)) => self.debouncer.touch(note_id),
                    Some(SchedulerEvent::SyncNow) => self.full_sync().await,
                    None => {
                        info!("Event channel closed, scheduler stopping");
                        break;
                    }
                },

                _ = full_sync.tick() => self.full_sync().await,

                _ = poll_timer.tick() => {
                    for note_id in self.debouncer.poll() {
                        self.push_note(note_id).await;
                    }
                }
            }
        }

        let remaining = self.debouncer.flush();
        if !remaining.is_empty() {
            info!(count = remaining.len(), "Flushing pending edits before stopping");
            for note_id in remaining {
                self.push_note(note_id).await;
            }
        }
        info!("Sync scheduler stopped");
    }

    async fn full_sync(&self) {
        let result = self.engine.sync_all().await;
        match result.error_message() {
            None => debug!(
                uploaded = result.notes_uploaded(),
                downloaded = result.notes_downloaded(),
                "Scheduled sync finished"
            ),
            Some(reason) => warn!(%reason, "Scheduled sync did not complete"),
        }
    }

    async fn push_note(&self, note_id: NoteId) {
        let result = self.engine.sync_note(&note_id).await;
        if let Some(reason) = result.error_message() {
            warn!(%note_id, %reason, "Autosave sync did not complete");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_waits_for_quiet_period() {
        let mut debouncer = AutosaveDebouncer::new(Duration::from_millis(1500));
        let id = NoteId::new();

        debouncer.touch(id);
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(debouncer.poll().is_empty());

        // Another keystroke restarts the window
        debouncer.touch(id);
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert!(debouncer.poll().is_empty());

        tokio::time::advance(Duration::from_millis(600)).await;
        assert_eq!(debouncer.poll(), vec![id]);
        assert!(debouncer.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debouncer_coalesces_per_note() {
        let mut debouncer = AutosaveDebouncer::new(Duration::from_millis(100));
        let a = NoteId::new();
        let b = NoteId::new();

        debouncer.touch(a);
        debouncer.touch(a);
        tokio::time::advance(Duration::from_millis(10)).await;
        debouncer.touch(b);
        assert_eq!(debouncer.pending_count(), 2);

        tokio::time::advance(Duration::from_millis(200)).await;
        assert_eq!(debouncer.poll(), vec![a, b]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_returns_everything() {
        let mut debouncer = AutosaveDebouncer::new(Duration::from_secs(60));
        let id = NoteId::new();
        debouncer.touch(id);
        assert!(debouncer.poll().is_empty());
        assert_eq!(debouncer.flush(), vec![id]);
        assert!(debouncer.is_empty());
    }
}
