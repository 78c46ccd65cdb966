//! Note synchronization engine
//!
//! The [`SyncEngine`] reconciles the local note store with a remote object
//! store obtained from a [`RemoteStoreRegistry`].
//!
//! ## Full Pass
//!
//! 1. **Listing**: list `notes/` remotely and load every local note
//! 2. **Pull**: download new remote notes, adopt newer ones, arbitrate conflicts
//! 3. **Push**: upload local notes that are missing remotely or changed since their last sync
//! 4. **Queue**: retry pending changes whose backoff has elapsed
//!
//! Failures of individual files are recorded in the [`SyncResult`] and never
//! abort the pass. Only listing failures (or cancellation) end a pass early.
//!
//! ## Locking
//!
//! Engine state (status, provider, passphrase, queue) sits behind one async
//! mutex that is never held across remote I/O. A second mutex serializes
//! passes so that `sync_all` and `sync_note` never interleave.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use notesync_conflict::{ConflictDetector, ConflictPolicy, ConflictResolver, DetectionResult};
use notesync_core::config::Config;
use notesync_core::domain::{
    Note, NoteId, SyncConflict, SyncConflictResolution, SyncResult, SyncStatus, SyncTally,
};
use notesync_core::ports::{
    INoteStore, IPayloadCipher, IRemoteStore, ISyncObserver, ProviderId, RemoteFileInfo,
    RemoteStoreRegistry, SyncOperation, SyncProgress,
};

use crate::arbiter::ConflictArbiter;
use crate::payload::{note_path, parse_note_file_name, NoteCodec, NOTES_FOLDER};
use crate::queue::{ChangeQueue, ChangeType, FailureOutcome, PendingSyncChange, RetryPolicy};
use crate::SyncError;

// ============================================================================
// Engine state
// ============================================================================

struct ActiveProvider {
    id: ProviderId,
    store: Arc<dyn IRemoteStore>,
}

struct EngineState {
    status: SyncStatus,
    provider: Option<ActiveProvider>,
    passphrase: Option<String>,
    queue: ChangeQueue,
    last_result: Option<SyncResult>,
    /// Token handed to passes started from now on
    cancel: CancellationToken,
    /// Bumped by every connect/disconnect so a stale connect can't install its provider
    connect_attempt: u64,
}

impl EngineState {
    fn new(retry_policy: RetryPolicy) -> Self {
        Self {
            status: SyncStatus::Disconnected,
            provider: None,
            passphrase: None,
            queue: ChangeQueue::new(retry_policy),
            last_result: None,
            cancel: CancellationToken::new(),
            connect_attempt: 0,
        }
    }

    fn set_status(&mut self, target: SyncStatus) {
        if let Err(e) = self.status.transition_to(target) {
            warn!(error = %e, "Ignoring invalid status transition");
        }
    }

    fn cancel_running(&mut self) {
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }

    /// Drops the provider and everything tied to it
    fn detach(&mut self) -> Option<ActiveProvider> {
        self.cancel_running();
        self.connect_attempt += 1;
        self.queue.clear();
        self.set_status(SyncStatus::Disconnected);
        self.provider.take()
    }

    fn session(&self) -> Result<Session, SyncError> {
        match &self.provider {
            Some(provider) if self.status.is_connected() && provider.store.is_authenticated() => {
                Ok(Session {
                    store: provider.store.clone(),
                    cancel: self.cancel.clone(),
                    passphrase: self.passphrase.clone(),
                })
            }
            _ => Err(SyncError::NotConnected),
        }
    }
}

/// Everything a pass needs, captured once at its start
struct Session {
    store: Arc<dyn IRemoteStore>,
    cancel: CancellationToken,
    passphrase: Option<String>,
}

impl Session {
    fn passphrase(&self) -> Option<&str> {
        self.passphrase.as_deref()
    }

    fn ensure_active(&self) -> Result<(), SyncError> {
        if self.cancel.is_cancelled() {
            Err(SyncError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// How a remote file left its local counterpart
enum RemoteOutcome {
    /// Local now mirrors remote; nothing to push
    Settled,
    /// Unresolved or unreadable; don't push over it this pass
    Held,
    /// Local may still need pushing
    LocalAhead,
}

/// What replaying a queued change did
enum Applied {
    Uploaded,
    AlreadyUploaded,
    Deleted,
    Missing,
}

/// Notes the push and queue steps must treat specially
#[derive(Default)]
struct PassLedger {
    seen_remote: HashSet<NoteId>,
    settled: HashSet<NoteId>,
    held: HashSet<NoteId>,
    uploaded: HashSet<NoteId>,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Bidirectional note synchronization engine
pub struct SyncEngine {
    note_store: Arc<dyn INoteStore>,
    registry: RemoteStoreRegistry,
    observer: Arc<dyn ISyncObserver>,
    arbiter: ConflictArbiter,
    codec: NoteCodec,
    state: Mutex<EngineState>,
    pass_lock: Mutex<()>,
}

impl SyncEngine {
    /// Creates an engine configured from the `retry` and `conflicts` sections
    ///
    /// # Errors
    /// Fails if the conflict strategies in `config` are not recognized.
    pub fn new(
        note_store: Arc<dyn INoteStore>,
        registry: RemoteStoreRegistry,
        observer: Arc<dyn ISyncObserver>,
        config: &Config,
    ) -> Result<Self, SyncError> {
        let conflict_policy = ConflictPolicy::from_config(&config.conflicts)?;
        let retry_policy = RetryPolicy::from_config(&config.retry);
        Ok(Self::with_policies(
            note_store,
            registry,
            observer,
            conflict_policy,
            retry_policy,
        ))
    }

    pub fn with_policies(
        note_store: Arc<dyn INoteStore>,
        registry: RemoteStoreRegistry,
        observer: Arc<dyn ISyncObserver>,
        conflict_policy: ConflictPolicy,
        retry_policy: RetryPolicy,
    ) -> Self {
        info!(
            providers = ?registry.providers(),
            max_attempts = retry_policy.max_attempts(),
            "Creating sync engine"
        );
        Self {
            note_store,
            registry,
            arbiter: ConflictArbiter::new(observer.clone(), conflict_policy),
            observer,
            codec: NoteCodec::default(),
            state: Mutex::new(EngineState::new(retry_policy)),
            pass_lock: Mutex::new(()),
        }
    }

    /// Enables payload encryption (effective once a passphrase is set)
    pub fn with_cipher(mut self, cipher: Arc<dyn IPayloadCipher>) -> Self {
        self.codec = NoteCodec::new(Some(cipher));
        self
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub async fn status(&self) -> SyncStatus {
        self.state.lock().await.status
    }

    pub async fn is_connected(&self) -> bool {
        self.state.lock().await.session().is_ok()
    }

    /// Identifier of the connected provider
    pub async fn provider(&self) -> Option<ProviderId> {
        self.state
            .lock()
            .await
            .provider
            .as_ref()
            .map(|p| p.id.clone())
    }

    /// Result of the last full pass that actually ran
    pub async fn last_result(&self) -> Option<SyncResult> {
        self.state.lock().await.last_result.clone()
    }

    /// Sets or clears the encryption passphrase; blank clears it
    pub async fn set_passphrase(&self, passphrase: Option<String>) {
        let passphrase = passphrase.filter(|p| !p.trim().is_empty());
        if passphrase.is_some() && !self.codec.has_cipher() {
            warn!("Passphrase set but no cipher is configured; uploads will fail");
        }
        self.state.lock().await.passphrase = passphrase;
    }

    // ------------------------------------------------------------------------
    // Connection lifecycle
    // ------------------------------------------------------------------------

    /// Connects to `provider_id`, replacing any current provider
    ///
    /// Returns false if the engine is busy, the provider is unknown, or
    /// authentication did not succeed.
    #[tracing::instrument(skip(self, provider_id), fields(provider = %provider_id))]
    pub async fn connect(&self, provider_id: &ProviderId) -> bool {
        let (attempt, previous) = {
            let mut state = self.state.lock().await;
            if state.status.is_busy() {
                warn!(status = %state.status, "Connect rejected while busy");
                return false;
            }
            let previous = state.detach();
            state.set_status(SyncStatus::Connecting);
            (state.connect_attempt, previous)
        };
        if let Some(previous) = previous {
            self.release(previous).await;
        }

        let store: Arc<dyn IRemoteStore> = match self.registry.create(provider_id) {
            Ok(store) => Arc::from(store),
            Err(e) => {
                error!(error = %format!("{e:#}"), "Failed to create remote store");
                self.abandon_connect(attempt).await;
                return false;
            }
        };

        let authenticated = match store.authenticate().await {
            Ok(authenticated) => authenticated,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "Authentication failed");
                false
            }
        };

        let mut state = self.state.lock().await;
        if state.connect_attempt != attempt || state.status != SyncStatus::Connecting {
            info!("Connection attempt superseded");
            return false;
        }
        if !authenticated {
            warn!("Provider rejected authentication");
            state.set_status(SyncStatus::Disconnected);
            return false;
        }

        state.provider = Some(ActiveProvider {
            id: provider_id.clone(),
            store,
        });
        state.set_status(SyncStatus::Idle);
        info!("Connected to remote store");
        true
    }

    /// Disconnects from the current provider
    ///
    /// Cancels a running pass, signs out, and clears pending changes.
    #[tracing::instrument(skip(self))]
    pub async fn disconnect(&self) {
        let previous = self.state.lock().await.detach();
        match previous {
            Some(previous) => {
                self.release(previous).await;
                info!("Disconnected from remote store");
            }
            None => debug!("Disconnect without a provider"),
        }
    }

    async fn release(&self, provider: ActiveProvider) {
        if let Err(e) = provider.store.sign_out().await {
            warn!(provider = %provider.id, error = %format!("{e:#}"), "Sign-out failed");
        }
    }

    async fn abandon_connect(&self, attempt: u64) {
        let mut state = self.state.lock().await;
        if state.connect_attempt == attempt && state.status == SyncStatus::Connecting {
            state.set_status(SyncStatus::Disconnected);
        }
    }

    // ------------------------------------------------------------------------
    // Pending change queue
    // ------------------------------------------------------------------------

    /// Queues a change for the next pass, replacing any pending one for the note
    pub async fn enqueue_change(&self, note_id: NoteId, change_type: ChangeType) {
        self.state
            .lock()
            .await
            .queue
            .enqueue(note_id, change_type, Utc::now());
    }

    /// Drops the pending change for a note; returns true if there was one
    pub async fn cancel_change(&self, note_id: &NoteId) -> bool {
        self.state.lock().await.queue.cancel(note_id)
    }

    /// Pending changes, oldest first
    pub async fn pending_changes(&self) -> Vec<PendingSyncChange> {
        self.state.lock().await.queue.snapshot()
    }

    /// Requests cooperative cancellation of the running pass
    pub async fn cancel_sync(&self) {
        self.state.lock().await.cancel_running();
        info!("Sync cancellation requested");
    }

    // ------------------------------------------------------------------------
    // Full pass
    // ------------------------------------------------------------------------

    /// Runs a full reconciliation pass
    #[tracing::instrument(skip(self))]
    pub async fn sync_all(&self) -> SyncResult {
        let session = match self.begin_full_pass().await {
            Ok(session) => session,
            Err(e) => {
                info!(reason = %e, "Sync request rejected");
                return SyncResult::rejected(e.to_string());
            }
        };
        let _pass = self.pass_lock.lock().await;
        let started = Instant::now();

        let mut tally = SyncTally::new();
        let outcome = self.run_full_pass(&session, &mut tally).await;
        let cancelled = matches!(outcome, Err(SyncError::Cancelled));
        let result = match outcome {
            Ok(()) => tally.finish(),
            Err(e) => {
                if !cancelled {
                    error!(error = %e, "Sync pass failed");
                }
                tally.fail(e.to_string())
            }
        };

        self.end_full_pass(&result, cancelled).await;
        self.progress(
            SyncOperation::FullSync,
            100.0,
            0,
            0,
            if result.success() {
                "Sync complete"
            } else {
                "Sync failed"
            },
        );
        info!(
            success = result.success(),
            uploaded = result.notes_uploaded(),
            downloaded = result.notes_downloaded(),
            conflicts_detected = result.conflicts_detected(),
            conflicts_resolved = result.conflicts_resolved(),
            failures = result.failures().count(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Sync pass finished"
        );
        result
    }

    async fn begin_full_pass(&self) -> Result<Session, SyncError> {
        let mut state = self.state.lock().await;
        if state.status == SyncStatus::Syncing {
            return Err(SyncError::AlreadySyncing);
        }
        let session = state.session()?;
        state.status.transition_to(SyncStatus::Syncing)?;
        Ok(session)
    }

    async fn end_full_pass(&self, result: &SyncResult, cancelled: bool) {
        let mut state = self.state.lock().await;
        state.last_result = Some(result.clone());
        // A disconnect during the pass already moved the status on
        if state.status == SyncStatus::Syncing {
            let next = if result.success() || cancelled {
                SyncStatus::Idle
            } else {
                SyncStatus::Error
            };
            state.set_status(next);
        }
    }

    async fn run_full_pass(&self, session: &Session, tally: &mut SyncTally) -> Result<(), SyncError> {
        let store = session.store.as_ref();
        self.progress(SyncOperation::FullSync, 0.0, 0, 0, "Starting sync");

        if let Err(e) = store.create_folder(NOTES_FOLDER).await {
            debug!(error = %format!("{e:#}"), "Could not ensure notes folder");
        }

        let local_notes = self
            .note_store
            .get_all_notes()
            .await
            .map_err(SyncError::NoteStore)?;
        let remote_files = store
            .list_files(NOTES_FOLDER)
            .await
            .map_err(SyncError::Remote)?;
        session.ensure_active()?;

        let pending_deletes = self.state.lock().await.queue.pending_deletes();
        let local: HashMap<NoteId, Note> =
            local_notes.into_iter().map(|n| (*n.id(), n)).collect();
        let total = remote_files.len();
        info!(local = local.len(), remote = total, "Starting reconciliation");
        self.progress(
            SyncOperation::FullSync,
            10.0,
            0,
            total,
            format!("Found {total} remote files"),
        );

        // --- Pull ---
        let mut ledger = PassLedger::default();
        for file in &remote_files {
            session.ensure_active()?;
            if file.is_folder {
                continue;
            }
            let Some(note_id) = parse_note_file_name(&file.name) else {
                debug!(path = %file.path, "Ignoring foreign remote file");
                tally.skipped(&file.path, "not a note payload");
                continue;
            };
            ledger.seen_remote.insert(note_id);

            if pending_deletes.contains(&note_id) {
                tally.skipped(&file.path, "deleted locally");
                ledger.settled.insert(note_id);
                continue;
            }

            match self
                .reconcile_remote_file(session, file, note_id, local.get(&note_id), tally)
                .await
            {
                Ok(RemoteOutcome::Settled) => {
                    ledger.settled.insert(note_id);
                }
                Ok(RemoteOutcome::Held) => {
                    ledger.held.insert(note_id);
                }
                Ok(RemoteOutcome::LocalAhead) => {}
                Err(SyncError::Cancelled) => return Err(SyncError::Cancelled),
                Err(e) => {
                    warn!(path = %file.path, error = %e, "Failed to reconcile remote file");
                    tally.failed(&file.path, e.to_string());
                    ledger.held.insert(note_id);
                }
            }
        }
        self.progress(
            SyncOperation::FullSync,
            50.0,
            total,
            total,
            "Remote changes applied",
        );

        // --- Push ---
        let mut outgoing: Vec<Note> = local
            .into_values()
            .filter(|n| !ledger.settled.contains(n.id()) && !ledger.held.contains(n.id()))
            .filter(|n| !ledger.seen_remote.contains(n.id()) || n.has_unsynced_changes())
            .collect();
        outgoing.sort_by_key(|n| (n.modified_date(), *n.id()));
        let outgoing_total = outgoing.len();

        for note in outgoing {
            session.ensure_active()?;
            let note_id = *note.id();
            let path = note_path(&note_id);
            match self.push_note(session, note).await {
                Ok(()) => {
                    tally.uploaded(&path);
                    ledger.uploaded.insert(note_id);
                }
                Err(e) => {
                    warn!(%note_id, error = %e, "Failed to upload note");
                    tally.failed(&path, e.to_string());
                }
            }
        }
        self.progress(
            SyncOperation::FullSync,
            80.0,
            outgoing_total,
            outgoing_total,
            "Local changes uploaded",
        );

        // --- Queue ---
        self.drain_queue(session, &ledger, tally).await?;
        self.progress(
            SyncOperation::FullSync,
            95.0,
            0,
            0,
            "Pending changes processed",
        );
        Ok(())
    }

    async fn reconcile_remote_file(
        &self,
        session: &Session,
        file: &RemoteFileInfo,
        note_id: NoteId,
        local: Option<&Note>,
        tally: &mut SyncTally,
    ) -> Result<RemoteOutcome, SyncError> {
        let Some(local) = local else {
            let mut note = self.fetch_existing(session, &file.path, &note_id).await?;
            note.mark_synced(Utc::now());
            self.save_local(&note).await?;
            debug!(%note_id, "Downloaded new note");
            tally.downloaded(&file.path);
            return Ok(RemoteOutcome::Settled);
        };

        if !ConflictDetector::remote_changed_since_sync(local, file.last_modified) {
            return Ok(RemoteOutcome::LocalAhead);
        }

        let remote = self.fetch_existing(session, &file.path, &note_id).await?;
        match ConflictDetector::check(local, &remote) {
            DetectionResult::Conflicted(conflict) => {
                tally.conflict_detected();
                if self.settle_conflict(session, *conflict, tally).await? {
                    Ok(RemoteOutcome::Settled)
                } else {
                    Ok(RemoteOutcome::Held)
                }
            }
            DetectionResult::NoConflict if ConflictDetector::remote_supersedes(local, &remote) => {
                self.adopt_remote(local, &remote).await?;
                debug!(%note_id, "Adopted newer remote note");
                tally.downloaded(&file.path);
                Ok(RemoteOutcome::Settled)
            }
            DetectionResult::NoConflict => Ok(RemoteOutcome::LocalAhead),
        }
    }

    async fn drain_queue(
        &self,
        session: &Session,
        ledger: &PassLedger,
        tally: &mut SyncTally,
    ) -> Result<(), SyncError> {
        let due = self.state.lock().await.queue.drain_due(Utc::now());
        if due.is_empty() {
            return Ok(());
        }
        let total = due.len();
        info!(count = total, "Processing pending changes");
        self.progress(
            SyncOperation::QueueDrain,
            0.0,
            0,
            total,
            format!("Retrying {total} pending changes"),
        );

        for entry in &due {
            session.ensure_active()?;
            let note_id = entry.note_id;
            let path = note_path(&note_id);
            if ledger.held.contains(&note_id) {
                debug!(%note_id, "Pending change held back by unresolved remote state");
                continue;
            }

            let attempt = self.apply_pending(session, entry, &ledger.uploaded).await;
            let mut state = self.state.lock().await;
            match attempt {
                Ok(applied) => {
                    state.queue.record_success(entry);
                    match applied {
                        Applied::Uploaded => tally.uploaded(&path),
                        Applied::Deleted => tally.deleted(&path),
                        Applied::Missing => tally.skipped(&path, "note no longer exists"),
                        Applied::AlreadyUploaded => {}
                    }
                }
                Err(e) => match state.queue.record_failure(entry, Utc::now()) {
                    FailureOutcome::Abandoned => {
                        error!(%note_id, error = %e, "Pending change abandoned after repeated failures");
                        tally.failed(&path, e.to_string());
                        tally.abandoned(note_id);
                    }
                    FailureOutcome::Rescheduled {
                        retry_count,
                        next_retry_at,
                    } => {
                        warn!(%note_id, retry_count, %next_retry_at, error = %e, "Pending change failed, will retry");
                        tally.failed(&path, e.to_string());
                    }
                    FailureOutcome::Superseded => {
                        debug!(%note_id, "Pending change replaced during attempt");
                    }
                },
            }
        }

        self.progress(
            SyncOperation::QueueDrain,
            100.0,
            total,
            total,
            "Pending changes processed",
        );
        Ok(())
    }

    async fn apply_pending(
        &self,
        session: &Session,
        entry: &PendingSyncChange,
        uploaded: &HashSet<NoteId>,
    ) -> Result<Applied, SyncError> {
        match entry.change_type {
            ChangeType::Delete => {
                let path = note_path(&entry.note_id);
                let existed = session
                    .store
                    .delete_file(&path)
                    .await
                    .map_err(SyncError::Remote)?;
                debug!(note_id = %entry.note_id, existed, "Replayed remote delete");
                Ok(Applied::Deleted)
            }
            ChangeType::CreateOrUpdate if uploaded.contains(&entry.note_id) => {
                Ok(Applied::AlreadyUploaded)
            }
            ChangeType::CreateOrUpdate => {
                let note = self
                    .note_store
                    .get_note_by_id(&entry.note_id)
                    .await
                    .map_err(SyncError::NoteStore)?;
                match note {
                    Some(note) => {
                        self.push_note(session, note).await?;
                        Ok(Applied::Uploaded)
                    }
                    None => Ok(Applied::Missing),
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Single note
    // ------------------------------------------------------------------------

    /// Reconciles one note immediately
    ///
    /// Does not change the engine status. A failed push or delete is queued
    /// for retry by the next full pass.
    #[tracing::instrument(skip(self, note_id), fields(note_id = %note_id))]
    pub async fn sync_note(&self, note_id: &NoteId) -> SyncResult {
        let (session, queued) = {
            let state = self.state.lock().await;
            match state.session() {
                Ok(session) => (session, state.queue.get(note_id).cloned()),
                Err(e) => return SyncResult::rejected(e.to_string()),
            }
        };
        let _pass = self.pass_lock.lock().await;
        self.progress(SyncOperation::NoteSync, 0.0, 0, 1, "Syncing note");

        let mut tally = SyncTally::new();
        let mut retry_as = ChangeType::CreateOrUpdate;
        let outcome = self
            .run_note_pass(&session, note_id, &mut retry_as, &mut tally)
            .await;

        let result = match outcome {
            Ok(completed) => {
                if completed {
                    if let Some(queued) = queued {
                        self.state.lock().await.queue.record_success(&queued);
                    }
                }
                tally.finish()
            }
            Err(SyncError::Cancelled) => tally.fail(SyncError::Cancelled.to_string()),
            Err(e) => {
                warn!(error = %e, change = ?retry_as, "Note sync failed, queueing for retry");
                self.state
                    .lock()
                    .await
                    .queue
                    .enqueue(*note_id, retry_as, Utc::now());
                tally.failed(note_path(note_id), e.to_string());
                tally.fail(e.to_string())
            }
        };

        self.progress(SyncOperation::NoteSync, 100.0, 1, 1, "Note synced");
        result
    }

    /// Returns false when a conflict was left unresolved
    async fn run_note_pass(
        &self,
        session: &Session,
        note_id: &NoteId,
        retry_as: &mut ChangeType,
        tally: &mut SyncTally,
    ) -> Result<bool, SyncError> {
        session.ensure_active()?;
        let path = note_path(note_id);

        let local = self
            .note_store
            .get_note_by_id(note_id)
            .await
            .map_err(SyncError::NoteStore)?;
        let Some(local) = local else {
            *retry_as = ChangeType::Delete;
            let existed = session
                .store
                .delete_file(&path)
                .await
                .map_err(SyncError::Remote)?;
            debug!(existed, "Deleted remote copy of removed note");
            tally.deleted(&path);
            return Ok(true);
        };

        let Some(remote) = self.fetch_note(session, &path, note_id).await? else {
            self.push_note(session, local).await?;
            tally.uploaded(&path);
            return Ok(true);
        };
        session.ensure_active()?;

        match ConflictDetector::check(&local, &remote) {
            DetectionResult::Conflicted(conflict) => {
                tally.conflict_detected();
                self.settle_conflict(session, *conflict, tally).await
            }
            DetectionResult::NoConflict if remote.sync_version() > local.sync_version() => {
                self.adopt_remote(&local, &remote).await?;
                tally.downloaded(&path);
                Ok(true)
            }
            DetectionResult::NoConflict => {
                self.push_note(session, local).await?;
                tally.uploaded(&path);
                Ok(true)
            }
        }
    }

    // ------------------------------------------------------------------------
    // Shared steps
    // ------------------------------------------------------------------------

    /// Arbitrates and applies a conflict; returns false if left unresolved
    async fn settle_conflict(
        &self,
        session: &Session,
        conflict: SyncConflict,
        tally: &mut SyncTally,
    ) -> Result<bool, SyncError> {
        let note_id = *conflict.note_id();
        let path = note_path(&note_id);
        info!(%note_id, "Conflict detected");

        let resolution = self.arbiter.decide(&conflict, &session.cancel).await?;
        if !resolution.is_resolution() {
            info!(%note_id, "Conflict left unresolved");
            tally.skipped(&path, "conflict unresolved");
            return Ok(false);
        }

        let now = Utc::now();
        let resolved =
            ConflictResolver::resolve(resolution, conflict.local(), conflict.remote(), now)?;
        match resolution {
            SyncConflictResolution::KeepRemote => {
                let mut note = resolved;
                note.mark_synced(now);
                self.save_local(&note).await?;
            }
            // Version already advanced by the resolver
            _ => self.upload(session, resolved).await?,
        }

        self.observer.on_conflict_resolved(&conflict, resolution);
        tally.conflict_resolved(&path);
        info!(%note_id, %resolution, "Conflict resolved");
        Ok(true)
    }

    /// Downloads and decodes a note payload; `Ok(None)` if absent remotely
    async fn fetch_note(
        &self,
        session: &Session,
        path: &str,
        note_id: &NoteId,
    ) -> Result<Option<Note>, SyncError> {
        let Some(bytes) = session
            .store
            .download_file(path)
            .await
            .map_err(SyncError::Remote)?
        else {
            return Ok(None);
        };
        let note = self.codec.decode(&bytes, session.passphrase())?;
        if note.id() != note_id {
            return Err(SyncError::NotRetrievable {
                path: path.to_string(),
                reason: format!("payload belongs to note {}", note.id()),
            });
        }
        Ok(Some(note))
    }

    async fn fetch_existing(
        &self,
        session: &Session,
        path: &str,
        note_id: &NoteId,
    ) -> Result<Note, SyncError> {
        self.fetch_note(session, path, note_id)
            .await?
            .ok_or_else(|| SyncError::NotRetrievable {
                path: path.to_string(),
                reason: "file vanished after listing".into(),
            })
    }

    async fn adopt_remote(&self, local: &Note, remote: &Note) -> Result<(), SyncError> {
        let mut note = local.clone();
        note.adopt(remote);
        note.mark_synced(Utc::now());
        self.save_local(&note).await
    }

    /// Bumps the version and uploads
    async fn push_note(&self, session: &Session, mut note: Note) -> Result<(), SyncError> {
        note.advance_sync_version(0);
        self.upload(session, note).await
    }

    /// Uploads `note` as-is, then stamps it synced locally
    async fn upload(&self, session: &Session, mut note: Note) -> Result<(), SyncError> {
        let path = note_path(note.id());
        let payload = self.codec.encode(&note, session.passphrase())?;
        let remote_ref = session
            .store
            .upload_file(&path, &payload)
            .await
            .map_err(SyncError::Remote)?
            .ok_or_else(|| SyncError::UploadRefused { path: path.clone() })?;

        note.mark_synced(Utc::now());
        self.save_local(&note).await?;
        debug!(
            note_id = %note.id(),
            version = note.sync_version(),
            %remote_ref,
            "Uploaded note"
        );
        Ok(())
    }

    async fn save_local(&self, note: &Note) -> Result<(), SyncError> {
        self.note_store
            .update_note(note)
            .await
            .map_err(SyncError::NoteStore)
    }

    fn progress(
        &self,
        operation: SyncOperation,
        percent: f64,
        processed: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        self.observer.on_progress(&SyncProgress::new(
            operation, percent, processed, total, message,
        ));
    }
}
