//! In-memory fakes shared by the engine integration tests

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use notesync_conflict::ConflictPolicy;
use notesync_core::domain::{Note, NoteId, SyncConflict, SyncConflictResolution};
use notesync_core::ports::{
    ConflictRequest, INoteStore, IPayloadCipher, IRemoteStore, ISyncObserver, ProviderId,
    RemoteFileInfo, RemoteStoreRegistry, SyncProgress,
};
use notesync_sync::{RetryPolicy, SyncEngine};

// ============================================================================
// Note store
// ============================================================================

#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Mutex<HashMap<NoteId, Note>>,
}

impl MemoryNoteStore {
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let store = Self::default();
        for note in notes {
            store.put(note);
        }
        store
    }

    pub fn put(&self, note: Note) {
        self.notes.lock().unwrap().insert(*note.id(), note);
    }

    pub fn remove(&self, id: &NoteId) {
        self.notes.lock().unwrap().remove(id);
    }

    pub fn get(&self, id: &NoteId) -> Option<Note> {
        self.notes.lock().unwrap().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.notes.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl INoteStore for MemoryNoteStore {
    async fn get_all_notes(&self) -> anyhow::Result<Vec<Note>> {
        Ok(self.notes.lock().unwrap().values().cloned().collect())
    }

    async fn get_note_by_id(&self, id: &NoteId) -> anyhow::Result<Option<Note>> {
        Ok(self.get(id))
    }

    async fn update_note(&self, note: &Note) -> anyhow::Result<()> {
        self.put(note.clone());
        Ok(())
    }
}

// ============================================================================
// Remote store
// ============================================================================

#[derive(Default)]
pub struct RemoteState {
    pub files: BTreeMap<String, (Vec<u8>, DateTime<Utc>)>,
    pub authenticated: bool,
    pub reject_auth: bool,
    pub fail_listing: bool,
    pub fail_uploads: bool,
    /// Uploads answer without an identifier
    pub refuse_uploads: bool,
    pub fail_deletes: bool,
    pub uploads: Vec<String>,
    pub deletes: Vec<String>,
    pub sign_outs: usize,
}

/// Shared in-memory object store; clones see the same files
#[derive(Clone, Default)]
pub struct FakeRemote {
    pub state: Arc<Mutex<RemoteState>>,
}

impl FakeRemote {
    pub fn put_raw(&self, path: &str, bytes: Vec<u8>, modified: DateTime<Utc>) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(path.to_string(), (bytes, modified));
    }

    pub fn put_note(&self, note: &Note, modified: DateTime<Utc>) {
        let bytes = serde_json::to_vec(note).unwrap();
        self.put_raw(&format!("notes/{}.json", note.id()), bytes, modified);
    }

    pub fn raw(&self, id: &NoteId) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .files
            .get(&format!("notes/{id}.json"))
            .map(|(bytes, _)| bytes.clone())
    }

    pub fn note(&self, id: &NoteId) -> Option<Note> {
        self.raw(id).map(|b| serde_json::from_slice(&b).unwrap())
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut RemoteState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait::async_trait]
impl IRemoteStore for FakeRemote {
    async fn authenticate(&self) -> anyhow::Result<bool> {
        let mut state = self.state.lock().unwrap();
        state.authenticated = !state.reject_auth;
        Ok(state.authenticated)
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        state.authenticated = false;
        state.sign_outs += 1;
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.state.lock().unwrap().authenticated
    }

    async fn list_files(&self, path: &str) -> anyhow::Result<Vec<RemoteFileInfo>> {
        let state = self.state.lock().unwrap();
        if state.fail_listing {
            anyhow::bail!("listing unavailable");
        }
        let prefix = format!("{path}/");
        Ok(state
            .files
            .iter()
            .filter_map(|(key, (bytes, modified))| {
                let name = key.strip_prefix(&prefix)?;
                Some(RemoteFileInfo {
                    name: name.to_string(),
                    path: key.clone(),
                    size: bytes.len() as u64,
                    last_modified: *modified,
                    version_tag: None,
                    is_folder: false,
                })
            })
            .collect())
    }

    async fn download_file(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .files
            .get(path)
            .map(|(bytes, _)| bytes.clone()))
    }

    async fn upload_file(&self, path: &str, data: &[u8]) -> anyhow::Result<Option<String>> {
        let mut state = self.state.lock().unwrap();
        if state.fail_uploads {
            anyhow::bail!("upload rejected");
        }
        if state.refuse_uploads {
            return Ok(None);
        }
        state
            .files
            .insert(path.to_string(), (data.to_vec(), Utc::now()));
        state.uploads.push(path.to_string());
        Ok(Some(path.to_string()))
    }

    async fn delete_file(&self, path: &str) -> anyhow::Result<bool> {
        let mut state = self.state.lock().unwrap();
        if state.fail_deletes {
            anyhow::bail!("delete rejected");
        }
        state.deletes.push(path.to_string());
        Ok(state.files.remove(path).is_some())
    }

    async fn create_folder(&self, _path: &str) -> anyhow::Result<bool> {
        Ok(true)
    }
}

// ============================================================================
// Observer
// ============================================================================

/// Records signals; answers conflicts with `answer` or parks them
pub struct RecordingObserver {
    answer: Option<SyncConflictResolution>,
    pub parked: Mutex<Vec<ConflictRequest>>,
    pub conflict_raised: Notify,
    pub progress: Mutex<Vec<SyncProgress>>,
    pub resolved: Mutex<Vec<(SyncConflict, SyncConflictResolution)>>,
}

impl RecordingObserver {
    pub fn answering(resolution: SyncConflictResolution) -> Self {
        Self::new(Some(resolution))
    }

    pub fn parking() -> Self {
        Self::new(None)
    }

    fn new(answer: Option<SyncConflictResolution>) -> Self {
        Self {
            answer,
            parked: Mutex::new(Vec::new()),
            conflict_raised: Notify::new(),
            progress: Mutex::new(Vec::new()),
            resolved: Mutex::new(Vec::new()),
        }
    }
}

impl ISyncObserver for RecordingObserver {
    fn on_progress(&self, progress: &SyncProgress) {
        self.progress.lock().unwrap().push(progress.clone());
    }

    fn on_conflict(&self, request: ConflictRequest) {
        match self.answer {
            Some(resolution) => {
                request.resolve(resolution);
            }
            None => self.parked.lock().unwrap().push(request),
        }
        self.conflict_raised.notify_one();
    }

    fn on_conflict_resolved(&self, conflict: &SyncConflict, resolution: SyncConflictResolution) {
        self.resolved
            .lock()
            .unwrap()
            .push((conflict.clone(), resolution));
    }
}

// ============================================================================
// Cipher
// ============================================================================

/// Reversible XOR cipher with a marker prefix
pub struct XorCipher;

impl IPayloadCipher for XorCipher {
    fn encrypt(&self, data: &[u8], passphrase: &str) -> anyhow::Result<Vec<u8>> {
        let mut out = b"XOR:".to_vec();
        out.extend(xor(data, passphrase));
        Ok(out)
    }

    fn decrypt(&self, data: &[u8], passphrase: &str) -> anyhow::Result<Vec<u8>> {
        let body = data
            .strip_prefix(b"XOR:")
            .ok_or_else(|| anyhow::anyhow!("not an encrypted payload"))?;
        Ok(xor(body, passphrase))
    }
}

fn xor(data: &[u8], key: &str) -> Vec<u8> {
    data.iter()
        .zip(key.as_bytes().iter().cycle())
        .map(|(b, k)| b ^ k)
        .collect()
}

// ============================================================================
// Engine setup
// ============================================================================

pub fn provider() -> ProviderId {
    ProviderId::new("fake").unwrap()
}

pub fn registry(remote: &FakeRemote) -> RemoteStoreRegistry {
    let remote = remote.clone();
    RemoteStoreRegistry::new().with(provider(), move || {
        Ok(Box::new(remote.clone()) as Box<dyn IRemoteStore>)
    })
}

/// Engine with immediate retries and the given conflict policy
pub fn engine(
    notes: Arc<MemoryNoteStore>,
    remote: &FakeRemote,
    observer: Arc<dyn ISyncObserver>,
    policy: ConflictPolicy,
) -> SyncEngine {
    SyncEngine::with_policies(
        notes,
        registry(remote),
        observer,
        policy,
        RetryPolicy::new(3, Duration::ZERO, Duration::ZERO),
    )
}

/// Builds a conflicting pair: both sides edited after the shared sync point
pub fn conflicting_pair(base: DateTime<Utc>) -> (Note, Note) {
    let id = NoteId::new();
    let synced = base + chrono::Duration::minutes(10);
    let local = Note::from_parts(
        id,
        "Plan",
        "local edit",
        base,
        base + chrono::Duration::minutes(20),
        Some(synced),
        1,
    );
    let remote = Note::from_parts(
        id,
        "Plan",
        "remote edit",
        base,
        base + chrono::Duration::minutes(30),
        Some(synced),
        2,
    );
    (local, remote)
}
