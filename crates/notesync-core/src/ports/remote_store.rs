//! Remote store port (driven/secondary port)
//!
//! This module defines the capability interface for a cloud file provider.
//! Vendor-specific adapters (authentication, file APIs) implement it; the
//! sync engine depends on nothing else.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are adapter-specific
//!   and don't need domain-level classification.
//! - "Absent" results are modelled as `Ok(None)` / `Ok(false)`, distinct from
//!   transport failures (`Err`). The engine treats both as per-item failures
//!   and never aborts a whole pass because of one file.
//! - Paths are provider-relative and `/`-separated (e.g. `notes/{id}.json`).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Read-only snapshot of a remote file's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteFileInfo {
    /// File name without directory (e.g. `3f2a...json`)
    pub name: String,
    /// Full provider-relative path (e.g. `notes/3f2a...json`)
    pub path: String,
    /// Size in bytes
    pub size: u64,
    /// Last modification time as reported by the provider
    pub last_modified: DateTime<Utc>,
    /// Provider version tag (ETag, revision id) if available
    pub version_tag: Option<String>,
    /// Whether this entry is a folder
    pub is_folder: bool,
}

/// Port trait for a cloud file provider
///
/// ## Implementation Notes
///
/// - `download_file` returns `Ok(None)` when the file does not exist.
/// - `delete_file` returns `Ok(false)` when there was nothing to delete.
/// - `upload_file` creates or replaces the file and returns the provider's
///   identifier for it; `Ok(None)` means the provider did not accept it.
/// - Resources are released when the adapter is dropped; the engine owns
///   the adapter exclusively between `connect` and `disconnect`.
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Authenticates with the provider; `Ok(false)` means rejected credentials
    async fn authenticate(&self) -> anyhow::Result<bool>;

    /// Signs out and forgets any cached credentials
    async fn sign_out(&self) -> anyhow::Result<()>;

    /// Returns whether the adapter currently holds a valid session
    fn is_authenticated(&self) -> bool;

    /// Lists the direct children of `path`
    async fn list_files(&self, path: &str) -> anyhow::Result<Vec<RemoteFileInfo>>;

    /// Downloads a file's content
    async fn download_file(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Uploads (creates or replaces) a file
    async fn upload_file(&self, path: &str, data: &[u8]) -> anyhow::Result<Option<String>>;

    /// Deletes a file
    async fn delete_file(&self, path: &str) -> anyhow::Result<bool>;

    /// Creates a folder; `Ok(true)` if it exists afterwards
    async fn create_folder(&self, path: &str) -> anyhow::Result<bool>;
}
