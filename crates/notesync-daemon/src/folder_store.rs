//! Folder-backed remote store
//!
//! Implements [`IRemoteStore`] over a plain directory, typically one that a
//! desktop sync client (or a network mount) already replicates. Provider
//! paths map onto paths below the root; `..` and absolute paths are
//! rejected.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Context;
use chrono::{DateTime, Utc};
use notesync_core::ports::{IRemoteStore, RemoteFileInfo};
use tracing::{debug, instrument};

/// Remote store rooted at a local directory
#[derive(Debug)]
pub struct FolderRemoteStore {
    root: PathBuf,
    authenticated: AtomicBool,
}

impl FolderRemoteStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            authenticated: AtomicBool::new(false),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn ensure_authenticated(&self) -> anyhow::Result<()> {
        if self.is_authenticated() {
            Ok(())
        } else {
            anyhow::bail!("folder store {} is not connected", self.root.display())
        }
    }

    /// Maps a provider path onto the filesystem
    fn resolve(&self, path: &str) -> anyhow::Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            anyhow::bail!("invalid remote path: {path}");
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait::async_trait]
impl IRemoteStore for FolderRemoteStore {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn authenticate(&self) -> anyhow::Result<bool> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create {}", self.root.display()))?;
        let usable = tokio::fs::metadata(&self.root).await?.is_dir();
        self.authenticated.store(usable, Ordering::Release);
        debug!(usable, "folder store opened");
        Ok(usable)
    }

    async fn sign_out(&self) -> anyhow::Result<()> {
        self.authenticated.store(false, Ordering::Release);
        Ok(())
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated.load(Ordering::Acquire)
    }

    #[instrument(skip(self))]
    async fn list_files(&self, path: &str) -> anyhow::Result<Vec<RemoteFileInfo>> {
        self.ensure_authenticated()?;
        let dir = self.resolve(path)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to list {}", dir.display()))
            }
        };

        let prefix = path.trim_matches('/');
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".tmp") {
                continue;
            }
            let metadata = entry.metadata().await?;
            let last_modified: DateTime<Utc> = metadata.modified()?.into();
            files.push(RemoteFileInfo {
                path: if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{prefix}/{name}")
                },
                name,
                size: metadata.len(),
                version_tag: last_modified.timestamp_nanos_opt().map(|n| n.to_string()),
                last_modified,
                is_folder: metadata.is_dir(),
            });
        }
        files.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = files.len(), "listed folder");
        Ok(files)
    }

    #[instrument(skip(self))]
    async fn download_file(&self, path: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.ensure_authenticated()?;
        match tokio::fs::read(self.resolve(path)?).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn upload_file(&self, path: &str, data: &[u8]) -> anyhow::Result<Option<String>> {
        self.ensure_authenticated()?;
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Same directory so the rename stays on one filesystem
        let tmp_path = {
            let mut p = target.as_os_str().to_owned();
            p.push(".tmp");
            PathBuf::from(p)
        };
        tokio::fs::write(&tmp_path, data).await?;
        tokio::fs::rename(&tmp_path, &target).await?;
        Ok(Some(path.to_string()))
    }

    #[instrument(skip(self))]
    async fn delete_file(&self, path: &str) -> anyhow::Result<bool> {
        self.ensure_authenticated()?;
        match tokio::fs::remove_file(self.resolve(path)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn create_folder(&self, path: &str) -> anyhow::Result<bool> {
        self.ensure_authenticated()?;
        tokio::fs::create_dir_all(self.resolve(path)?).await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    async fn open(dir: &TempDir) -> FolderRemoteStore {
        let store = FolderRemoteStore::new(dir.path().join("remote"));
        assert!(store.authenticate().await.unwrap());
        store
    }

    #[tokio::test]
    async fn test_requires_authentication() {
        let dir = TempDir::new().unwrap();
        let store = FolderRemoteStore::new(dir.path());
        assert!(!store.is_authenticated());
        assert!(store.list_files("notes").await.is_err());
    }

    #[tokio::test]
    async fn test_upload_list_download_delete() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;

        assert_eq!(
            store.upload_file("notes/a.json", b"{}").await.unwrap(),
            Some("notes/a.json".to_string())
        );
        let files = store.list_files("notes").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.json");
        assert_eq!(files[0].path, "notes/a.json");
        assert_eq!(files[0].size, 2);
        assert!(!files[0].is_folder);

        assert_eq!(
            store.download_file("notes/a.json").await.unwrap(),
            Some(b"{}".to_vec())
        );
        assert!(store.delete_file("notes/a.json").await.unwrap());
        assert!(!store.delete_file("notes/a.json").await.unwrap());
        assert_eq!(store.download_file("notes/a.json").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_folder_lists_empty() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        assert!(store.list_files("notes").await.unwrap().is_empty());
        assert!(store.create_folder("notes").await.unwrap());
        assert!(store.root().join("notes").is_dir());
    }

    #[tokio::test]
    async fn test_rejects_escaping_paths() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        assert!(store.upload_file("../outside.json", b"x").await.is_err());
        assert!(store.download_file("notes/../../etc/passwd").await.is_err());
    }

    #[tokio::test]
    async fn test_sign_out_blocks_access() {
        let dir = TempDir::new().unwrap();
        let store = open(&dir).await;
        store.sign_out().await.unwrap();
        assert!(store.upload_file("notes/a.json", b"x").await.is_err());
    }
}
