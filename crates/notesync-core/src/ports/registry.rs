//! Remote store provider registry
//!
//! Maps a provider identifier (`"onedrive"`, `"dropbox"`, `"folder"`, ...)
//! to a factory that builds a fresh [`IRemoteStore`] adapter. The engine
//! connects by identifier, so the host decides which vendors exist and
//! tests can register doubles without touching engine code.

use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::remote_store::IRemoteStore;
use crate::domain::errors::DomainError;

/// Identifier of a registered remote store provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(String);

impl ProviderId {
    /// Creates a provider identifier
    ///
    /// Identifiers are trimmed and lowercased; empty identifiers are rejected.
    pub fn new(id: impl AsRef<str>) -> Result<Self, DomainError> {
        let normalized = id.as_ref().trim().to_ascii_lowercase();
        if normalized.is_empty() {
            return Err(DomainError::ValidationFailed(
                "provider id must not be empty".to_string(),
            ));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ProviderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Factory producing a new, unauthenticated remote store adapter
pub type RemoteStoreFactory =
    Arc<dyn Fn() -> anyhow::Result<Box<dyn IRemoteStore>> + Send + Sync>;

/// Registry of remote store factories keyed by [`ProviderId`]
#[derive(Default, Clone)]
pub struct RemoteStoreRegistry {
    factories: HashMap<ProviderId, RemoteStoreFactory>,
}

impl RemoteStoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the factory for `id`
    pub fn register<F>(&mut self, id: ProviderId, factory: F)
    where
        F: Fn() -> anyhow::Result<Box<dyn IRemoteStore>> + Send + Sync + 'static,
    {
        debug!(provider = %id, "Registering remote store provider");
        self.factories.insert(id, Arc::new(factory));
    }

    /// Builder-style variant of [`register`](Self::register)
    pub fn with<F>(mut self, id: ProviderId, factory: F) -> Self
    where
        F: Fn() -> anyhow::Result<Box<dyn IRemoteStore>> + Send + Sync + 'static,
    {
        self.register(id, factory);
        self
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.factories.contains_key(id)
    }

    /// Registered identifiers in sorted order
    pub fn providers(&self) -> Vec<ProviderId> {
        let mut ids: Vec<ProviderId> = self.factories.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Builds a new adapter for `id`
    pub fn create(&self, id: &ProviderId) -> anyhow::Result<Box<dyn IRemoteStore>> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| anyhow::anyhow!("Unknown remote store provider: {id}"))?;
        factory()
    }
}

impl std::fmt::Debug for RemoteStoreRegistry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteStoreRegistry")
            .field("providers", &self.providers())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::remote_store::RemoteFileInfo;

    struct StubStore;

    #[async_trait::async_trait]
    impl IRemoteStore for StubStore {
        async fn authenticate(&self) -> anyhow::Result<bool> {
            Ok(true)
        }
        async fn sign_out(&self) -> anyhow::Result<()> {
            Ok(())
        }
        fn is_authenticated(&self) -> bool {
            true
        }
        async fn list_files(&self, _path: &str) -> anyhow::Result<Vec<RemoteFileInfo>> {
            Ok(Vec::new())
        }
        async fn download_file(&self, _path: &str) -> anyhow::Result<Option<Vec<u8>>> {
            Ok(None)
        }
        async fn upload_file(&self, path: &str, _data: &[u8]) -> anyhow::Result<Option<String>> {
            Ok(Some(path.to_string()))
        }
        async fn delete_file(&self, _path: &str) -> anyhow::Result<bool> {
            Ok(false)
        }
        async fn create_folder(&self, _path: &str) -> anyhow::Result<bool> {
            Ok(true)
        }
    }

    #[test]
    fn test_provider_id_normalized() {
        let id = ProviderId::new("  OneDrive ").unwrap();
        assert_eq!(id.as_str(), "onedrive");
    }

    #[test]
    fn test_provider_id_empty_rejected() {
        assert!(ProviderId::new("   ").is_err());
    }

    #[test]
    fn test_register_and_create() {
        let id = ProviderId::new("stub").unwrap();
        let registry = RemoteStoreRegistry::new().with(id.clone(), || Ok(Box::new(StubStore)));

        assert!(registry.contains(&id));
        let store = registry.create(&id).unwrap();
        assert!(store.is_authenticated());
    }

    #[test]
    fn test_create_unknown_provider_fails() {
        let registry = RemoteStoreRegistry::new();
        let err = registry
            .create(&ProviderId::new("dropbox").unwrap())
            .err()
            .unwrap();
        assert!(err.to_string().contains("dropbox"));
    }

    #[test]
    fn test_providers_sorted() {
        let registry = RemoteStoreRegistry::new()
            .with(ProviderId::new("zeta").unwrap(), || Ok(Box::new(StubStore)))
            .with(ProviderId::new("alpha").unwrap(), || Ok(Box::new(StubStore)));
        let names: Vec<String> = registry
            .providers()
            .into_iter()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }
}
