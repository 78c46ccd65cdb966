//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! sync engine. Ports are interfaces that the engine depends on, but whose
//! implementations live in adapter crates or in the host application.
//!
//! ## Ports Overview
//!
//! - [`IRemoteStore`] - Cloud file provider capability (vendor adapters)
//! - [`INoteStore`] - Local note persistence, source of truth for local state
//! - [`IPayloadCipher`] - Optional payload encryption around transport
//! - [`ISyncObserver`] - Progress signals and conflict-resolution requests
//!
//! The [`RemoteStoreRegistry`] maps provider identifiers to factories
//! producing [`IRemoteStore`] instances.

pub mod cipher;
pub mod note_store;
pub mod observer;
pub mod registry;
pub mod remote_store;

pub use cipher::IPayloadCipher;
pub use note_store::INoteStore;
pub use observer::{
    ConflictRequest, ISyncObserver, NullObserver, ResolutionResponder, SyncOperation, SyncProgress,
};
pub use registry::{ProviderId, RemoteStoreFactory, RemoteStoreRegistry};
pub use remote_store::{IRemoteStore, RemoteFileInfo};
