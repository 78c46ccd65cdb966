//! Notesync Core - Domain types and port definitions
//!
//! This crate contains the hexagonal core of the note synchronization engine:
//! - **Domain entities** - `Note`, `SyncStatus`, `SyncResult`, conflict types
//! - **Port definitions** - Traits for adapters: `IRemoteStore`, `INoteStore`,
//!   `IPayloadCipher`, `ISyncObserver`
//! - **Provider registry** - Maps provider identifiers to remote store factories
//! - **Configuration** - Typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure data and invariants with no I/O.
//! Ports define the trait interfaces that adapters (vendor clients, note
//! databases, UI observers) implement. The sync engine in `notesync-sync`
//! only ever talks to these traits.

pub mod config;
pub mod domain;
pub mod ports;
