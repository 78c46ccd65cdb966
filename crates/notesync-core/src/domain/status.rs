//! Engine connection/sync status
//!
//! There is exactly one `SyncStatus` per engine instance. Transitions:
//!
//! ```text
//! Disconnected ──→ Connecting ──→ Idle ⇄ Syncing ──→ Error
//!       ↑              │           │        │          │
//!       └──────────────┴───────────┴────────┴──────────┘  (disconnect / failed auth)
//! ```
//!
//! `Error` may also start a new pass directly (`Error → Syncing`).

use serde::{Deserialize, Serialize};

use super::errors::DomainError;

/// Connection and activity state of the sync engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// No provider is connected
    Disconnected,
    /// Authentication with a provider is in progress
    Connecting,
    /// Connected and waiting for work
    Idle,
    /// A full reconciliation pass is running
    Syncing,
    /// The last full pass failed
    Error,
}

impl SyncStatus {
    /// Returns the lowercase name used in logs and error messages
    pub fn name(&self) -> &'static str {
        match self {
            SyncStatus::Disconnected => "disconnected",
            SyncStatus::Connecting => "connecting",
            SyncStatus::Idle => "idle",
            SyncStatus::Syncing => "syncing",
            SyncStatus::Error => "error",
        }
    }

    /// Returns true if a provider session is established
    pub fn is_connected(&self) -> bool {
        matches!(
            self,
            SyncStatus::Idle | SyncStatus::Syncing | SyncStatus::Error
        )
    }

    /// Returns true if the status blocks a new `connect` attempt
    pub fn is_busy(&self) -> bool {
        matches!(self, SyncStatus::Connecting | SyncStatus::Syncing)
    }

    /// Checks whether moving to `target` is a legal transition
    pub fn can_transition_to(&self, target: SyncStatus) -> bool {
        use SyncStatus::*;

        // Explicit disconnect is always allowed
        if target == Disconnected {
            return true;
        }

        matches!(
            (self, target),
            (Disconnected, Connecting)
                | (Connecting, Idle)
                | (Idle, Syncing)
                | (Syncing, Idle)
                | (Syncing, Error)
                | (Error, Syncing)
                | (Error, Idle)
        )
    }

    /// Performs a checked transition
    pub fn transition_to(&mut self, target: SyncStatus) -> Result<(), DomainError> {
        if !self.can_transition_to(target) {
            return Err(DomainError::InvalidState {
                from: self.name().to_string(),
                to: target.name().to_string(),
            });
        }
        *self = target;
        Ok(())
    }
}

impl Default for SyncStatus {
    fn default() -> Self {
        SyncStatus::Disconnected
    }
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
