//! Conflict policy
//!
//! Decides whether a conflict is resolved automatically or handed to the
//! observer, how long to wait for the observer's answer, and what to do
//! when no answer arrives.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use notesync_core::config::ConflictsConfig;
use notesync_core::domain::SyncConflictResolution;

use crate::error::ConflictError;

/// Resolution policy for detected conflicts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictPolicy {
    /// Applied without asking when set
    auto_resolution: Option<SyncConflictResolution>,
    /// How long to wait for the observer's decision
    decision_timeout: Duration,
    /// Applied when the observer does not answer in time
    timeout_resolution: SyncConflictResolution,
}

impl ConflictPolicy {
    /// Asks the observer, waiting up to `decision_timeout`
    pub fn manual(decision_timeout: Duration) -> Self {
        Self {
            auto_resolution: None,
            decision_timeout,
            timeout_resolution: SyncConflictResolution::None,
        }
    }

    /// Always applies `resolution` without asking
    pub fn automatic(resolution: SyncConflictResolution) -> Self {
        Self {
            auto_resolution: Some(resolution),
            decision_timeout: Duration::ZERO,
            timeout_resolution: resolution,
        }
    }

    /// Sets the resolution used when the observer does not answer
    pub fn with_timeout_resolution(mut self, resolution: SyncConflictResolution) -> Self {
        self.timeout_resolution = resolution;
        self
    }

    /// Builds the policy from the `conflicts` configuration section
    pub fn from_config(config: &ConflictsConfig) -> Result<Self, ConflictError> {
        let auto_resolution = match config.default_strategy.as_str() {
            "manual" => None,
            other => Some(
                other
                    .parse()
                    .map_err(|_| ConflictError::InvalidStrategy(other.to_string()))?,
            ),
        };
        let timeout_resolution = config
            .timeout_strategy
            .parse()
            .map_err(|_| ConflictError::InvalidStrategy(config.timeout_strategy.clone()))?;

        let policy = Self {
            auto_resolution,
            decision_timeout: config.decision_timeout(),
            timeout_resolution,
        };
        debug!(policy = ?policy, "Conflict policy initialized");
        Ok(policy)
    }

    pub fn auto_resolution(&self) -> Option<SyncConflictResolution> {
        self.auto_resolution
    }

    pub fn decision_timeout(&self) -> Duration {
        self.decision_timeout
    }

    pub fn timeout_resolution(&self) -> SyncConflictResolution {
        self.timeout_resolution
    }
}

impl Default for ConflictPolicy {
    fn default() -> Self {
        Self::from_config(&ConflictsConfig::default())
            .unwrap_or_else(|_| Self::manual(Duration::from_secs(120)))
    }
}
