//! Configuration module for Notesync.
//!
//! Provides typed configuration structs that map to the YAML configuration file,
//! with loading, validation and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Config struct with sub-sections
// ---------------------------------------------------------------------------

/// Top-level configuration for Notesync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub sync: SyncConfig,
    pub retry: RetryConfig,
    pub conflicts: ConflictsConfig,
    pub logging: LoggingConfig,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Registry identifier of the remote store provider to connect to.
    pub provider: String,
    /// Root of the remote store for folder-backed providers.
    pub remote_root: PathBuf,
    /// Directory holding the local note store.
    pub notes_dir: PathBuf,
    /// Seconds between full reconciliation passes.
    pub poll_interval: u64,
    /// Milliseconds a note must stay untouched before an autosave push.
    pub autosave_debounce_ms: u64,
}

/// Retry/backoff settings for the pending change queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Failed attempts after which a queued change is abandoned.
    pub max_attempts: u32,
    /// Backoff base delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Backoff ceiling in milliseconds.
    pub max_delay_ms: u64,
}

/// Conflict resolution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConflictsConfig {
    /// `manual` (ask the observer), `keep_local`, `keep_remote`, or `merge`.
    pub default_strategy: String,
    /// Seconds to wait for the observer's decision.
    pub decision_timeout_secs: u64,
    /// Resolution applied when the observer does not answer in time.
    pub timeout_strategy: String,
}

/// Logging / tracing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: `trace`, `debug`, `info`, `warn`, or `error`.
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Using default configuration");
                Self::default()
            }
        }
    }

    /// Platform-appropriate default path for the configuration file.
    ///
    /// Typically `$XDG_CONFIG_HOME/notesync/config.yaml` on Linux.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("notesync")
            .join("config.yaml")
    }
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl ConflictsConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }
}

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

impl Default for SyncConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("~/.local/share"))
            .join("notesync");
        Self {
            provider: "folder".to_string(),
            remote_root: dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("~"))
                .join("Notesync"),
            notes_dir: data_dir.join("notes"),
            poll_interval: 300,
            autosave_debounce_ms: 1500,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1_000,
            max_delay_ms: 60_000,
        }
    }
}

impl Default for ConflictsConfig {
    fn default() -> Self {
        Self {
            default_strategy: "manual".to_string(),
            decision_timeout_secs: 120,
            timeout_strategy: "none".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Config::validate()
// ---------------------------------------------------------------------------

/// A single validation error found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path to the offending field, e.g. `"sync.poll_interval"`.
    pub field: String,
    /// Human-readable explanation.
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Valid values for `logging.level`.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Valid values for `conflicts.default_strategy`.
const VALID_CONFLICT_STRATEGIES: &[&str] = &["manual", "keep_local", "keep_remote", "merge"];

/// Valid values for `conflicts.timeout_strategy`.
const VALID_TIMEOUT_STRATEGIES: &[&str] = &["none", "keep_local", "keep_remote", "merge"];

impl Config {
    /// Validate the configuration and return all errors found.
    ///
    /// An empty vector means the configuration is valid.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        let mut push = |field: &str, message: String| {
            errors.push(ValidationError {
                field: field.into(),
                message,
            });
        };

        // --- sync ---
        if self.sync.provider.trim().is_empty() {
            push("sync.provider", "must not be empty".into());
        }
        if self.sync.poll_interval == 0 {
            push("sync.poll_interval", "must be greater than 0".into());
        }
        if self.sync.autosave_debounce_ms == 0 {
            push("sync.autosave_debounce_ms", "must be greater than 0".into());
        }

        // --- retry ---
        if self.retry.max_attempts == 0 {
            push("retry.max_attempts", "must be greater than 0".into());
        }
        if self.retry.initial_delay_ms == 0 {
            push("retry.initial_delay_ms", "must be greater than 0".into());
        }
        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            push(
                "retry.max_delay_ms",
                format!(
                    "must be at least retry.initial_delay_ms ({})",
                    self.retry.initial_delay_ms
                ),
            );
        }

        // --- conflicts ---
        if !VALID_CONFLICT_STRATEGIES.contains(&self.conflicts.default_strategy.as_str()) {
            push(
                "conflicts.default_strategy",
                format!(
                    "invalid strategy '{}'; valid: {}",
                    self.conflicts.default_strategy,
                    VALID_CONFLICT_STRATEGIES.join(", ")
                ),
            );
        }
        if !VALID_TIMEOUT_STRATEGIES.contains(&self.conflicts.timeout_strategy.as_str()) {
            push(
                "conflicts.timeout_strategy",
                format!(
                    "invalid strategy '{}'; valid: {}",
                    self.conflicts.timeout_strategy,
                    VALID_TIMEOUT_STRATEGIES.join(", ")
                ),
            );
        }
        if self.conflicts.decision_timeout_secs == 0 {
            push("conflicts.decision_timeout_secs", "must be greater than 0".into());
        }

        // --- logging ---
        if !VALID_LOG_LEVELS.contains(&self.logging.level.as_str()) {
            push(
                "logging.level",
                format!(
                    "invalid level '{}'; valid: {}",
                    self.logging.level,
                    VALID_LOG_LEVELS.join(", ")
                ),
            );
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_empty(), "{:?}", config.validate());
    }

    #[test]
    fn test_default_retry_values() {
        let retry = RetryConfig::default();
        assert_eq!(retry.max_attempts, 3);
        assert_eq!(retry.initial_delay(), Duration::from_secs(1));
        assert_eq!(retry.max_delay(), Duration::from_secs(60));
    }

    #[test]
    fn test_validate_reports_every_bad_field() {
        let mut config = Config::default();
        config.sync.poll_interval = 0;
        config.retry.max_attempts = 0;
        config.conflicts.default_strategy = "keep_both".into();
        config.logging.level = "verbose".into();

        let fields: Vec<String> = config.validate().into_iter().map(|e| e.field).collect();
        assert!(fields.contains(&"sync.poll_interval".to_string()));
        assert!(fields.contains(&"retry.max_attempts".to_string()));
        assert!(fields.contains(&"conflicts.default_strategy".to_string()));
        assert!(fields.contains(&"logging.level".to_string()));
    }

    #[test]
    fn test_validate_max_delay_below_initial() {
        let mut config = Config::default();
        config.retry.initial_delay_ms = 5_000;
        config.retry.max_delay_ms = 1_000;
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "retry.max_delay_ms");
    }

    #[test]
    fn test_decision_timeout() {
        let conflicts = ConflictsConfig::default();
        assert_eq!(conflicts.decision_timeout(), Duration::from_secs(120));
    }

    #[test]
    fn test_load_partial_yaml_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "sync:\n  provider: dropbox\n  poll_interval: 60\nconflicts:\n  default_strategy: keep_remote"
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.sync.provider, "dropbox");
        assert_eq!(config.sync.poll_interval, 60);
        assert_eq!(config.sync.autosave_debounce_ms, 1500);
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.conflicts.default_strategy, "keep_remote");
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("missing.yaml"));
        assert_eq!(config.sync.provider, "folder");
    }

    #[test]
    fn test_default_path_ends_with_config_yaml() {
        let path = Config::default_path();
        assert!(path.ends_with("notesync/config.yaml"));
    }
}
