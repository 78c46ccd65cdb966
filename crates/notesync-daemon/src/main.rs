//! Notesync Daemon - Background note synchronization service
//!
//! Loads the configuration, opens the local note directory, connects the
//! configured remote store provider, and then either runs a single full
//! pass (`--once`) or keeps syncing on a timer until SIGTERM/SIGINT.
//!
//! On Unix, SIGUSR1 triggers an immediate full pass.

mod folder_store;
mod note_directory;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use notesync_core::config::Config;
use notesync_core::domain::{SyncConflict, SyncConflictResolution};
use notesync_core::ports::{
    ConflictRequest, IRemoteStore, ISyncObserver, ProviderId, RemoteStoreRegistry, SyncProgress,
};
use notesync_sync::scheduler::{SchedulerEvent, SyncScheduler};
use notesync_sync::SyncEngine;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::folder_store::FolderRemoteStore;
use crate::note_directory::NoteDirectory;

/// Provider id of the built-in folder store
const FOLDER_PROVIDER: &str = "folder";

#[derive(Debug, Parser)]
#[command(name = "notesyncd", version, about = "Notesync background sync daemon")]
struct Args {
    /// Configuration file (defaults to the platform config directory)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Run one full pass, print the result as JSON, and exit
    #[arg(long)]
    once: bool,
}

// ============================================================================
// Observer
// ============================================================================

/// Headless observer: logs progress and leaves conflicts to the policy
///
/// Dropping a conflict request makes the engine fall back to the configured
/// timeout strategy right away.
struct LogObserver;

impl ISyncObserver for LogObserver {
    fn on_progress(&self, progress: &SyncProgress) {
        debug!(
            operation = %progress.operation,
            percent = progress.percent_complete,
            processed = progress.items_processed,
            total = progress.total_items,
            "{}",
            progress.message
        );
    }

    fn on_conflict(&self, request: ConflictRequest) {
        warn!(
            note_id = %request.conflict.note_id(),
            "Conflict needs a decision; no interactive client, applying timeout strategy"
        );
    }

    fn on_conflict_resolved(&self, conflict: &SyncConflict, resolution: SyncConflictResolution) {
        info!(note_id = %conflict.note_id(), %resolution, "Conflict resolved");
    }
}

// ============================================================================
// Setup
// ============================================================================

fn load_config(args: &Args) -> Result<Config> {
    let config = match &args.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load_or_default(&Config::default_path()),
    };

    let errors = config.validate();
    if !errors.is_empty() {
        let listed: Vec<String> = errors.iter().map(ToString::to_string).collect();
        anyhow::bail!("Invalid configuration: {}", listed.join("; "));
    }
    Ok(config)
}

fn init_tracing(config: &Config) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    if config.logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}

fn build_registry(config: &Config) -> RemoteStoreRegistry {
    let remote_root = config.sync.remote_root.clone();
    let mut registry = RemoteStoreRegistry::new();
    if let Ok(id) = ProviderId::new(FOLDER_PROVIDER) {
        registry.register(id, move || {
            Ok(Box::new(FolderRemoteStore::new(remote_root.clone())) as Box<dyn IRemoteStore>)
        });
    }
    registry
}

fn build_engine(config: &Config) -> Result<SyncEngine> {
    let notes = Arc::new(NoteDirectory::new(config.sync.notes_dir.clone()));
    let engine = SyncEngine::new(
        notes,
        build_registry(config),
        Arc::new(LogObserver),
        config,
    )?;
    Ok(engine)
}

// ============================================================================
// Signals
// ============================================================================

/// Waits for SIGTERM or SIGINT and triggers the cancellation token
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}

/// Forwards SIGUSR1 as a "sync now" request
#[cfg(unix)]
async fn sync_now_signal(events: mpsc::Sender<SchedulerEvent>, shutdown: CancellationToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 = match signal(SignalKind::user_defined1()) {
        Ok(signal) => signal,
        Err(e) => {
            warn!(error = %e, "SIGUSR1 unavailable; sync-now requests disabled");
            return;
        }
    };
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            received = usr1.recv() => {
                if received.is_none() {
                    break;
                }
                info!("Received SIGUSR1, requesting full sync");
                if events.send(SchedulerEvent::SyncNow).await.is_err() {
                    break;
                }
            }
        }
    }
}

#[cfg(not(unix))]
async fn sync_now_signal(_events: mpsc::Sender<SchedulerEvent>, shutdown: CancellationToken) {
    shutdown.cancelled().await;
}

// ============================================================================
// Main entry point
// ============================================================================

async fn run(config: Config, once: bool) -> Result<bool> {
    let engine = Arc::new(build_engine(&config)?);
    let provider = ProviderId::new(&config.sync.provider)?;
    if !engine.connect(&provider).await {
        anyhow::bail!("Could not connect to remote store provider '{provider}'");
    }

    if once {
        let result = engine.sync_all().await;
        println!("{}", serde_json::to_string_pretty(&result)?);
        engine.disconnect().await;
        return Ok(result.success());
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(shutdown_signal(shutdown.clone()));

    let (events_tx, events_rx) = mpsc::channel(64);
    tokio::spawn(sync_now_signal(events_tx.clone(), shutdown.clone()));

    let scheduler = SyncScheduler::new(
        engine.clone(),
        events_rx,
        Duration::from_millis(config.sync.autosave_debounce_ms),
        Duration::from_secs(config.sync.poll_interval),
    );
    scheduler.run(shutdown).await;
    drop(events_tx);

    engine.disconnect().await;
    Ok(true)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    init_tracing(&config);

    info!(
        provider = %config.sync.provider,
        notes_dir = %config.sync.notes_dir.display(),
        "Notesync daemon starting (notesyncd)"
    );

    match run(config, args.once).await {
        Ok(true) => {
            info!("Notesync daemon shut down gracefully");
            Ok(())
        }
        Ok(false) => {
            error!("Sync pass failed");
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Notesync daemon exiting with error");
            Err(e)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
