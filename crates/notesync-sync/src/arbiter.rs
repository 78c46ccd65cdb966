//! Conflict arbitration
//!
//! Turns a detected [`SyncConflict`] into a [`SyncConflictResolution`]:
//! either straight from an automatic policy, or by asking the observer and
//! waiting (bounded) for its answer.

use std::sync::Arc;

use notesync_conflict::ConflictPolicy;
use notesync_core::domain::{SyncConflict, SyncConflictResolution};
use notesync_core::ports::{ConflictRequest, ISyncObserver, ResolutionResponder};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::SyncError;

pub struct ConflictArbiter {
    observer: Arc<dyn ISyncObserver>,
    policy: ConflictPolicy,
}

impl ConflictArbiter {
    pub fn new(observer: Arc<dyn ISyncObserver>, policy: ConflictPolicy) -> Self {
        Self { observer, policy }
    }

    pub fn policy(&self) -> &ConflictPolicy {
        &self.policy
    }

    /// Obtains a decision for `conflict`
    ///
    /// A missing answer (timeout, or the responder being dropped) yields the
    /// policy's timeout resolution. Fails only with [`SyncError::Cancelled`].
    pub async fn decide(
        &self,
        conflict: &SyncConflict,
        cancel: &CancellationToken,
    ) -> Result<SyncConflictResolution, SyncError> {
        let note_id = conflict.note_id();

        if let Some(resolution) = self.policy.auto_resolution() {
            debug!(%note_id, %resolution, "Conflict resolved by policy");
            return Ok(resolution);
        }

        let (responder, answer) = ResolutionResponder::channel();
        self.observer.on_conflict(ConflictRequest {
            conflict: conflict.clone(),
            responder,
        });
        info!(%note_id, "Waiting for conflict decision");

        let fallback = self.policy.timeout_resolution();
        tokio::select! {
            _ = cancel.cancelled() => Err(SyncError::Cancelled),
            outcome = tokio::time::timeout(self.policy.decision_timeout(), answer) => {
                match outcome {
                    Ok(Ok(resolution)) => {
                        info!(%note_id, %resolution, "Conflict decision received");
                        Ok(resolution)
                    }
                    Ok(Err(_)) => {
                        warn!(%note_id, %fallback, "Conflict request dropped without an answer");
                        Ok(fallback)
                    }
                    Err(_) => {
                        warn!(%note_id, %fallback, "Timed out waiting for conflict decision");
                        Ok(fallback)
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use chrono::Utc;
    use notesync_core::domain::{Note, NoteId};

    use super::*;

    fn conflict() -> SyncConflict {
        let now = Utc::now();
        let id = NoteId::new();
        let local = Note::from_parts(id, "t", "local", now, now, Some(now), 1);
        let remote = Note::from_parts(id, "t", "remote", now, now, Some(now), 1);
        SyncConflict::new(local, remote)
    }

    /// Answers every request with a fixed resolution
    struct Answering(SyncConflictResolution);

    impl ISyncObserver for Answering {
        fn on_conflict(&self, request: ConflictRequest) {
            request.resolve(self.0);
        }
    }

    /// Keeps requests around without answering them
    #[derive(Default)]
    struct Hoarding(Mutex<Vec<ConflictRequest>>);

    impl ISyncObserver for Hoarding {
        fn on_conflict(&self, request: ConflictRequest) {
            self.0.lock().unwrap().push(request);
        }
    }

    /// Drops requests immediately
    struct Ignoring;

    impl ISyncObserver for Ignoring {}

    #[tokio::test]
    async fn test_observer_answer_is_used() {
        let arbiter = ConflictArbiter::new(
            Arc::new(Answering(SyncConflictResolution::Merge)),
            ConflictPolicy::manual(Duration::from_secs(5)),
        );
        let resolution = arbiter
            .decide(&conflict(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution, SyncConflictResolution::Merge);
    }

    #[tokio::test]
    async fn test_automatic_policy_skips_observer() {
        let observer = Arc::new(Hoarding::default());
        let arbiter = ConflictArbiter::new(
            observer.clone(),
            ConflictPolicy::automatic(SyncConflictResolution::KeepLocal),
        );
        let resolution = arbiter
            .decide(&conflict(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution, SyncConflictResolution::KeepLocal);
        assert!(observer.0.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let observer = Arc::new(Hoarding::default());
        let arbiter = ConflictArbiter::new(
            observer.clone(),
            ConflictPolicy::manual(Duration::from_secs(30))
                .with_timeout_resolution(SyncConflictResolution::KeepRemote),
        );
        let resolution = arbiter
            .decide(&conflict(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution, SyncConflictResolution::KeepRemote);
        assert_eq!(observer.0.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dropped_request_falls_back_to_none() {
        let arbiter = ConflictArbiter::new(
            Arc::new(Ignoring),
            ConflictPolicy::manual(Duration::from_secs(30)),
        );
        let resolution = arbiter
            .decide(&conflict(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(resolution, SyncConflictResolution::None);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting() {
        let arbiter = ConflictArbiter::new(
            Arc::new(Hoarding::default()),
            ConflictPolicy::manual(Duration::from_secs(300)),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = arbiter.decide(&conflict(), &cancel).await.unwrap_err();
        assert!(matches!(err, SyncError::Cancelled));
    }
}
