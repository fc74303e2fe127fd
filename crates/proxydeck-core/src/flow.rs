// ── Connection flows ──
//
// The two ways a provider gets linked. Flows only drive the external
// collaborators and report progress through the attempt guard; the
// orchestrator decides what a terminal outcome means for shared state.

use std::path::PathBuf;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::backend::{CredentialImporter, FileFilter, FilePicker, OAuthBroker};
use crate::config::OrchestratorConfig;
use crate::error::BackendError;
use crate::guard::AttemptGuard;
use crate::model::{FlowPhase, Provider};

/// Terminal result of one flow run.
#[derive(Debug)]
pub(crate) enum FlowOutcome {
    Succeeded,
    TimedOut { attempts: u32 },
    Failed(BackendError),
    /// The consumer was torn down mid-flow.
    Cancelled,
    /// The file picker was dismissed.
    NoFileSelected,
}

// ── OAuth ────────────────────────────────────────────────────────────

pub(crate) struct OAuthFlow<'a> {
    pub(crate) broker: &'a dyn OAuthBroker,
    pub(crate) config: &'a OrchestratorConfig,
}

impl OAuthFlow<'_> {
    /// Request authorization, then poll once per interval until the broker
    /// reports completion or the ceiling is reached.
    ///
    /// Polls are strictly sequential: the next tick is not awaited until
    /// the previous check resolves, and missed ticks are delayed rather
    /// than bursted. An erroring check is logged and counted.
    pub(crate) async fn run(
        &self,
        provider: Provider,
        attempt: &AttemptGuard<'_>,
        cancel: &CancellationToken,
    ) -> FlowOutcome {
        attempt.update(|a| a.phase = FlowPhase::Requesting);

        let opened = tokio::select! {
            biased;
            () = cancel.cancelled() => return FlowOutcome::Cancelled,
            opened = self.broker.open_oauth(provider) => opened,
        };
        let token = match opened {
            Ok(token) => token,
            Err(e) => return FlowOutcome::Failed(e),
        };
        debug!(%provider, %token, "oauth authorization opened");
        attempt.update(|a| {
            a.flow_token = Some(token.clone());
            a.phase = FlowPhase::Polling;
        });

        let mut interval = tokio::time::interval(self.config.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; polling starts one interval in.
        interval.tick().await;

        let mut attempts: u32 = 0;
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => return FlowOutcome::Cancelled,
                _ = interval.tick() => {}
            }

            attempts += 1;
            attempt.update(|a| a.attempts_made = attempts);

            let polled = tokio::select! {
                biased;
                () = cancel.cancelled() => return FlowOutcome::Cancelled,
                polled = self.broker.poll_oauth_status(&token) => polled,
            };
            match polled {
                Ok(true) => {
                    debug!(%provider, attempts, "oauth authorization complete");
                    return FlowOutcome::Succeeded;
                }
                Ok(false) => {}
                Err(e) => warn!(%provider, attempts, error = %e, "oauth status check failed"),
            }

            if attempts >= self.config.max_poll_attempts {
                return FlowOutcome::TimedOut { attempts };
            }
        }
    }
}

// ── Import ───────────────────────────────────────────────────────────

pub(crate) struct ImportFlow<'a> {
    pub(crate) picker: &'a dyn FilePicker,
    pub(crate) importer: &'a dyn CredentialImporter,
}

impl ImportFlow<'_> {
    /// Ask for a JSON credential file and register it. Runs to completion;
    /// only the OAuth timer is cancellable.
    pub(crate) async fn run(&self, provider: Provider, attempt: &AttemptGuard<'_>) -> FlowOutcome {
        attempt.update(|a| a.phase = FlowPhase::AwaitingFileSelection);

        let path: PathBuf = match self.picker.pick_file(&[FileFilter::json()]).await {
            Ok(Some(path)) => path,
            Ok(None) => return FlowOutcome::NoFileSelected,
            Err(e) => return FlowOutcome::Failed(e),
        };

        attempt.update(|a| a.phase = FlowPhase::Importing);
        debug!(%provider, path = %path.display(), "importing credential file");
        match self.importer.import_credential(provider, &path).await {
            Ok(()) => FlowOutcome::Succeeded,
            Err(e) => FlowOutcome::Failed(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::guard::AttemptSlot;
    use crate::testing::{FakeBroker, FakeImporter, FakePicker};

    #[tokio::test(start_paused = true)]
    async fn never_completing_flow_polls_exactly_ceiling_times() {
        let broker = FakeBroker::never_completes();
        let config = OrchestratorConfig::default();
        let slot = AttemptSlot::new();
        let guard = slot.try_begin(Provider::Claude).unwrap();
        let cancel = CancellationToken::new();

        let outcome = OAuthFlow {
            broker: &broker,
            config: &config,
        }
        .run(Provider::Claude, &guard, &cancel)
        .await;

        assert!(matches!(outcome, FlowOutcome::TimedOut { attempts: 120 }));
        assert_eq!(broker.poll_count(), 120);
        let times = broker.poll_times();
        for pair in times.windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::from_secs(1));
        }
        assert_eq!(slot.current().unwrap().attempts_made, 120);
    }

    #[tokio::test(start_paused = true)]
    async fn erroring_polls_still_count_toward_ceiling() {
        let broker = FakeBroker::never_completes();
        broker.fail_polls(1..=5);
        let config = OrchestratorConfig {
            max_poll_attempts: 5,
            ..OrchestratorConfig::default()
        };
        let slot = AttemptSlot::new();
        let guard = slot.try_begin(Provider::Qwen).unwrap();

        let outcome = OAuthFlow {
            broker: &broker,
            config: &config,
        }
        .run(Provider::Qwen, &guard, &CancellationToken::new())
        .await;

        assert!(matches!(outcome, FlowOutcome::TimedOut { attempts: 5 }));
        assert_eq!(broker.poll_count(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let broker = Arc::new(FakeBroker::never_completes());
        let config = OrchestratorConfig::default();
        let slot = Arc::new(AttemptSlot::new());
        let cancel = CancellationToken::new();

        let task = tokio::spawn({
            let broker = Arc::clone(&broker);
            let slot = Arc::clone(&slot);
            let cancel = cancel.clone();
            async move {
                let guard = slot.try_begin(Provider::Gemini).unwrap();
                OAuthFlow {
                    broker: broker.as_ref(),
                    config: &config,
                }
                .run(Provider::Gemini, &guard, &cancel)
                .await
            }
        });

        tokio::time::sleep(Duration::from_millis(5_500)).await;
        assert_eq!(broker.poll_count(), 5);
        cancel.cancel();

        let outcome = task.await.unwrap();
        assert!(matches!(outcome, FlowOutcome::Cancelled));
        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(broker.poll_count(), 5);
        assert!(slot.current().is_none());
    }

    #[tokio::test]
    async fn dismissed_picker_imports_nothing() {
        let broker = Arc::new(FakeBroker::default());
        let importer = FakeImporter::linked_to(Arc::clone(&broker));
        let picker = FakePicker::dismissed();
        let slot = AttemptSlot::new();
        let guard = slot.try_begin(Provider::Vertex).unwrap();

        let outcome = ImportFlow {
            picker: &picker,
            importer: &importer,
        }
        .run(Provider::Vertex, &guard)
        .await;

        assert!(matches!(outcome, FlowOutcome::NoFileSelected));
        assert!(importer.imports().is_empty());
        assert_eq!(picker.requests(), vec![vec![FileFilter::json()]]);
    }

    #[tokio::test]
    async fn picked_file_is_imported_once() {
        let broker = Arc::new(FakeBroker::default());
        let importer = FakeImporter::linked_to(Arc::clone(&broker));
        let picker = FakePicker::answering("/tmp/sa.json");
        let slot = AttemptSlot::new();
        let guard = slot.try_begin(Provider::Vertex).unwrap();

        let outcome = ImportFlow {
            picker: &picker,
            importer: &importer,
        }
        .run(Provider::Vertex, &guard)
        .await;

        assert!(matches!(outcome, FlowOutcome::Succeeded));
        assert_eq!(
            importer.imports(),
            vec![(Provider::Vertex, PathBuf::from("/tmp/sa.json"))]
        );
    }
}
