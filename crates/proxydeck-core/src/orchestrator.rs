// ── Connection orchestrator ──
//
// Gatekeeper for provider connections: checks preconditions, owns the
// single attempt slot, dispatches to the right flow and applies the
// outcome to the published account status.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::backend::{CredentialImporter, FilePicker, OAuthBroker};
use crate::config::OrchestratorConfig;
use crate::error::CoreError;
use crate::flow::{FlowOutcome, ImportFlow, OAuthFlow};
use crate::guard::{AttemptGuard, AttemptSlot};
use crate::model::{AuthStatus, ConnectionAttempt, ConnectionKind, Provider, ProxyStatus};
use crate::notify::Notifier;

/// Result of a `connect` request that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectOutcome {
    Connected(AuthStatus),
    Rejected(RejectReason),
    NoFileSelected,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    ProxyNotRunning,
    AttemptInFlight { provider: Provider },
}

// ── Recently connected markers ───────────────────────────────────────

/// Providers connected within the highlight window. Each mark bumps a
/// per-provider generation so only the latest mark's timer clears it.
struct RecentlyConnected {
    set: watch::Sender<BTreeSet<Provider>>,
    generations: Mutex<HashMap<Provider, u64>>,
}

impl RecentlyConnected {
    fn new() -> Self {
        let (set, _) = watch::channel(BTreeSet::new());
        Self {
            set,
            generations: Mutex::new(HashMap::new()),
        }
    }

    fn mark(&self, provider: Provider) -> u64 {
        let generation = {
            let mut generations = self
                .generations
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let generation = generations.entry(provider).or_default();
            *generation += 1;
            *generation
        };
        self.set.send_modify(|set| {
            set.insert(provider);
        });
        generation
    }

    fn clear_if_current(&self, provider: Provider, generation: u64) {
        let current = self
            .generations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&provider)
            .copied();
        if current == Some(generation) {
            self.set.send_if_modified(|set| set.remove(&provider));
        }
    }
}

// ── ConnectionOrchestrator ───────────────────────────────────────────

pub(crate) struct ConnectionOrchestrator {
    broker: Arc<dyn OAuthBroker>,
    importer: Arc<dyn CredentialImporter>,
    picker: Arc<dyn FilePicker>,
    config: OrchestratorConfig,
    proxy_status: watch::Receiver<ProxyStatus>,
    auth: watch::Sender<AuthStatus>,
    attempt: AttemptSlot,
    recent: Arc<RecentlyConnected>,
    notifier: Notifier,
}

impl ConnectionOrchestrator {
    pub(crate) fn new(
        broker: Arc<dyn OAuthBroker>,
        importer: Arc<dyn CredentialImporter>,
        picker: Arc<dyn FilePicker>,
        config: OrchestratorConfig,
        proxy_status: watch::Receiver<ProxyStatus>,
        notifier: Notifier,
    ) -> Self {
        let (auth, _) = watch::channel(AuthStatus::default());
        Self {
            broker,
            importer,
            picker,
            config,
            proxy_status,
            auth,
            attempt: AttemptSlot::new(),
            recent: Arc::new(RecentlyConnected::new()),
            notifier,
        }
    }

    pub(crate) fn auth_status(&self) -> AuthStatus {
        self.auth.borrow().clone()
    }

    pub(crate) fn subscribe_auth(&self) -> watch::Receiver<AuthStatus> {
        self.auth.subscribe()
    }

    pub(crate) fn current_attempt(&self) -> Option<ConnectionAttempt> {
        self.attempt.current()
    }

    pub(crate) fn subscribe_attempt(&self) -> watch::Receiver<Option<ConnectionAttempt>> {
        self.attempt.subscribe()
    }

    pub(crate) fn recently_connected(&self) -> BTreeSet<Provider> {
        self.recent.set.borrow().clone()
    }

    pub(crate) fn subscribe_recent(&self) -> watch::Receiver<BTreeSet<Provider>> {
        self.recent.set.subscribe()
    }

    /// Link `provider`. Precondition failures are `Rejected` outcomes,
    /// not errors; flow failures and timeouts are errors. Cancelling
    /// `cancel` abandons the flow without touching the account status.
    pub(crate) async fn connect(
        &self,
        provider: Provider,
        cancel: &CancellationToken,
    ) -> Result<ConnectOutcome, CoreError> {
        if !self.proxy_status.borrow().running {
            self.notifier.warning(
                "Start proxy first",
                Some("The proxy must be running to connect accounts".into()),
            );
            return Ok(ConnectOutcome::Rejected(RejectReason::ProxyNotRunning));
        }

        let attempt = match self.attempt.try_begin(provider) {
            Ok(guard) => guard,
            Err(holder) => {
                self.notifier.warning(
                    "Connection already in progress",
                    Some(format!("Finish connecting {} first", holder.display_name())),
                );
                return Ok(ConnectOutcome::Rejected(RejectReason::AttemptInFlight {
                    provider: holder,
                }));
            }
        };

        let kind = provider.connection_kind();
        info!(%provider, %kind, "connecting provider");
        let outcome = match kind {
            ConnectionKind::OAuth => {
                self.notifier.info(
                    format!("Connecting to {}...", provider.display_name()),
                    "Complete authentication in your browser",
                );
                OAuthFlow {
                    broker: self.broker.as_ref(),
                    config: &self.config,
                }
                .run(provider, &attempt, cancel)
                .await
            }
            ConnectionKind::Import => {
                self.notifier.info(
                    format!("Import {} credentials", provider.display_name()),
                    "Select your service account JSON file",
                );
                ImportFlow {
                    picker: self.picker.as_ref(),
                    importer: self.importer.as_ref(),
                }
                .run(provider, &attempt)
                .await
            }
        };

        self.finish(provider, outcome, attempt, cancel).await
    }

    async fn finish(
        &self,
        provider: Provider,
        outcome: FlowOutcome,
        attempt: AttemptGuard<'_>,
        cancel: &CancellationToken,
    ) -> Result<ConnectOutcome, CoreError> {
        match outcome {
            FlowOutcome::Succeeded => {
                let refreshed = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        info!(%provider, "connection cancelled during account refresh");
                        return Ok(ConnectOutcome::Cancelled);
                    }
                    refreshed = self.broker.refresh_auth_status() => refreshed,
                };
                let auth = match refreshed {
                    Ok(auth) => auth,
                    Err(e) => {
                        warn!(%provider, error = %e, "account refresh after connect failed");
                        let err = CoreError::remote("Refresh account status", &e);
                        self.notifier
                            .error("Failed to refresh account status", err.to_string());
                        return Err(err);
                    }
                };
                self.auth.send_replace(auth.clone());
                drop(attempt);
                self.mark_recently_connected(provider, cancel);
                info!(%provider, accounts = auth.count(provider), "provider connected");
                let detail = match provider.connection_kind() {
                    ConnectionKind::OAuth => "You can now use this provider",
                    ConnectionKind::Import => "Service account imported successfully",
                };
                self.notifier
                    .success(format!("{} connected!", provider.display_name()), detail);
                Ok(ConnectOutcome::Connected(auth))
            }
            FlowOutcome::TimedOut { attempts } => {
                warn!(%provider, attempts, "oauth flow timed out");
                self.notifier
                    .error("Connection timeout", "Please try again");
                Err(CoreError::Timeout { provider, attempts })
            }
            FlowOutcome::Failed(e) => {
                warn!(%provider, error = %e, "connection flow failed");
                let err = CoreError::remote(format!("Connect {provider}"), &e);
                self.notifier.error("Connection failed", err.to_string());
                Err(err)
            }
            FlowOutcome::Cancelled => {
                info!(%provider, "connection flow cancelled");
                Ok(ConnectOutcome::Cancelled)
            }
            FlowOutcome::NoFileSelected => {
                self.notifier.warning(
                    "No file selected",
                    Some("Choose a service account JSON file".into()),
                );
                Ok(ConnectOutcome::NoFileSelected)
            }
        }
    }

    /// Mark `provider` and clear the mark after the highlight window. A
    /// later mark restarts the window; teardown clears it early.
    fn mark_recently_connected(&self, provider: Provider, cancel: &CancellationToken) {
        let generation = self.recent.mark(provider);
        let recent = Arc::clone(&self.recent);
        let window = self.config.highlight_duration;
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {}
                () = tokio::time::sleep(window) => {}
            }
            recent.clear_if_current(provider, generation);
        });
    }

    /// Remove every account of `provider`, then re-read the account status.
    pub(crate) async fn disconnect(&self, provider: Provider) -> Result<AuthStatus, CoreError> {
        if let Err(e) = self.broker.disconnect_provider(provider).await {
            warn!(%provider, error = %e, "disconnect failed");
            let err = CoreError::remote(format!("Disconnect {provider}"), &e);
            self.notifier.error("Failed to disconnect", err.to_string());
            return Err(err);
        }
        let auth = self.refresh_auth().await?;
        info!(%provider, "provider disconnected");
        self.notifier.success(
            format!("{} disconnected", provider.display_name()),
            "All linked accounts were removed",
        );
        Ok(auth)
    }

    pub(crate) async fn refresh_auth(&self) -> Result<AuthStatus, CoreError> {
        match self.broker.refresh_auth_status().await {
            Ok(auth) => {
                self.auth.send_replace(auth.clone());
                Ok(auth)
            }
            Err(e) => {
                warn!(error = %e, "account status refresh failed");
                let err = CoreError::remote("Refresh account status", &e);
                self.notifier
                    .error("Failed to refresh account status", err.to_string());
                Err(err)
            }
        }
    }
}
