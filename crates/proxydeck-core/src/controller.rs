// ── Controller facade ──
//
// Single entry point for consumers. Owns the proxy lifecycle, the
// connection orchestrator and (while open) the credential workspace,
// routes typed commands, and vends snapshot streams and notifications.

use std::collections::BTreeSet;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::backend::{Backends, ProviderTestResult};
use crate::command::{Command, CommandEnvelope, CommandResult, CredentialDraft};
use crate::config::OrchestratorConfig;
use crate::credentials::{CredentialWorkspace, TestTarget};
use crate::error::CoreError;
use crate::lifecycle::{LifecycleOutcome, ProxyLifecycle};
use crate::model::{
    ApiKey, AuthStatus, ConnectionAttempt, CredentialKind, CredentialRecord, Provider,
    ProxyStatus,
};
use crate::notify::{Notification, Notifier};
use crate::orchestrator::{ConnectOutcome, ConnectionOrchestrator};
use crate::stream::SnapshotStream;

const COMMAND_CHANNEL_SIZE: usize = 64;

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. A consumer session is
/// represented by a child cancellation token: [`detach()`](Self::detach)
/// cancels it, which abandons any running OAuth flow and drops the
/// credential workspace, then installs a fresh token for the next
/// session.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: OrchestratorConfig,
    backends: Backends,
    notifier: Notifier,
    lifecycle: ProxyLifecycle,
    orchestrator: ConnectionOrchestrator,
    credentials: Mutex<Option<Arc<CredentialWorkspace>>>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    /// Child token for the current consumer session; cancelled on detach,
    /// replaced so the controller stays usable.
    cancel_child: Mutex<CancellationToken>,
}

impl Controller {
    pub fn new(backends: Backends, config: OrchestratorConfig) -> Self {
        let notifier = Notifier::new();
        let lifecycle = ProxyLifecycle::new(Arc::clone(&backends.proxy), notifier.clone());
        let orchestrator = ConnectionOrchestrator::new(
            Arc::clone(&backends.broker),
            Arc::clone(&backends.importer),
            Arc::clone(&backends.picker),
            config.clone(),
            lifecycle.subscribe(),
            notifier.clone(),
        );
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let cancel_child = cancel.child_token();

        Self {
            inner: Arc::new(ControllerInner {
                config,
                backends,
                notifier,
                lifecycle,
                orchestrator,
                credentials: Mutex::new(None),
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel,
                cancel_child: Mutex::new(cancel_child),
            }),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.inner.config
    }

    // ── Session ──────────────────────────────────────────────────────

    /// Read the proxy status and, if it is running, the account counts.
    pub async fn sync(&self) -> Result<ProxyStatus, CoreError> {
        let status = self.inner.lifecycle.refresh().await?;
        if status.running {
            self.inner.orchestrator.refresh_auth().await?;
        }
        Ok(status)
    }

    /// Tear down the current consumer session.
    pub async fn detach(&self) {
        let mut child = self.inner.cancel_child.lock().await;
        child.cancel();
        *child = self.inner.cancel.child_token();
        drop(child);
        self.close_credentials().await;
        debug!("consumer session detached");
    }

    /// Stop everything this controller spawned.
    pub fn shutdown(&self) {
        self.inner.cancel.cancel();
    }

    async fn session_token(&self) -> CancellationToken {
        self.inner.cancel_child.lock().await.clone()
    }

    // ── Proxy lifecycle ──────────────────────────────────────────────

    pub async fn toggle_proxy(&self) -> Result<LifecycleOutcome, CoreError> {
        self.inner.lifecycle.toggle().await
    }

    pub async fn start_proxy(&self) -> Result<LifecycleOutcome, CoreError> {
        self.inner.lifecycle.start().await
    }

    pub async fn stop_proxy(&self) -> Result<LifecycleOutcome, CoreError> {
        self.inner.lifecycle.stop().await
    }

    pub async fn refresh_proxy_status(&self) -> Result<ProxyStatus, CoreError> {
        self.inner.lifecycle.refresh().await
    }

    // ── Connections ──────────────────────────────────────────────────

    pub async fn connect(&self, provider: Provider) -> Result<ConnectOutcome, CoreError> {
        let cancel = self.session_token().await;
        self.inner.orchestrator.connect(provider, &cancel).await
    }

    pub async fn disconnect(&self, provider: Provider) -> Result<AuthStatus, CoreError> {
        self.inner.orchestrator.disconnect(provider).await
    }

    pub async fn refresh_auth_status(&self) -> Result<AuthStatus, CoreError> {
        self.inner.orchestrator.refresh_auth().await
    }

    // ── Credentials ──────────────────────────────────────────────────

    /// Create and hydrate a fresh credential workspace, replacing any
    /// open one. Fails without opening if the proxy is not running or
    /// loading fails.
    pub async fn open_credentials(&self) -> Result<Arc<CredentialWorkspace>, CoreError> {
        let workspace = Arc::new(CredentialWorkspace::new(
            &self.inner.backends.store,
            Arc::clone(&self.inner.backends.tester),
            self.inner.lifecycle.subscribe(),
            self.inner.notifier.clone(),
        ));
        workspace.hydrate().await?;
        *self.inner.credentials.lock().await = Some(Arc::clone(&workspace));
        info!("credential workspace opened");
        Ok(workspace)
    }

    /// The open workspace.
    pub async fn credentials(&self) -> Result<Arc<CredentialWorkspace>, CoreError> {
        self.inner
            .credentials
            .lock()
            .await
            .clone()
            .ok_or(CoreError::WorkspaceClosed)
    }

    /// Discard the open workspace, mirrors and edit buffer included.
    pub async fn close_credentials(&self) {
        if self.inner.credentials.lock().await.take().is_some() {
            debug!("credential workspace closed");
        }
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub fn proxy_status(&self) -> ProxyStatus {
        self.inner.lifecycle.status()
    }

    pub fn is_toggling(&self) -> bool {
        self.inner.lifecycle.is_toggling()
    }

    pub fn auth_status(&self) -> AuthStatus {
        self.inner.orchestrator.auth_status()
    }

    pub fn connection_attempt(&self) -> Option<ConnectionAttempt> {
        self.inner.orchestrator.current_attempt()
    }

    pub fn recently_connected(&self) -> BTreeSet<Provider> {
        self.inner.orchestrator.recently_connected()
    }

    pub fn proxy_status_stream(&self) -> SnapshotStream<ProxyStatus> {
        SnapshotStream::new(self.inner.lifecycle.subscribe())
    }

    pub fn auth_status_stream(&self) -> SnapshotStream<AuthStatus> {
        SnapshotStream::new(self.inner.orchestrator.subscribe_auth())
    }

    pub fn connection_attempt_stream(&self) -> SnapshotStream<Option<ConnectionAttempt>> {
        SnapshotStream::new(self.inner.orchestrator.subscribe_attempt())
    }

    pub fn recently_connected_stream(&self) -> SnapshotStream<BTreeSet<Provider>> {
        SnapshotStream::new(self.inner.orchestrator.subscribe_recent())
    }

    pub fn notifications(&self) -> broadcast::Receiver<Arc<Notification>> {
        self.inner.notifier.subscribe()
    }

    // ── Command routing ──────────────────────────────────────────────

    /// Send a command through the command channel and wait for its result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        self.ensure_processor().await;

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Internal("command processor stopped".into()))?;

        rx.await
            .map_err(|_| CoreError::Internal("command dropped before completion".into()))?
    }

    async fn ensure_processor(&self) {
        let Some(rx) = self.inner.command_rx.lock().await.take() else {
            return;
        };
        tokio::spawn(command_processor_task(self.clone(), rx));
    }
}

// ── Background tasks ─────────────────────────────────────────────────

async fn command_processor_task(controller: Controller, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = controller.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let controller = controller.clone();
                tokio::spawn(async move {
                    let result = route_command(&controller, envelope.command).await;
                    let _ = envelope.response_tx.send(result);
                });
            }
        }
    }
}

async fn route_command(controller: &Controller, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::ToggleProxy => controller.toggle_proxy().await.map(CommandResult::Lifecycle),
        Command::StartProxy => controller.start_proxy().await.map(CommandResult::Lifecycle),
        Command::StopProxy => controller.stop_proxy().await.map(CommandResult::Lifecycle),
        Command::RefreshProxyStatus => controller
            .refresh_proxy_status()
            .await
            .map(CommandResult::ProxyStatus),

        Command::Connect { provider } => controller.connect(provider).await.map(CommandResult::Connect),
        Command::Disconnect { provider } => controller
            .disconnect(provider)
            .await
            .map(CommandResult::AuthStatus),
        Command::RefreshAuthStatus => controller
            .refresh_auth_status()
            .await
            .map(CommandResult::AuthStatus),

        Command::AddCredential(draft) => {
            let ws = controller.credentials().await?;
            match draft {
                CredentialDraft::Gemini(r) => credentials(ws.gemini().add(r).await),
                CredentialDraft::Claude(r) => credentials(ws.claude().add(r).await),
                CredentialDraft::Codex(r) => credentials(ws.codex().add(r).await),
                CredentialDraft::OpenAiCompatible(r) => credentials(ws.openai().add(r).await),
            }
        }
        Command::RemoveCredential { kind, index } => {
            let ws = controller.credentials().await?;
            match kind {
                CredentialKind::Gemini => credentials(ws.gemini().remove(index).await),
                CredentialKind::Claude => credentials(ws.claude().remove(index).await),
                CredentialKind::Codex => credentials(ws.codex().remove(index).await),
                CredentialKind::OpenAiCompatible => credentials(ws.openai().remove(index).await),
            }
        }
        Command::SaveCredentials { kind } => {
            let ws = controller.credentials().await?;
            match kind {
                CredentialKind::Gemini => credentials(ws.gemini().save_all().await),
                CredentialKind::Claude => credentials(ws.claude().save_all().await),
                CredentialKind::Codex => credentials(ws.codex().save_all().await),
                CredentialKind::OpenAiCompatible => credentials(ws.openai().save_all().await),
            }
        }
        Command::UpdateProvider { index, provider } => {
            let ws = controller.credentials().await?;
            credentials(ws.openai().update(index, provider).await)
        }
        Command::AddModel {
            provider_index,
            name,
        } => {
            let ws = controller.credentials().await?;
            credentials(ws.openai().add_model(provider_index, &name).await)
        }
        Command::RemoveModel {
            provider_index,
            model_index,
        } => {
            let ws = controller.credentials().await?;
            credentials(ws.openai().remove_model(provider_index, model_index).await)
        }
        Command::TestProvider {
            target,
            base_url,
            api_key,
        } => test_provider(controller, target, &base_url, &api_key).await,
    }
}

fn credentials<R: CredentialRecord>(
    result: Result<Arc<Vec<R>>, CoreError>,
) -> Result<CommandResult, CoreError> {
    result.map(|records| CommandResult::Credentials(R::into_set(records.to_vec())))
}

async fn test_provider(
    controller: &Controller,
    target: TestTarget,
    base_url: &str,
    api_key: &ApiKey,
) -> Result<CommandResult, CoreError> {
    let ws = controller.credentials().await?;
    let result: Option<ProviderTestResult> = ws.test_provider(target, base_url, api_key).await?;
    Ok(CommandResult::ProviderTest(result))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{CredentialSet, GeminiKey};
    use crate::notify::NotificationLevel;
    use crate::orchestrator::RejectReason;
    use crate::model::{ApiKeyEntry, OpenAiCompatProvider};
    use crate::testing::{FakeBroker, FakePicker, FakeProxy, FakeStore, FakeTester, Fakes};

    fn controller(fakes: &Fakes) -> Controller {
        Controller::new(fakes.backends(), OrchestratorConfig::default())
    }

    #[tokio::test]
    async fn sync_reads_status_and_accounts() {
        let fakes = Fakes::new(FakeBroker::default());
        fakes
            .broker
            .seed(AuthStatus::from_counts([(Provider::Claude, 1)]));
        let ctrl = controller(&fakes);

        assert!(!ctrl.sync().await.unwrap().running);
        assert_eq!(fakes.broker.refresh_calls(), 0);

        ctrl.start_proxy().await.unwrap();
        assert!(ctrl.sync().await.unwrap().running);
        assert_eq!(ctrl.auth_status().count(Provider::Claude), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_commands_share_one_guard() {
        let fakes = Fakes::new(FakeBroker::default());
        let slow = Arc::new(FakeProxy::with_latency(Duration::from_millis(300)));
        let ctrl = Controller::new(
            Backends {
                proxy: slow.clone(),
                ..fakes.backends()
            },
            OrchestratorConfig::default(),
        );

        let (a, b) = tokio::join!(
            ctrl.execute(Command::ToggleProxy),
            ctrl.execute(Command::ToggleProxy)
        );
        let outcomes = [a.unwrap(), b.unwrap()];
        assert_eq!(slow.start_calls(), 1);
        assert!(outcomes.contains(&CommandResult::Lifecycle(LifecycleOutcome::InFlight)));
        assert!(ctrl.proxy_status().running);
    }

    #[tokio::test]
    async fn connect_before_start_is_rejected_with_one_warning() {
        let fakes = Fakes::new(FakeBroker::completes_on(1));
        let ctrl = controller(&fakes);
        let mut notes = ctrl.notifications();

        let result = ctrl
            .execute(Command::Connect {
                provider: Provider::Claude,
            })
            .await
            .unwrap();
        assert_eq!(
            result,
            CommandResult::Connect(ConnectOutcome::Rejected(RejectReason::ProxyNotRunning))
        );
        let note = notes.recv().await.unwrap();
        assert_eq!(note.level, NotificationLevel::Warning);
        assert_eq!(note.title, "Start proxy first");
        assert!(notes.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn detach_cancels_running_flow() {
        let fakes = Fakes::new(FakeBroker::never_completes());
        let ctrl = controller(&fakes);
        ctrl.start_proxy().await.unwrap();

        let flow = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.connect(Provider::Gemini).await }
        });
        tokio::time::sleep(Duration::from_millis(3_500)).await;
        assert!(ctrl.connection_attempt().is_some());

        ctrl.detach().await;
        assert_eq!(flow.await.unwrap().unwrap(), ConnectOutcome::Cancelled);
        assert!(ctrl.connection_attempt().is_none());
        assert_eq!(fakes.broker.poll_count(), 3);
        assert_eq!(ctrl.auth_status(), AuthStatus::default());

        // The next session gets a live token.
        let next = tokio::spawn({
            let ctrl = ctrl.clone();
            async move { ctrl.connect(Provider::Gemini).await }
        });
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        assert_eq!(fakes.broker.poll_count(), 4);
        ctrl.detach().await;
        assert_eq!(next.await.unwrap().unwrap(), ConnectOutcome::Cancelled);
    }

    #[tokio::test]
    async fn credential_commands_need_open_workspace() {
        let fakes = Fakes::new(FakeBroker::default()).with_store(FakeStore::default());
        let ctrl = controller(&fakes);
        let add = || {
            Command::AddCredential(CredentialDraft::Gemini(GeminiKey {
                api_key: ApiKey::new("AIza-new"),
                ..GeminiKey::default()
            }))
        };

        assert!(matches!(
            ctrl.execute(add()).await.unwrap_err(),
            CoreError::WorkspaceClosed
        ));
        assert!(matches!(
            ctrl.open_credentials().await.unwrap_err(),
            CoreError::ProxyNotRunning
        ));

        ctrl.start_proxy().await.unwrap();
        ctrl.open_credentials().await.unwrap();
        let result = ctrl.execute(add()).await.unwrap();
        let CommandResult::Credentials(CredentialSet::Gemini(keys)) = result else {
            panic!("unexpected result {result:?}");
        };
        assert_eq!(keys.len(), 1);
        assert_eq!(fakes.store.stored().len(), 1);

        ctrl.detach().await;
        assert!(matches!(
            ctrl.credentials().await.unwrap_err(),
            CoreError::WorkspaceClosed
        ));
    }

    #[tokio::test]
    async fn model_commands_route_to_openai_store() {
        let fakes = Fakes::new(FakeBroker::default());
        fakes
            .store
            .seed(OpenAiCompatProvider::into_set(vec![
                OpenAiCompatProvider {
                    name: "ollama".into(),
                    base_url: "http://localhost:11434/v1".into(),
                    api_key_entries: vec![ApiKeyEntry {
                        api_key: ApiKey::new("ollama"),
                        proxy_url: None,
                    }],
                    ..Default::default()
                },
            ]));
        let ctrl = controller(&fakes);
        ctrl.start_proxy().await.unwrap();
        let ws = ctrl.open_credentials().await.unwrap();

        ctrl.execute(Command::AddModel {
            provider_index: 0,
            name: "llama3.1".into(),
        })
        .await
        .unwrap();
        assert_eq!(ws.openai().list()[0].models.len(), 1);

        ctrl.execute(Command::RemoveModel {
            provider_index: 0,
            model_index: 0,
        })
        .await
        .unwrap();
        assert!(ws.openai().list()[0].models.is_empty());
    }

    #[tokio::test]
    async fn vertex_connect_uses_picker() {
        let fakes = Fakes::new(FakeBroker::default())
            .with_picker(FakePicker::answering("/home/me/vertex-sa.json"));
        let ctrl = controller(&fakes);
        ctrl.start_proxy().await.unwrap();

        let outcome = ctrl.connect(Provider::Vertex).await.unwrap();
        assert!(matches!(outcome, ConnectOutcome::Connected(_)));
        assert_eq!(fakes.picker.requests().len(), 1);
        assert_eq!(ctrl.auth_status().count(Provider::Vertex), 1);
        assert!(ctrl.recently_connected().contains(&Provider::Vertex));
    }

    #[tokio::test]
    async fn test_provider_command_reports_result() {
        let fakes = Fakes::new(FakeBroker::default()).with_tester(FakeTester::default());
        let ctrl = controller(&fakes);
        ctrl.start_proxy().await.unwrap();
        ctrl.open_credentials().await.unwrap();

        let result = ctrl
            .execute(Command::TestProvider {
                target: TestTarget::NewForm,
                base_url: "https://api.groq.com/openai/v1".into(),
                api_key: ApiKey::new("gsk-live"),
            })
            .await
            .unwrap();
        let CommandResult::ProviderTest(Some(probe)) = result else {
            panic!("unexpected result {result:?}");
        };
        assert!(probe.success);
        assert_eq!(probe.models_found, Some(3));
        assert_eq!(fakes.tester.calls(), 1);
    }
}
