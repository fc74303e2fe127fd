// ── In-memory fakes for the backend traits ──
//
// Each fake records its calls and can be scripted to fail or stall.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::backend::{
    Backends, ConfigStore, ConnectionTester, CredentialImporter, FileFilter, FilePicker,
    OAuthBroker, ProviderTestResult, ProxyControl,
};
use crate::error::BackendError;
use crate::model::{
    ApiKey, AuthStatus, CredentialKind, CredentialSet, FlowToken, Provider, ProxyStatus,
};

async fn stall(latency: Option<Duration>) {
    if let Some(latency) = latency {
        tokio::time::sleep(latency).await;
    }
}

// ── Proxy ────────────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct FakeProxy {
    latency: Option<Duration>,
    running: Mutex<bool>,
    starts: AtomicU32,
    stops: AtomicU32,
    fail_start: Mutex<Option<String>>,
}

impl FakeProxy {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub(crate) fn fail_next_start(&self, reason: &str) {
        *self.fail_start.lock().unwrap() = Some(reason.to_owned());
    }

    pub(crate) fn start_calls(&self) -> u32 {
        self.starts.load(Ordering::SeqCst)
    }

    pub(crate) fn stop_calls(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProxyControl for FakeProxy {
    async fn start(&self) -> Result<ProxyStatus, BackendError> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        stall(self.latency).await;
        if let Some(reason) = self.fail_start.lock().unwrap().take() {
            return Err(BackendError::other(reason));
        }
        *self.running.lock().unwrap() = true;
        Ok(ProxyStatus::running_on(8317))
    }

    async fn stop(&self) -> Result<ProxyStatus, BackendError> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        stall(self.latency).await;
        *self.running.lock().unwrap() = false;
        Ok(ProxyStatus::stopped())
    }

    async fn status(&self) -> Result<ProxyStatus, BackendError> {
        if *self.running.lock().unwrap() {
            Ok(ProxyStatus::running_on(8317))
        } else {
            Ok(ProxyStatus::stopped())
        }
    }
}

// ── OAuth broker ─────────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct FakeBroker {
    /// Poll number (1-based) on which authorization completes.
    completes_on: Mutex<Option<u32>>,
    failing_polls: Mutex<BTreeSet<u32>>,
    fail_open: Mutex<Option<String>>,
    fail_refresh: Mutex<bool>,
    fail_disconnect: Mutex<Option<String>>,
    refresh_latency: Mutex<Option<Duration>>,
    opened: Mutex<Vec<Provider>>,
    polls: Mutex<Vec<Instant>>,
    current: Mutex<Option<Provider>>,
    accounts: Mutex<AuthStatus>,
    disconnects: Mutex<Vec<Provider>>,
    refreshes: AtomicU32,
}

impl FakeBroker {
    pub(crate) fn never_completes() -> Self {
        Self::default()
    }

    pub(crate) fn completes_on(poll: u32) -> Self {
        let broker = Self::default();
        *broker.completes_on.lock().unwrap() = Some(poll);
        broker
    }

    pub(crate) fn fail_polls(&self, polls: impl IntoIterator<Item = u32>) {
        self.failing_polls.lock().unwrap().extend(polls);
    }

    pub(crate) fn fail_open(&self, reason: &str) {
        *self.fail_open.lock().unwrap() = Some(reason.to_owned());
    }

    pub(crate) fn fail_refresh(&self) {
        *self.fail_refresh.lock().unwrap() = true;
    }

    pub(crate) fn fail_disconnect(&self, reason: &str) {
        *self.fail_disconnect.lock().unwrap() = Some(reason.to_owned());
    }

    pub(crate) fn slow_refresh(&self, latency: Duration) {
        *self.refresh_latency.lock().unwrap() = Some(latency);
    }

    pub(crate) fn link(&self, provider: Provider) {
        let mut accounts = self.accounts.lock().unwrap();
        let count = accounts.count(provider);
        accounts.set(provider, count + 1);
    }

    pub(crate) fn seed(&self, status: AuthStatus) {
        *self.accounts.lock().unwrap() = status;
    }

    pub(crate) fn opened(&self) -> Vec<Provider> {
        self.opened.lock().unwrap().clone()
    }

    pub(crate) fn poll_count(&self) -> usize {
        self.polls.lock().unwrap().len()
    }

    pub(crate) fn poll_times(&self) -> Vec<Instant> {
        self.polls.lock().unwrap().clone()
    }

    pub(crate) fn disconnects(&self) -> Vec<Provider> {
        self.disconnects.lock().unwrap().clone()
    }

    pub(crate) fn refresh_calls(&self) -> u32 {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OAuthBroker for FakeBroker {
    async fn open_oauth(&self, provider: Provider) -> Result<FlowToken, BackendError> {
        if provider == Provider::Vertex {
            return Err(BackendError::Unsupported { provider });
        }
        if let Some(reason) = self.fail_open.lock().unwrap().take() {
            return Err(BackendError::other(reason));
        }
        self.opened.lock().unwrap().push(provider);
        *self.current.lock().unwrap() = Some(provider);
        Ok(FlowToken::new(format!("state-{provider}")))
    }

    async fn poll_oauth_status(&self, _token: &FlowToken) -> Result<bool, BackendError> {
        let number = {
            let mut polls = self.polls.lock().unwrap();
            polls.push(Instant::now());
            u32::try_from(polls.len()).unwrap()
        };
        if self.failing_polls.lock().unwrap().contains(&number) {
            return Err(BackendError::Unreachable {
                reason: "connection reset".into(),
            });
        }
        let done = *self.completes_on.lock().unwrap() == Some(number);
        if done {
            if let Some(provider) = *self.current.lock().unwrap() {
                self.link(provider);
            }
        }
        Ok(done)
    }

    async fn disconnect_provider(&self, provider: Provider) -> Result<(), BackendError> {
        self.disconnects.lock().unwrap().push(provider);
        if let Some(reason) = self.fail_disconnect.lock().unwrap().take() {
            return Err(BackendError::other(reason));
        }
        self.accounts.lock().unwrap().set(provider, 0);
        Ok(())
    }

    async fn refresh_auth_status(&self) -> Result<AuthStatus, BackendError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        let latency = *self.refresh_latency.lock().unwrap();
        stall(latency).await;
        if *self.fail_refresh.lock().unwrap() {
            return Err(BackendError::Unreachable {
                reason: "connection refused".into(),
            });
        }
        Ok(self.accounts.lock().unwrap().clone())
    }
}

// ── Importer ─────────────────────────────────────────────────────────

pub(crate) struct FakeImporter {
    broker: Arc<FakeBroker>,
    fail: Mutex<Option<String>>,
    imports: Mutex<Vec<(Provider, PathBuf)>>,
}

impl FakeImporter {
    /// Successful imports link an account on `broker`.
    pub(crate) fn linked_to(broker: Arc<FakeBroker>) -> Self {
        Self {
            broker,
            fail: Mutex::new(None),
            imports: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn fail_next(&self, reason: &str) {
        *self.fail.lock().unwrap() = Some(reason.to_owned());
    }

    pub(crate) fn imports(&self) -> Vec<(Provider, PathBuf)> {
        self.imports.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialImporter for FakeImporter {
    async fn import_credential(
        &self,
        provider: Provider,
        path: &Path,
    ) -> Result<(), BackendError> {
        self.imports
            .lock()
            .unwrap()
            .push((provider, path.to_path_buf()));
        if let Some(reason) = self.fail.lock().unwrap().take() {
            return Err(BackendError::other(reason));
        }
        self.broker.link(provider);
        Ok(())
    }
}

// ── Configuration store ──────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct FakeStore {
    latency: Option<Duration>,
    sets: Mutex<HashMap<CredentialKind, CredentialSet>>,
    stored: Mutex<Vec<CredentialSet>>,
    fail_next_store: Mutex<Option<String>>,
    fail_load: Mutex<bool>,
    loads: AtomicU32,
}

impl FakeStore {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    pub(crate) fn seed(&self, set: CredentialSet) {
        self.sets.lock().unwrap().insert(set.kind(), set);
    }

    pub(crate) fn fail_next_store(&self, reason: &str) {
        *self.fail_next_store.lock().unwrap() = Some(reason.to_owned());
    }

    pub(crate) fn fail_loads(&self) {
        *self.fail_load.lock().unwrap() = true;
    }

    /// Every set passed to `store`, including failed calls.
    pub(crate) fn stored(&self) -> Vec<CredentialSet> {
        self.stored.lock().unwrap().clone()
    }

    pub(crate) fn load_calls(&self) -> u32 {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConfigStore for FakeStore {
    async fn load(&self, kind: CredentialKind) -> Result<CredentialSet, BackendError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if *self.fail_load.lock().unwrap() {
            return Err(BackendError::Unreachable {
                reason: "connection refused".into(),
            });
        }
        Ok(self
            .sets
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| CredentialSet::empty(kind)))
    }

    async fn store(&self, set: &CredentialSet) -> Result<(), BackendError> {
        self.stored.lock().unwrap().push(set.clone());
        stall(self.latency).await;
        if let Some(reason) = self.fail_next_store.lock().unwrap().take() {
            return Err(BackendError::Rejected {
                status: 500,
                message: reason,
            });
        }
        self.sets.lock().unwrap().insert(set.kind(), set.clone());
        Ok(())
    }
}

// ── Probe and picker ─────────────────────────────────────────────────

#[derive(Default)]
pub(crate) struct FakeTester {
    latency: Option<Duration>,
    calls: AtomicU32,
}

impl FakeTester {
    pub(crate) fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionTester for FakeTester {
    async fn test_provider(
        &self,
        base_url: &str,
        api_key: &ApiKey,
    ) -> Result<ProviderTestResult, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        stall(self.latency).await;
        if api_key.expose() == "bad" {
            return Ok(ProviderTestResult {
                success: false,
                message: "Authentication failed - check your API key".into(),
                latency_ms: Some(12),
                models_found: None,
            });
        }
        Ok(ProviderTestResult {
            success: true,
            message: format!("Connected to {base_url}"),
            latency_ms: Some(12),
            models_found: Some(3),
        })
    }
}

#[derive(Default)]
pub(crate) struct FakePicker {
    answer: Mutex<Option<PathBuf>>,
    filters: Mutex<Vec<Vec<FileFilter>>>,
}

impl FakePicker {
    pub(crate) fn answering(path: &str) -> Self {
        Self {
            answer: Mutex::new(Some(PathBuf::from(path))),
            filters: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn dismissed() -> Self {
        Self::default()
    }

    pub(crate) fn requests(&self) -> Vec<Vec<FileFilter>> {
        self.filters.lock().unwrap().clone()
    }
}

#[async_trait]
impl FilePicker for FakePicker {
    async fn pick_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>, BackendError> {
        self.filters.lock().unwrap().push(filters.to_vec());
        Ok(self.answer.lock().unwrap().clone())
    }
}

// ── Bundle ───────────────────────────────────────────────────────────

/// One of each fake, wired into a [`Backends`].
pub(crate) struct Fakes {
    pub(crate) proxy: Arc<FakeProxy>,
    pub(crate) broker: Arc<FakeBroker>,
    pub(crate) importer: Arc<FakeImporter>,
    pub(crate) store: Arc<FakeStore>,
    pub(crate) tester: Arc<FakeTester>,
    pub(crate) picker: Arc<FakePicker>,
}

impl Fakes {
    pub(crate) fn new(broker: FakeBroker) -> Self {
        let broker = Arc::new(broker);
        Self {
            proxy: Arc::new(FakeProxy::default()),
            importer: Arc::new(FakeImporter::linked_to(Arc::clone(&broker))),
            broker,
            store: Arc::new(FakeStore::default()),
            tester: Arc::new(FakeTester::default()),
            picker: Arc::new(FakePicker::dismissed()),
        }
    }

    pub(crate) fn with_picker(mut self, picker: FakePicker) -> Self {
        self.picker = Arc::new(picker);
        self
    }

    pub(crate) fn with_store(mut self, store: FakeStore) -> Self {
        self.store = Arc::new(store);
        self
    }

    pub(crate) fn with_tester(mut self, tester: FakeTester) -> Self {
        self.tester = Arc::new(tester);
        self
    }

    pub(crate) fn backends(&self) -> Backends {
        Backends {
            proxy: self.proxy.clone(),
            broker: self.broker.clone(),
            importer: self.importer.clone(),
            store: self.store.clone(),
            tester: self.tester.clone(),
            picker: self.picker.clone(),
        }
    }
}
