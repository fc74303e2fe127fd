// ── Credential workspace ──
//
// The four per-kind stores plus the connection probe, alive only while a
// consumer manages credentials. Dropping the workspace discards the
// mirrors and any edit buffer.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::CredentialStore;
use crate::backend::{ConfigStore, ConnectionTester, ProviderTestResult};
use crate::error::{BackendError, CoreError};
use crate::guard::KeyedFlight;
use crate::model::{
    ApiKey, ClaudeKey, CodexKey, CredentialKind, CredentialSet, GeminiKey, OpenAiCompatProvider,
    ProxyStatus,
};
use crate::notify::Notifier;
use crate::stream::SnapshotStream;

/// Which form a connection probe belongs to. Probes for different
/// targets run independently; a second probe for the same target is
/// ignored while the first is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum TestTarget {
    Existing(usize),
    NewForm,
}

pub struct CredentialWorkspace {
    gemini: CredentialStore<GeminiKey>,
    claude: CredentialStore<ClaudeKey>,
    codex: CredentialStore<CodexKey>,
    openai: CredentialStore<OpenAiCompatProvider>,
    tester: Arc<dyn ConnectionTester>,
    testing: KeyedFlight<TestTarget>,
    proxy_status: watch::Receiver<ProxyStatus>,
    notifier: Notifier,
}

impl std::fmt::Debug for CredentialWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialWorkspace").finish_non_exhaustive()
    }
}

impl CredentialWorkspace {
    pub(crate) fn new(
        store: &Arc<dyn ConfigStore>,
        tester: Arc<dyn ConnectionTester>,
        proxy_status: watch::Receiver<ProxyStatus>,
        notifier: Notifier,
    ) -> Self {
        Self {
            gemini: CredentialStore::new(Arc::clone(store), notifier.clone()),
            claude: CredentialStore::new(Arc::clone(store), notifier.clone()),
            codex: CredentialStore::new(Arc::clone(store), notifier.clone()),
            openai: CredentialStore::new(Arc::clone(store), notifier.clone()),
            tester,
            testing: KeyedFlight::new(),
            proxy_status,
            notifier,
        }
    }

    pub fn gemini(&self) -> &CredentialStore<GeminiKey> {
        &self.gemini
    }

    pub fn claude(&self) -> &CredentialStore<ClaudeKey> {
        &self.claude
    }

    pub fn codex(&self) -> &CredentialStore<CodexKey> {
        &self.codex
    }

    pub fn openai(&self) -> &CredentialStore<OpenAiCompatProvider> {
        &self.openai
    }

    /// The current mirror of one kind as a tagged set.
    pub fn snapshot(&self, kind: CredentialKind) -> CredentialSet {
        match kind {
            CredentialKind::Gemini => CredentialSet::Gemini(self.gemini.list().to_vec()),
            CredentialKind::Claude => CredentialSet::Claude(self.claude.list().to_vec()),
            CredentialKind::Codex => CredentialSet::Codex(self.codex.list().to_vec()),
            CredentialKind::OpenAiCompatible => {
                CredentialSet::OpenAiCompatible(self.openai.list().to_vec())
            }
        }
    }

    /// Load all four collections. Requires a running proxy; either every
    /// mirror is replaced or none is.
    pub async fn hydrate(&self) -> Result<(), CoreError> {
        if !self.proxy_status.borrow().running {
            self.notifier.error(
                "Proxy not running",
                "Start the proxy to manage API keys",
            );
            return Err(CoreError::ProxyNotRunning);
        }

        let loaded: Result<_, BackendError> = tokio::try_join!(
            self.gemini.fetch(),
            self.claude.fetch(),
            self.codex.fetch(),
            self.openai.fetch(),
        );
        let (gemini, claude, codex, openai) = match loaded {
            Ok(all) => all,
            Err(e) => {
                warn!(error = %e, "credential hydration failed");
                let err = CoreError::remote("Load API keys", &e);
                self.notifier.error("Failed to load API keys", err.to_string());
                return Err(err);
            }
        };

        info!(
            gemini = gemini.len(),
            claude = claude.len(),
            codex = codex.len(),
            openai = openai.len(),
            "credential workspace hydrated"
        );
        self.gemini.replace(gemini);
        self.claude.replace(claude);
        self.codex.replace(codex);
        self.openai.replace(openai);
        Ok(())
    }

    /// Probe an OpenAI-compatible endpoint. `Ok(None)` when a probe for
    /// `target` is already running. Never touches any collection.
    pub async fn test_provider(
        &self,
        target: TestTarget,
        base_url: &str,
        api_key: &ApiKey,
    ) -> Result<Option<ProviderTestResult>, CoreError> {
        let Some(_guard) = self.testing.try_acquire(target) else {
            debug!(?target, "provider test already in flight, ignoring");
            return Ok(None);
        };

        match self.tester.test_provider(base_url, api_key).await {
            Ok(result) => {
                if result.success {
                    let detail = result
                        .models_found
                        .map_or_else(|| result.message.clone(), |n| format!("Found {n} models"));
                    self.notifier.success("Connection successful", detail);
                } else {
                    self.notifier.error("Connection failed", result.message.clone());
                }
                Ok(Some(result))
            }
            Err(e) => {
                warn!(?target, error = %e, "provider test failed");
                let err = CoreError::remote("Test provider", &e);
                self.notifier.error("Test failed", err.to_string());
                Err(err)
            }
        }
    }

    /// Probe a saved provider with its first non-empty key.
    pub async fn test_existing(
        &self,
        index: usize,
    ) -> Result<Option<ProviderTestResult>, CoreError> {
        let providers = self.openai.list();
        let Some(provider) = providers.get(index) else {
            let err = CoreError::validation(format!("No provider at index {index}"));
            self.notifier.warning(err.to_string(), None);
            return Err(err);
        };
        let Some(entry) = provider.api_key_entries.iter().find(|e| !e.api_key.is_blank()) else {
            let err = CoreError::validation("At least one API key required");
            self.notifier.warning(err.to_string(), None);
            return Err(err);
        };
        self.test_provider(TestTarget::Existing(index), &provider.base_url, &entry.api_key)
            .await
    }

    pub fn testing(&self) -> BTreeSet<TestTarget> {
        self.testing.in_flight()
    }

    pub fn subscribe_testing(&self) -> SnapshotStream<BTreeSet<TestTarget>> {
        SnapshotStream::new(self.testing.subscribe())
    }
}
