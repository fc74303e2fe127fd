// ── External collaborators ──
//
// The orchestrator only talks to the outside world through these traits.
// `proxydeck-api` implements them over HTTP and a child process; tests
// use in-memory fakes.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::BackendError;
use crate::model::{
    ApiKey, AuthStatus, CredentialKind, CredentialSet, FlowToken, Provider, ProxyStatus,
};

/// Starts, stops and reports on the local proxy.
#[async_trait]
pub trait ProxyControl: Send + Sync {
    async fn start(&self) -> Result<ProxyStatus, BackendError>;
    async fn stop(&self) -> Result<ProxyStatus, BackendError>;
    async fn status(&self) -> Result<ProxyStatus, BackendError>;
}

/// Runs the browser OAuth handshake on the proxy's behalf.
#[async_trait]
pub trait OAuthBroker: Send + Sync {
    /// Begin authorization; the returned token identifies the attempt.
    async fn open_oauth(&self, provider: Provider) -> Result<FlowToken, BackendError>;

    /// `true` once the user has completed authorization.
    async fn poll_oauth_status(&self, token: &FlowToken) -> Result<bool, BackendError>;

    /// Remove every linked account of `provider`.
    async fn disconnect_provider(&self, provider: Provider) -> Result<(), BackendError>;

    async fn refresh_auth_status(&self) -> Result<AuthStatus, BackendError>;
}

/// Registers a credential file for providers that do not use OAuth.
#[async_trait]
pub trait CredentialImporter: Send + Sync {
    async fn import_credential(&self, provider: Provider, path: &Path)
    -> Result<(), BackendError>;
}

/// Remote persisted store for credential collections.
#[async_trait]
pub trait ConfigStore: Send + Sync {
    async fn load(&self, kind: CredentialKind) -> Result<CredentialSet, BackendError>;

    /// Replace the stored collection of `set.kind()` wholesale.
    async fn store(&self, set: &CredentialSet) -> Result<(), BackendError>;
}

/// Read-only reachability probe for an OpenAI-compatible endpoint.
#[async_trait]
pub trait ConnectionTester: Send + Sync {
    async fn test_provider(
        &self,
        base_url: &str,
        api_key: &ApiKey,
    ) -> Result<ProviderTestResult, BackendError>;
}

/// Asks the user for a file. `Ok(None)` means the picker was dismissed.
#[async_trait]
pub trait FilePicker: Send + Sync {
    async fn pick_file(&self, filters: &[FileFilter]) -> Result<Option<PathBuf>, BackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn json() -> Self {
        Self {
            name: "JSON".into(),
            extensions: vec!["json".into()],
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderTestResult {
    pub success: bool,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models_found: Option<u32>,
}

/// The full set of collaborators a [`Controller`](crate::Controller)
/// needs.
#[derive(Clone)]
pub struct Backends {
    pub proxy: Arc<dyn ProxyControl>,
    pub broker: Arc<dyn OAuthBroker>,
    pub importer: Arc<dyn CredentialImporter>,
    pub store: Arc<dyn ConfigStore>,
    pub tester: Arc<dyn ConnectionTester>,
    pub picker: Arc<dyn FilePicker>,
}
