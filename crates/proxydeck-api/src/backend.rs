// Collaborator implementations for `proxydeck-core`.
//
// Bridges the HTTP client, probe and process supervisor onto the core's
// backend traits, translating `Error` into `BackendError` at the seam.

use std::collections::BTreeMap;
use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use proxydeck_core::{
    ApiKey, AuthStatus, BackendError, ConfigStore, ConnectionTester, CredentialImporter,
    CredentialKind, CredentialSet, FlowToken, OAuthBroker, Provider, ProviderTestResult,
    ProxyControl, ProxyStatus,
};

use crate::error::Error;
use crate::management::{AuthFile, AuthState, ManagementClient};
use crate::probe::ProviderProbe;
use crate::process::ProcessProxy;

impl From<Error> for BackendError {
    fn from(err: Error) -> Self {
        match err {
            Error::Transport(ref e) if e.is_connect() || e.is_timeout() => Self::Unreachable {
                reason: err.to_string(),
            },
            Error::Timeout { timeout_secs } | Error::StartupTimeout { timeout_secs, .. } => {
                Self::Timeout { timeout_secs }
            }
            Error::Status { status, body } => Self::Rejected {
                status,
                message: body,
            },
            Error::Deserialization { message, .. } => Self::InvalidResponse { message },
            Error::UnsupportedProvider(provider) => Self::Unsupported { provider },
            other => Self::other(other.to_string()),
        }
    }
}

// ── Management API ───────────────────────────────────────────────────

#[async_trait]
impl OAuthBroker for ManagementClient {
    async fn open_oauth(&self, provider: Provider) -> Result<FlowToken, BackendError> {
        let start = self.request_auth_url(provider).await?;
        if start.state.is_empty() {
            return Err(BackendError::InvalidResponse {
                message: "auth URL response carried no state token".into(),
            });
        }
        info!(%provider, "OAuth handshake opened");
        self.hand_off_auth_url(provider, &start.url);
        Ok(FlowToken::new(start.state))
    }

    async fn poll_oauth_status(&self, token: &FlowToken) -> Result<bool, BackendError> {
        match self.auth_state(token.as_str()).await? {
            AuthState::Complete => Ok(true),
            AuthState::Pending => Ok(false),
            AuthState::Failed(message) => Err(Error::AuthFailed { message }.into()),
        }
    }

    async fn disconnect_provider(&self, provider: Provider) -> Result<(), BackendError> {
        let files = self.list_auth_files().await?;
        let mut first_error = None;
        for file in files.iter().filter(|f| f.owner() == Some(provider)) {
            debug!(%provider, name = %file.name, "deleting auth file");
            if let Err(e) = self.delete_auth_file(&file.name).await {
                warn!(name = %file.name, error = %e, "failed to delete auth file");
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    async fn refresh_auth_status(&self) -> Result<AuthStatus, BackendError> {
        let files = self.list_auth_files().await?;
        let mut counts: BTreeMap<Provider, u32> = BTreeMap::new();
        for provider in files.iter().filter_map(AuthFile::owner) {
            *counts.entry(provider).or_default() += 1;
        }
        Ok(AuthStatus::from_counts(counts))
    }
}

#[async_trait]
impl CredentialImporter for ManagementClient {
    async fn import_credential(
        &self,
        provider: Provider,
        path: &Path,
    ) -> Result<(), BackendError> {
        if provider != Provider::Vertex {
            return Err(BackendError::Unsupported { provider });
        }
        let project_id = self.import_vertex_credential(path).await?;
        info!(%project_id, "service account imported");
        Ok(())
    }
}

#[async_trait]
impl ConfigStore for ManagementClient {
    async fn load(&self, kind: CredentialKind) -> Result<CredentialSet, BackendError> {
        Ok(self.load_credentials(kind).await?)
    }

    async fn store(&self, set: &CredentialSet) -> Result<(), BackendError> {
        Ok(self.store_credentials(set).await?)
    }
}

// ── Probe ────────────────────────────────────────────────────────────

#[async_trait]
impl ConnectionTester for ProviderProbe {
    async fn test_provider(
        &self,
        base_url: &str,
        api_key: &ApiKey,
    ) -> Result<ProviderTestResult, BackendError> {
        Ok(self.probe(base_url, api_key).await)
    }
}

// ── Process ──────────────────────────────────────────────────────────

#[async_trait]
impl ProxyControl for ProcessProxy {
    async fn start(&self) -> Result<ProxyStatus, BackendError> {
        Ok(ProcessProxy::start(self).await?)
    }

    async fn stop(&self) -> Result<ProxyStatus, BackendError> {
        Ok(ProcessProxy::stop(self).await?)
    }

    async fn status(&self) -> Result<ProxyStatus, BackendError> {
        Ok(ProcessProxy::status(self).await)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_keep_code_and_body() {
        let err: BackendError = Error::Status {
            status: 401,
            body: "bad key".into(),
        }
        .into();
        assert_eq!(
            err,
            BackendError::Rejected {
                status: 401,
                message: "bad key".into()
            }
        );
    }

    #[test]
    fn unsupported_provider_maps_through() {
        let err: BackendError = Error::UnsupportedProvider(Provider::Vertex).into();
        assert_eq!(
            err,
            BackendError::Unsupported {
                provider: Provider::Vertex
            }
        );
    }

    #[test]
    fn startup_timeout_becomes_timeout() {
        let err: BackendError = Error::StartupTimeout {
            port: 8317,
            timeout_secs: 15,
        }
        .into();
        assert_eq!(err, BackendError::Timeout { timeout_secs: 15 });
    }
}
