// ── Command API ──
//
// Every operation a consumer can trigger, as a typed value. Commands flow
// through the controller's channel; each one is spawned independently so
// the single-flight guards, not queue order, decide exclusivity.

use crate::backend::ProviderTestResult;
use crate::credentials::TestTarget;
use crate::error::CoreError;
use crate::lifecycle::LifecycleOutcome;
use crate::model::{
    ApiKey, AuthStatus, ClaudeKey, CodexKey, CredentialKind, CredentialSet, GeminiKey,
    OpenAiCompatProvider, Provider, ProxyStatus,
};
use crate::orchestrator::ConnectOutcome;

pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// One new record of any kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialDraft {
    Gemini(GeminiKey),
    Claude(ClaudeKey),
    Codex(CodexKey),
    OpenAiCompatible(OpenAiCompatProvider),
}

impl CredentialDraft {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::Gemini(_) => CredentialKind::Gemini,
            Self::Claude(_) => CredentialKind::Claude,
            Self::Codex(_) => CredentialKind::Codex,
            Self::OpenAiCompatible(_) => CredentialKind::OpenAiCompatible,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    // ── Proxy lifecycle ──────────────────────────────────────────────
    ToggleProxy,
    StartProxy,
    StopProxy,
    RefreshProxyStatus,

    // ── Connections ──────────────────────────────────────────────────
    Connect {
        provider: Provider,
    },
    Disconnect {
        provider: Provider,
    },
    RefreshAuthStatus,

    // ── Credentials (require an open workspace) ──────────────────────
    AddCredential(CredentialDraft),
    RemoveCredential {
        kind: CredentialKind,
        index: usize,
    },
    SaveCredentials {
        kind: CredentialKind,
    },
    UpdateProvider {
        index: usize,
        provider: OpenAiCompatProvider,
    },
    AddModel {
        provider_index: usize,
        name: String,
    },
    RemoveModel {
        provider_index: usize,
        model_index: usize,
    },
    TestProvider {
        target: TestTarget,
        base_url: String,
        api_key: ApiKey,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    Lifecycle(LifecycleOutcome),
    ProxyStatus(ProxyStatus),
    Connect(ConnectOutcome),
    AuthStatus(AuthStatus),
    /// The collection after a credential write.
    Credentials(CredentialSet),
    /// `None` when a probe for the same target was already running.
    ProviderTest(Option<ProviderTestResult>),
}
