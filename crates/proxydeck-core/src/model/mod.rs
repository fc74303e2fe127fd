// ── Domain model ──

mod attempt;
mod credential;
mod provider;
mod status;

pub use attempt::{ConnectionAttempt, FlowPhase, FlowToken};
pub use credential::{
    ApiKey, ApiKeyEntry, ClaudeKey, CodexKey, CredentialKind, CredentialRecord, CredentialSet,
    GeminiKey, ModelEntry, OpenAiCompatProvider,
};
pub use provider::{ConnectionKind, Provider};
pub use status::{AuthStatus, ProxyStatus};
