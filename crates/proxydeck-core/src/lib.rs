//! Connection orchestration and credential mirroring for a locally running
//! AI proxy.
//!
//! - **[`Controller`]**: facade over the proxy lifecycle, the provider
//!   connection orchestrator and the credential workspace. Cheaply
//!   cloneable; publishes immutable snapshots through `watch` channels
//!   and user-facing [`Notification`]s through a broadcast channel.
//!
//! - **Connection flows**: OAuth handshakes driven by bounded, cancellable
//!   polling, and a file-import flow for providers without OAuth. At most
//!   one attempt is live system-wide.
//!
//! - **[`CredentialStore<R>`]**: write-through mirror of one credential
//!   collection. The full next collection is persisted before the mirror
//!   changes; writes per kind are serialised.
//!
//! - **[`backend`]**: the collaborator traits. `proxydeck-api` implements
//!   them against the proxy's management API.

pub mod backend;
pub mod command;
pub mod config;
pub mod controller;
pub mod credentials;
pub mod error;
mod flow;
mod guard;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod orchestrator;
pub mod stream;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backend::{
    Backends, ConfigStore, ConnectionTester, CredentialImporter, FileFilter, FilePicker,
    OAuthBroker, ProviderTestResult, ProxyControl,
};
pub use command::{Command, CommandResult, CredentialDraft};
pub use config::OrchestratorConfig;
pub use controller::Controller;
pub use credentials::{CredentialStore, CredentialWorkspace, EditBuffer, TestTarget};
pub use error::{BackendError, CoreError};
pub use lifecycle::LifecycleOutcome;
pub use notify::{Notification, NotificationLevel};
pub use orchestrator::{ConnectOutcome, RejectReason};
pub use stream::SnapshotStream;

pub use model::{
    ApiKey, ApiKeyEntry, AuthStatus, ClaudeKey, CodexKey, ConnectionAttempt, ConnectionKind,
    CredentialKind, CredentialRecord, CredentialSet, FlowPhase, FlowToken, GeminiKey, ModelEntry,
    OpenAiCompatProvider, Provider, ProxyStatus,
};
