// ── Core error types ──
//
// `BackendError` is what collaborator implementations hand back;
// `CoreError` is what consumers of the orchestrator see. Backend failures
// surface as `CoreError::Remote` tagged with the operation that failed.

use thiserror::Error;

use crate::model::Provider;

/// Failure reported by an external collaborator (proxy control, OAuth
/// broker, import service, configuration store, probe, file picker).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("Proxy is not reachable: {reason}")]
    Unreachable { reason: String },

    #[error("Request rejected (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("{provider} is not supported by this operation")]
    Unsupported { provider: Provider },

    #[error("{message}")]
    Other { message: String },
}

impl BackendError {
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Local input rejected before any remote call.
    #[error("{message}")]
    Validation { message: String },

    #[error("{operation} failed: {message}")]
    Remote { operation: String, message: String },

    #[error("Connecting {provider} timed out after {attempts} status checks")]
    Timeout { provider: Provider, attempts: u32 },

    #[error("Proxy not running")]
    ProxyNotRunning,

    #[error("No record is being edited")]
    NoActiveEdit,

    #[error("Credential workspace is not open")]
    WorkspaceClosed,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn remote(operation: impl Into<String>, source: &BackendError) -> Self {
        Self::Remote {
            operation: operation.into(),
            message: source.to_string(),
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}
