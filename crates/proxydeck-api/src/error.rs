use std::path::PathBuf;

use thiserror::Error;

use proxydeck_core::Provider;

/// Top-level error type for the `proxydeck-api` crate.
///
/// Covers the management API, the provider probe, and the supervised
/// proxy process. `proxydeck-core` sees these as `BackendError`s.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// A header value could not be built (non-visible ASCII in the key).
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),

    // ── Management API ──────────────────────────────────────────────
    /// Non-success HTTP status, with whatever body the proxy sent.
    #[error("Management API error (HTTP {status}): {body}")]
    Status { status: u16, body: String },

    /// The proxy reported a failed OAuth handshake.
    #[error("Authorization failed: {message}")]
    AuthFailed { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A credential file was rejected before upload.
    #[error("Invalid credential file {}: {reason}", path.display())]
    InvalidCredentialFile { path: PathBuf, reason: String },

    /// The provider has no counterpart for the requested operation.
    #[error("{0} is not supported by this operation")]
    UnsupportedProvider(Provider),

    // ── Process ─────────────────────────────────────────────────────
    /// The proxy binary could not be launched.
    #[error("Failed to spawn {}: {source}", binary.display())]
    Spawn {
        binary: PathBuf,
        source: std::io::Error,
    },

    /// The proxy exited before its management port answered.
    #[error("Proxy exited during startup ({status})")]
    ExitedEarly { status: String },

    /// The management port never answered.
    #[error("Proxy did not accept connections on port {port} within {timeout_secs}s")]
    StartupTimeout { port: u16, timeout_secs: u64 },

    /// A detached proxy recorded in the pid file could not be stopped.
    #[error("Failed to stop proxy process {pid} ({status})")]
    Terminate { pid: u32, status: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::StartupTimeout { .. } => true,
            Self::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }
}
