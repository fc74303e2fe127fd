//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use proxydeck_config::ConfigError;
use proxydeck_core::{CoreError, Provider};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Proxy ────────────────────────────────────────────────────────
    #[error("The proxy is not running")]
    #[diagnostic(
        code(proxydeck::proxy_not_running),
        help("Start it with: proxydeck proxy start")
    )]
    ProxyNotRunning,

    #[error("A connection for {provider} is already in progress")]
    #[diagnostic(
        code(proxydeck::attempt_in_flight),
        help("Wait for it to finish or time out, then try again.")
    )]
    AttemptInFlight { provider: Provider },

    // ── Remote ───────────────────────────────────────────────────────
    #[error("{operation} failed: {message}")]
    #[diagnostic(code(proxydeck::remote))]
    Remote { operation: String, message: String },

    #[error("Connection test failed: {message}")]
    #[diagnostic(
        code(proxydeck::probe_failed),
        help("Check the base URL and API key.")
    )]
    ProbeFailed { message: String },

    // ── Timeout / interruption ───────────────────────────────────────
    #[error("Connecting {provider} timed out after {attempts} status checks")]
    #[diagnostic(
        code(proxydeck::timeout),
        help("Complete the authorization in your browser, then run connect again.")
    )]
    Timeout { provider: Provider, attempts: u32 },

    #[error("Interrupted")]
    #[diagnostic(code(proxydeck::interrupted))]
    Interrupted,

    #[error("No file selected")]
    #[diagnostic(
        code(proxydeck::no_file),
        help("Pass the credential file with --file <path>.")
    )]
    NoFileSelected,

    // ── Validation ───────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(proxydeck::invalid))]
    Invalid { message: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(proxydeck::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(proxydeck::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(proxydeck::config),
        help("Inspect it with: proxydeck config show")
    )]
    Config(#[from] ConfigError),

    // ── Internal / IO / Serialization ────────────────────────────────
    #[error("Internal error: {0}")]
    #[diagnostic(code(proxydeck::internal))]
    Internal(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("JSON output failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML output failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ProxyNotRunning | Self::ProbeFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Invalid { .. }
            | Self::Validation { .. }
            | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            Self::Interrupted => exit_code::INTERRUPTED,
            _ => exit_code::GENERAL,
        }
    }
}

impl From<proxydeck_api::Error> for CliError {
    fn from(err: proxydeck_api::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation { message } => Self::Invalid { message },
            CoreError::Remote { operation, message } => Self::Remote { operation, message },
            CoreError::Timeout { provider, attempts } => Self::Timeout { provider, attempts },
            CoreError::ProxyNotRunning => Self::ProxyNotRunning,
            CoreError::NoActiveEdit | CoreError::WorkspaceClosed | CoreError::Internal(_) => {
                Self::Internal(err.to_string())
            }
        }
    }
}
