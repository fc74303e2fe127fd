//! Configuration for proxydeck.
//!
//! TOML file in the platform config directory, overridden by `PROXYDECK_`
//! environment variables, plus management-key resolution
//! (env + keyring + plaintext) and translation to
//! `proxydeck_core::OrchestratorConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use proxydeck_core::OrchestratorConfig;

/// Keyring service holding the management key.
pub const KEYRING_SERVICE: &str = "proxydeck";
/// Keyring user under [`KEYRING_SERVICE`].
pub const KEYRING_USER: &str = "management-key";
/// Key the bundled proxy configuration ships with.
pub const DEFAULT_MANAGEMENT_KEY: &str = "proxypal-mgmt-key";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Port the proxy listens on (API and management).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Proxy executable, resolved through `PATH` when relative.
    #[serde(default = "default_proxy_binary")]
    pub proxy_binary: PathBuf,

    /// Passed to the proxy as `--config`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_config: Option<PathBuf>,

    #[serde(default = "default_startup_timeout")]
    pub startup_timeout_secs: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Management key (plaintext; prefer keyring or env var).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_key: Option<String>,

    /// Environment variable name containing the management key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub management_key_env: Option<String>,

    #[serde(default)]
    pub orchestrator: OrchestratorSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            proxy_binary: default_proxy_binary(),
            proxy_config: None,
            startup_timeout_secs: default_startup_timeout(),
            request_timeout_secs: default_request_timeout(),
            management_key: None,
            management_key_env: None,
            orchestrator: OrchestratorSettings::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrchestratorSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_max_poll_attempts")]
    pub max_poll_attempts: u32,

    #[serde(default = "default_highlight")]
    pub highlight_ms: u64,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            max_poll_attempts: default_max_poll_attempts(),
            highlight_ms: default_highlight(),
        }
    }
}

fn default_port() -> u16 {
    8317
}
fn default_proxy_binary() -> PathBuf {
    PathBuf::from("cli-proxy-api")
}
fn default_startup_timeout() -> u64 {
    15
}
fn default_request_timeout() -> u64 {
    10
}
fn default_poll_interval() -> u64 {
    1000
}
fn default_max_poll_attempts() -> u32 {
    120
}
fn default_highlight() -> u64 {
    2000
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(invalid("port", "must be between 1 and 65535"));
        }
        if self.startup_timeout_secs == 0 {
            return Err(invalid("startup_timeout_secs", "must be positive"));
        }
        if self.request_timeout_secs == 0 {
            return Err(invalid("request_timeout_secs", "must be positive"));
        }
        if self.orchestrator.poll_interval_ms == 0 {
            return Err(invalid("orchestrator.poll_interval_ms", "must be positive"));
        }
        if self.orchestrator.max_poll_attempts == 0 {
            return Err(invalid("orchestrator.max_poll_attempts", "must be positive"));
        }
        Ok(())
    }

    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            poll_interval: Duration::from_millis(self.orchestrator.poll_interval_ms),
            max_poll_attempts: self.orchestrator.max_poll_attempts,
            highlight_duration: Duration::from_millis(self.orchestrator.highlight_ms),
        }
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "proxydeck", "proxydeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where a detached proxy's pid is recorded between invocations.
pub fn pid_file_path() -> PathBuf {
    ProjectDirs::from("dev", "proxydeck", "proxydeck").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("proxy.pid");
            p
        },
        |dirs| dirs.data_local_dir().join("proxy.pid"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("proxydeck");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` + environment. A missing file yields the defaults.
/// Nested keys use a double underscore:
/// `PROXYDECK_ORCHESTRATOR__POLL_INTERVAL_MS`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PROXYDECK_").split("__"))
        .extract()?;
    config.validate()?;
    Ok(config)
}

/// Load config, returning a default if it cannot be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Management key ──────────────────────────────────────────────────

/// Where a resolved management key came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    Env,
    Keyring,
    Plaintext,
    Default,
}

/// Resolve the management key: configured env var, then the system
/// keyring, then the plaintext field, then the bundled default.
pub fn resolve_management_key(cfg: &Config) -> (SecretString, KeySource) {
    if let Some(ref env_name) = cfg.management_key_env {
        if let Ok(val) = std::env::var(env_name) {
            return (SecretString::from(val), KeySource::Env);
        }
    }

    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER) {
        if let Ok(secret) = entry.get_password() {
            return (SecretString::from(secret), KeySource::Keyring);
        }
    }

    if let Some(ref key) = cfg.management_key {
        return (SecretString::from(key.clone()), KeySource::Plaintext);
    }

    (
        SecretString::from(DEFAULT_MANAGEMENT_KEY),
        KeySource::Default,
    )
}

/// Store the management key in the system keyring.
pub fn store_management_key(key: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?.set_password(key)?;
    Ok(())
}
