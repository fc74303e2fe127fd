//! CLI configuration: thin wrapper around `proxydeck_config`.
//!
//! Applies `GlobalOpts` overrides (--port, --management-key) and wires the
//! resolved settings into a ready `Controller`.

use std::sync::Arc;

use secrecy::SecretString;
use tracing::debug;

use proxydeck_api::{ManagementClient, ProcessConfig, ProcessProxy, ProviderProbe, TransportConfig};
use proxydeck_core::{Controller, Provider};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::picker::PromptPicker;

pub use proxydeck_config::{
    Config, KeySource, config_path, load_config, pid_file_path, resolve_management_key,
    save_config, store_management_key,
};

/// Load the config file + env and apply flag overrides.
pub fn effective_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let mut cfg = load_config()?;
    if let Some(port) = global.port {
        cfg.port = port;
    }
    cfg.validate()?;
    Ok(cfg)
}

/// The management key: `--management-key` first, then the config chain.
pub fn management_key(global: &GlobalOpts, cfg: &Config) -> (SecretString, KeySource) {
    if let Some(ref key) = global.management_key {
        return (SecretString::from(key.clone()), KeySource::Env);
    }
    resolve_management_key(cfg)
}

/// How the proxy child relates to this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyMode {
    /// The child outlives this invocation and is tracked in the pid file.
    Detached,
    /// The child dies with this process.
    Foreground,
}

/// Build a controller over the management API, the probe, and the
/// proxy process.
pub fn build_controller(
    global: &GlobalOpts,
    cfg: &Config,
    mode: ProxyMode,
    picker: PromptPicker,
) -> Result<Controller, CliError> {
    let (key, source) = management_key(global, cfg);
    debug!(?source, port = cfg.port, "building controller");

    let transport = TransportConfig::with_timeout(cfg.request_timeout());
    let client = ManagementClient::local(cfg.port, &key, &transport)?
        .with_auth_url_handler(Arc::new(print_auth_url));
    let probe = ProviderProbe::new()?;
    let proxy = ProcessProxy::new(ProcessConfig {
        binary: cfg.proxy_binary.clone(),
        config_path: cfg.proxy_config.clone(),
        port: cfg.port,
        startup_timeout: cfg.startup_timeout(),
        pid_file: match mode {
            ProxyMode::Detached => Some(pid_file_path()),
            ProxyMode::Foreground => None,
        },
    });

    let backends = proxydeck_api::backends(client, probe, proxy, Arc::new(picker));
    Ok(Controller::new(backends, cfg.orchestrator_config()))
}

fn print_auth_url(provider: Provider, url: &str) {
    eprintln!("Open this URL to authorize {}:", provider.display_name());
    eprintln!("  {url}");
}
