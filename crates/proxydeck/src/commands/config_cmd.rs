//! Config subcommand handlers.

use std::fmt::Write;
use std::path::PathBuf;

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

// ── Helpers ─────────────────────────────────────────────────────────

fn redacted(cfg: &Config) -> Config {
    let mut cfg = cfg.clone();
    if cfg.management_key.is_some() {
        cfg.management_key = Some("****".into());
    }
    cfg
}

/// Format config for display, masking sensitive fields.
fn format_config_redacted(cfg: &Config) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "port = {}", cfg.port);
    let _ = writeln!(out, "proxy_binary = \"{}\"", cfg.proxy_binary.display());
    if let Some(ref path) = cfg.proxy_config {
        let _ = writeln!(out, "proxy_config = \"{}\"", path.display());
    }
    let _ = writeln!(out, "startup_timeout_secs = {}", cfg.startup_timeout_secs);
    let _ = writeln!(out, "request_timeout_secs = {}", cfg.request_timeout_secs);
    if cfg.management_key.is_some() {
        let _ = writeln!(out, "management_key = \"****\"");
    }
    if let Some(ref env) = cfg.management_key_env {
        let _ = writeln!(out, "management_key_env = \"{env}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[orchestrator]");
    let _ = writeln!(out, "poll_interval_ms = {}", cfg.orchestrator.poll_interval_ms);
    let _ = writeln!(out, "max_poll_attempts = {}", cfg.orchestrator.max_poll_attempts);
    let _ = write!(out, "highlight_ms = {}", cfg.orchestrator.highlight_ms);
    out
}

/// Ask where the management key lives and record the choice in `cfg`.
fn prompt_key_storage(cfg: &mut Config) -> Result<(), CliError> {
    let choices = &[
        "Use the bundled default key",
        "Store a key in the system keyring (recommended)",
        "Read it from an environment variable",
        "Save to config file (plaintext)",
    ];
    let selection = Select::new()
        .with_prompt("Management key")
        .items(choices)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    match selection {
        0 => {}
        1 => {
            let key = rpassword::prompt_password("Management key: ").map_err(prompt_err)?;
            if key.is_empty() {
                return Err(CliError::Validation {
                    field: "management_key".into(),
                    reason: "key cannot be empty".into(),
                });
            }
            config::store_management_key(&key)?;
            eprintln!("   ✓ Management key stored in system keyring");
        }
        2 => {
            let name: String = Input::new()
                .with_prompt("Variable name")
                .default("PROXYDECK_MGMT_KEY".into())
                .interact_text()
                .map_err(prompt_err)?;
            cfg.management_key_env = Some(name);
        }
        _ => {
            let key = rpassword::prompt_password("Management key: ").map_err(prompt_err)?;
            cfg.management_key = (!key.is_empty()).then_some(key);
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("proxydeck configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let mut cfg = Config::default();

            cfg.port = Input::new()
                .with_prompt("Proxy port")
                .default(cfg.port)
                .interact_text()
                .map_err(prompt_err)?;

            let binary: String = Input::new()
                .with_prompt("Proxy executable")
                .default(cfg.proxy_binary.display().to_string())
                .interact_text()
                .map_err(prompt_err)?;
            cfg.proxy_binary = PathBuf::from(binary);

            let proxy_config: String = Input::new()
                .with_prompt("Proxy config file (empty for none)")
                .allow_empty(true)
                .interact_text()
                .map_err(prompt_err)?;
            cfg.proxy_config = (!proxy_config.trim().is_empty())
                .then(|| PathBuf::from(proxy_config.trim()));

            prompt_key_storage(&mut cfg)?;

            cfg.validate()?;
            let path = config::save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", path.display());
            eprintln!("\n  Try it: proxydeck proxy start && proxydeck status");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config()?);
            let out = output::render_single(&global.output, &cfg, format_config_redacted, |_| {
                config::config_path().display().to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Path ────────────────────────────────────────────────────
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
    }
}
