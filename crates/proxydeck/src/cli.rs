//! Clap derive structures for the `proxydeck` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use proxydeck_core::{CredentialKind, Provider};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// proxydeck -- control deck for a local AI proxy
#[derive(Debug, Parser)]
#[command(
    name = "proxydeck",
    version,
    about = "Run a local AI proxy and manage its provider accounts and API keys",
    long_about = "Starts and stops the local proxy, links provider accounts through\n\
        OAuth or credential import, and manages the API keys and\n\
        OpenAI-compatible upstreams the proxy routes to.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Proxy port (overrides config)
    #[arg(long, env = "PROXYDECK_PORT", global = true)]
    pub port: Option<u16>,

    /// Management API key (overrides env, keyring and config)
    #[arg(long, env = "PROXYDECK_MANAGEMENT_KEY", global = true, hide_env = true)]
    pub management_key: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "PROXYDECK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Show proxy status and linked accounts
    #[command(alias = "st")]
    Status,

    /// Start, stop or supervise the proxy
    Proxy(ProxyArgs),

    /// Link a provider account (OAuth, or credential import for vertex)
    Connect(ConnectArgs),

    /// Remove every linked account of a provider
    Disconnect(DisconnectArgs),

    /// Manage provider API keys
    #[command(alias = "k")]
    Keys(KeysArgs),

    /// Manage the model list of an OpenAI-compatible provider
    Models(ModelsArgs),

    /// Check that an OpenAI-compatible endpoint answers with a key
    TestProvider(TestProviderArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Proxy ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ProxyArgs {
    #[command(subcommand)]
    pub command: ProxyCommand,
}

#[derive(Debug, Subcommand)]
pub enum ProxyCommand {
    /// Start the proxy in the background
    Start,
    /// Stop a proxy started by proxydeck
    Stop,
    /// Stop if running, start otherwise
    Toggle,
    /// Run the proxy in the foreground until Ctrl-C
    Run,
}

// ── Connections ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConnectArgs {
    /// Provider to link
    #[arg(value_parser = parse_provider)]
    pub provider: Provider,

    /// Credential file to import (vertex); prompted for when omitted
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DisconnectArgs {
    /// Provider whose accounts are removed
    #[arg(value_parser = parse_provider)]
    pub provider: Provider,
}

fn parse_provider(s: &str) -> Result<Provider, String> {
    s.parse().map_err(|_| {
        let names: Vec<&str> = Provider::ALL.iter().map(AsRef::as_ref).collect();
        format!("unknown provider '{s}' (expected one of: {})", names.join(", "))
    })
}

// ── API keys ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KeyKind {
    Gemini,
    Claude,
    Codex,
    /// OpenAI-compatible providers
    Openai,
}

impl From<KeyKind> for CredentialKind {
    fn from(kind: KeyKind) -> Self {
        match kind {
            KeyKind::Gemini => Self::Gemini,
            KeyKind::Claude => Self::Claude,
            KeyKind::Codex => Self::Codex,
            KeyKind::Openai => Self::OpenAiCompatible,
        }
    }
}

#[derive(Debug, Args)]
pub struct KeysArgs {
    /// Which collection to manage
    pub kind: KeyKind,

    #[command(subcommand)]
    pub command: KeysCommand,
}

#[derive(Debug, Subcommand)]
pub enum KeysCommand {
    /// List stored keys (masked)
    #[command(alias = "ls")]
    List,

    /// Add a key, or an OpenAI-compatible provider
    Add(KeyAddArgs),

    /// Remove the entry at an index
    #[command(alias = "rm")]
    Remove {
        /// Index as shown by `list`
        index: usize,
    },

    /// Edit an OpenAI-compatible provider in place
    Update(KeyUpdateArgs),

    /// Write the loaded collection back to the proxy unchanged
    Save,
}

#[derive(Debug, Args)]
pub struct KeyAddArgs {
    /// API key (prompted for when omitted). Repeatable for openai.
    #[arg(long)]
    pub api_key: Vec<String>,

    /// Provider name (openai)
    #[arg(long)]
    pub name: Option<String>,

    /// Upstream base URL (required for openai)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Model name prefix
    #[arg(long)]
    pub prefix: Option<String>,

    /// Outbound proxy for requests using this key
    #[arg(long)]
    pub proxy_url: Option<String>,

    /// Model to expose (openai, repeatable)
    #[arg(long = "model")]
    pub models: Vec<String>,
}

#[derive(Debug, Args)]
pub struct KeyUpdateArgs {
    /// Index as shown by `list`
    pub index: usize,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub base_url: Option<String>,

    #[arg(long)]
    pub prefix: Option<String>,

    /// Replace the key pool with these keys (repeatable)
    #[arg(long)]
    pub api_key: Vec<String>,
}

// ── Models ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ModelsArgs {
    /// OpenAI-compatible provider index (see `keys openai list`)
    #[arg(long, short = 'p')]
    pub provider: usize,

    #[command(subcommand)]
    pub command: ModelsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ModelsCommand {
    #[command(alias = "ls")]
    List,
    Add {
        name: String,
    },
    #[command(alias = "rm")]
    Remove {
        index: usize,
    },
}

// ── Probe ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TestProviderArgs {
    /// Probe a saved OpenAI-compatible provider by index
    #[arg(long, conflicts_with_all = ["base_url", "api_key"])]
    pub index: Option<usize>,

    /// Upstream base URL
    #[arg(long, required_unless_present = "index")]
    pub base_url: Option<String>,

    /// API key (prompted for when omitted)
    #[arg(long)]
    pub api_key: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Interactive configuration wizard
    Init,
    /// Print the effective configuration (secrets masked)
    Show,
    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
