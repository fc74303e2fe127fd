mod cli;
mod commands;
mod config;
mod error;
mod output;
mod picker;
mod session;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, ProxyCommand};
use crate::config::ProxyMode;
use crate::error::CliError;
use crate::picker::PromptPicker;
use crate::session::Session;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Config commands don't need a controller
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "proxydeck", &mut std::io::stdout());
            Ok(())
        }

        // Everything else drives the controller
        cmd => {
            let cfg = config::effective_config(&cli.global)?;
            let mode = match cmd {
                Command::Proxy(ref args) if matches!(args.command, ProxyCommand::Run) => {
                    ProxyMode::Foreground
                }
                _ => ProxyMode::Detached,
            };
            let picker = match cmd {
                Command::Connect(ref args) => PromptPicker::new(args.file.clone()),
                _ => PromptPicker::default(),
            };
            let controller = config::build_controller(&cli.global, &cfg, mode, picker)?;
            let mut session = Session::open(controller, &cli.global).await?;

            tracing::debug!(command = ?cmd, "dispatching command");
            let result = commands::dispatch(cmd, &mut session, &cli.global).await;
            session.close(result).await
        }
    }
}
