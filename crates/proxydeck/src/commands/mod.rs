//! Command handlers, one module per top-level subcommand.

pub mod config_cmd;
pub mod connect;
pub mod keys;
pub mod models;
pub mod proxy;
pub mod status;
pub mod test_provider;
pub mod util;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;
use crate::session::Session;

/// Dispatch a parsed command to its handler.
pub async fn dispatch(
    cmd: Command,
    session: &mut Session,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status => status::handle(session, global).await,
        Command::Proxy(args) => proxy::handle(session, args, global).await,
        Command::Connect(args) => connect::handle_connect(session, args, global).await,
        Command::Disconnect(args) => connect::handle_disconnect(session, args, global).await,
        Command::Keys(args) => keys::handle(session, args, global).await,
        Command::Models(args) => models::handle(session, args, global).await,
        Command::TestProvider(args) => test_provider::handle(session, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
