//! `connect` and `disconnect`.

use indicatif::ProgressBar;
use serde::Serialize;

use proxydeck_core::{
    AuthStatus, ConnectOutcome, ConnectionAttempt, FlowPhase, Provider, RejectReason,
};

use crate::cli::{ConnectArgs, DisconnectArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

#[derive(Debug, Serialize)]
struct LinkedView {
    provider: Provider,
    accounts: u32,
}

fn linked_view(provider: Provider, auth: &AuthStatus) -> LinkedView {
    LinkedView {
        provider,
        accounts: auth.count(provider),
    }
}

fn print_linked(view: &LinkedView, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        view,
        |v| {
            let noun = if v.accounts == 1 { "account" } else { "accounts" };
            format!("{}: {} {noun} linked", v.provider.display_name(), v.accounts)
        },
        |v| v.accounts.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn waiting_message(attempt: &ConnectionAttempt, max_attempts: u32) -> String {
    match attempt.phase {
        FlowPhase::Polling => format!(
            "Waiting for {} authorization ({}/{max_attempts})",
            attempt.provider.display_name(),
            attempt.attempts_made
        ),
        FlowPhase::Importing => format!("Importing {} credentials...", attempt.provider.display_name()),
        _ => format!("Connecting {}...", attempt.provider.display_name()),
    }
}

// ── connect ──────────────────────────────────────────────────────────

pub async fn handle_connect(
    session: &mut Session,
    args: ConnectArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let provider = args.provider;
    let max_attempts = session.controller.config().max_poll_attempts;
    let mut attempts = session.controller.connection_attempt_stream();

    let controller = session.controller.clone();
    let mut task = tokio::spawn(async move { controller.connect(provider).await });

    // The spinner only starts once the flow is waiting, so prompts and the
    // authorization URL print cleanly first.
    let mut spinner: Option<ProgressBar> = None;
    let mut interrupted = false;

    let joined = loop {
        tokio::select! {
            joined = &mut task => break joined,
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                if let Some(ref pb) = spinner {
                    pb.set_message("Cancelling...");
                }
                session.controller.detach().await;
            }
            Some(current) = attempts.changed() => {
                let Some(attempt) = current else { continue };
                if matches!(attempt.phase, FlowPhase::Polling | FlowPhase::Importing) {
                    let pb = spinner.get_or_insert_with(|| util::spinner("", global.quiet));
                    pb.set_message(waiting_message(&attempt, max_attempts));
                }
            }
            Some(notice) = session.next_notice() => match spinner {
                Some(ref pb) => pb.suspend(|| session.show(&notice)),
                None => session.show(&notice),
            },
        }
    };
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    let outcome = joined.map_err(|e| CliError::Internal(e.to_string()))??;
    match outcome {
        ConnectOutcome::Connected(auth) => {
            session.flush();
            print_linked(&linked_view(provider, &auth), global)
        }
        ConnectOutcome::Rejected(RejectReason::ProxyNotRunning) => Err(CliError::ProxyNotRunning),
        ConnectOutcome::Rejected(RejectReason::AttemptInFlight { provider }) => {
            Err(CliError::AttemptInFlight { provider })
        }
        ConnectOutcome::NoFileSelected => Err(CliError::NoFileSelected),
        ConnectOutcome::Cancelled => Err(CliError::Interrupted),
    }
}

// ── disconnect ───────────────────────────────────────────────────────

pub async fn handle_disconnect(
    session: &mut Session,
    args: DisconnectArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let provider = args.provider;
    if !session.controller.proxy_status().running {
        return Err(CliError::ProxyNotRunning);
    }
    if !util::confirm(
        &format!(
            "Remove every linked {} account?",
            provider.display_name()
        ),
        "disconnect",
        global.yes,
    )? {
        return Ok(());
    }

    let auth = session.controller.disconnect(provider).await?;
    session.flush();
    print_linked(&linked_view(provider, &auth), global)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn polling_message_counts_attempts() {
        let mut attempt = ConnectionAttempt::begin(Provider::Claude);
        attempt.phase = FlowPhase::Polling;
        attempt.attempts_made = 3;
        assert_eq!(
            waiting_message(&attempt, 120),
            "Waiting for Claude authorization (3/120)"
        );
    }

    #[test]
    fn linked_view_reads_one_provider() {
        let auth = AuthStatus::from_counts([(Provider::Gemini, 2), (Provider::Qwen, 1)]);
        let view = linked_view(Provider::Gemini, &auth);
        assert_eq!(view.accounts, 2);
        assert_eq!(linked_view(Provider::Vertex, &auth).accounts, 0);
    }
}
