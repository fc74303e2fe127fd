//! `proxy start|stop|toggle|run`.

use std::time::Duration;

use tracing::{debug, warn};

use proxydeck_core::{LifecycleOutcome, ProxyStatus};

use crate::cli::{GlobalOpts, ProxyArgs, ProxyCommand};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

/// How often `proxy run` re-checks that the child is still listening.
const WATCH_INTERVAL: Duration = Duration::from_secs(5);

fn detail(status: &ProxyStatus, color: bool) -> String {
    match status.endpoint {
        Some(ref endpoint) => format!(
            "Proxy {} at {endpoint}",
            output::running_label(status.running, color)
        ),
        None => format!("Proxy {}", output::running_label(status.running, color)),
    }
}

fn print_status(
    session: &Session,
    status: &ProxyStatus,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = session.color();
    let out = output::render_single(
        &global.output,
        status,
        |s| detail(s, color),
        |s| s.endpoint.clone().unwrap_or_default(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

/// Status after a lifecycle call, with the notes the core leaves unsaid.
fn settle(session: &Session, outcome: LifecycleOutcome, global: &GlobalOpts) -> ProxyStatus {
    match outcome {
        LifecycleOutcome::Started(status) => status,
        LifecycleOutcome::Stopped(status) => {
            if status.running {
                eprintln!("Proxy is still running; it was not started by proxydeck.");
            }
            status
        }
        LifecycleOutcome::Unchanged(status) => {
            if !global.quiet {
                let state = if status.running { "running" } else { "stopped" };
                eprintln!("Proxy already {state}");
            }
            status
        }
        LifecycleOutcome::InFlight => session.controller.proxy_status(),
    }
}

pub async fn handle(
    session: &mut Session,
    args: ProxyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let outcome = match args.command {
        ProxyCommand::Start => {
            util::with_spinner("Starting proxy...", global.quiet, session.controller.start_proxy())
                .await?
        }
        ProxyCommand::Stop => session.controller.stop_proxy().await?,
        ProxyCommand::Toggle => {
            util::with_spinner("Switching proxy...", global.quiet, session.controller.toggle_proxy())
                .await?
        }
        ProxyCommand::Run => return run_foreground(session, global).await,
    };

    let status = settle(session, outcome, global);
    session.flush();
    print_status(session, &status, global)
}

/// Start the proxy, stream notifications, stop on Ctrl-C.
async fn run_foreground(session: &mut Session, global: &GlobalOpts) -> Result<(), CliError> {
    let outcome =
        util::with_spinner("Starting proxy...", global.quiet, session.controller.start_proxy())
            .await?;
    if let LifecycleOutcome::Unchanged(status) = outcome {
        eprintln!("Proxy is already running; nothing to supervise.");
        return print_status(session, &status, global);
    }
    session.flush();
    print_status(session, &session.controller.proxy_status(), global)?;
    if !global.quiet {
        eprintln!("Press Ctrl-C to stop.");
    }

    let mut watch = tokio::time::interval(WATCH_INTERVAL);
    watch.tick().await;
    let exited = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break false,
            _ = watch.tick() => {
                match session.controller.refresh_proxy_status().await {
                    Ok(status) if !status.running => break true,
                    Ok(_) => {}
                    Err(e) => debug!(error = %e, "status check failed"),
                }
            }
            Some(notice) = session.next_notice() => session.show(&notice),
        }
    };

    if exited {
        warn!("proxy stopped listening");
        return Err(CliError::Remote {
            operation: "Run proxy".into(),
            message: "the proxy exited".into(),
        });
    }

    eprintln!();
    session.controller.stop_proxy().await?;
    session.flush();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_shows_endpoint() {
        assert_eq!(
            detail(&ProxyStatus::running_on(8317), false),
            "Proxy running at http://localhost:8317/v1"
        );
        assert_eq!(detail(&ProxyStatus::stopped(), false), "Proxy stopped");
    }
}
