//! `test-provider`: reachability probe for an OpenAI-compatible endpoint.

use std::fmt::Write;

use proxydeck_core::{
    ApiKey, Command as CoreCommand, CommandResult, ProviderTestResult, TestTarget,
};

use crate::cli::{GlobalOpts, TestProviderArgs};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

fn detail(result: &ProviderTestResult) -> String {
    let mut out = result.message.clone();
    if let Some(n) = result.models_found {
        let _ = write!(out, "\nModels: {n}");
    }
    out
}

pub async fn handle(
    session: &mut Session,
    args: TestProviderArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ws = session.controller.open_credentials().await?;

    let probe = match args.index {
        Some(index) => {
            util::with_spinner("Testing provider...", global.quiet, ws.test_existing(index))
                .await?
        }
        None => {
            let api_key = match args.api_key {
                Some(key) => key,
                None => util::prompt_secret("API key: ")?,
            };
            let cmd = CoreCommand::TestProvider {
                target: TestTarget::NewForm,
                base_url: args.base_url.unwrap_or_default(),
                api_key: ApiKey::new(api_key.trim()),
            };
            match util::with_spinner("Testing provider...", global.quiet, session.controller.execute(cmd))
                .await?
            {
                CommandResult::ProviderTest(probe) => probe,
                other => {
                    return Err(CliError::Internal(format!(
                        "unexpected result for a provider test: {other:?}"
                    )));
                }
            }
        }
    };

    let Some(result) = probe else {
        return Err(CliError::Internal("a test for this provider is already running".into()));
    };

    // The core already reported the outcome as a notification.
    session.discard();
    let out = output::render_single(&global.output, &result, detail, |r| r.success.to_string())?;
    output::print_output(&out, global.quiet);

    if result.success {
        Ok(())
    } else {
        Err(CliError::ProbeFailed {
            message: result.message,
        })
    }
}
