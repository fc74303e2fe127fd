//! `models -p <provider> list|add|remove`.

use serde::Serialize;
use tabled::Tabled;

use proxydeck_core::{Command as CoreCommand, CommandResult, CredentialSet, OpenAiCompatProvider};

use crate::cli::{GlobalOpts, ModelsArgs, ModelsCommand};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

#[derive(Debug, Serialize)]
struct ModelView {
    index: usize,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    alias: Option<String>,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Alias")]
    alias: String,
}

fn model_views(provider: &OpenAiCompatProvider) -> Vec<ModelView> {
    provider
        .models
        .iter()
        .enumerate()
        .map(|(index, m)| ModelView {
            index,
            name: m.name.clone(),
            alias: m.alias.clone(),
        })
        .collect()
}

fn provider_at(
    providers: &[OpenAiCompatProvider],
    index: usize,
) -> Result<&OpenAiCompatProvider, CliError> {
    providers.get(index).ok_or_else(|| CliError::Invalid {
        message: format!("No OpenAI-compatible provider at index {index}"),
    })
}

pub async fn handle(
    session: &mut Session,
    args: ModelsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let ws = util::with_spinner(
        "Loading providers...",
        global.quiet,
        session.controller.open_credentials(),
    )
    .await?;
    let provider_index = args.provider;

    let providers = match args.command {
        ModelsCommand::List => ws.openai().list().to_vec(),
        ModelsCommand::Add { name } => providers_of(
            session
                .controller
                .execute(CoreCommand::AddModel {
                    provider_index,
                    name,
                })
                .await?,
        )?,
        ModelsCommand::Remove { index } => providers_of(
            session
                .controller
                .execute(CoreCommand::RemoveModel {
                    provider_index,
                    model_index: index,
                })
                .await?,
        )?,
    };

    let provider = provider_at(&providers, provider_index)?;
    session.flush();
    let views = model_views(provider);
    let out = output::render_list(
        &global.output,
        &views,
        |v| ModelRow {
            index: v.index,
            name: v.name.clone(),
            alias: util::or_dash(v.alias.as_deref()),
        },
        |v| v.name.clone(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn providers_of(result: CommandResult) -> Result<Vec<OpenAiCompatProvider>, CliError> {
    match result {
        CommandResult::Credentials(CredentialSet::OpenAiCompatible(providers)) => Ok(providers),
        other => Err(CliError::Internal(format!(
            "unexpected result for a model change: {other:?}"
        ))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proxydeck_core::ModelEntry;

    use super::*;

    #[test]
    fn views_keep_positions_and_aliases() {
        let provider = OpenAiCompatProvider {
            models: vec![
                ModelEntry::named("llama3.1"),
                ModelEntry {
                    name: "mixtral-8x7b".into(),
                    alias: Some("mixtral".into()),
                },
            ],
            ..OpenAiCompatProvider::default()
        };
        let views = model_views(&provider);
        assert_eq!(views[1].index, 1);
        assert_eq!(views[1].alias.as_deref(), Some("mixtral"));
    }

    #[test]
    fn missing_provider_is_a_usage_error() {
        let err = provider_at(&[], 2).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::exit_code::USAGE);
    }
}
