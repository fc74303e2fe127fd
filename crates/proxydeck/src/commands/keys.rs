//! `keys <kind> list|add|remove|update|save`.
//!
//! Keys are only ever printed masked; the raw values go to the proxy.

use serde::Serialize;
use tabled::Tabled;

use proxydeck_core::{
    ApiKey, ApiKeyEntry, ClaudeKey, CodexKey, Command as CoreCommand, CommandResult,
    CredentialDraft, CredentialKind, CredentialSet, GeminiKey, ModelEntry, OpenAiCompatProvider,
};

use crate::cli::{GlobalOpts, KeyAddArgs, KeyKind, KeyUpdateArgs, KeysArgs, KeysCommand};
use crate::error::CliError;
use crate::output;
use crate::session::Session;

use super::util;

// ── Masked views ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub(crate) struct KeyView {
    index: usize,
    api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    proxy_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    models: Vec<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ProviderView {
    index: usize,
    name: String,
    base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    prefix: Option<String>,
    api_keys: Vec<String>,
    models: Vec<String>,
}

impl ProviderView {
    pub(crate) fn new(index: usize, p: &OpenAiCompatProvider) -> Self {
        Self {
            index,
            name: p.name.clone(),
            base_url: p.base_url.clone(),
            prefix: p.prefix.clone(),
            api_keys: p.api_key_entries.iter().map(|e| e.api_key.masked()).collect(),
            models: p.models.iter().map(|m| m.name.clone()).collect(),
        }
    }
}

fn key_view(
    index: usize,
    api_key: &ApiKey,
    base_url: Option<&String>,
    prefix: Option<&String>,
    proxy_url: Option<&String>,
) -> KeyView {
    KeyView {
        index,
        api_key: api_key.masked(),
        base_url: base_url.cloned(),
        prefix: prefix.cloned(),
        proxy_url: proxy_url.cloned(),
        models: Vec::new(),
    }
}

fn key_views(set: &CredentialSet) -> Vec<KeyView> {
    match set {
        CredentialSet::Gemini(keys) => keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                key_view(i, &k.api_key, k.base_url.as_ref(), k.prefix.as_ref(), k.proxy_url.as_ref())
            })
            .collect(),
        CredentialSet::Claude(keys) => keys
            .iter()
            .enumerate()
            .map(|(i, k)| KeyView {
                models: k
                    .models
                    .iter()
                    .flatten()
                    .map(|m| m.name.clone())
                    .collect(),
                ..key_view(i, &k.api_key, k.base_url.as_ref(), k.prefix.as_ref(), k.proxy_url.as_ref())
            })
            .collect(),
        CredentialSet::Codex(keys) => keys
            .iter()
            .enumerate()
            .map(|(i, k)| {
                key_view(i, &k.api_key, k.base_url.as_ref(), k.prefix.as_ref(), k.proxy_url.as_ref())
            })
            .collect(),
        CredentialSet::OpenAiCompatible(_) => Vec::new(),
    }
}

// ── Table rows ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct KeyRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Key")]
    api_key: String,
    #[tabled(rename = "Base URL")]
    base_url: String,
    #[tabled(rename = "Prefix")]
    prefix: String,
    #[tabled(rename = "Proxy")]
    proxy_url: String,
}

impl From<&KeyView> for KeyRow {
    fn from(v: &KeyView) -> Self {
        Self {
            index: v.index,
            api_key: v.api_key.clone(),
            base_url: util::or_dash(v.base_url.as_deref()),
            prefix: util::or_dash(v.prefix.as_deref()),
            proxy_url: util::or_dash(v.proxy_url.as_deref()),
        }
    }
}

#[derive(Tabled)]
struct ProviderRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Base URL")]
    base_url: String,
    #[tabled(rename = "Keys")]
    keys: usize,
    #[tabled(rename = "Models")]
    models: usize,
}

impl From<&ProviderView> for ProviderRow {
    fn from(v: &ProviderView) -> Self {
        Self {
            index: v.index,
            name: v.name.clone(),
            base_url: v.base_url.clone(),
            keys: v.api_keys.len(),
            models: v.models.len(),
        }
    }
}

fn print_set(set: &CredentialSet, global: &GlobalOpts) -> Result<(), CliError> {
    let out = match set {
        CredentialSet::OpenAiCompatible(providers) => {
            let views: Vec<ProviderView> = providers
                .iter()
                .enumerate()
                .map(|(i, p)| ProviderView::new(i, p))
                .collect();
            output::render_list(&global.output, &views, |v| ProviderRow::from(v), |v| v.name.clone())?
        }
        _ => {
            let views = key_views(set);
            output::render_list(&global.output, &views, |v| KeyRow::from(v), |v| v.api_key.clone())?
        }
    };
    output::print_output(&out, global.quiet);
    Ok(())
}

// ── Drafts ───────────────────────────────────────────────────────────

fn single_key(keys: Vec<String>) -> Result<ApiKey, CliError> {
    let mut keys = keys.into_iter();
    let key = match keys.next() {
        Some(key) => key,
        None => util::prompt_secret("API key: ")?,
    };
    if keys.next().is_some() {
        return Err(CliError::Validation {
            field: "api-key".into(),
            reason: "only OpenAI-compatible providers take more than one key".into(),
        });
    }
    Ok(ApiKey::new(key.trim()))
}

fn draft(kind: KeyKind, args: KeyAddArgs) -> Result<CredentialDraft, CliError> {
    let KeyAddArgs {
        api_key,
        name,
        base_url,
        prefix,
        proxy_url,
        models,
    } = args;

    if kind != KeyKind::Openai && name.is_some() {
        return Err(CliError::Validation {
            field: "name".into(),
            reason: "only OpenAI-compatible providers have a name".into(),
        });
    }
    if !matches!(kind, KeyKind::Openai | KeyKind::Claude) && !models.is_empty() {
        return Err(CliError::Validation {
            field: "model".into(),
            reason: format!("{} keys do not carry a model list", CredentialKind::from(kind)),
        });
    }

    Ok(match kind {
        KeyKind::Gemini => CredentialDraft::Gemini(GeminiKey {
            api_key: single_key(api_key)?,
            base_url,
            prefix,
            proxy_url,
            ..GeminiKey::default()
        }),
        KeyKind::Claude => CredentialDraft::Claude(ClaudeKey {
            api_key: single_key(api_key)?,
            base_url,
            prefix,
            proxy_url,
            models: (!models.is_empty())
                .then(|| models.into_iter().map(ModelEntry::named).collect()),
            ..ClaudeKey::default()
        }),
        KeyKind::Codex => CredentialDraft::Codex(CodexKey {
            api_key: single_key(api_key)?,
            base_url,
            prefix,
            proxy_url,
            ..CodexKey::default()
        }),
        KeyKind::Openai => {
            let keys = if api_key.is_empty() {
                vec![util::prompt_secret("API key: ")?]
            } else {
                api_key
            };
            CredentialDraft::OpenAiCompatible(OpenAiCompatProvider {
                name: name.unwrap_or_default(),
                base_url: base_url.unwrap_or_default(),
                prefix,
                api_key_entries: keys
                    .into_iter()
                    .map(|k| ApiKeyEntry {
                        api_key: ApiKey::new(k.trim()),
                        proxy_url: proxy_url.clone(),
                    })
                    .collect(),
                models: models.into_iter().map(ModelEntry::named).collect(),
                headers: None,
            })
        }
    })
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(
    session: &mut Session,
    args: KeysArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let kind = CredentialKind::from(args.kind);
    let ws = util::with_spinner(
        "Loading API keys...",
        global.quiet,
        session.controller.open_credentials(),
    )
    .await?;

    let set = match args.command {
        KeysCommand::List => ws.snapshot(kind),

        KeysCommand::Add(add) => {
            let draft = draft(args.kind, add)?;
            written(session.controller.execute(CoreCommand::AddCredential(draft)).await?)?
        }

        KeysCommand::Remove { index } => {
            if !util::confirm(
                &format!("Remove {} #{index}?", kind.label()),
                "keys remove",
                global.yes,
            )? {
                return Ok(());
            }
            written(
                session
                    .controller
                    .execute(CoreCommand::RemoveCredential { kind, index })
                    .await?,
            )?
        }

        KeysCommand::Update(update) => {
            if args.kind != KeyKind::Openai {
                return Err(CliError::Validation {
                    field: "kind".into(),
                    reason: "only OpenAI-compatible providers can be edited; remove and re-add the key instead".into(),
                });
            }
            update_provider(&ws, update).await?
        }

        KeysCommand::Save => written(
            session
                .controller
                .execute(CoreCommand::SaveCredentials { kind })
                .await?,
        )?,
    };

    session.flush();
    print_set(&set, global)
}

fn written(result: CommandResult) -> Result<CredentialSet, CliError> {
    match result {
        CommandResult::Credentials(set) => Ok(set),
        other => Err(CliError::Internal(format!(
            "unexpected result for a credential write: {other:?}"
        ))),
    }
}

/// Edit through the workspace's edit buffer, so a rejected draft is
/// reported without touching the stored provider.
async fn update_provider(
    ws: &proxydeck_core::CredentialWorkspace,
    update: KeyUpdateArgs,
) -> Result<CredentialSet, CliError> {
    let store = ws.openai();
    store.begin_edit(update.index)?;
    store.edit(|p| {
        if let Some(name) = update.name {
            p.name = name;
        }
        if let Some(base_url) = update.base_url {
            p.base_url = base_url;
        }
        if let Some(prefix) = update.prefix {
            p.prefix = (!prefix.is_empty()).then_some(prefix);
        }
        if !update.api_key.is_empty() {
            p.api_key_entries = update
                .api_key
                .into_iter()
                .map(|k| ApiKeyEntry {
                    api_key: ApiKey::new(k.trim()),
                    proxy_url: None,
                })
                .collect();
        }
    })?;
    match store.commit_edit().await {
        Ok(providers) => Ok(CredentialSet::OpenAiCompatible(providers.to_vec())),
        Err(e) => {
            store.cancel_edit();
            Err(e.into())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn add_args(keys: &[&str]) -> KeyAddArgs {
        KeyAddArgs {
            api_key: keys.iter().map(ToString::to_string).collect(),
            name: None,
            base_url: None,
            prefix: None,
            proxy_url: None,
            models: Vec::new(),
        }
    }

    #[test]
    fn views_never_carry_the_raw_key() {
        let set = CredentialSet::Gemini(vec![GeminiKey {
            api_key: ApiKey::new("AIzaSyD-secret-value-1234"),
            prefix: Some("team".into()),
            ..GeminiKey::default()
        }]);
        let json = serde_json::to_string(&key_views(&set)).unwrap();
        assert!(!json.contains("secret-value"), "leaked: {json}");
        assert!(json.contains("AIza...1234"));
        assert!(json.contains("\"prefix\":\"team\""));
    }

    #[test]
    fn provider_view_masks_every_key() {
        let provider = OpenAiCompatProvider {
            name: "groq".into(),
            base_url: "https://api.groq.com/openai/v1".into(),
            api_key_entries: vec![
                ApiKeyEntry {
                    api_key: ApiKey::new("gsk-first-secret-key"),
                    proxy_url: None,
                },
                ApiKeyEntry {
                    api_key: ApiKey::new("short"),
                    proxy_url: None,
                },
            ],
            models: vec![ModelEntry::named("llama3.1")],
            ..OpenAiCompatProvider::default()
        };
        let view = ProviderView::new(0, &provider);
        assert_eq!(view.api_keys, vec!["gsk-...-key".to_owned(), "****".to_owned()]);
        assert_eq!(view.models, vec!["llama3.1".to_owned()]);
    }

    #[test]
    fn gemini_draft_takes_one_key() {
        let CredentialDraft::Gemini(key) = draft(KeyKind::Gemini, add_args(&[" AIza-x "])).unwrap()
        else {
            panic!("wrong draft kind");
        };
        assert_eq!(key.api_key.expose(), "AIza-x");

        let err = draft(KeyKind::Gemini, add_args(&["a", "b"])).unwrap_err();
        assert!(matches!(err, CliError::Validation { .. }));
    }

    #[test]
    fn openai_draft_keeps_every_key_and_model() {
        let mut args = add_args(&["k1", "k2"]);
        args.name = Some("groq".into());
        args.base_url = Some("https://api.groq.com/openai/v1".into());
        args.models = vec!["llama3.1".into()];
        args.proxy_url = Some("socks5://127.0.0.1:1080".into());

        let CredentialDraft::OpenAiCompatible(p) = draft(KeyKind::Openai, args).unwrap() else {
            panic!("wrong draft kind");
        };
        assert_eq!(p.api_key_entries.len(), 2);
        assert!(p.api_key_entries.iter().all(|e| e.proxy_url.is_some()));
        assert!(p.has_model("llama3.1"));
    }

    #[test]
    fn codex_rejects_models() {
        let mut args = add_args(&["k"]);
        args.models = vec!["gpt-5".into()];
        assert!(draft(KeyKind::Codex, args).is_err());
    }
}
