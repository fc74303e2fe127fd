// Management API: OAuth handshakes, linked-account files, and
// service-account import.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use proxydeck_core::Provider;

use super::{ManagementClient, parse_json};
use crate::error::Error;

/// Authorization URL plus the state token used to poll for completion.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OAuthStart {
    pub url: String,
    #[serde(default)]
    pub state: String,
}

/// Progress of an OAuth handshake as reported by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    Complete,
    Pending,
    Failed(String),
}

#[derive(Debug, Deserialize)]
struct AuthStatusBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// One linked account, stored by the proxy as a credential file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthFile {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl AuthFile {
    /// Which provider this account belongs to: the `provider`/`type`
    /// field when present, otherwise the filename prefix.
    pub fn owner(&self) -> Option<Provider> {
        self.provider
            .as_deref()
            .or(self.kind.as_deref())
            .and_then(provider_from_label)
            .or_else(|| provider_from_filename(&self.name))
    }
}

fn provider_from_label(label: &str) -> Option<Provider> {
    match label.to_ascii_lowercase().as_str() {
        "claude" | "anthropic" => Some(Provider::Claude),
        "codex" | "openai" => Some(Provider::OpenAi),
        "gemini" | "gemini-cli" => Some(Provider::Gemini),
        "qwen" => Some(Provider::Qwen),
        "iflow" => Some(Provider::IFlow),
        "vertex" => Some(Provider::Vertex),
        "antigravity" => Some(Provider::Antigravity),
        _ => None,
    }
}

fn provider_from_filename(name: &str) -> Option<Provider> {
    const PREFIXES: [(&str, Provider); 8] = [
        ("claude-", Provider::Claude),
        ("anthropic-", Provider::Claude),
        ("codex-", Provider::OpenAi),
        ("gemini-", Provider::Gemini),
        ("qwen-", Provider::Qwen),
        ("iflow-", Provider::IFlow),
        ("vertex-", Provider::Vertex),
        ("antigravity-", Provider::Antigravity),
    ];
    let name = name.to_ascii_lowercase();
    PREFIXES
        .iter()
        .find(|(prefix, _)| name.starts_with(prefix))
        .map(|(_, provider)| *provider)
}

/// `auth-files` answers either `{ "files": [...] }` or a bare array.
#[derive(Deserialize)]
#[serde(untagged)]
enum AuthFilesBody {
    Wrapped {
        #[serde(default)]
        files: Option<Vec<AuthFile>>,
    },
    Bare(Vec<AuthFile>),
}

/// Path segment of the provider's auth-url endpoint. Vertex has none;
/// it links through a service-account import.
pub(crate) fn oauth_slug(provider: Provider) -> Option<&'static str> {
    match provider {
        Provider::Claude => Some("anthropic"),
        Provider::OpenAi => Some("codex"),
        Provider::Gemini => Some("gemini-cli"),
        Provider::Qwen => Some("qwen"),
        Provider::IFlow => Some("iflow"),
        Provider::Antigravity => Some("antigravity"),
        Provider::Vertex => None,
    }
}

impl ManagementClient {
    // ── OAuth ────────────────────────────────────────────────────────

    /// Ask the proxy to begin an OAuth handshake for `provider`.
    pub async fn request_auth_url(&self, provider: Provider) -> Result<OAuthStart, Error> {
        let slug = oauth_slug(provider).ok_or(Error::UnsupportedProvider(provider))?;
        let url =
            self.endpoint_with_query(&format!("{slug}-auth-url"), &[("is_webui", "true")])?;
        self.get_json(url).await
    }

    /// Poll a handshake. A non-success status means the proxy has no
    /// answer yet and is reported as [`AuthState::Pending`].
    pub async fn auth_state(&self, state: &str) -> Result<AuthState, Error> {
        let url = self.endpoint_with_query("get-auth-status", &[("state", state)])?;
        let resp = self.get_raw(url).await?;
        if !resp.status().is_success() {
            debug!(status = resp.status().as_u16(), "auth status not ready");
            return Ok(AuthState::Pending);
        }

        let body: AuthStatusBody = parse_json(resp).await?;
        Ok(match body.status.as_deref() {
            Some("ok") => AuthState::Complete,
            Some("error") => AuthState::Failed(
                body.error
                    .unwrap_or_else(|| "authorization was not completed".into()),
            ),
            _ => AuthState::Pending,
        })
    }

    // ── Linked accounts ──────────────────────────────────────────────

    pub async fn list_auth_files(&self) -> Result<Vec<AuthFile>, Error> {
        let body: AuthFilesBody = self.get_json(self.endpoint("auth-files")?).await?;
        Ok(match body {
            AuthFilesBody::Wrapped { files } => files.unwrap_or_default(),
            AuthFilesBody::Bare(files) => files,
        })
    }

    pub async fn delete_auth_file(&self, name: &str) -> Result<(), Error> {
        let url = self.endpoint_with_query("auth-files", &[("name", name)])?;
        self.delete(url).await
    }

    // ── Service-account import ───────────────────────────────────────

    /// Validate a Google service-account key file and hand it to the
    /// proxy. Returns the file's `project_id`.
    pub async fn import_vertex_credential(&self, path: &Path) -> Result<String, Error> {
        let invalid = |reason: String| Error::InvalidCredentialFile {
            path: path.to_path_buf(),
            reason,
        };

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| invalid(format!("cannot read file: {e}")))?;
        let json: serde_json::Value =
            serde_json::from_str(&content).map_err(|e| invalid(format!("invalid JSON: {e}")))?;

        if json.get("type").and_then(|t| t.as_str()) != Some("service_account") {
            return Err(invalid("'type' must be 'service_account'".into()));
        }
        let project_id = json
            .get("project_id")
            .and_then(|p| p.as_str())
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("missing 'project_id' field".into()))?
            .to_owned();

        self.post_json(self.endpoint("vertex/import")?, &json).await?;
        Ok(project_id)
    }
}
