// ── Credential records ──
//
// One record type per credential kind, mirrored locally from the
// proxy's configuration store. Field names serialise as kebab-case,
// the management API's wire format.

use std::collections::BTreeMap;
use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use strum::Display;

use crate::error::CoreError;

// ── ApiKey ───────────────────────────────────────────────────────────

/// A provider API key. Redacted in `Debug`, zeroised on drop, and only
/// exposed when serialised for the store or handed to a probe.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(SecretString::from(key.into()))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }

    pub fn is_blank(&self) -> bool {
        self.expose().trim().is_empty()
    }

    /// `abcd...wxyz` for display; short keys are fully hidden.
    pub fn masked(&self) -> String {
        let chars: Vec<char> = self.expose().chars().collect();
        if chars.len() <= 8 {
            return "****".into();
        }
        let head: String = chars.iter().take(4).collect();
        let tail: String = chars.iter().skip(chars.len() - 4).collect();
        format!("{head}...{tail}")
    }
}

impl Default for ApiKey {
    fn default() -> Self {
        Self::new(String::new())
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(****)")
    }
}

impl PartialEq for ApiKey {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for ApiKey {}

impl From<&str> for ApiKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for ApiKey {
    fn from(key: String) -> Self {
        Self::new(key)
    }
}

impl Serialize for ApiKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// The store sends `null` for empty lists.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// ── Record types ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct GeminiKey {
    pub api_key: ApiKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_models: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ClaudeKey {
    pub api_key: ApiKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub models: Option<Vec<ModelEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub excluded_models: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CodexKey {
    pub api_key: ApiKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

/// A custom OpenAI-compatible upstream with its own key pool and
/// model list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OpenAiCompatProvider {
    pub name: String,
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub api_key_entries: Vec<ApiKeyEntry>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub models: Vec<ModelEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ApiKeyEntry {
    pub api_key: ApiKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
}

impl ModelEntry {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    /// A model matches by its upstream name or its alias.
    pub fn matches(&self, candidate: &str) -> bool {
        self.name == candidate || self.alias.as_deref() == Some(candidate)
    }
}

impl OpenAiCompatProvider {
    pub fn has_model(&self, candidate: &str) -> bool {
        self.models.iter().any(|m| m.matches(candidate))
    }
}

// ── Kinds and the store boundary ─────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display)]
pub enum CredentialKind {
    #[strum(to_string = "gemini")]
    Gemini,
    #[strum(to_string = "claude")]
    Claude,
    #[strum(to_string = "codex")]
    Codex,
    #[strum(to_string = "openai-compatible")]
    OpenAiCompatible,
}

impl CredentialKind {
    pub const ALL: [Self; 4] = [
        Self::Gemini,
        Self::Claude,
        Self::Codex,
        Self::OpenAiCompatible,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Self::Gemini => "Gemini API key",
            Self::Claude => "Claude API key",
            Self::Codex => "Codex API key",
            Self::OpenAiCompatible => "OpenAI-compatible provider",
        }
    }
}

/// A whole collection of one kind; the unit exchanged with the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSet {
    Gemini(Vec<GeminiKey>),
    Claude(Vec<ClaudeKey>),
    Codex(Vec<CodexKey>),
    OpenAiCompatible(Vec<OpenAiCompatProvider>),
}

impl CredentialSet {
    pub fn kind(&self) -> CredentialKind {
        match self {
            Self::Gemini(_) => CredentialKind::Gemini,
            Self::Claude(_) => CredentialKind::Claude,
            Self::Codex(_) => CredentialKind::Codex,
            Self::OpenAiCompatible(_) => CredentialKind::OpenAiCompatible,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Gemini(v) => v.len(),
            Self::Claude(v) => v.len(),
            Self::Codex(v) => v.len(),
            Self::OpenAiCompatible(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn empty(kind: CredentialKind) -> Self {
        match kind {
            CredentialKind::Gemini => Self::Gemini(Vec::new()),
            CredentialKind::Claude => Self::Claude(Vec::new()),
            CredentialKind::Codex => Self::Codex(Vec::new()),
            CredentialKind::OpenAiCompatible => Self::OpenAiCompatible(Vec::new()),
        }
    }
}

/// Behaviour shared by every record kind held in a
/// [`CredentialStore`](crate::CredentialStore).
pub trait CredentialRecord: Clone + fmt::Debug + PartialEq + Send + Sync + 'static {
    const KIND: CredentialKind;

    /// Checked before any remote call.
    fn validate(&self) -> Result<(), CoreError>;

    fn into_set(records: Vec<Self>) -> CredentialSet;

    /// `None` when the set holds a different kind.
    fn from_set(set: CredentialSet) -> Option<Vec<Self>>;
}

fn require_api_key(key: &ApiKey) -> Result<(), CoreError> {
    if key.is_blank() {
        return Err(CoreError::validation("API key required"));
    }
    Ok(())
}

impl CredentialRecord for GeminiKey {
    const KIND: CredentialKind = CredentialKind::Gemini;

    fn validate(&self) -> Result<(), CoreError> {
        require_api_key(&self.api_key)
    }

    fn into_set(records: Vec<Self>) -> CredentialSet {
        CredentialSet::Gemini(records)
    }

    fn from_set(set: CredentialSet) -> Option<Vec<Self>> {
        match set {
            CredentialSet::Gemini(records) => Some(records),
            _ => None,
        }
    }
}

impl CredentialRecord for ClaudeKey {
    const KIND: CredentialKind = CredentialKind::Claude;

    fn validate(&self) -> Result<(), CoreError> {
        require_api_key(&self.api_key)
    }

    fn into_set(records: Vec<Self>) -> CredentialSet {
        CredentialSet::Claude(records)
    }

    fn from_set(set: CredentialSet) -> Option<Vec<Self>> {
        match set {
            CredentialSet::Claude(records) => Some(records),
            _ => None,
        }
    }
}

impl CredentialRecord for CodexKey {
    const KIND: CredentialKind = CredentialKind::Codex;

    fn validate(&self) -> Result<(), CoreError> {
        require_api_key(&self.api_key)
    }

    fn into_set(records: Vec<Self>) -> CredentialSet {
        CredentialSet::Codex(records)
    }

    fn from_set(set: CredentialSet) -> Option<Vec<Self>> {
        match set {
            CredentialSet::Codex(records) => Some(records),
            _ => None,
        }
    }
}

impl CredentialRecord for OpenAiCompatProvider {
    const KIND: CredentialKind = CredentialKind::OpenAiCompatible;

    fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() || self.base_url.trim().is_empty() {
            return Err(CoreError::validation("Name and Base URL required"));
        }
        if !self.api_key_entries.iter().any(|e| !e.api_key.is_blank()) {
            return Err(CoreError::validation("At least one API key required"));
        }
        Ok(())
    }

    fn into_set(records: Vec<Self>) -> CredentialSet {
        CredentialSet::OpenAiCompatible(records)
    }

    fn from_set(set: CredentialSet) -> Option<Vec<Self>> {
        match set {
            CredentialSet::OpenAiCompatible(records) => Some(records),
            _ => None,
        }
    }
}
