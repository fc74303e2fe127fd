// Management API: credential collections.
//
// Each kind is one endpoint exchanged wholesale. GET may wrap the array
// under the endpoint name and may send `null` for an empty collection;
// PUT takes the bare array.

use serde::Serialize;
use serde::de::DeserializeOwned;

use proxydeck_core::{CredentialKind, CredentialSet};

use super::ManagementClient;
use crate::error::Error;

/// Endpoint backing one credential kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEndpoint(&'static str);

impl KeyEndpoint {
    pub fn for_kind(kind: CredentialKind) -> Self {
        Self(match kind {
            CredentialKind::Gemini => "gemini-api-key",
            CredentialKind::Claude => "claude-api-key",
            CredentialKind::Codex => "codex-api-key",
            CredentialKind::OpenAiCompatible => "openai-compatibility",
        })
    }

    pub fn as_str(self) -> &'static str {
        self.0
    }
}

/// Pull the record array out of a GET body.
fn unwrap_list(json: serde_json::Value, key: KeyEndpoint) -> Result<serde_json::Value, Error> {
    use serde_json::Value;

    match json {
        Value::Object(mut obj) => match obj.remove(key.as_str()) {
            Some(arr @ Value::Array(_)) => Ok(arr),
            Some(Value::Null) | None => Ok(Value::Array(Vec::new())),
            Some(other) => Err(Error::Deserialization {
                message: format!("expected array or null under '{}'", key.as_str()),
                body: other.to_string(),
            }),
        },
        arr @ Value::Array(_) => Ok(arr),
        Value::Null => Ok(Value::Array(Vec::new())),
        other => Err(Error::Deserialization {
            message: format!("expected object with '{}' or an array", key.as_str()),
            body: other.to_string(),
        }),
    }
}

impl ManagementClient {
    pub async fn get_key_list<T: DeserializeOwned>(
        &self,
        key: KeyEndpoint,
    ) -> Result<Vec<T>, Error> {
        let json: serde_json::Value = self.get_json(self.endpoint(key.as_str())?).await?;
        let list = unwrap_list(json, key)?;
        serde_json::from_value(list.clone()).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: list.to_string(),
        })
    }

    pub async fn put_key_list<T: Serialize + Sync>(
        &self,
        key: KeyEndpoint,
        records: &[T],
    ) -> Result<(), Error> {
        self.put_json(self.endpoint(key.as_str())?, &records).await
    }

    /// Load the stored collection of one kind.
    pub async fn load_credentials(&self, kind: CredentialKind) -> Result<CredentialSet, Error> {
        let key = KeyEndpoint::for_kind(kind);
        Ok(match kind {
            CredentialKind::Gemini => CredentialSet::Gemini(self.get_key_list(key).await?),
            CredentialKind::Claude => CredentialSet::Claude(self.get_key_list(key).await?),
            CredentialKind::Codex => CredentialSet::Codex(self.get_key_list(key).await?),
            CredentialKind::OpenAiCompatible => {
                CredentialSet::OpenAiCompatible(self.get_key_list(key).await?)
            }
        })
    }

    /// Replace the stored collection of `set.kind()`.
    pub async fn store_credentials(&self, set: &CredentialSet) -> Result<(), Error> {
        let key = KeyEndpoint::for_kind(set.kind());
        match set {
            CredentialSet::Gemini(records) => self.put_key_list(key, records).await,
            CredentialSet::Claude(records) => self.put_key_list(key, records).await,
            CredentialSet::Codex(records) => self.put_key_list(key, records).await,
            CredentialSet::OpenAiCompatible(records) => self.put_key_list(key, records).await,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    const GEMINI: KeyEndpoint = KeyEndpoint("gemini-api-key");

    #[test]
    fn wrapped_null_is_empty() {
        let list = unwrap_list(json!({ "gemini-api-key": null }), GEMINI).unwrap();
        assert_eq!(list, json!([]));
    }

    #[test]
    fn bare_array_passes_through() {
        let list = unwrap_list(json!([{ "api-key": "k" }]), GEMINI).unwrap();
        assert_eq!(list, json!([{ "api-key": "k" }]));
    }

    #[test]
    fn wrong_shape_is_rejected() {
        assert!(matches!(
            unwrap_list(json!({ "gemini-api-key": "nope" }), GEMINI),
            Err(Error::Deserialization { .. })
        ));
        assert!(unwrap_list(json!(42), GEMINI).is_err());
    }
}
