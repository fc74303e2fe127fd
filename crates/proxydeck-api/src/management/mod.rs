// Management API HTTP client
//
// Wraps `reqwest::Client` with the proxy's management URL layout and the
// `X-Management-Key` header. Endpoint groups live in sibling files as
// inherent methods so this module stays focused on transport mechanics.

mod auth;
mod keys;

use std::fmt;
use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use proxydeck_core::Provider;

use crate::error::Error;
use crate::transport::TransportConfig;

pub use auth::{AuthFile, AuthState, OAuthStart};
pub use keys::KeyEndpoint;

/// Header carrying the management secret on every request.
pub const MANAGEMENT_KEY_HEADER: &str = "X-Management-Key";

/// Secret the bundled proxy configuration ships with.
pub const DEFAULT_MANAGEMENT_KEY: &str = "proxypal-mgmt-key";

/// Receives the authorization URL of a freshly opened OAuth handshake,
/// typically to launch a browser.
pub type AuthUrlHandler = Arc<dyn Fn(Provider, &str) + Send + Sync>;

/// HTTP client for the proxy's `/v0/management/` API.
#[derive(Clone)]
pub struct ManagementClient {
    http: reqwest::Client,
    base_url: Url,
    auth_url_handler: Option<AuthUrlHandler>,
}

impl fmt::Debug for ManagementClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagementClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth_url_handler", &self.auth_url_handler.is_some())
            .finish_non_exhaustive()
    }
}

impl ManagementClient {
    /// Create a client rooted at `base_url` (the `.../v0/management/`
    /// prefix). The key is sent as a sensitive default header.
    pub fn new(
        base_url: &str,
        management_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        let mut value = HeaderValue::from_str(management_key.expose_secret())?;
        value.set_sensitive(true);
        headers.insert(MANAGEMENT_KEY_HEADER, value);

        let http = transport.build_client_with_headers(headers)?;
        Self::with_client(http, base_url)
    }

    /// Client for a proxy listening on `127.0.0.1:{port}`.
    pub fn local(
        port: u16,
        management_key: &SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Self::new(
            &format!("http://127.0.0.1:{port}/v0/management/"),
            management_key,
            transport,
        )
    }

    /// Create a client with a pre-built `reqwest::Client`. The caller is
    /// responsible for the management key header.
    pub fn with_client(http: reqwest::Client, base_url: &str) -> Result<Self, Error> {
        let mut normalized = base_url.to_owned();
        if !normalized.ends_with('/') {
            normalized.push('/');
        }
        Ok(Self {
            http,
            base_url: Url::parse(&normalized)?,
            auth_url_handler: None,
        })
    }

    /// Install the callback that receives OAuth authorization URLs.
    pub fn with_auth_url_handler(mut self, handler: AuthUrlHandler) -> Self {
        self.auth_url_handler = Some(handler);
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub(crate) fn hand_off_auth_url(&self, provider: Provider, url: &str) {
        match &self.auth_url_handler {
            Some(handler) => handler(provider, url),
            None => debug!(%provider, "no auth URL handler installed"),
        }
    }

    // ── URL builders ─────────────────────────────────────────────────

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    pub(crate) fn endpoint_with_query(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Url, Error> {
        let mut url = self.endpoint(path)?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        parse_json(check(resp).await?).await
    }

    /// GET that hands back the raw response, for endpoints where a
    /// non-success status carries meaning.
    pub(crate) async fn get_raw(&self, url: Url) -> Result<reqwest::Response, Error> {
        debug!("GET {}", url);
        Ok(self.http.get(url).send().await?)
    }

    pub(crate) async fn put_json(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("PUT {}", url);
        let resp = self.http.put(url).json(body).send().await?;
        check(resp).await.map(drop)
    }

    pub(crate) async fn post_json(&self, url: Url, body: &impl Serialize) -> Result<(), Error> {
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        check(resp).await.map(drop)
    }

    pub(crate) async fn delete(&self, url: Url) -> Result<(), Error> {
        debug!("DELETE {}", url);
        let resp = self.http.delete(url).send().await?;
        check(resp).await.map(drop)
    }
}

/// Turn a non-success status into `Error::Status`, keeping the body.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status {
        status: status.as_u16(),
        body,
    })
}

pub(crate) async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
