// Reachability probe for OpenAI-compatible upstreams.
//
// Read-only: lists models with the candidate key and reports what came
// back. Transport failures become an unsuccessful result rather than an
// error so the caller can show them inline.

use std::time::{Duration, Instant};

use reqwest::StatusCode;
use tracing::debug;

use proxydeck_core::{ApiKey, ProviderTestResult};

use crate::error::Error;
use crate::transport::TransportConfig;

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ProviderProbe {
    http: reqwest::Client,
}

impl ProviderProbe {
    pub fn new() -> Result<Self, Error> {
        Self::with_transport(&TransportConfig::with_timeout(PROBE_TIMEOUT))
    }

    pub fn with_transport(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    /// Try `{base}/models`, then `{base}/v1/models`. The first success or
    /// auth rejection decides; any other rejection moves on to the next
    /// candidate, and the last one is reported if none succeeds.
    pub async fn probe(&self, base_url: &str, api_key: &ApiKey) -> ProviderTestResult {
        let base = base_url.trim().trim_end_matches('/');
        if base.is_empty() || api_key.is_blank() {
            return failure("Base URL and API key are required", None);
        }

        let start = Instant::now();
        let mut last_rejection = None;
        for endpoint in [format!("{base}/models"), format!("{base}/v1/models")] {
            debug!("GET {}", endpoint);
            let sent = self
                .http
                .get(&endpoint)
                .bearer_auth(api_key.expose())
                .send()
                .await;
            let latency = elapsed_ms(start);

            match sent {
                Ok(resp) if resp.status().is_success() => {
                    let models_found = resp
                        .json::<serde_json::Value>()
                        .await
                        .ok()
                        .and_then(|json| json.get("data")?.as_array().map(Vec::len))
                        .and_then(|n| u32::try_from(n).ok());
                    return ProviderTestResult {
                        success: true,
                        message: format!("Connection successful! ({latency}ms)"),
                        latency_ms: Some(latency),
                        models_found,
                    };
                }
                Ok(resp)
                    if matches!(resp.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) =>
                {
                    return failure("Authentication failed - check your API key", Some(latency));
                }
                Ok(resp) => {
                    let status = resp.status();
                    debug!(status = status.as_u16(), "probe candidate rejected");
                    last_rejection = Some(format!("Provider returned {status}"));
                }
                Err(e) if e.is_timeout() => {
                    return failure("Connection timed out - check your base URL", Some(latency));
                }
                Err(e) if e.is_connect() => {
                    return failure("Could not connect - check your base URL", Some(latency));
                }
                Err(e) => {
                    debug!(error = %e, "probe candidate failed");
                    last_rejection = Some(format!("Request failed ({e})"));
                }
            }
        }

        let reason = last_rejection.unwrap_or_else(|| "No response".into());
        failure(
            &format!("{reason} - check your base URL (tried /models and /v1/models)"),
            Some(elapsed_ms(start)),
        )
    }
}

fn failure(message: &str, latency_ms: Option<u64>) -> ProviderTestResult {
    ProviderTestResult {
        success: false,
        message: message.into(),
        latency_ms,
        models_found: None,
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}
