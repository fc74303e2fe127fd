// ── Proxy and account status snapshots ──

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::Provider;

/// Running state of the local proxy, replaced wholesale on every
/// successful start, stop or status read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyStatus {
    pub running: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
}

impl ProxyStatus {
    pub fn stopped() -> Self {
        Self::default()
    }

    pub fn running_on(port: u16) -> Self {
        Self {
            running: true,
            port: Some(port),
            endpoint: Some(format!("http://localhost:{port}/v1")),
        }
    }
}

/// Linked-account counts per provider.
///
/// A provider with zero accounts is indistinguishable from an absent one:
/// zero counts are dropped on every construction path, so derived
/// equality compares the normalised maps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<Provider, u32>", into = "BTreeMap<Provider, u32>")]
pub struct AuthStatus {
    counts: BTreeMap<Provider, u32>,
}

impl AuthStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_counts(counts: impl IntoIterator<Item = (Provider, u32)>) -> Self {
        let mut status = Self::new();
        for (provider, count) in counts {
            status.set(provider, count);
        }
        status
    }

    pub fn count(&self, provider: Provider) -> u32 {
        self.counts.get(&provider).copied().unwrap_or(0)
    }

    pub fn is_connected(&self, provider: Provider) -> bool {
        self.count(provider) > 0
    }

    pub fn set(&mut self, provider: Provider, count: u32) {
        if count == 0 {
            self.counts.remove(&provider);
        } else {
            self.counts.insert(provider, count);
        }
    }

    /// Providers with at least one linked account, in enum order.
    pub fn connected(&self) -> impl Iterator<Item = (Provider, u32)> + '_ {
        self.counts.iter().map(|(p, n)| (*p, *n))
    }

    pub fn total_accounts(&self) -> u32 {
        self.counts.values().sum()
    }
}

impl From<BTreeMap<Provider, u32>> for AuthStatus {
    fn from(counts: BTreeMap<Provider, u32>) -> Self {
        Self::from_counts(counts)
    }
}

impl From<AuthStatus> for BTreeMap<Provider, u32> {
    fn from(status: AuthStatus) -> Self {
        status.counts
    }
}
