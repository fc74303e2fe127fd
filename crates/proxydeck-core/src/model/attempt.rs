// ── Connection attempts ──

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::{ConnectionKind, Provider};

/// Opaque handle identifying one in-progress OAuth authorization.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowToken(String);

impl FlowToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for FlowToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FlowToken({})", self.0)
    }
}

impl fmt::Display for FlowToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a connection flow currently stands.
///
/// OAuth: `Idle -> Requesting -> Polling -> {Succeeded, TimedOut, Failed}`.
/// Import: `Idle -> AwaitingFileSelection -> Importing -> {Succeeded, Failed}`.
/// A live [`ConnectionAttempt`] only ever carries the non-terminal phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    Requesting,
    Polling,
    AwaitingFileSelection,
    Importing,
    Succeeded,
    TimedOut,
    Failed,
}

impl FlowPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::TimedOut | Self::Failed)
    }
}

/// The single live connection attempt, if any.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionAttempt {
    pub provider: Provider,
    pub kind: ConnectionKind,
    pub flow_token: Option<FlowToken>,
    pub attempts_made: u32,
    pub started_at: DateTime<Utc>,
    pub phase: FlowPhase,
}

impl ConnectionAttempt {
    pub fn begin(provider: Provider) -> Self {
        let kind = provider.connection_kind();
        let phase = match kind {
            ConnectionKind::OAuth => FlowPhase::Requesting,
            ConnectionKind::Import => FlowPhase::AwaitingFileSelection,
        };
        Self {
            provider,
            kind,
            flow_token: None,
            attempts_made: 0,
            started_at: Utc::now(),
            phase,
        }
    }
}
