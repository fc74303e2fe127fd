// ── Orchestrator timing ──

use std::time::Duration;

/// Timing knobs for connection flows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// Spacing between OAuth status checks.
    pub poll_interval: Duration,
    /// Status checks before an OAuth flow times out.
    pub max_poll_attempts: u32,
    /// How long a provider stays marked "recently connected".
    pub highlight_duration: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            max_poll_attempts: 120,
            highlight_duration: Duration::from_secs(2),
        }
    }
}
