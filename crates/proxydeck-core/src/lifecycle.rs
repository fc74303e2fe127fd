// ── Proxy lifecycle ──
//
// Start/stop the local proxy exactly once at a time. The published
// status is only ever replaced with what the control service returns.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::ProxyControl;
use crate::error::CoreError;
use crate::guard::SingleFlight;
use crate::model::ProxyStatus;
use crate::notify::Notifier;

/// What a lifecycle request ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleOutcome {
    Started(ProxyStatus),
    Stopped(ProxyStatus),
    /// Another start/stop/toggle was already in flight; nothing was sent.
    InFlight,
    /// The proxy was already in the requested state; nothing was sent.
    Unchanged(ProxyStatus),
}

pub(crate) struct ProxyLifecycle {
    control: Arc<dyn ProxyControl>,
    status: watch::Sender<ProxyStatus>,
    toggling: SingleFlight,
    notifier: Notifier,
}

impl ProxyLifecycle {
    pub(crate) fn new(control: Arc<dyn ProxyControl>, notifier: Notifier) -> Self {
        let (status, _) = watch::channel(ProxyStatus::default());
        Self {
            control,
            status,
            toggling: SingleFlight::default(),
            notifier,
        }
    }

    pub(crate) fn status(&self) -> ProxyStatus {
        self.status.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<ProxyStatus> {
        self.status.subscribe()
    }

    pub(crate) fn is_toggling(&self) -> bool {
        self.toggling.is_busy()
    }

    /// Stop if running, start otherwise.
    pub(crate) async fn toggle(&self) -> Result<LifecycleOutcome, CoreError> {
        let Some(_guard) = self.toggling.try_acquire() else {
            debug!("proxy toggle already in flight, ignoring");
            return Ok(LifecycleOutcome::InFlight);
        };
        let running = self.status.borrow().running;
        self.transition(!running).await
    }

    pub(crate) async fn start(&self) -> Result<LifecycleOutcome, CoreError> {
        self.ensure(true).await
    }

    pub(crate) async fn stop(&self) -> Result<LifecycleOutcome, CoreError> {
        self.ensure(false).await
    }

    /// Re-read the status from the control service.
    pub(crate) async fn refresh(&self) -> Result<ProxyStatus, CoreError> {
        match self.control.status().await {
            Ok(status) => {
                self.status.send_replace(status.clone());
                Ok(status)
            }
            Err(e) => {
                warn!(error = %e, "failed to read proxy status");
                let err = CoreError::remote("Read proxy status", &e);
                self.notifier
                    .error("Failed to read proxy status", err.to_string());
                Err(err)
            }
        }
    }

    async fn ensure(&self, running: bool) -> Result<LifecycleOutcome, CoreError> {
        let Some(_guard) = self.toggling.try_acquire() else {
            debug!("proxy lifecycle change already in flight, ignoring");
            return Ok(LifecycleOutcome::InFlight);
        };
        let current = self.status();
        if current.running == running {
            return Ok(LifecycleOutcome::Unchanged(current));
        }
        self.transition(running).await
    }

    /// Caller holds the guard.
    async fn transition(&self, start: bool) -> Result<LifecycleOutcome, CoreError> {
        let result = if start {
            self.control.start().await
        } else {
            self.control.stop().await
        };

        match result {
            Ok(status) => {
                self.status.send_replace(status.clone());
                if start {
                    info!(port = ?status.port, "proxy started");
                    let detail = status
                        .port
                        .map_or_else(|| "Proxy is running".to_owned(), |p| {
                            format!("Listening on port {p}")
                        });
                    self.notifier.success("Proxy started", detail);
                    Ok(LifecycleOutcome::Started(status))
                } else {
                    info!("proxy stopped");
                    self.notifier.info("Proxy stopped", "No requests are being routed");
                    Ok(LifecycleOutcome::Stopped(status))
                }
            }
            Err(e) => {
                warn!(error = %e, start, "proxy lifecycle change failed");
                let action = if start { "Start proxy" } else { "Stop proxy" };
                let err = CoreError::remote(action, &e);
                self.notifier.error("Failed to toggle proxy", err.to_string());
                Err(err)
            }
        }
    }
}
