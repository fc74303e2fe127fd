//! One CLI invocation's view of the controller.
//!
//! Subscribes to notifications before any operation runs so nothing the
//! core reports is missed, and prints them to stderr.

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::debug;

use proxydeck_core::{Controller, Notification, NotificationLevel};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

pub struct Session {
    pub controller: Controller,
    notices: broadcast::Receiver<Arc<Notification>>,
    quiet: bool,
    color: bool,
}

impl Session {
    pub async fn open(controller: Controller, global: &GlobalOpts) -> Result<Self, CliError> {
        let notices = controller.notifications();
        controller.refresh_proxy_status().await?;
        Ok(Self {
            controller,
            notices,
            quiet: global.quiet,
            color: output::should_color(&global.color),
        })
    }

    pub fn color(&self) -> bool {
        self.color
    }

    /// Print one notification. Quiet mode keeps warnings and errors.
    pub fn show(&self, notification: &Notification) {
        let chatty = matches!(
            notification.level,
            NotificationLevel::Info | NotificationLevel::Success
        );
        if self.quiet && chatty {
            return;
        }
        eprintln!("{}", output::format_notification(notification, self.color));
    }

    /// Print everything queued so far.
    pub fn flush(&mut self) {
        loop {
            match self.notices.try_recv() {
                Ok(n) => self.show(&n),
                Err(TryRecvError::Lagged(skipped)) => {
                    debug!(skipped, "notifications dropped");
                }
                Err(TryRecvError::Empty | TryRecvError::Closed) => break,
            }
        }
    }

    /// Drop queued notifications; the error report already covers them.
    pub fn discard(&mut self) {
        while !matches!(
            self.notices.try_recv(),
            Err(TryRecvError::Empty | TryRecvError::Closed)
        ) {}
    }

    /// Wait for the next notification.
    pub async fn next_notice(&mut self) -> Option<Arc<Notification>> {
        loop {
            match self.notices.recv().await {
                Ok(n) => return Some(n),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!(skipped, "notifications dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    pub async fn close(mut self, result: Result<(), CliError>) -> Result<(), CliError> {
        if result.is_ok() {
            self.flush();
        } else {
            self.discard();
        }
        self.controller.detach().await;
        self.controller.shutdown();
        result
    }
}
