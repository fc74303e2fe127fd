// Proxy process supervisor
//
// Owns at most one child proxy process. Liveness is judged by whether the
// management port accepts TCP connections, so a proxy started elsewhere
// is reported as running. With a pid file configured the child outlives
// this process and a later supervisor can stop it through the pid file.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::process::{Child, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use proxydeck_core::ProxyStatus;

use crate::error::Error;

const CONNECT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub binary: PathBuf,
    /// Passed as `--config <path>` when set.
    pub config_path: Option<PathBuf>,
    pub port: u16,
    pub startup_timeout: Duration,
    /// Detach the child and record its pid here. Without one the child
    /// is killed when the supervisor is dropped.
    pub pid_file: Option<PathBuf>,
}

#[derive(Debug)]
pub struct ProcessProxy {
    config: ProcessConfig,
    child: Mutex<Option<Child>>,
}

impl ProcessProxy {
    pub fn new(config: ProcessConfig) -> Self {
        Self {
            config,
            child: Mutex::new(None),
        }
    }

    pub fn port(&self) -> u16 {
        self.config.port
    }

    /// Launch the proxy and wait until its port answers. Already listening
    /// (ours or someone else's) counts as started.
    pub async fn start(&self) -> Result<ProxyStatus, Error> {
        let mut slot = self.child.lock().await;
        if port_open(self.config.port).await {
            debug!(port = self.config.port, "proxy already listening");
            return Ok(ProxyStatus::running_on(self.config.port));
        }

        let mut command = Command::new(&self.config.binary);
        if let Some(path) = &self.config.config_path {
            command.arg("--config").arg(path);
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(self.config.pid_file.is_none());

        let mut child = command.spawn().map_err(|source| Error::Spawn {
            binary: self.config.binary.clone(),
            source,
        })?;
        info!(binary = %self.config.binary.display(), pid = ?child.id(), "proxy spawned");

        let deadline = tokio::time::Instant::now() + self.config.startup_timeout;
        loop {
            if let Some(status) = child.try_wait()? {
                return Err(Error::ExitedEarly {
                    status: status.to_string(),
                });
            }
            if port_open(self.config.port).await {
                self.write_pid_file(child.id()).await?;
                *slot = Some(child);
                return Ok(ProxyStatus::running_on(self.config.port));
            }
            if tokio::time::Instant::now() >= deadline {
                if let Err(e) = child.kill().await {
                    warn!(error = %e, "failed to kill unresponsive proxy");
                }
                return Err(Error::StartupTimeout {
                    port: self.config.port,
                    timeout_secs: self.config.startup_timeout.as_secs(),
                });
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Kill the owned child, or the one recorded in the pid file. A proxy
    /// started by something else is left alone and reported as it is.
    ///
    /// The pid file is only trusted while the port is listening and the
    /// pid still runs the configured binary; otherwise it is stale and
    /// removed without signalling anything.
    pub async fn stop(&self) -> Result<ProxyStatus, Error> {
        let mut slot = self.child.lock().await;
        if let Some(mut child) = slot.take() {
            child.kill().await?;
            self.remove_pid_file().await;
            info!("proxy stopped");
            return Ok(ProxyStatus::stopped());
        }

        if let Some(pid) = self.read_pid_file().await {
            if !port_open(self.config.port).await {
                debug!(pid, "proxy not listening; discarding stale pid file");
                self.remove_pid_file().await;
                return Ok(ProxyStatus::stopped());
            }
            if runs_binary(pid, &self.config.binary) {
                let terminated = terminate(pid).await;
                self.remove_pid_file().await;
                terminated?;
                self.wait_for_port_close().await;
                info!(pid, "detached proxy stopped");
                return Ok(self.probe_status().await);
            }
            warn!(pid, "pid file names another process; discarding it");
            self.remove_pid_file().await;
        }
        drop(slot);

        let status = self.probe_status().await;
        if status.running {
            warn!(port = self.config.port, "proxy was not started here; leaving it running");
        }
        Ok(status)
    }

    pub async fn status(&self) -> ProxyStatus {
        {
            let mut slot = self.child.lock().await;
            if let Some(child) = slot.as_mut() {
                if let Ok(Some(exit)) = child.try_wait() {
                    warn!(%exit, "proxy exited");
                    *slot = None;
                }
            }
        }
        self.probe_status().await
    }

    async fn probe_status(&self) -> ProxyStatus {
        if port_open(self.config.port).await {
            ProxyStatus::running_on(self.config.port)
        } else {
            ProxyStatus::stopped()
        }
    }

    async fn wait_for_port_close(&self) {
        let deadline = tokio::time::Instant::now() + self.config.startup_timeout;
        while port_open(self.config.port).await && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    // ── Pid file ─────────────────────────────────────────────────────

    async fn write_pid_file(&self, pid: Option<u32>) -> Result<(), Error> {
        let (Some(path), Some(pid)) = (&self.config.pid_file, pid) else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, pid.to_string()).await?;
        Ok(())
    }

    async fn read_pid_file(&self) -> Option<u32> {
        let path = self.config.pid_file.as_ref()?;
        let text = tokio::fs::read_to_string(path).await.ok()?;
        text.trim().parse().ok()
    }

    async fn remove_pid_file(&self) {
        if let Some(path) = &self.config.pid_file {
            if let Err(e) = tokio::fs::remove_file(path).await {
                debug!(path = %path.display(), error = %e, "pid file not removed");
            }
        }
    }
}

async fn port_open(port: u16) -> bool {
    matches!(
        tokio::time::timeout(CONNECT_PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}

/// Whether `pid` is still running `binary`. Only Linux exposes the
/// command line cheaply; elsewhere the listening port is the only check.
#[cfg(target_os = "linux")]
fn runs_binary(pid: u32, binary: &Path) -> bool {
    let Ok(cmdline) = std::fs::read(format!("/proc/{pid}/cmdline")) else {
        return false;
    };
    let Some(argv0) = cmdline.split(|b| *b == 0).next() else {
        return false;
    };
    let argv0 = Path::new(std::str::from_utf8(argv0).unwrap_or_default());
    argv0.file_name().is_some() && argv0.file_name() == binary.file_name()
}

#[cfg(not(target_os = "linux"))]
fn runs_binary(_pid: u32, _binary: &Path) -> bool {
    true
}

/// Ask the OS to end a process we no longer hold a handle to.
async fn terminate(pid: u32) -> Result<(), Error> {
    #[cfg(windows)]
    let status = Command::new("taskkill")
        .args(["/PID", &pid.to_string(), "/F"])
        .status()
        .await?;
    #[cfg(not(windows))]
    let status = Command::new("kill").arg(pid.to_string()).status().await?;

    if status.success() {
        Ok(())
    } else {
        Err(Error::Terminate {
            pid,
            status: status.to_string(),
        })
    }
}
