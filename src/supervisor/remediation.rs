//! Remediation executor
//!
//! Maps each check kind to its restart mechanism. Remediation never returns
//! an error to the caller: every attempt produces a `RemediationOutcome`,
//! success or failure, which the tracker records and the next check cycle
//! verifies.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::domain::{CheckKind, RemediationOutcome, ServiceSpec};

/// Executes restarts; a seam so tests can script outcomes
#[async_trait]
pub trait Remediator: Send + Sync {
    async fn remediate(&self, spec: &ServiceSpec) -> RemediationOutcome;
}

/// Production remediator shelling out to the host's service managers
pub struct ExecRemediator {
    clock: Arc<dyn Clock>,
}

impl ExecRemediator {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    async fn restart_unit(&self, unit: &str) -> Result<String, String> {
        run_checked("systemctl", &["restart", unit]).await?;
        Ok(format!("systemctl restart {unit}"))
    }

    async fn restart_container(&self, container: &str) -> Result<String, String> {
        run_checked("docker", &["restart", container]).await?;
        Ok(format!("docker restart {container}"))
    }

    /// Terminate the tracked process, then relaunch it with the configured
    /// command. No relaunch command configured is a failed outcome.
    async fn restart_process(&self, spec: &ServiceSpec) -> Result<String, String> {
        let command = spec
            .restart_command
            .as_deref()
            .ok_or_else(|| "no restart_command configured".to_string())?;

        if let Some(pid) = resolve_pid(&spec.locator).await {
            terminate(pid)?;
            // Give the old process a moment to release ports and lock files
            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
        }

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .spawn()
            .map_err(|e| format!("relaunch failed to spawn: {e}"))?;
        info!(pid = child.id(), command, "process relaunched");
        Ok(format!("relaunched via: {command}"))
    }

    /// Endpoint services are restarted through their backing unit when one
    /// is configured; otherwise there is nothing to restart.
    async fn restart_endpoint(&self, spec: &ServiceSpec) -> Result<String, String> {
        match spec.backing_unit.as_deref() {
            Some(unit) => self.restart_unit(unit).await,
            None => Err("endpoint has no backing_unit, not directly restartable".to_string()),
        }
    }
}

#[async_trait]
impl Remediator for ExecRemediator {
    async fn remediate(&self, spec: &ServiceSpec) -> RemediationOutcome {
        let attempt = match spec.kind {
            CheckKind::SystemdUnit => self.restart_unit(&spec.locator).await,
            CheckKind::Container => self.restart_container(&spec.locator).await,
            CheckKind::Process => self.restart_process(spec).await,
            CheckKind::HttpEndpoint => self.restart_endpoint(spec).await,
        };

        let now = self.clock.now();
        match attempt {
            Ok(message) => {
                info!(service = %spec.name, %message, "remediation executed");
                RemediationOutcome::success(message, now)
            }
            Err(reason) => {
                warn!(service = %spec.name, %reason, "remediation failed");
                RemediationOutcome::failure(reason, now)
            }
        }
    }
}

async fn run_checked(program: &str, args: &[&str]) -> Result<(), String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| format!("{program} failed to run: {e}"))?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        Err(format!("{program} {} failed: {stderr}", args.join(" ")))
    }
}

/// Resolve a process locator (PID file path or process name) to a live PID
async fn resolve_pid(locator: &str) -> Option<u32> {
    let path = Path::new(locator);
    if path.exists() {
        let contents = tokio::fs::read_to_string(path).await.ok()?;
        return contents.trim().parse().ok();
    }
    let mut sys = sysinfo::System::new();
    sys.refresh_processes();
    let pid = sys
        .processes_by_name(locator)
        .next()
        .map(|p| p.pid().as_u32());
    pid
}

#[cfg(unix)]
fn terminate(pid: u32) -> Result<(), String> {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid as i32), Signal::SIGTERM)
        .map_err(|e| format!("SIGTERM to {pid} failed: {e}"))
}

#[cfg(not(unix))]
fn terminate(pid: u32) -> Result<(), String> {
    Err(format!("cannot signal PID {pid} on this platform"))
}
