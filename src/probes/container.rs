//! Containerized-service checks via the docker daemon

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;

use super::CheckDriver;
use crate::domain::{HealthResult, ServiceSpec};
use crate::Result;

/// Checks a container's state (and optionally its restart count)
pub struct ContainerDriver;

#[async_trait]
impl CheckDriver for ContainerDriver {
    async fn probe(&self, spec: &ServiceSpec, now: DateTime<Utc>) -> Result<HealthResult> {
        let output = Command::new("docker")
            .args(["inspect", "--format", "{{.State.Status}} {{.RestartCount}}"])
            .arg(&spec.locator)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            // Daemon unreachable gets a diagnostic distinct from "no such container"
            let detail = if stderr.contains("Cannot connect") || stderr.contains("daemon") {
                format!("docker daemon unreachable: {stderr}")
            } else {
                format!("container not found: {stderr}")
            };
            return Ok(HealthResult::unhealthy(&spec.name, now, detail));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(interpret_inspect(spec, &stdout, now))
    }
}

/// Parse `<status> <restart-count>` from docker inspect output
fn interpret_inspect(spec: &ServiceSpec, inspect: &str, now: DateTime<Utc>) -> HealthResult {
    let mut parts = inspect.split_whitespace();
    let status = parts.next().unwrap_or("unknown");
    let restart_count: u64 = parts.next().and_then(|c| c.parse().ok()).unwrap_or(0);

    if status != "running" {
        return HealthResult::unhealthy(
            &spec.name,
            now,
            format!("container not running (status: {status})"),
        );
    }

    if let Some(max) = spec.max_container_restarts {
        if restart_count > max {
            return HealthResult::unhealthy(
                &spec.name,
                now,
                format!("container restart count spiked: {restart_count} (limit {max})"),
            );
        }
    }

    HealthResult::healthy(&spec.name, now)
}
