//! Process-manager unit checks via systemctl

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;

use super::CheckDriver;
use crate::domain::{HealthResult, ServiceSpec};
use crate::Result;

/// Checks a systemd unit's active-state
pub struct SystemdDriver;

#[async_trait]
impl CheckDriver for SystemdDriver {
    async fn probe(&self, spec: &ServiceSpec, now: DateTime<Utc>) -> Result<HealthResult> {
        let output = Command::new("systemctl")
            .arg("is-active")
            .arg(&spec.locator)
            .output()
            .await?;

        let state = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(interpret_state(&spec.name, &spec.locator, &state, now))
    }
}

/// Healthy iff the unit reports active/running; any other state string is
/// carried through as the diagnostic.
fn interpret_state(
    service: &str,
    unit: &str,
    state: &str,
    now: DateTime<Utc>,
) -> HealthResult {
    match state {
        "active" | "running" => HealthResult::healthy(service, now),
        "" => HealthResult::unhealthy(service, now, format!("unit {unit} not known to systemd")),
        other => HealthResult::unhealthy(service, now, format!("unit state: {other}")),
    }
}
