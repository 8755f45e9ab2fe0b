//! Managed-service data model
//!
//! `ServiceSpec` is the immutable per-service configuration loaded at startup;
//! `ServiceState` is the mutable tracking record owned by the failure tracker.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Check mechanism kind - a small closed set, dispatched by spec kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CheckKind {
    /// Process-manager unit queried through systemctl
    SystemdUnit,
    /// Container queried through the docker daemon
    Container,
    /// Raw OS process located by PID file or name match
    Process,
    /// HTTP status endpoint
    HttpEndpoint,
}

impl CheckKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckKind::SystemdUnit => "systemd-unit",
            CheckKind::Container => "container",
            CheckKind::Process => "process",
            CheckKind::HttpEndpoint => "http-endpoint",
        }
    }
}

impl std::fmt::Display for CheckKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static configuration for one managed service. Immutable after load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSpec {
    /// Unique service name (filled in from the config map key)
    #[serde(default)]
    pub name: String,
    pub kind: CheckKind,
    /// Mechanism-specific locator: unit name, container id, PID file path or
    /// process name, or URL for endpoint checks
    pub locator: String,
    /// Expected HTTP status for endpoint checks
    #[serde(default = "default_expected_status")]
    pub expected_status: u16,
    /// Consecutive unhealthy results required before remediation
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Per-service override of the global restart budget
    #[serde(default)]
    pub max_restarts: Option<u32>,
    /// Per-service override of the global restart window
    #[serde(default)]
    pub restart_window_secs: Option<u64>,
    /// Shell command used to relaunch a raw process after termination
    #[serde(default)]
    pub restart_command: Option<String>,
    /// Backing systemd unit restarted on behalf of an HTTP endpoint service
    #[serde(default)]
    pub backing_unit: Option<String>,
    /// Treat the container as unhealthy once its restart count exceeds this
    #[serde(default)]
    pub max_container_restarts: Option<u64>,
    #[serde(default)]
    pub description: String,
}

fn default_expected_status() -> u16 {
    200
}

fn default_failure_threshold() -> u32 {
    3
}

/// Normalized health result produced by a check driver each cycle.
/// Ephemeral - consumed by the failure tracker, never persisted verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResult {
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub healthy: bool,
    /// Diagnostic message for unhealthy results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Round-trip latency for endpoint checks
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthResult {
    pub fn healthy(service: &str, timestamp: DateTime<Utc>) -> Self {
        Self {
            service: service.to_string(),
            timestamp,
            healthy: true,
            detail: None,
            latency_ms: None,
        }
    }

    pub fn unhealthy(service: &str, timestamp: DateTime<Utc>, detail: impl Into<String>) -> Self {
        Self {
            service: service.to_string(),
            timestamp,
            healthy: false,
            detail: Some(detail.into()),
            latency_ms: None,
        }
    }

    pub fn with_latency(mut self, latency_ms: u64) -> Self {
        self.latency_ms = Some(latency_ms);
        self
    }
}

/// Lifecycle state of a managed service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    /// Last check was healthy
    Healthy,
    /// Failures counted but below threshold
    Degraded,
    /// Restart in flight, awaiting the next check
    Remediating,
    /// Restart budget exhausted within the window
    Escalated,
}

impl ServiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServiceStatus::Healthy => "healthy",
            ServiceStatus::Degraded => "degraded",
            ServiceStatus::Remediating => "remediating",
            ServiceStatus::Escalated => "escalated",
        }
    }
}

impl std::fmt::Display for ServiceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one remediation attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemediationOutcome {
    pub success: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl RemediationOutcome {
    pub fn success(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: true,
            message: message.into(),
            timestamp,
        }
    }

    pub fn failure(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            success: false,
            message: message.into(),
            timestamp,
        }
    }
}

/// Mutable tracking record for one service. Created lazily on the first
/// check; mutated only by the failure tracker and remediation executor;
/// never persisted across supervisor restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceState {
    pub status: ServiceStatus,
    pub consecutive_failures: u32,
    /// Restart timestamps within the current window, oldest first
    pub restart_times: Vec<DateTime<Utc>>,
    pub last_outcome: Option<RemediationOutcome>,
    pub last_remediated: Option<DateTime<Utc>>,
    pub last_result: Option<HealthResult>,
}

impl Default for ServiceState {
    fn default() -> Self {
        Self {
            status: ServiceStatus::Healthy,
            consecutive_failures: 0,
            restart_times: Vec::new(),
            last_outcome: None,
            last_remediated: None,
            last_result: None,
        }
    }
}

impl ServiceState {
    /// Drop restart timestamps older than `window`. Called before every
    /// restart-eligibility check.
    pub fn prune_restarts(&mut self, now: DateTime<Utc>, window: Duration) {
        self.restart_times
            .retain(|t| now.signed_duration_since(*t) < window);
    }

    /// Restart attempts within the trailing window
    pub fn restarts_in_window(&self, now: DateTime<Utc>, window: Duration) -> usize {
        self.restart_times
            .iter()
            .filter(|t| now.signed_duration_since(**t) < window)
            .count()
    }
}
