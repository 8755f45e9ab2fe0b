//! Severity-tagged alert events
//!
//! Events flow from the failure tracker and resource sampler into the alert
//! dispatcher; external anomaly signals enter through the same shape.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Alert severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - state transitions, recoveries
    Info,
    /// Warning - degraded resources, remediation attempts
    Warning,
    /// Critical - escalations, critical resource zones
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        }
    }

    /// Emoji prefix used by the chat channel
    pub fn emoji(&self) -> &'static str {
        match self {
            Severity::Info => "\u{2139}\u{fe0f}",    // info icon
            Severity::Warning => "\u{26a0}\u{fe0f}", // warning icon
            Severity::Critical => "\u{1f6a8}",       // police light
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Alert payload routed through the dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertEvent {
    pub severity: Severity,
    /// Service name, or "system" for host-level conditions
    pub source: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    /// Source plus condition kind; identical keys within the cool-down
    /// window are suppressed
    pub dedup_key: String,
}

impl AlertEvent {
    /// Create an event with a dedup key of `source:condition`
    pub fn new(
        severity: Severity,
        source: &str,
        condition: &str,
        message: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            severity,
            source: source.to_string(),
            message: message.into(),
            timestamp,
            dedup_key: format!("{}:{}", source, condition),
        }
    }
}
