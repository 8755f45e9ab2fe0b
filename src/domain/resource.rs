//! Host-level resource snapshots and threshold zones

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Severity;

/// Host-level utilization snapshot
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ResourceSample {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub disk_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// Sampled host metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Cpu,
    Memory,
    Disk,
}

impl Metric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Cpu => "cpu",
            Metric::Memory => "memory",
            Metric::Disk => "disk",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Threshold zone a metric value falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Zone {
    Normal,
    Warning,
    Critical,
}

impl Zone {
    pub fn as_str(&self) -> &'static str {
        match self {
            Zone::Normal => "normal",
            Zone::Warning => "warning",
            Zone::Critical => "critical",
        }
    }

    /// Alert severity for a non-normal zone
    pub fn severity(&self) -> Option<Severity> {
        match self {
            Zone::Normal => None,
            Zone::Warning => Some(Severity::Warning),
            Zone::Critical => Some(Severity::Critical),
        }
    }
}

impl std::fmt::Display for Zone {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Warning/critical threshold pair partitioning a metric into three zones
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Threshold {
    pub warning: f64,
    pub critical: f64,
}

impl Threshold {
    pub fn zone(&self, value: f64) -> Zone {
        if value >= self.critical {
            Zone::Critical
        } else if value >= self.warning {
            Zone::Warning
        } else {
            Zone::Normal
        }
    }
}
