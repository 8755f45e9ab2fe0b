//! Supervisor metrics counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics collector for observability
pub struct Metrics {
    /// Total health checks executed
    pub checks_run: AtomicU64,
    /// Total unhealthy check results
    pub checks_failed: AtomicU64,
    /// Total remediation attempts
    pub remediations: AtomicU64,
    /// Remediation attempts that reported failure
    pub remediations_failed: AtomicU64,
    /// Total escalations to human operators
    pub escalations: AtomicU64,
    /// Alerts delivered to at least one channel
    pub alerts_delivered: AtomicU64,
    /// Alerts suppressed by the cool-down dedup
    pub alerts_suppressed: AtomicU64,
    /// Resource samples taken
    pub resource_samples: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            checks_run: AtomicU64::new(0),
            checks_failed: AtomicU64::new(0),
            remediations: AtomicU64::new(0),
            remediations_failed: AtomicU64::new(0),
            escalations: AtomicU64::new(0),
            alerts_delivered: AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
            resource_samples: AtomicU64::new(0),
        }
    }

    pub fn inc_checks_run(&self, n: u64) {
        self.checks_run.fetch_add(n, Ordering::Relaxed);
    }

    pub fn inc_checks_failed(&self) {
        self.checks_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_remediations(&self) {
        self.remediations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_remediations_failed(&self) {
        self.remediations_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_escalations(&self) {
        self.escalations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_delivered(&self) {
        self.alerts_delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_alerts_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_resource_samples(&self) {
        self.resource_samples.fetch_add(1, Ordering::Relaxed);
    }

    /// Export metrics in Prometheus format
    pub fn prometheus(&self) -> String {
        format!(
            r#"# HELP warden_checks_total Total health checks executed
# TYPE warden_checks_total counter
warden_checks_total {}

# HELP warden_checks_failed_total Total unhealthy check results
# TYPE warden_checks_failed_total counter
warden_checks_failed_total {}

# HELP warden_remediations_total Total remediation attempts
# TYPE warden_remediations_total counter
warden_remediations_total {}

# HELP warden_remediations_failed_total Remediation attempts that failed
# TYPE warden_remediations_failed_total counter
warden_remediations_failed_total {}

# HELP warden_escalations_total Escalations to human operators
# TYPE warden_escalations_total counter
warden_escalations_total {}

# HELP warden_alerts_delivered_total Alerts delivered to at least one channel
# TYPE warden_alerts_delivered_total counter
warden_alerts_delivered_total {}

# HELP warden_alerts_suppressed_total Alerts suppressed by dedup
# TYPE warden_alerts_suppressed_total counter
warden_alerts_suppressed_total {}

# HELP warden_resource_samples_total Resource samples taken
# TYPE warden_resource_samples_total counter
warden_resource_samples_total {}
"#,
            self.checks_run.load(Ordering::Relaxed),
            self.checks_failed.load(Ordering::Relaxed),
            self.remediations.load(Ordering::Relaxed),
            self.remediations_failed.load(Ordering::Relaxed),
            self.escalations.load(Ordering::Relaxed),
            self.alerts_delivered.load(Ordering::Relaxed),
            self.alerts_suppressed.load(Ordering::Relaxed),
            self.resource_samples.load(Ordering::Relaxed),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
