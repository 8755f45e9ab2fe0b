//! Supervision scheduler
//!
//! Two independent interval loops: one probes every managed service, one
//! samples host resources. Probes within a cycle run concurrently; their
//! results are folded into the tracker serially in configured service order,
//! so state transitions stay deterministic.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use super::remediation::{ExecRemediator, Remediator};
use super::tracker::{Decision, FailureTracker, RestartPolicy};
use crate::alerts::AlertDispatcher;
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::domain::{AlertEvent, HealthResult, RemediationOutcome, ServiceSpec, Severity};
use crate::metrics::Metrics;
use crate::probes::{ProbeRunner, Probes};
use crate::sampler::ResourceSampler;
use crate::{Result, WardenError};

pub struct Supervisor {
    config: AppConfig,
    specs: Vec<ServiceSpec>,
    probes: Arc<dyn ProbeRunner>,
    tracker: Arc<FailureTracker>,
    remediator: Arc<dyn Remediator>,
    dispatcher: Arc<AlertDispatcher>,
    sampler: Arc<ResourceSampler>,
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
    started_at: DateTime<Utc>,
}

impl Supervisor {
    /// Assemble the production supervisor from validated configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let probes = Arc::new(Probes::new(
            Duration::from_secs(config.system.check_timeout_secs),
            clock.clone(),
        )?);
        let remediator = Arc::new(ExecRemediator::new(clock.clone()));
        let dispatcher = Arc::new(AlertDispatcher::from_config(
            &config.notifications,
            config.system.alert_cooldown_secs,
            clock.clone(),
        )?);
        let sampler = Arc::new(ResourceSampler::new(
            config.resources.clone(),
            config.system.resource_history,
            clock.clone(),
        ));
        Ok(Self::with_parts(
            config, probes, remediator, dispatcher, sampler, clock,
        ))
    }

    /// Assemble from explicit parts, letting tests script probes,
    /// remediation, and delivery
    pub fn with_parts(
        config: AppConfig,
        probes: Arc<dyn ProbeRunner>,
        remediator: Arc<dyn Remediator>,
        dispatcher: Arc<AlertDispatcher>,
        sampler: Arc<ResourceSampler>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let specs = config.service_specs();
        let started_at = clock.now();
        Self {
            config,
            specs,
            probes,
            tracker: Arc::new(FailureTracker::new(clock.clone())),
            remediator,
            dispatcher,
            sampler,
            metrics: Arc::new(Metrics::new()),
            clock,
            started_at,
        }
    }

    /// Drive both loops until the task is cancelled
    pub async fn run(self: Arc<Self>) {
        info!(
            services = self.specs.len(),
            service_interval = self.config.system.service_check_interval_secs,
            resource_interval = self.config.system.check_interval_secs,
            "supervision loops starting"
        );

        let mut service_ticks = tokio::time::interval(Duration::from_secs(
            self.config.system.service_check_interval_secs,
        ));
        service_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut resource_ticks =
            tokio::time::interval(Duration::from_secs(self.config.system.check_interval_secs));
        resource_ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // When both intervals fire on the same tick, sample resources
            // before probing services
            tokio::select! {
                biased;
                _ = resource_ticks.tick() => self.tick_resources().await,
                _ = service_ticks.tick() => self.tick_services().await,
            }
        }
    }

    /// One service cycle: probe everything concurrently, merge serially
    pub async fn tick_services(&self) {
        let results = join_all(self.specs.iter().map(|spec| self.probes.run(spec))).await;
        self.metrics.inc_checks_run(results.len() as u64);

        for (spec, result) in self.specs.iter().zip(results) {
            self.merge_result(spec, result).await;
        }
    }

    async fn merge_result(&self, spec: &ServiceSpec, result: HealthResult) {
        if !result.healthy {
            self.metrics.inc_checks_failed();
            warn!(
                service = %spec.name,
                detail = result.detail.as_deref().unwrap_or("unknown"),
                "unhealthy"
            );
        }

        let policy = RestartPolicy::for_spec(spec, &self.config.system);
        let (decision, events) = self.tracker.ingest(spec, &policy, &result).await;
        self.dispatch_all(events).await;

        match decision {
            Decision::None => {}
            Decision::Escalate => self.metrics.inc_escalations(),
            Decision::Remediate => self.execute_remediation(spec).await,
        }
    }

    /// One remediation attempt under the configured timeout. The outcome is
    /// recorded; verification is left to the next check cycle.
    async fn execute_remediation(&self, spec: &ServiceSpec) {
        self.metrics.inc_remediations();
        let timeout = Duration::from_secs(self.config.system.remediation_timeout_secs);

        let outcome = match tokio::time::timeout(timeout, self.remediator.remediate(spec)).await {
            Ok(outcome) => outcome,
            Err(_) => RemediationOutcome::failure(
                format!("remediation timed out after {}s", timeout.as_secs()),
                self.clock.now(),
            ),
        };

        if !outcome.success {
            self.metrics.inc_remediations_failed();
            error!(service = %spec.name, reason = %outcome.message, "remediation attempt failed");
            let event = AlertEvent::new(
                Severity::Warning,
                &spec.name,
                "remediation-failed",
                format!("restart of {} failed: {}", spec.name, outcome.message),
                outcome.timestamp,
            );
            self.dispatch_all(vec![event]).await;
        }
        self.tracker.record_outcome(&spec.name, outcome).await;
    }

    /// One resource cycle
    pub async fn tick_resources(&self) {
        let events = self.sampler.tick();
        self.metrics.inc_resource_samples();
        self.dispatch_all(events).await;
    }

    async fn dispatch_all(&self, events: Vec<AlertEvent>) {
        for event in events {
            match self.dispatcher.dispatch(&event).await {
                None => self.metrics.inc_alerts_suppressed(),
                Some(_) => self.metrics.inc_alerts_delivered(),
            }
        }
    }

    /// Probe one service immediately, outside the loop. Used by the CLI
    /// `check` command; does not touch tracker state.
    pub async fn check_once(&self, service: &str) -> Result<HealthResult> {
        let spec = self
            .spec_of(service)
            .ok_or_else(|| WardenError::UnknownService(service.to_string()))?;
        Ok(self.probes.run(spec).await)
    }

    /// Operator-requested restart, budget rules applied
    pub async fn force_remediate(&self, service: &str) -> Result<()> {
        let spec = self
            .spec_of(service)
            .ok_or_else(|| WardenError::UnknownService(service.to_string()))?
            .clone();
        let policy = RestartPolicy::for_spec(&spec, &self.config.system);
        self.tracker.force_remediate(&spec.name, &policy).await?;
        self.execute_remediation(&spec).await;
        Ok(())
    }

    /// Operator acknowledgement of an escalated service
    pub async fn acknowledge(&self, service: &str) -> Result<()> {
        if self.spec_of(service).is_none() {
            return Err(WardenError::UnknownService(service.to_string()));
        }
        self.tracker.acknowledge(service).await
    }

    /// External anomaly signal routed through the normal alert pipeline
    pub async fn ingest_alert(&self, event: AlertEvent) {
        self.dispatch_all(vec![event]).await;
    }

    fn spec_of(&self, service: &str) -> Option<&ServiceSpec> {
        self.specs.iter().find(|s| s.name == service)
    }

    pub fn specs(&self) -> &[ServiceSpec] {
        &self.specs
    }

    pub fn tracker(&self) -> &FailureTracker {
        &self.tracker
    }

    pub fn sampler(&self) -> &ResourceSampler {
        &self.sampler
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn dispatcher(&self) -> &AlertDispatcher {
        &self.dispatcher
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn uptime_seconds(&self) -> u64 {
        (self.clock.now() - self.started_at).num_seconds().max(0) as u64
    }
}
