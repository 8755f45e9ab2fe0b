//! Failure tracking and restart policy
//!
//! One `ServiceState` per managed service, keyed by name. The tracker turns
//! a stream of per-cycle health results into lifecycle transitions and
//! restart decisions; the scheduler acts on the decisions, the dispatcher on
//! the emitted events.
//!
//! Budget accounting uses a sliding window: timestamps older than the window
//! are pruned before every eligibility check, so an escalated service whose
//! window has aged out becomes restartable again without manual action.

use chrono::Duration;
#[cfg(test)]
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SystemConfig;
use crate::domain::{
    AlertEvent, HealthResult, RemediationOutcome, ServiceSpec, ServiceState, ServiceStatus,
    Severity,
};
use crate::{Result, WardenError};

/// Effective restart policy for one service, service overrides applied
/// over the global defaults
#[derive(Debug, Clone, Copy)]
pub struct RestartPolicy {
    pub failure_threshold: u32,
    pub max_restarts: u32,
    pub restart_window: Duration,
}

impl RestartPolicy {
    pub fn for_spec(spec: &ServiceSpec, system: &SystemConfig) -> Self {
        Self {
            failure_threshold: spec.failure_threshold,
            max_restarts: spec.max_restarts.unwrap_or(system.max_restarts),
            restart_window: Duration::seconds(
                spec.restart_window_secs.unwrap_or(system.restart_window_secs) as i64,
            ),
        }
    }
}

/// What the scheduler should do after ingesting a result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    None,
    /// Threshold reached with budget remaining; restart now
    Remediate,
    /// Threshold reached with the budget spent; page a human
    Escalate,
}

pub struct FailureTracker {
    states: RwLock<HashMap<String, ServiceState>>,
    clock: Arc<dyn Clock>,
}

impl FailureTracker {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            states: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Fold one health result into the service's state. Returns the restart
    /// decision plus any alert events the transition produced.
    pub async fn ingest(
        &self,
        spec: &ServiceSpec,
        policy: &RestartPolicy,
        result: &HealthResult,
    ) -> (Decision, Vec<AlertEvent>) {
        let now = result.timestamp;
        let mut states = self.states.write().await;
        let state = states.entry(spec.name.clone()).or_default();
        let mut events = Vec::new();

        if result.healthy {
            let was = state.status;
            state.consecutive_failures = 0;
            state.status = ServiceStatus::Healthy;
            state.last_result = Some(result.clone());
            if was != ServiceStatus::Healthy {
                info!(service = %spec.name, from = %was, "service recovered");
                events.push(AlertEvent::new(
                    Severity::Info,
                    &spec.name,
                    "recovered",
                    format!("{} recovered (was {})", spec.name, was),
                    now,
                ));
            }
            return (Decision::None, events);
        }

        state.consecutive_failures += 1;
        state.last_result = Some(result.clone());
        state.prune_restarts(now, policy.restart_window);
        let budget_left = (state.restart_times.len() as u32) < policy.max_restarts;
        let detail = result.detail.clone().unwrap_or_default();

        debug!(
            service = %spec.name,
            failures = state.consecutive_failures,
            status = %state.status,
            "unhealthy check"
        );

        match state.status {
            ServiceStatus::Remediating => {
                // The restart did not take. Fall back to degraded, or
                // straight to escalated when the budget is gone.
                if budget_left {
                    state.status = ServiceStatus::Degraded;
                } else {
                    state.status = ServiceStatus::Escalated;
                    warn!(service = %spec.name, "restart did not recover the service, budget spent");
                    events.push(AlertEvent::new(
                        Severity::Critical,
                        &spec.name,
                        "escalated",
                        format!(
                            "{} still failing after restart, budget of {} spent: {detail}",
                            spec.name, policy.max_restarts
                        ),
                        now,
                    ));
                }
                return (Decision::None, events);
            }
            ServiceStatus::Escalated => {
                if !budget_left {
                    // Still out of budget; stay escalated without re-alerting
                    return (Decision::None, events);
                }
                // Window aged out; re-enter the normal path
                state.status = ServiceStatus::Degraded;
            }
            ServiceStatus::Healthy => {
                state.status = ServiceStatus::Degraded;
            }
            ServiceStatus::Degraded => {}
        }

        if state.consecutive_failures < policy.failure_threshold {
            return (Decision::None, events);
        }

        if budget_left {
            state.status = ServiceStatus::Remediating;
            state.restart_times.push(now);
            info!(
                service = %spec.name,
                attempt = state.restart_times.len(),
                budget = policy.max_restarts,
                "failure threshold reached, remediating"
            );
            events.push(AlertEvent::new(
                Severity::Warning,
                &spec.name,
                "remediating",
                format!(
                    "{} hit {} consecutive failures, restarting ({}/{} in window): {detail}",
                    spec.name,
                    state.consecutive_failures,
                    state.restart_times.len(),
                    policy.max_restarts
                ),
                now,
            ));
            (Decision::Remediate, events)
        } else {
            state.status = ServiceStatus::Escalated;
            warn!(service = %spec.name, "restart budget exhausted, escalating");
            events.push(AlertEvent::new(
                Severity::Critical,
                &spec.name,
                "escalated",
                format!(
                    "{} failing with restart budget of {} exhausted, manual intervention required: {detail}",
                    spec.name, policy.max_restarts
                ),
                now,
            ));
            (Decision::Escalate, events)
        }
    }

    /// Record the outcome of a remediation attempt. Lifecycle state stays
    /// driven by health checks; only the attempt record is updated here.
    pub async fn record_outcome(&self, service: &str, outcome: RemediationOutcome) {
        let mut states = self.states.write().await;
        let state = states.entry(service.to_string()).or_default();
        state.last_remediated = Some(outcome.timestamp);
        state.last_outcome = Some(outcome);
    }

    /// Operator-requested restart. Consumes budget like an automatic one and
    /// refuses when one is already in flight or the budget is spent.
    pub async fn force_remediate(&self, service: &str, policy: &RestartPolicy) -> Result<()> {
        let now = self.clock.now();
        let mut states = self.states.write().await;
        let state = states.entry(service.to_string()).or_default();

        if state.status == ServiceStatus::Remediating {
            return Err(WardenError::RemediationInFlight(service.to_string()));
        }
        state.prune_restarts(now, policy.restart_window);
        if (state.restart_times.len() as u32) >= policy.max_restarts {
            return Err(WardenError::BudgetExhausted(service.to_string()));
        }

        state.status = ServiceStatus::Remediating;
        state.restart_times.push(now);
        info!(service, "operator-requested restart");
        Ok(())
    }

    /// Operator acknowledgement of an escalated service. Resets the status
    /// and the failure counter but keeps the restart history, so the budget
    /// still ages out naturally.
    pub async fn acknowledge(&self, service: &str) -> Result<()> {
        let mut states = self.states.write().await;
        let state = states
            .get_mut(service)
            .ok_or_else(|| WardenError::UnknownService(service.to_string()))?;
        state.status = ServiceStatus::Healthy;
        state.consecutive_failures = 0;
        info!(service, "escalation acknowledged");
        Ok(())
    }

    pub async fn state_of(&self, service: &str) -> Option<ServiceState> {
        self.states.read().await.get(service).cloned()
    }

    pub async fn snapshot(&self) -> HashMap<String, ServiceState> {
        self.states.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::domain::CheckKind;

    fn spec(name: &str, threshold: u32) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            kind: CheckKind::SystemdUnit,
            locator: format!("{name}.service"),
            expected_status: 200,
            failure_threshold: threshold,
            max_restarts: None,
            restart_window_secs: None,
            restart_command: None,
            backing_unit: None,
            max_container_restarts: None,
            description: String::new(),
        }
    }

    fn policy(threshold: u32, max_restarts: u32, window_secs: i64) -> RestartPolicy {
        RestartPolicy {
            failure_threshold: threshold,
            max_restarts,
            restart_window: Duration::seconds(window_secs),
        }
    }

    fn tracker_with_clock() -> (FailureTracker, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (FailureTracker::new(clock.clone()), clock)
    }

    async fn fail(
        tracker: &FailureTracker,
        spec: &ServiceSpec,
        policy: &RestartPolicy,
        now: DateTime<Utc>,
    ) -> (Decision, Vec<AlertEvent>) {
        tracker
            .ingest(spec, policy, &HealthResult::unhealthy(&spec.name, now, "down"))
            .await
    }

    async fn pass(
        tracker: &FailureTracker,
        spec: &ServiceSpec,
        policy: &RestartPolicy,
        now: DateTime<Utc>,
    ) -> (Decision, Vec<AlertEvent>) {
        tracker
            .ingest(spec, policy, &HealthResult::healthy(&spec.name, now))
            .await
    }

    #[tokio::test]
    async fn threshold_must_be_consecutive() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 3);
        let policy = policy(3, 3, 300);

        // fail, fail, pass, fail, fail: never 3 in a row
        for healthy in [false, false, true, false, false] {
            let (decision, _) = if healthy {
                pass(&tracker, &spec, &policy, clock.now()).await
            } else {
                fail(&tracker, &spec, &policy, clock.now()).await
            };
            assert_eq!(decision, Decision::None);
        }

        let state = tracker.state_of("web").await.unwrap();
        assert_eq!(state.consecutive_failures, 2);
        assert!(state.restart_times.is_empty());
    }

    #[tokio::test]
    async fn third_consecutive_failure_remediates() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 3);
        let policy = policy(3, 3, 300);

        assert_eq!(fail(&tracker, &spec, &policy, clock.now()).await.0, Decision::None);
        assert_eq!(fail(&tracker, &spec, &policy, clock.now()).await.0, Decision::None);
        let (decision, events) = fail(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(decision, Decision::Remediate);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Warning);

        let state = tracker.state_of("web").await.unwrap();
        assert_eq!(state.status, ServiceStatus::Remediating);
        assert_eq!(state.restart_times.len(), 1);
    }

    #[tokio::test]
    async fn exhausted_budget_escalates_once() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 1);
        let policy = policy(1, 2, 300);

        // Two restarts spend the budget. After each Remediate decision a
        // failed check drops the service back to degraded.
        assert_eq!(fail(&tracker, &spec, &policy, clock.now()).await.0, Decision::Remediate);
        assert_eq!(fail(&tracker, &spec, &policy, clock.now()).await.0, Decision::None);
        assert_eq!(fail(&tracker, &spec, &policy, clock.now()).await.0, Decision::Remediate);

        // Budget gone: the post-restart failure escalates immediately
        let (decision, events) = fail(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(decision, Decision::None);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Critical);
        assert_eq!(
            tracker.state_of("web").await.unwrap().status,
            ServiceStatus::Escalated
        );

        // Continued failures while escalated stay quiet
        let (decision, events) = fail(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(decision, Decision::None);
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn window_aging_restores_eligibility() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 1);
        let policy = policy(1, 1, 300);

        assert_eq!(fail(&tracker, &spec, &policy, clock.now()).await.0, Decision::Remediate);
        // Restart fails, budget of 1 spent
        fail(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(
            tracker.state_of("web").await.unwrap().status,
            ServiceStatus::Escalated
        );

        // Age the window out; the next failure is restartable again
        clock.advance(Duration::seconds(301));
        let (decision, _) = fail(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(decision, Decision::Remediate);
        assert_eq!(
            tracker.state_of("web").await.unwrap().status,
            ServiceStatus::Remediating
        );
    }

    #[tokio::test]
    async fn recovery_emits_info_and_resets_counter() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 3);
        let policy = policy(3, 3, 300);

        fail(&tracker, &spec, &policy, clock.now()).await;
        fail(&tracker, &spec, &policy, clock.now()).await;
        let (_, events) = pass(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].severity, Severity::Info);

        let state = tracker.state_of("web").await.unwrap();
        assert_eq!(state.status, ServiceStatus::Healthy);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[tokio::test]
    async fn healthy_to_healthy_is_silent() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 3);
        let policy = policy(3, 3, 300);

        let (_, events) = pass(&tracker, &spec, &policy, clock.now()).await;
        assert!(events.is_empty());
        let (_, events) = pass(&tracker, &spec, &policy, clock.now()).await;
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn recovery_keeps_restart_history() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 1);
        let policy = policy(1, 3, 300);

        fail(&tracker, &spec, &policy, clock.now()).await;
        pass(&tracker, &spec, &policy, clock.now()).await;

        let state = tracker.state_of("web").await.unwrap();
        assert_eq!(state.restart_times.len(), 1);
    }

    #[tokio::test]
    async fn force_remediate_respects_budget_and_inflight() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 1);
        let policy = policy(1, 1, 300);

        fail(&tracker, &spec, &policy, clock.now()).await;
        // Remediating: refuse a concurrent operator restart
        assert!(matches!(
            tracker.force_remediate("web", &policy).await,
            Err(WardenError::RemediationInFlight(_))
        ));

        // Back to degraded with the budget spent
        fail(&tracker, &spec, &policy, clock.now()).await;
        assert!(matches!(
            tracker.force_remediate("web", &policy).await,
            Err(WardenError::BudgetExhausted(_))
        ));

        clock.advance(Duration::seconds(301));
        assert!(tracker.force_remediate("web", &policy).await.is_ok());
    }

    #[tokio::test]
    async fn acknowledge_resets_status_but_not_history() {
        let (tracker, clock) = tracker_with_clock();
        let spec = spec("web", 1);
        let policy = policy(1, 1, 300);

        fail(&tracker, &spec, &policy, clock.now()).await;
        fail(&tracker, &spec, &policy, clock.now()).await;
        assert_eq!(
            tracker.state_of("web").await.unwrap().status,
            ServiceStatus::Escalated
        );

        tracker.acknowledge("web").await.unwrap();
        let state = tracker.state_of("web").await.unwrap();
        assert_eq!(state.status, ServiceStatus::Healthy);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.restart_times.len(), 1);

        assert!(matches!(
            tracker.acknowledge("nope").await,
            Err(WardenError::UnknownService(_))
        ));
    }

    #[tokio::test]
    async fn services_are_tracked_independently() {
        let (tracker, clock) = tracker_with_clock();
        let web = spec("web", 2);
        let db = spec("db", 2);
        let policy = policy(2, 3, 300);

        fail(&tracker, &web, &policy, clock.now()).await;
        fail(&tracker, &db, &policy, clock.now()).await;
        let (decision, _) = fail(&tracker, &web, &policy, clock.now()).await;
        assert_eq!(decision, Decision::Remediate);
        assert_eq!(
            tracker.state_of("db").await.unwrap().status,
            ServiceStatus::Degraded
        );
    }
}
