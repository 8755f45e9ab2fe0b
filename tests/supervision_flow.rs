//! End-to-end supervision flow against scripted probes and remediators

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use warden::alerts::{AlertDispatcher, NotificationChannel};
use warden::clock::{Clock, ManualClock};
use warden::config::{AppConfig, SystemConfig};
use warden::domain::{
    AlertEvent, CheckKind, HealthResult, RemediationOutcome, ServiceSpec, ServiceStatus, Severity,
};
use warden::probes::ProbeRunner;
use warden::sampler::ResourceSampler;
use warden::supervisor::{Remediator, Supervisor};

/// Probe whose per-service health is flipped by the test
struct ScriptedProbe {
    healthy: Mutex<HashMap<String, bool>>,
    clock: Arc<ManualClock>,
}

impl ScriptedProbe {
    fn new(clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            healthy: Mutex::new(HashMap::new()),
            clock,
        })
    }

    async fn set_healthy(&self, service: &str, healthy: bool) {
        self.healthy
            .lock()
            .await
            .insert(service.to_string(), healthy);
    }
}

#[async_trait]
impl ProbeRunner for ScriptedProbe {
    async fn run(&self, spec: &ServiceSpec) -> HealthResult {
        let now = self.clock.now();
        let healthy = self
            .healthy
            .lock()
            .await
            .get(&spec.name)
            .copied()
            .unwrap_or(true);
        if healthy {
            HealthResult::healthy(&spec.name, now)
        } else {
            HealthResult::unhealthy(&spec.name, now, "scripted failure")
        }
    }
}

/// Remediator that records its calls and reports a scripted result
struct ScriptedRemediator {
    calls: Mutex<Vec<String>>,
    succeed: bool,
    clock: Arc<ManualClock>,
}

impl ScriptedRemediator {
    fn new(succeed: bool, clock: Arc<ManualClock>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            succeed,
            clock,
        })
    }

    async fn calls(&self) -> Vec<String> {
        self.calls.lock().await.clone()
    }
}

#[async_trait]
impl Remediator for ScriptedRemediator {
    async fn remediate(&self, spec: &ServiceSpec) -> RemediationOutcome {
        self.calls.lock().await.push(spec.name.clone());
        if self.succeed {
            RemediationOutcome::success("scripted restart", self.clock.now())
        } else {
            RemediationOutcome::failure("scripted restart failure", self.clock.now())
        }
    }
}

/// Channel that captures every delivered event
struct CapturingChannel {
    events: Mutex<Vec<AlertEvent>>,
}

impl CapturingChannel {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    async fn events(&self) -> Vec<AlertEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl NotificationChannel for CapturingChannel {
    fn name(&self) -> &'static str {
        "capturing"
    }

    fn min_severity(&self) -> Severity {
        Severity::Info
    }

    async fn deliver(&self, event: &AlertEvent) -> warden::Result<()> {
        self.events.lock().await.push(event.clone());
        Ok(())
    }
}

fn test_config(max_restarts: u32, window_secs: u64) -> AppConfig {
    let mut services = HashMap::new();
    services.insert(
        "web".to_string(),
        ServiceSpec {
            name: "web".to_string(),
            kind: CheckKind::HttpEndpoint,
            locator: "http://localhost:9999/health".to_string(),
            expected_status: 200,
            failure_threshold: 3,
            max_restarts: None,
            restart_window_secs: None,
            restart_command: None,
            backing_unit: None,
            max_container_restarts: None,
            description: "frontend".to_string(),
        },
    );

    AppConfig {
        system: SystemConfig {
            max_restarts,
            restart_window_secs: window_secs,
            alert_cooldown_secs: 300,
            ..SystemConfig::default()
        },
        resources: Default::default(),
        services,
        notifications: Default::default(),
        logging: Default::default(),
        status_port: None,
    }
}

struct Harness {
    supervisor: Arc<Supervisor>,
    probe: Arc<ScriptedProbe>,
    remediator: Arc<ScriptedRemediator>,
    channel: Arc<CapturingChannel>,
    clock: Arc<ManualClock>,
}

fn harness(config: AppConfig, remediation_succeeds: bool) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let probe = ScriptedProbe::new(clock.clone());
    let remediator = ScriptedRemediator::new(remediation_succeeds, clock.clone());
    let channel = CapturingChannel::new();
    let dispatcher = Arc::new(AlertDispatcher::with_channels(
        vec![channel.clone() as Arc<dyn NotificationChannel>],
        config.system.alert_cooldown_secs,
        clock.clone() as Arc<dyn Clock>,
    ));
    let sampler = Arc::new(ResourceSampler::new(
        config.resources.clone(),
        config.system.resource_history,
        clock.clone() as Arc<dyn Clock>,
    ));
    let supervisor = Arc::new(Supervisor::with_parts(
        config,
        probe.clone() as Arc<dyn ProbeRunner>,
        remediator.clone() as Arc<dyn Remediator>,
        dispatcher,
        sampler,
        clock.clone() as Arc<dyn Clock>,
    ));
    Harness {
        supervisor,
        probe,
        remediator,
        channel,
        clock,
    }
}

async fn tick(h: &Harness) {
    h.supervisor.tick_services().await;
    // Distinct timestamps per cycle
    h.clock.advance(Duration::seconds(15));
}

#[tokio::test]
async fn failure_threshold_triggers_restart_and_recovery_alerting() {
    let h = harness(test_config(3, 300), true);

    h.probe.set_healthy("web", false).await;
    tick(&h).await;
    tick(&h).await;
    assert!(h.remediator.calls().await.is_empty());

    // Third consecutive failure crosses the threshold
    tick(&h).await;
    assert_eq!(h.remediator.calls().await, vec!["web".to_string()]);

    let state = h.supervisor.tracker().state_of("web").await.unwrap();
    assert_eq!(state.status, ServiceStatus::Remediating);
    assert!(state.last_outcome.as_ref().unwrap().success);

    // Restart took; the next cycle reports recovery
    h.probe.set_healthy("web", true).await;
    tick(&h).await;

    let state = h.supervisor.tracker().state_of("web").await.unwrap();
    assert_eq!(state.status, ServiceStatus::Healthy);
    assert_eq!(state.consecutive_failures, 0);

    let events = h.channel.events().await;
    let kinds: Vec<&str> = events.iter().map(|e| e.dedup_key.as_str()).collect();
    assert_eq!(kinds, vec!["web:remediating", "web:recovered"]);
}

#[tokio::test]
async fn exhausted_budget_escalates_exactly_once() {
    let mut config = test_config(2, 300);
    config
        .services
        .get_mut("web")
        .unwrap()
        .failure_threshold = 1;
    let h = harness(config, true);

    h.probe.set_healthy("web", false).await;
    // Restart 1, fail, restart 2, fail -> escalate, then keep failing
    for _ in 0..6 {
        tick(&h).await;
    }

    assert_eq!(h.remediator.calls().await.len(), 2);
    let state = h.supervisor.tracker().state_of("web").await.unwrap();
    assert_eq!(state.status, ServiceStatus::Escalated);

    let events = h.channel.events().await;
    let criticals = events
        .iter()
        .filter(|e| e.severity == Severity::Critical)
        .count();
    assert_eq!(criticals, 1, "escalation must not re-alert every cycle");
}

#[tokio::test]
async fn budget_window_ages_out_and_restores_restarts() {
    let mut config = test_config(1, 300);
    config
        .services
        .get_mut("web")
        .unwrap()
        .failure_threshold = 1;
    let h = harness(config, true);

    h.probe.set_healthy("web", false).await;
    tick(&h).await; // restart 1, budget spent
    tick(&h).await; // escalated
    assert_eq!(h.remediator.calls().await.len(), 1);

    h.clock.advance(Duration::seconds(301));
    tick(&h).await;
    assert_eq!(h.remediator.calls().await.len(), 2);
    assert_eq!(
        h.supervisor.tracker().state_of("web").await.unwrap().status,
        ServiceStatus::Remediating
    );
}

#[tokio::test]
async fn failed_remediation_is_recorded_and_alerted() {
    let mut config = test_config(3, 300);
    config
        .services
        .get_mut("web")
        .unwrap()
        .failure_threshold = 1;
    let h = harness(config, false);

    h.probe.set_healthy("web", false).await;
    tick(&h).await;

    let state = h.supervisor.tracker().state_of("web").await.unwrap();
    let outcome = state.last_outcome.unwrap();
    assert!(!outcome.success);
    assert!(outcome.message.contains("scripted restart failure"));

    let events = h.channel.events().await;
    assert!(events
        .iter()
        .any(|e| e.dedup_key == "web:remediation-failed"));
}

#[tokio::test]
async fn external_anomalies_share_the_dedup_window() {
    let h = harness(test_config(3, 300), true);

    let event = AlertEvent::new(
        Severity::Warning,
        "backup-job",
        "failed",
        "nightly backup failed",
        Utc::now(),
    );
    h.supervisor.ingest_alert(event.clone()).await;
    h.supervisor.ingest_alert(event).await;

    assert_eq!(h.channel.events().await.len(), 1);
    assert_eq!(h.supervisor.metrics().alerts_suppressed.load(std::sync::atomic::Ordering::Relaxed), 1);
}

#[tokio::test]
async fn operator_remediation_and_acknowledgement() {
    let h = harness(test_config(1, 300), true);

    // Manual restart consumes the budget
    h.supervisor.force_remediate("web").await.unwrap();
    assert_eq!(h.remediator.calls().await.len(), 1);

    // In flight: a second request conflicts
    assert!(h.supervisor.force_remediate("web").await.is_err());

    assert!(h.supervisor.force_remediate("nope").await.is_err());
    assert!(h.supervisor.acknowledge("nope").await.is_err());
}

mod http_surface {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::util::ServiceExt;
    use warden::status::router;

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn status_reports_services_and_uptime() {
        let h = harness(test_config(3, 300), true);
        h.probe.set_healthy("web", false).await;
        tick(&h).await;

        let app = router(h.supervisor.clone());
        let response = app
            .oneshot(Request::get("/status").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["services"][0]["name"], "web");
        assert_eq!(json["services"][0]["status"], "degraded");
        assert_eq!(json["services"][0]["consecutive_failures"], 1);
    }

    #[tokio::test]
    async fn unknown_service_is_404_and_spent_budget_is_409() {
        let h = harness(test_config(1, 300), true);
        let app = router(h.supervisor.clone());

        let response = app
            .clone()
            .oneshot(
                Request::post("/services/nope/remediate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        // Spend the single budget slot manually
        h.supervisor.force_remediate("web").await.unwrap();
        // After the outcome lands the status is still Remediating; a second
        // operator request conflicts
        let response = app
            .oneshot(
                Request::post("/services/web/remediate")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn external_alert_ingestion_accepts_json() {
        let h = harness(test_config(3, 300), true);
        let app = router(h.supervisor.clone());

        let response = app
            .oneshot(
                Request::post("/alerts")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"severity":"critical","source":"disk-scrubber","condition":"corrupt","message":"checksum mismatch"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let events = h.channel.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].dedup_key, "disk-scrubber:corrupt");
    }

    #[tokio::test]
    async fn alert_ingestion_accepts_minimal_shape_without_condition() {
        let h = harness(test_config(3, 300), true);
        let app = router(h.supervisor.clone());

        let response = app
            .oneshot(
                Request::post("/alerts")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        r#"{"severity":"warning","source":"backup-job","message":"nightly backup failed"}"#,
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let events = h.channel.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].dedup_key, "backup-job:anomaly");
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let h = harness(test_config(3, 300), true);
        tick(&h).await;

        let app = router(h.supervisor.clone());
        let response = app
            .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains("warden_checks_total 1"));
    }
}
