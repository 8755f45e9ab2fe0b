//! Check drivers
//!
//! One pluggable probe per managed-service kind, each producing a normalized
//! `HealthResult`. Drivers never raise past the probe boundary: `Probes::run`
//! converts errors and timeouts into unhealthy results so a misbehaving probe
//! can never block the scheduler.

mod container;
mod http;
mod process;
mod systemd;

pub use container::ContainerDriver;
pub use http::HttpDriver;
pub use process::ProcessDriver;
pub use systemd::SystemdDriver;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::clock::Clock;
use crate::domain::{CheckKind, HealthResult, ServiceSpec};
use crate::Result;

/// A health probe for one check mechanism
#[async_trait]
pub trait CheckDriver: Send + Sync {
    /// Determine the current health of the service described by `spec`.
    /// `now` is the tick timestamp stamped onto the result.
    async fn probe(&self, spec: &ServiceSpec, now: DateTime<Utc>) -> Result<HealthResult>;
}

/// Entry point for running probes. Implemented by [`Probes`] in production
/// and by scripted mocks in tests.
#[async_trait]
pub trait ProbeRunner: Send + Sync {
    async fn run(&self, spec: &ServiceSpec) -> HealthResult;
}

/// The fixed set of check drivers, dispatched by spec kind
pub struct Probes {
    systemd: SystemdDriver,
    container: ContainerDriver,
    process: ProcessDriver,
    http: HttpDriver,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl Probes {
    pub fn new(timeout: Duration, clock: Arc<dyn Clock>) -> Result<Self> {
        Ok(Self {
            systemd: SystemdDriver,
            container: ContainerDriver,
            process: ProcessDriver,
            http: HttpDriver::new(timeout)?,
            timeout,
            clock,
        })
    }

    fn driver_for(&self, kind: CheckKind) -> &dyn CheckDriver {
        match kind {
            CheckKind::SystemdUnit => &self.systemd,
            CheckKind::Container => &self.container,
            CheckKind::Process => &self.process,
            CheckKind::HttpEndpoint => &self.http,
        }
    }
}

#[async_trait]
impl ProbeRunner for Probes {
    /// Run the appropriate driver under the per-check timeout. Errors and
    /// timeouts come back as unhealthy results, never as propagated failures.
    async fn run(&self, spec: &ServiceSpec) -> HealthResult {
        let now = self.clock.now();
        let driver = self.driver_for(spec.kind);

        match tokio::time::timeout(self.timeout, driver.probe(spec, now)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                debug!("Probe for {} failed: {}", spec.name, e);
                HealthResult::unhealthy(&spec.name, now, format!("probe error: {e}"))
            }
            Err(_) => HealthResult::unhealthy(
                &spec.name,
                now,
                format!("probe timed out after {}s", self.timeout.as_secs()),
            ),
        }
    }
}
