//! HTTP status-endpoint checks

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use std::time::{Duration, Instant};

use super::CheckDriver;
use crate::domain::{HealthResult, ServiceSpec};
use crate::{Result, WardenError};

/// Issues a bounded-timeout GET and compares the status against the
/// configured expected status. Network error, timeout, and status mismatch
/// each get a distinct diagnostic.
pub struct HttpDriver {
    client: Client,
}

impl HttpDriver {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(WardenError::Http)?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CheckDriver for HttpDriver {
    async fn probe(&self, spec: &ServiceSpec, now: DateTime<Utc>) -> Result<HealthResult> {
        let started = Instant::now();

        let result = match self.client.get(&spec.locator).send().await {
            Ok(response) => {
                let latency_ms = started.elapsed().as_millis() as u64;
                let status = response.status().as_u16();
                if status == spec.expected_status {
                    HealthResult::healthy(&spec.name, now).with_latency(latency_ms)
                } else {
                    HealthResult::unhealthy(
                        &spec.name,
                        now,
                        format!(
                            "unexpected status: got {status}, expected {}",
                            spec.expected_status
                        ),
                    )
                    .with_latency(latency_ms)
                }
            }
            Err(e) if e.is_timeout() => {
                HealthResult::unhealthy(&spec.name, now, "request timed out")
            }
            Err(e) if e.is_connect() => {
                HealthResult::unhealthy(&spec.name, now, format!("connection failed: {e}"))
            }
            Err(e) => HealthResult::unhealthy(&spec.name, now, format!("request error: {e}")),
        };

        Ok(result)
    }
}
