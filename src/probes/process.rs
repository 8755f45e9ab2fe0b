//! Raw-process liveness checks
//!
//! The locator is either a PID file path or a process name to match. This
//! only establishes that the process exists; it makes no claim that the
//! process is serving correctly.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::Path;
use sysinfo::{Pid, System};

use super::CheckDriver;
use crate::domain::{HealthResult, ServiceSpec};
use crate::Result;

pub struct ProcessDriver;

#[async_trait]
impl CheckDriver for ProcessDriver {
    async fn probe(&self, spec: &ServiceSpec, now: DateTime<Utc>) -> Result<HealthResult> {
        let path = Path::new(&spec.locator);

        if path.exists() {
            // PID-file mode
            let contents = tokio::fs::read_to_string(path).await?;
            let pid: u32 = match contents.trim().parse() {
                Ok(pid) => pid,
                Err(_) => {
                    return Ok(HealthResult::unhealthy(
                        &spec.name,
                        now,
                        format!("invalid PID file: {}", spec.locator),
                    ))
                }
            };
            Ok(check_pid(&spec.name, pid, now))
        } else {
            // Name-match mode
            Ok(check_name(&spec.name, &spec.locator, now))
        }
    }
}

fn check_pid(service: &str, pid: u32, now: DateTime<Utc>) -> HealthResult {
    let mut sys = System::new();
    sys.refresh_processes();
    if sys.process(Pid::from_u32(pid)).is_some() {
        HealthResult::healthy(service, now)
    } else {
        HealthResult::unhealthy(service, now, format!("no process with PID {pid}"))
    }
}

fn check_name(service: &str, name: &str, now: DateTime<Utc>) -> HealthResult {
    let mut sys = System::new();
    sys.refresh_processes();
    if sys.processes_by_name(name).next().is_some() {
        HealthResult::healthy(service, now)
    } else {
        HealthResult::unhealthy(service, now, format!("no process matching name '{name}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CheckKind;
    use std::io::Write;

    fn spec(locator: &str) -> ServiceSpec {
        ServiceSpec {
            name: "worker".to_string(),
            kind: CheckKind::Process,
            locator: locator.to_string(),
            expected_status: 200,
            failure_threshold: 3,
            max_restarts: None,
            restart_window_secs: None,
            restart_command: None,
            backing_unit: None,
            max_container_restarts: None,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn own_pid_is_alive() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        let mut f = std::fs::File::create(&pid_file).unwrap();
        write!(f, "{}", std::process::id()).unwrap();

        let result = ProcessDriver
            .probe(&spec(pid_file.to_str().unwrap()), Utc::now())
            .await
            .unwrap();
        assert!(result.healthy);
    }

    #[tokio::test]
    async fn dead_pid_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        // PID near the typical pid_max; overwhelmingly unlikely to exist
        std::fs::write(&pid_file, "4194000").unwrap();

        let result = ProcessDriver
            .probe(&spec(pid_file.to_str().unwrap()), Utc::now())
            .await
            .unwrap();
        assert!(!result.healthy);
        assert!(result.detail.unwrap().contains("no process with PID"));
    }

    #[tokio::test]
    async fn garbage_pid_file_is_unhealthy() {
        let dir = tempfile::tempdir().unwrap();
        let pid_file = dir.path().join("worker.pid");
        std::fs::write(&pid_file, "not-a-pid").unwrap();

        let result = ProcessDriver
            .probe(&spec(pid_file.to_str().unwrap()), Utc::now())
            .await
            .unwrap();
        assert!(!result.healthy);
        assert!(result.detail.unwrap().contains("invalid PID file"));
    }

    #[tokio::test]
    async fn missing_name_is_unhealthy() {
        let result = ProcessDriver
            .probe(&spec("warden-definitely-not-running"), Utc::now())
            .await
            .unwrap();
        assert!(!result.healthy);
    }
}
