//! Core data model shared across the supervisor components

mod alert;
mod resource;
mod service;

pub use alert::{AlertEvent, Severity};
pub use resource::{Metric, ResourceSample, Threshold, Zone};
pub use service::{
    CheckKind, HealthResult, RemediationOutcome, ServiceSpec, ServiceState, ServiceStatus,
};
