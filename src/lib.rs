//! warden: a self-healing service supervisor
//!
//! Periodically checks managed services through pluggable mechanisms
//! (systemd units, containers, raw processes, HTTP endpoints), samples host
//! resources against thresholds, restarts failing services within a sliding
//! restart budget, and escalates to human operators when the budget runs
//! out.

pub mod alerts;
pub mod cli;
pub mod clock;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod probes;
pub mod sampler;
pub mod status;
pub mod supervisor;

pub use config::AppConfig;
pub use error::{Result, WardenError};
pub use supervisor::Supervisor;
