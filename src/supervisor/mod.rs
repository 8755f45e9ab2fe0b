//! Self-healing supervision core
//!
//! The scheduler drives check cycles, the tracker turns results into
//! lifecycle transitions and restart decisions, and the remediation executor
//! carries the restarts out.

mod remediation;
mod scheduler;
mod tracker;

pub use remediation::{ExecRemediator, Remediator};
pub use scheduler::Supervisor;
pub use tracker::{Decision, FailureTracker, RestartPolicy};
