use thiserror::Error;

/// Main error type for the supervisor
#[derive(Error, Debug)]
pub enum WardenError {
    // Configuration errors (fatal at startup only)
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Check mechanism errors (always contained at the probe boundary)
    #[error("Probe error for {service}: {reason}")]
    Probe { service: String, reason: String },

    // Remediation errors (recorded as failed outcomes, never propagated raw)
    #[error("Remediation failed for {service}: {reason}")]
    Remediation { service: String, reason: String },

    // Notification delivery errors (logged locally, never re-alerted)
    #[error("Delivery failed on channel {channel}: {reason}")]
    Delivery { channel: String, reason: String },

    // Command surface errors
    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Restart budget exhausted for {0}")]
    BudgetExhausted(String),

    #[error("Remediation already in flight for {0}")]
    RemediationInFlight(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for WardenError
pub type Result<T> = std::result::Result<T, WardenError>;
