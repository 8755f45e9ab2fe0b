use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::domain::{CheckKind, ServiceSpec, Severity, Threshold};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub system: SystemConfig,
    #[serde(default)]
    pub resources: ResourcesConfig,
    /// Service name -> spec; the name field is filled in from the map key
    #[serde(default)]
    pub services: HashMap<String, ServiceSpec>,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Status/command server port (default: 8080)
    #[serde(default)]
    pub status_port: Option<u16>,
}

/// Global supervision timings and restart budget defaults
#[derive(Debug, Clone, Deserialize)]
pub struct SystemConfig {
    /// Interval between host resource samples in seconds
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
    /// Interval between service check cycles in seconds
    #[serde(default = "default_service_check_interval")]
    pub service_check_interval_secs: u64,
    /// Per-probe timeout in seconds
    #[serde(default = "default_check_timeout")]
    pub check_timeout_secs: u64,
    /// Per-remediation-attempt timeout in seconds
    #[serde(default = "default_remediation_timeout")]
    pub remediation_timeout_secs: u64,
    /// Maximum restart attempts within the restart window (global default)
    #[serde(default = "default_max_restarts")]
    pub max_restarts: u32,
    /// Trailing window over which restart attempts are counted, in seconds
    #[serde(default = "default_restart_window")]
    pub restart_window_secs: u64,
    /// Cool-down for duplicate alert suppression in seconds
    #[serde(default = "default_alert_cooldown")]
    pub alert_cooldown_secs: u64,
    /// Number of resource samples kept for short-term trend display
    #[serde(default = "default_resource_history")]
    pub resource_history: usize,
}

fn default_check_interval() -> u64 {
    30
}

fn default_service_check_interval() -> u64 {
    15
}

fn default_check_timeout() -> u64 {
    5
}

fn default_remediation_timeout() -> u64 {
    30
}

fn default_max_restarts() -> u32 {
    3
}

fn default_restart_window() -> u64 {
    300
}

fn default_alert_cooldown() -> u64 {
    300
}

fn default_resource_history() -> usize {
    120
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
            service_check_interval_secs: default_service_check_interval(),
            check_timeout_secs: default_check_timeout(),
            remediation_timeout_secs: default_remediation_timeout(),
            max_restarts: default_max_restarts(),
            restart_window_secs: default_restart_window(),
            alert_cooldown_secs: default_alert_cooldown(),
            resource_history: default_resource_history(),
        }
    }
}

/// Warning/critical thresholds per host metric
#[derive(Debug, Clone, Deserialize)]
pub struct ResourcesConfig {
    #[serde(default = "default_cpu_threshold")]
    pub cpu: Threshold,
    #[serde(default = "default_memory_threshold")]
    pub memory: Threshold,
    #[serde(default = "default_disk_threshold")]
    pub disk: Threshold,
}

fn default_cpu_threshold() -> Threshold {
    Threshold {
        warning: 80.0,
        critical: 95.0,
    }
}

fn default_memory_threshold() -> Threshold {
    Threshold {
        warning: 80.0,
        critical: 95.0,
    }
}

fn default_disk_threshold() -> Threshold {
    Threshold {
        warning: 85.0,
        critical: 95.0,
    }
}

impl Default for ResourcesConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu_threshold(),
            memory: default_memory_threshold(),
            disk: default_disk_threshold(),
        }
    }
}

/// Notification channel configuration
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub email: EmailChannelConfig,
    #[serde(default)]
    pub chat: ChatChannelConfig,
    #[serde(default)]
    pub webhook: WebhookChannelConfig,
}

fn default_min_severity() -> Severity {
    Severity::Warning
}

fn default_smtp_port() -> u16 {
    587
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub smtp_host: String,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: Vec<String>,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

impl Default for EmailChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_host: String::new(),
            smtp_port: default_smtp_port(),
            username: String::new(),
            password: String::new(),
            from: String::new(),
            to: Vec::new(),
            min_severity: default_min_severity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Incoming-webhook URL of the chat bot
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

impl Default for ChatChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            webhook_url: String::new(),
            min_severity: default_min_severity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookChannelConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Endpoint receiving the full JSON event
    #[serde(default)]
    pub url: String,
    #[serde(default = "default_min_severity")]
    pub min_severity: Severity,
}

impl Default for WebhookChannelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            min_severity: default_min_severity(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config")
    }

    /// Load configuration from a specific directory
    pub fn load_from<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/production.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("WARDEN_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            )
            // Override with environment variables (WARDEN_SYSTEM__MAX_RESTARTS, etc.)
            .add_source(
                Environment::with_prefix("WARDEN")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        // Names come from the map keys
        for (name, spec) in config.services.iter_mut() {
            spec.name = name.clone();
        }

        Ok(config)
    }

    /// Service specs in a stable, configured order so that each tick's alert
    /// batch is reproducible
    pub fn service_specs(&self) -> Vec<ServiceSpec> {
        let mut specs: Vec<ServiceSpec> = self.services.values().cloned().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Validate configuration values. Any error is fatal at startup: the
    /// supervisor refuses to run with a partial or undefined spec set.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.system.check_interval_secs == 0 {
            errors.push("system.check_interval_secs must be positive".to_string());
        }
        if self.system.service_check_interval_secs == 0 {
            errors.push("system.service_check_interval_secs must be positive".to_string());
        }
        if self.system.check_timeout_secs == 0 {
            errors.push("system.check_timeout_secs must be positive".to_string());
        }
        if self.system.restart_window_secs == 0 {
            errors.push("system.restart_window_secs must be positive".to_string());
        }

        for (metric, t) in [
            ("cpu", &self.resources.cpu),
            ("memory", &self.resources.memory),
            ("disk", &self.resources.disk),
        ] {
            if t.warning >= t.critical {
                errors.push(format!(
                    "resources.{metric}: warning threshold ({}) must be below critical ({})",
                    t.warning, t.critical
                ));
            }
        }

        for (name, spec) in &self.services {
            if spec.locator.trim().is_empty() {
                errors.push(format!("services.{name}: locator must not be empty"));
            }
            if spec.failure_threshold == 0 {
                errors.push(format!("services.{name}: failure_threshold must be >= 1"));
            }
            if spec.max_restarts == Some(0) {
                errors.push(format!("services.{name}: max_restarts override must be >= 1"));
            }
            if spec.restart_window_secs == Some(0) {
                errors.push(format!(
                    "services.{name}: restart_window_secs override must be positive"
                ));
            }
            if spec.kind == CheckKind::HttpEndpoint {
                if !spec.locator.starts_with("http://") && !spec.locator.starts_with("https://") {
                    errors.push(format!(
                        "services.{name}: http-endpoint locator must be an http(s) URL"
                    ));
                }
                if !(100..=599).contains(&spec.expected_status) {
                    errors.push(format!(
                        "services.{name}: expected_status {} is not a valid HTTP status",
                        spec.expected_status
                    ));
                }
            }
        }

        let n = &self.notifications;
        if n.email.enabled {
            if n.email.smtp_host.is_empty() {
                errors.push("notifications.email: smtp_host is required when enabled".to_string());
            }
            if n.email.from.is_empty() {
                errors.push("notifications.email: from is required when enabled".to_string());
            }
            if n.email.to.is_empty() {
                errors.push("notifications.email: at least one recipient is required".to_string());
            }
        }
        if n.chat.enabled && n.chat.webhook_url.is_empty() {
            errors.push("notifications.chat: webhook_url is required when enabled".to_string());
        }
        if n.webhook.enabled && n.webhook.url.is_empty() {
            errors.push("notifications.webhook: url is required when enabled".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
