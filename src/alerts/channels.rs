//! Notification channel implementations
//!
//! Each channel carries its own severity floor; the dispatcher skips a
//! channel when an event falls below it. Delivery failures are reported to
//! the caller but never abort delivery on sibling channels.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use crate::config::{ChatChannelConfig, EmailChannelConfig, WebhookChannelConfig};
use crate::domain::{AlertEvent, Severity};
use crate::{Result, WardenError};

/// A destination alerts can be delivered to
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Events below this severity are not delivered on this channel
    fn min_severity(&self) -> Severity;

    async fn deliver(&self, event: &AlertEvent) -> Result<()>;
}

/// SMTP email channel
pub struct EmailChannel {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    to: Vec<String>,
    min_severity: Severity,
}

impl EmailChannel {
    pub fn new(config: &EmailChannelConfig) -> Result<Self> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)
            .map_err(|e| WardenError::Delivery {
                channel: "email".to_string(),
                reason: format!("bad SMTP relay config: {e}"),
            })?
            .port(config.smtp_port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self {
            transport: builder.build(),
            from: config.from.clone(),
            to: config.to.clone(),
            min_severity: config.min_severity,
        })
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let subject = format!("[warden {}] {}", event.severity, event.source);
        let body = format!(
            "{}\n\nsource: {}\nseverity: {}\ntime: {}\n",
            event.message,
            event.source,
            event.severity,
            event.timestamp.to_rfc3339(),
        );

        for recipient in &self.to {
            let message = Message::builder()
                .from(self.from.parse().map_err(|e| WardenError::Delivery {
                    channel: "email".to_string(),
                    reason: format!("bad from address: {e}"),
                })?)
                .to(recipient.parse().map_err(|e| WardenError::Delivery {
                    channel: "email".to_string(),
                    reason: format!("bad recipient address: {e}"),
                })?)
                .subject(&subject)
                .header(ContentType::TEXT_PLAIN)
                .body(body.clone())
                .map_err(|e| WardenError::Delivery {
                    channel: "email".to_string(),
                    reason: e.to_string(),
                })?;

            self.transport
                .send(message)
                .await
                .map_err(|e| WardenError::Delivery {
                    channel: "email".to_string(),
                    reason: e.to_string(),
                })?;
        }
        debug!("email alert delivered to {} recipient(s)", self.to.len());
        Ok(())
    }
}

#[derive(Serialize)]
struct ChatMessage {
    msg_type: String,
    content: ChatContent,
}

#[derive(Serialize)]
struct ChatContent {
    text: String,
}

/// Incoming-webhook chat bot channel (Feishu/Lark text message shape)
pub struct ChatChannel {
    client: Client,
    webhook_url: String,
    min_severity: Severity,
}

impl ChatChannel {
    pub fn new(config: &ChatChannelConfig) -> Self {
        Self {
            client: Client::new(),
            webhook_url: config.webhook_url.clone(),
            min_severity: config.min_severity,
        }
    }
}

#[async_trait]
impl NotificationChannel for ChatChannel {
    fn name(&self) -> &'static str {
        "chat"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let message = ChatMessage {
            msg_type: "text".to_string(),
            content: ChatContent {
                text: format!(
                    "{} [{}] {}: {}",
                    event.severity.emoji(),
                    event.severity,
                    event.source,
                    event.message
                ),
            },
        };

        let resp = self
            .client
            .post(&self.webhook_url)
            .json(&message)
            .send()
            .await?;

        if resp.status().is_success() {
            debug!("chat alert delivered");
            Ok(())
        } else {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            Err(WardenError::Delivery {
                channel: "chat".to_string(),
                reason: format!("HTTP {status}: {body}"),
            })
        }
    }
}

/// Generic webhook channel; POSTs the full event as JSON
pub struct WebhookChannel {
    client: Client,
    url: String,
    min_severity: Severity,
}

impl WebhookChannel {
    pub fn new(config: &WebhookChannelConfig) -> Self {
        Self {
            client: Client::new(),
            url: config.url.clone(),
            min_severity: config.min_severity,
        }
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn name(&self) -> &'static str {
        "webhook"
    }

    fn min_severity(&self) -> Severity {
        self.min_severity
    }

    async fn deliver(&self, event: &AlertEvent) -> Result<()> {
        let resp = self.client.post(&self.url).json(event).send().await?;

        if resp.status().is_success() {
            debug!("webhook alert delivered");
            Ok(())
        } else {
            Err(WardenError::Delivery {
                channel: "webhook".to_string(),
                reason: format!("HTTP {}", resp.status()),
            })
        }
    }
}
