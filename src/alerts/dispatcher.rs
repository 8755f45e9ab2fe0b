//! Alert dispatcher with cool-down dedup
//!
//! Every event is published on an internal broadcast bus regardless of
//! dedup, so in-process observers always see the full stream. Outbound
//! channel delivery is gated: an event whose dedup key fired within the
//! cool-down window is suppressed.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{debug, info, warn};

use super::channels::{ChatChannel, EmailChannel, NotificationChannel, WebhookChannel};
use crate::clock::Clock;
use crate::config::NotificationsConfig;
use crate::domain::AlertEvent;
use crate::Result;

const EVENT_BUS_CAPACITY: usize = 256;

pub struct AlertDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
    cooldown: Duration,
    recent: RwLock<HashMap<String, DateTime<Utc>>>,
    clock: Arc<dyn Clock>,
    tx: broadcast::Sender<AlertEvent>,
}

impl AlertDispatcher {
    /// Build the dispatcher with the channels enabled in config
    pub fn from_config(
        notifications: &NotificationsConfig,
        cooldown_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let mut channels: Vec<Arc<dyn NotificationChannel>> = Vec::new();
        if notifications.email.enabled {
            channels.push(Arc::new(EmailChannel::new(&notifications.email)?));
        }
        if notifications.chat.enabled {
            channels.push(Arc::new(ChatChannel::new(&notifications.chat)));
        }
        if notifications.webhook.enabled {
            channels.push(Arc::new(WebhookChannel::new(&notifications.webhook)));
        }
        info!(
            channels = channels.len(),
            cooldown_secs, "alert dispatcher ready"
        );
        Ok(Self::with_channels(channels, cooldown_secs, clock))
    }

    /// Build with explicit channels
    pub fn with_channels(
        channels: Vec<Arc<dyn NotificationChannel>>,
        cooldown_secs: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            channels,
            cooldown: Duration::seconds(cooldown_secs as i64),
            recent: RwLock::new(HashMap::new()),
            clock,
            tx,
        }
    }

    /// Observe the full event stream, dedup not applied
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.tx.subscribe()
    }

    /// Route one event. `None` means the event was suppressed by dedup;
    /// otherwise the number of channels it was delivered to.
    pub async fn dispatch(&self, event: &AlertEvent) -> Option<usize> {
        // Bus first; a deduped event is still visible in-process
        let _ = self.tx.send(event.clone());

        if self.is_duplicate(event).await {
            debug!(
                key = %event.dedup_key,
                "alert suppressed inside cool-down window"
            );
            return None;
        }

        let eligible: Vec<&Arc<dyn NotificationChannel>> = self
            .channels
            .iter()
            .filter(|c| event.severity >= c.min_severity())
            .collect();

        let deliveries = eligible.iter().map(|channel| {
            let channel = Arc::clone(channel);
            let event = event.clone();
            async move {
                match channel.deliver(&event).await {
                    Ok(()) => true,
                    Err(e) => {
                        warn!(channel = channel.name(), error = %e, "alert delivery failed");
                        false
                    }
                }
            }
        });

        Some(
            join_all(deliveries)
                .await
                .into_iter()
                .filter(|ok| *ok)
                .count(),
        )
    }

    /// Check the dedup table and record this event's key. Expired entries
    /// are dropped on the way through so the table stays bounded.
    async fn is_duplicate(&self, event: &AlertEvent) -> bool {
        let now = self.clock.now();
        let mut recent = self.recent.write().await;
        recent.retain(|_, fired_at| now - *fired_at < self.cooldown);

        if recent.contains_key(&event.dedup_key) {
            return true;
        }
        recent.insert(event.dedup_key.clone(), now);
        false
    }
}
