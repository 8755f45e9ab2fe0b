//! Alert dispatch
//!
//! Events from the failure tracker, the resource sampler, and the external
//! anomaly endpoint all funnel through one dispatcher, which dedups repeats
//! and fans the survivors out to the configured notification channels.

mod channels;
mod dispatcher;

pub use channels::{ChatChannel, EmailChannel, NotificationChannel, WebhookChannel};
pub use dispatcher::AlertDispatcher;
