//! Channel construction and fan-out dispatch.
//!
//! [`build_channel`] is the factory keyed by the channel-config tag; adding
//! a channel type means adding a config variant, an adapter, and one factory
//! arm — dispatch logic never changes. [`ChannelDispatcher`] owns a set of
//! adapters and delivers one alert to all of them with wait-all semantics:
//! every channel gets its attempt, each bounded by a per-channel timeout,
//! and one failure never blocks the others.

use std::time::Duration;

use futures::future::join_all;
use tracing::debug;

use crate::channels::{
    ChannelValidation, LogChannel, NotificationChannel, SlackChannel, WebhookChannel,
};
use crate::types::{
    Alert, AlertConfig, AlertSeverity, ChannelConfig, ChannelResult, ChannelSettings, ChannelType,
};

/// Default bound on a single channel delivery attempt.
pub const DEFAULT_CHANNEL_TIMEOUT: Duration = Duration::from_secs(5);

/// Builds the adapter for a channel configuration.
///
/// Returns `None` for the email channel: its configuration is accepted but
/// the adapter is intentionally unimplemented, so the channel type behaves
/// as disabled until one exists.
#[must_use]
pub fn build_channel(settings: &ChannelSettings) -> Option<Box<dyn NotificationChannel>> {
    match &settings.config {
        ChannelConfig::Log(config) => Some(Box::new(LogChannel::new(config.clone()))),
        ChannelConfig::Webhook(config) => Some(Box::new(WebhookChannel::new(config.clone()))),
        ChannelConfig::Slack(config) => Some(Box::new(SlackChannel::new(config.clone()))),
        ChannelConfig::Email(_) => None,
    }
}

/// Fans one alert out to a set of channels and collects per-channel results.
#[derive(Debug)]
pub struct ChannelDispatcher {
    channels: Vec<Box<dyn NotificationChannel>>,
    per_channel_timeout: Duration,
}

impl ChannelDispatcher {
    /// Creates a dispatcher over explicit adapters.
    #[must_use]
    pub fn with_channels(channels: Vec<Box<dyn NotificationChannel>>) -> Self {
        Self {
            channels,
            per_channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    /// Builds a dispatcher over every enabled, constructible channel in the
    /// configuration.
    #[must_use]
    pub fn from_config(config: &AlertConfig) -> Self {
        let mut types: Vec<ChannelType> = config.channels.keys().copied().collect();
        types.sort();
        Self::from_config_routed(config, &types)
    }

    /// Builds a dispatcher over the intersection of `routed` and the
    /// enabled, constructible channels of the configuration.
    #[must_use]
    pub fn from_config_routed(config: &AlertConfig, routed: &[ChannelType]) -> Self {
        let mut channels: Vec<Box<dyn NotificationChannel>> = Vec::new();
        let mut seen: Vec<ChannelType> = Vec::new();

        for channel_type in routed {
            if seen.contains(channel_type) {
                continue;
            }
            seen.push(*channel_type);

            let Some(settings) = config.channels.get(channel_type) else {
                debug!(channel = %channel_type, "channel not configured, skipping");
                continue;
            };
            if !settings.enabled {
                debug!(channel = %channel_type, "channel disabled, skipping");
                continue;
            }
            match build_channel(settings) {
                Some(channel) => channels.push(channel),
                None => debug!(channel = %channel_type, "no adapter for channel, skipping"),
            }
        }

        Self::with_channels(channels)
    }

    /// Overrides the per-channel delivery timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.per_channel_timeout = timeout;
        self
    }

    /// The channel types this dispatcher will attempt, in order.
    #[must_use]
    pub fn channel_types(&self) -> Vec<ChannelType> {
        self.channels.iter().map(|c| c.channel_type()).collect()
    }

    /// Number of channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True if there is nothing to dispatch to.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Returns the adapter for a channel type, if present.
    #[must_use]
    pub fn get(&self, channel_type: ChannelType) -> Option<&dyn NotificationChannel> {
        self.channels
            .iter()
            .find(|c| c.channel_type() == channel_type)
            .map(|c| c.as_ref())
    }

    /// Validates every channel's configuration.
    #[must_use]
    pub fn validate_all(&self) -> Vec<(ChannelType, ChannelValidation)> {
        self.channels
            .iter()
            .map(|c| (c.channel_type(), c.validate()))
            .collect()
    }

    /// Delivers one alert to every channel, waiting for all attempts.
    ///
    /// Each attempt is bounded by the per-channel timeout so a hung channel
    /// cannot stall the dispatch; a timed-out or failed channel yields a
    /// failed [`ChannelResult`] while the others proceed.
    pub async fn dispatch(&self, alert: &Alert) -> Vec<ChannelResult> {
        let attempts = self.channels.iter().map(|channel| {
            let channel_type = channel.channel_type();
            async move {
                match tokio::time::timeout(self.per_channel_timeout, channel.send(alert)).await {
                    Ok(result) => result,
                    Err(_) => ChannelResult::failure(
                        channel_type,
                        format!(
                            "channel timed out after {}s",
                            self.per_channel_timeout.as_secs()
                        ),
                    ),
                }
            }
        });

        join_all(attempts).await
    }

    /// Sends an info-level smoke alert through every channel and reports
    /// whether all of them succeeded.
    pub async fn test_all(&self) -> bool {
        if self.channels.is_empty() {
            return false;
        }
        let alert = Alert::new(
            AlertSeverity::Info,
            "Test alert",
            "hivewatch notification test",
            None,
            "test",
        );
        let results = self.dispatch(&alert).await;
        results.iter().all(|r| r.success)
    }
}
