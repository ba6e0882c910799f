//! The alert notifier: configuration, persisted history and dispatch.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hive_persist::JsonStore;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dispatch::{ChannelDispatcher, DEFAULT_CHANNEL_TIMEOUT};
use crate::types::{
    Alert, AlertConfig, AlertConfigPatch, AlertRule, AlertSeverity, AlertStats, AlertStatus,
    ChannelResult, ChannelType, Metadata,
};

/// Default source recorded on alerts sent without one.
const DEFAULT_SOURCE: &str = "hivewatch";

/// The persisted alert document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlertsDocument {
    alerts: Vec<Alert>,
    stats: AlertStats,
    config: AlertConfig,
    last_update: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct NotifierState {
    alerts: Vec<Alert>,
    stats: AlertStats,
    config: AlertConfig,
}

/// The outcome of a `send_alert` call.
#[derive(Debug, Clone)]
pub struct SendReport {
    /// True when at least one channel delivered the alert.
    pub success: bool,
    /// The final alert record, absent when alerting is disabled.
    pub alert: Option<Alert>,
    /// One result per attempted channel.
    pub results: Vec<ChannelResult>,
}

impl SendReport {
    fn disabled() -> Self {
        Self {
            success: false,
            alert: None,
            results: Vec::new(),
        }
    }
}

/// Façade over alert configuration, history, stats and channel dispatch.
///
/// The notifier exclusively owns the persisted alert document
/// (`alerts.json`: history + stats + config); every mutation goes through
/// its methods, is serialized behind one lock, and snapshots the whole
/// document. Persistence is best-effort: a failed write is logged and the
/// in-memory result still reflects the delivery outcome.
#[derive(Debug)]
pub struct AlertNotifier {
    state: Mutex<NotifierState>,
    store: JsonStore,
    channel_timeout: Duration,
}

impl AlertNotifier {
    /// Creates a notifier, loading any persisted document from
    /// `<state_dir>/alerts.json`.
    #[must_use]
    pub fn new(state_dir: &Path) -> Self {
        let store = JsonStore::new(state_dir, "alerts");
        let doc: AlertsDocument = store.load();
        debug!(
            alerts = doc.alerts.len(),
            rules = doc.config.rules.len(),
            "loaded alert state from disk"
        );
        Self {
            state: Mutex::new(NotifierState {
                alerts: doc.alerts,
                stats: doc.stats,
                config: doc.config,
            }),
            store,
            channel_timeout: DEFAULT_CHANNEL_TIMEOUT,
        }
    }

    /// Creates a notifier with an explicit configuration, keeping any
    /// persisted history and stats.
    #[must_use]
    pub fn with_config(state_dir: &Path, config: AlertConfig) -> Self {
        let notifier = Self::new(state_dir);
        {
            let mut state = notifier.state.lock();
            state.config = config;
            notifier.persist(&state);
        }
        notifier
    }

    /// Overrides the per-channel delivery timeout (default 5s).
    #[must_use]
    pub const fn with_channel_timeout(mut self, timeout: Duration) -> Self {
        self.channel_timeout = timeout;
        self
    }

    // ============ Sending ============

    /// Sends an alert through the channels its severity routes to.
    ///
    /// When alerting is disabled this returns `success: false` immediately,
    /// with no side effects and nothing persisted. Otherwise the pending
    /// alert is persisted before dispatch, every eligible channel gets its
    /// attempt, and the alert resolves to sent (≥1 delivery) or failed.
    pub async fn send_alert(
        &self,
        severity: AlertSeverity,
        title: &str,
        message: &str,
        metadata: Option<Metadata>,
        source: Option<&str>,
    ) -> SendReport {
        self.send_internal(severity, title, message, metadata, source, None)
            .await
    }

    /// Sends an alert to an explicit channel list (still intersected with
    /// the enabled channels). Used by the rule engine's actions.
    pub async fn send_alert_to(
        &self,
        severity: AlertSeverity,
        title: &str,
        message: &str,
        metadata: Option<Metadata>,
        source: Option<&str>,
        channels: &[ChannelType],
    ) -> SendReport {
        self.send_internal(severity, title, message, metadata, source, Some(channels))
            .await
    }

    /// Sends an info-level test alert through every enabled channel.
    pub async fn test_alert(&self) -> SendReport {
        let mut enabled: Vec<ChannelType> = {
            let state = self.state.lock();
            state
                .config
                .channels
                .iter()
                .filter(|(_, settings)| settings.enabled)
                .map(|(channel_type, _)| *channel_type)
                .collect()
        };
        enabled.sort();

        self.send_internal(
            AlertSeverity::Info,
            "Test alert",
            "hivewatch notification test",
            None,
            Some("test"),
            Some(&enabled),
        )
        .await
    }

    async fn send_internal(
        &self,
        severity: AlertSeverity,
        title: &str,
        message: &str,
        metadata: Option<Metadata>,
        source: Option<&str>,
        requested: Option<&[ChannelType]>,
    ) -> SendReport {
        // Phase 1: create and persist the pending alert under the lock.
        let (mut alert, dispatcher) = {
            let mut state = self.state.lock();

            if !state.config.enabled {
                debug!(title = %title, "alerting disabled, dropping alert");
                return SendReport::disabled();
            }

            let routed: Vec<ChannelType> = match requested {
                Some(channels) => channels.to_vec(),
                None => state
                    .config
                    .severity_routing
                    .get(&severity)
                    .cloned()
                    .unwrap_or_default(),
            };
            let dispatcher = ChannelDispatcher::from_config_routed(&state.config, &routed)
                .with_timeout(self.channel_timeout);

            let mut alert = Alert::new(
                severity,
                title,
                message,
                metadata,
                source.unwrap_or(DEFAULT_SOURCE),
            );
            alert.channels = dispatcher.channel_types();

            state.alerts.push(alert.clone());
            state.stats.record_created(&alert);
            self.persist(&state);

            (alert, dispatcher)
        };

        // Phase 2: fan out without holding the lock.
        let results = dispatcher.dispatch(&alert).await;

        // Phase 3: finalize and persist.
        let success = results.iter().any(|r| r.success);
        let now = Utc::now();
        if success {
            alert.mark_sent(now);
        } else {
            let first_error = results
                .iter()
                .find_map(|r| r.error.clone())
                .unwrap_or_else(|| "no eligible channels".to_string());
            alert.mark_failed(now, first_error);
        }

        {
            let mut state = self.state.lock();
            if let Some(stored) = state.alerts.iter_mut().find(|a| a.id == alert.id) {
                *stored = alert.clone();
            }
            state.stats.record_outcome(&alert, &results);
            self.persist(&state);
        }

        info!(
            alert = %alert.id,
            severity = %alert.severity,
            status = %alert.status,
            channels = results.len(),
            "alert dispatched"
        );

        SendReport {
            success,
            alert: Some(alert),
            results,
        }
    }

    // ============ Queries ============

    /// Alerts, most recent first, optionally limited.
    #[must_use]
    pub fn get_alerts(&self, limit: Option<usize>) -> Vec<Alert> {
        let state = self.state.lock();
        let iter = state.alerts.iter().rev().cloned();
        match limit {
            Some(limit) => iter.take(limit).collect(),
            None => iter.collect(),
        }
    }

    /// One alert by id.
    #[must_use]
    pub fn get_alert(&self, id: &str) -> Option<Alert> {
        let state = self.state.lock();
        state.alerts.iter().find(|a| a.id == id).cloned()
    }

    /// Aggregate statistics, with the 24-hour window recomputed.
    #[must_use]
    pub fn get_stats(&self) -> AlertStats {
        let state = self.state.lock();
        let cutoff = Utc::now() - chrono::Duration::hours(24);
        let mut stats = state.stats.clone();
        stats.last_24h = state.alerts.iter().filter(|a| a.timestamp >= cutoff).count() as u64;
        stats
    }

    /// The current configuration.
    #[must_use]
    pub fn get_config(&self) -> AlertConfig {
        self.state.lock().config.clone()
    }

    /// The configured rules, including their `last_triggered` timestamps.
    #[must_use]
    pub fn rules(&self) -> Vec<AlertRule> {
        self.state.lock().config.rules.clone()
    }

    /// The global cooldown floor in seconds.
    #[must_use]
    pub fn global_cooldown_seconds(&self) -> u64 {
        self.state.lock().config.global_cooldown_seconds
    }

    // ============ Administration ============

    /// Applies a shallow configuration update and returns the result.
    ///
    /// Nested fields (`channels`, `rules`, `severityRouting`) are replaced
    /// whole when present in the patch, never deep-merged.
    pub fn update_config(&self, patch: AlertConfigPatch) -> AlertConfig {
        let mut state = self.state.lock();
        patch.apply(&mut state.config);
        self.persist(&state);
        info!("alert configuration updated");
        state.config.clone()
    }

    /// Stamps a rule's `last_triggered`. Returns `false` for unknown rules.
    pub fn mark_rule_triggered(&self, rule_id: &str, when: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        let Some(rule) = state.config.rules.iter_mut().find(|r| r.id == rule_id) else {
            return false;
        };
        rule.last_triggered = Some(when);
        self.persist(&state);
        true
    }

    /// Removes alerts older than `older_than_days` days and returns how
    /// many were removed. Remaining alerts keep their order.
    pub fn clear_old_alerts(&self, older_than_days: u32) -> usize {
        let cutoff = Utc::now() - chrono::Duration::days(i64::from(older_than_days));
        let mut state = self.state.lock();

        let before = state.alerts.len();
        state.alerts.retain(|a| a.timestamp >= cutoff);
        let removed = before - state.alerts.len();

        if removed > 0 {
            self.persist(&state);
            info!(removed, older_than_days, "purged old alerts");
        }
        removed
    }

    /// Acknowledges a sent or failed alert. Returns `false` when the alert
    /// is unknown, pending, or already acknowledged.
    pub fn acknowledge_alert(&self, id: &str) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state.alerts.iter().position(|a| a.id == id) else {
            return false;
        };

        let previous = state.alerts[index].status;
        if !state.alerts[index].acknowledge() {
            return false;
        }
        state.stats.record_acknowledged(previous);
        self.persist(&state);
        info!(alert = %id, "alert acknowledged");
        true
    }

    fn persist(&self, state: &NotifierState) {
        let doc = AlertsDocument {
            alerts: state.alerts.clone(),
            stats: state.stats.clone(),
            config: state.config.clone(),
            last_update: Some(Utc::now()),
        };
        if let Err(e) = self.store.save(&doc) {
            warn!(error = %e, "failed to persist alert state");
        }
    }
}
