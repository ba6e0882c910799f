//! Core types for the alerting system.
//!
//! This module provides the data model shared by the rule engine, the
//! channel dispatcher and the notifier:
//! - [`AlertSeverity`] / [`AlertStatus`]: classification and lifecycle
//! - [`ChannelType`]: the delivery channel tag
//! - [`ComparisonOperator`] and [`RuleCondition`]: when a rule fires
//! - [`AlertRule`] and [`RuleAction`]: what happens when it does
//! - [`Alert`] and [`ChannelResult`]: the persisted record of a firing
//! - [`AlertConfig`] / [`AlertConfigPatch`] / [`AlertStats`]: the document
//!   the notifier owns

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AlertError, Result};

/// Free-form metadata attached to an alert.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// The severity of an alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    /// Requires immediate attention.
    Critical,
    /// Should be investigated promptly.
    High,
    /// Should be investigated.
    Medium,
    /// Worth noting.
    Low,
    /// Informational only.
    Info,
}

impl AlertSeverity {
    /// All severities, highest first.
    pub const ALL: [Self; 5] = [
        Self::Critical,
        Self::High,
        Self::Medium,
        Self::Low,
        Self::Info,
    ];

    /// Returns the severity as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
            Self::Info => "info",
        }
    }
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The lifecycle status of an alert.
///
/// `Pending` exists only between creation and the end of dispatch; a
/// persisted alert always resolves to `Sent` or `Failed`, and may then be
/// acknowledged (terminal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertStatus {
    /// Created, dispatch not yet finished.
    Pending,
    /// At least one channel delivered it.
    Sent,
    /// Every channel failed (or none were eligible).
    Failed,
    /// Seen by an operator; terminal.
    Acknowledged,
}

impl AlertStatus {
    /// Returns the status as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Sent => "sent",
            Self::Failed => "failed",
            Self::Acknowledged => "acknowledged",
        }
    }
}

impl std::fmt::Display for AlertStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The kind of delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    /// Structured log line (and optional file append).
    Log,
    /// Generic HTTP webhook.
    Webhook,
    /// Slack incoming webhook.
    Slack,
    /// Email. Configuration exists but no adapter is implemented yet;
    /// the channel factory treats it as disabled.
    Email,
}

impl ChannelType {
    /// Returns the channel type as a string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Log => "log",
            Self::Webhook => "webhook",
            Self::Slack => "slack",
            Self::Email => "email",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Comparison operators for threshold and rate conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComparisonOperator {
    /// Greater than (>).
    #[serde(rename = ">")]
    GreaterThan,
    /// Greater than or equal (>=).
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    /// Less than (<).
    #[serde(rename = "<")]
    LessThan,
    /// Less than or equal (<=).
    #[serde(rename = "<=")]
    LessThanOrEqual,
    /// Equal (==).
    #[serde(rename = "==")]
    Equal,
    /// Not equal (!=).
    #[serde(rename = "!=")]
    NotEqual,
}

impl ComparisonOperator {
    /// Evaluates the comparison between two values.
    #[must_use]
    pub fn evaluate(&self, left: f64, right: f64) -> bool {
        match self {
            Self::GreaterThan => left > right,
            Self::GreaterThanOrEqual => left >= right,
            Self::LessThan => left < right,
            Self::LessThanOrEqual => left <= right,
            Self::Equal => (left - right).abs() < f64::EPSILON,
            Self::NotEqual => (left - right).abs() >= f64::EPSILON,
        }
    }

    /// Returns the operator as a symbol.
    #[must_use]
    pub const fn as_symbol(&self) -> &'static str {
        match self {
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_symbol())
    }
}

/// The condition under which a rule fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RuleCondition {
    /// A metric value compared against a fixed threshold.
    Threshold {
        /// Metric name, matched against the caller-supplied values.
        metric: String,
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Threshold value.
        threshold: f64,
    },
    /// A ratio (computed externally over a window) compared against a
    /// threshold.
    Rate {
        /// Metric name, matched against the caller-supplied rates.
        metric: String,
        /// Comparison operator.
        operator: ComparisonOperator,
        /// Threshold ratio (0.0 – 1.0).
        threshold: f64,
        /// Window the ratio was computed over, in seconds.
        window_secs: u64,
    },
    /// A substring or regex match against caller-supplied text lines.
    Pattern {
        /// Pattern to look for.
        pattern: String,
        /// Interpret the pattern as a regular expression.
        #[serde(default)]
        regex: bool,
    },
    /// True while any circuit breaker is open.
    Circuit,
    /// True while any active agent's heartbeat has timed out.
    AgentStale,
}

impl RuleCondition {
    /// Short name of the condition kind, used in alert metadata.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Threshold { .. } => "threshold",
            Self::Rate { .. } => "rate",
            Self::Pattern { .. } => "pattern",
            Self::Circuit => "circuit",
            Self::AgentStale => "agent_stale",
        }
    }
}

/// One notification action of a rule: which channels, with what message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleAction {
    /// Channels this action dispatches to.
    pub channels: Vec<ChannelType>,
    /// Message template; `{placeholder}` names are substituted from the
    /// evaluation context (e.g. `{rate}`, `{circuit}`, `{agentId}`).
    pub message_template: String,
}

/// A configured alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    /// Unique identifier.
    pub id: String,
    /// Human-readable name; used as the alert title when the rule fires.
    pub name: String,
    /// Disabled rules are never evaluated.
    pub enabled: bool,
    /// Severity of alerts produced by this rule.
    pub severity: AlertSeverity,
    /// The firing condition.
    pub condition: RuleCondition,
    /// Actions taken when the rule fires.
    pub actions: Vec<RuleAction>,
    /// Minimum seconds between firings of this rule.
    pub cooldown_seconds: u64,
    /// When the rule last fired.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_triggered: Option<DateTime<Utc>>,
}

impl AlertRule {
    /// Creates a rule builder.
    pub fn builder(name: impl Into<String>, condition: RuleCondition) -> AlertRuleBuilder {
        AlertRuleBuilder::new(name, condition)
    }

    /// True if the rule's cooldown has elapsed (or it never fired).
    /// `floor_seconds` is the configured global cooldown, applied as a
    /// minimum across all rules.
    #[must_use]
    pub fn is_cooled_down(&self, now: DateTime<Utc>, floor_seconds: u64) -> bool {
        let cooldown = self.cooldown_seconds.max(floor_seconds);
        match self.last_triggered {
            None => true,
            Some(last) => now - last >= chrono::Duration::seconds(cooldown as i64),
        }
    }
}

/// Builder for [`AlertRule`].
#[derive(Debug)]
pub struct AlertRuleBuilder {
    name: String,
    condition: RuleCondition,
    severity: AlertSeverity,
    actions: Vec<RuleAction>,
    cooldown_seconds: u64,
    enabled: bool,
}

impl AlertRuleBuilder {
    fn new(name: impl Into<String>, condition: RuleCondition) -> Self {
        Self {
            name: name.into(),
            condition,
            severity: AlertSeverity::High,
            actions: Vec::new(),
            cooldown_seconds: 0,
            enabled: true,
        }
    }

    /// Sets the severity of alerts produced by this rule.
    #[must_use]
    pub const fn severity(mut self, severity: AlertSeverity) -> Self {
        self.severity = severity;
        self
    }

    /// Adds an action: channels plus a message template.
    #[must_use]
    pub fn action(mut self, channels: Vec<ChannelType>, template: impl Into<String>) -> Self {
        self.actions.push(RuleAction {
            channels,
            message_template: template.into(),
        });
        self
    }

    /// Sets the cooldown in seconds.
    #[must_use]
    pub const fn cooldown_seconds(mut self, seconds: u64) -> Self {
        self.cooldown_seconds = seconds;
        self
    }

    /// Enables or disables the rule.
    #[must_use]
    pub const fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Builds the rule.
    ///
    /// # Errors
    ///
    /// Returns `AlertError::InvalidRule` if the name is empty.
    pub fn build(self) -> Result<AlertRule> {
        if self.name.is_empty() {
            return Err(AlertError::InvalidRule {
                reason: "rule name cannot be empty".to_string(),
            });
        }

        Ok(AlertRule {
            id: Uuid::new_v4().to_string(),
            name: self.name,
            enabled: self.enabled,
            severity: self.severity,
            condition: self.condition,
            actions: self.actions,
            cooldown_seconds: self.cooldown_seconds,
            last_triggered: None,
        })
    }
}

/// A persisted alert record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    /// Unique identifier.
    pub id: String,
    /// Severity.
    pub severity: AlertSeverity,
    /// Lifecycle status.
    pub status: AlertStatus,
    /// Short title.
    pub title: String,
    /// Full message.
    pub message: String,
    /// What produced the alert (e.g. "rule-engine", "api").
    pub source: String,
    /// When the alert was created.
    pub timestamp: DateTime<Utc>,
    /// When dispatch succeeded, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
    /// When dispatch failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    /// First delivery error, when the alert failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Free-form context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
    /// Channel types dispatch was attempted on.
    pub channels: Vec<ChannelType>,
}

impl Alert {
    /// Creates a new alert in `Pending` status.
    #[must_use]
    pub fn new(
        severity: AlertSeverity,
        title: impl Into<String>,
        message: impl Into<String>,
        metadata: Option<Metadata>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            severity,
            status: AlertStatus::Pending,
            title: title.into(),
            message: message.into(),
            source: source.into(),
            timestamp: Utc::now(),
            sent_at: None,
            failed_at: None,
            error: None,
            metadata,
            channels: Vec::new(),
        }
    }

    /// Marks the alert sent.
    pub fn mark_sent(&mut self, at: DateTime<Utc>) {
        self.status = AlertStatus::Sent;
        self.sent_at = Some(at);
    }

    /// Marks the alert failed with the first delivery error.
    pub fn mark_failed(&mut self, at: DateTime<Utc>, error: impl Into<String>) {
        self.status = AlertStatus::Failed;
        self.failed_at = Some(at);
        self.error = Some(error.into());
    }

    /// Acknowledges a sent or failed alert. Returns `false` when the alert
    /// is pending or already acknowledged.
    pub fn acknowledge(&mut self) -> bool {
        match self.status {
            AlertStatus::Sent | AlertStatus::Failed => {
                self.status = AlertStatus::Acknowledged;
                true
            }
            AlertStatus::Pending | AlertStatus::Acknowledged => false,
        }
    }
}

/// The outcome of one channel's delivery attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelResult {
    /// The channel that was attempted.
    pub channel: ChannelType,
    /// Whether delivery succeeded.
    pub success: bool,
    /// Delivery error, verbatim.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When delivery completed, for successes.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sent_at: Option<DateTime<Utc>>,
}

impl ChannelResult {
    /// Creates a successful result stamped now.
    #[must_use]
    pub fn success(channel: ChannelType) -> Self {
        Self {
            channel,
            success: true,
            error: None,
            sent_at: Some(Utc::now()),
        }
    }

    /// Creates a failed result carrying the error verbatim.
    #[must_use]
    pub fn failure(channel: ChannelType, error: impl Into<String>) -> Self {
        Self {
            channel,
            success: false,
            error: Some(error.into()),
            sent_at: None,
        }
    }
}

/// Configuration for the log channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogChannelConfig {
    /// Optional file the formatted line is also appended to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
}

fn default_webhook_method() -> String {
    "POST".to_string()
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Configuration for the generic webhook channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookChannelConfig {
    /// Target URL.
    pub url: String,
    /// HTTP method (default POST).
    #[serde(default = "default_webhook_method")]
    pub method: String,
    /// Extra request headers.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,
    /// Request timeout in seconds.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_seconds: u64,
}

/// Configuration for the Slack channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlackChannelConfig {
    /// Slack incoming-webhook URL.
    pub webhook_url: String,
    /// Override the channel the webhook posts to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Override the bot username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
}

/// Configuration for the email channel.
///
/// The email adapter is intentionally unimplemented; this type exists so the
/// configuration round-trips, but the channel factory returns no adapter for
/// it and the channel stays disabled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailChannelConfig {
    /// Recipient addresses.
    pub to: Vec<String>,
    /// Sender address.
    pub from: String,
    /// SMTP relay host.
    pub smtp_host: String,
}

/// Channel configuration, tagged by channel type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChannelConfig {
    /// Log channel settings.
    Log(LogChannelConfig),
    /// Webhook channel settings.
    Webhook(WebhookChannelConfig),
    /// Slack channel settings.
    Slack(SlackChannelConfig),
    /// Email channel settings (declared stub, no adapter).
    Email(EmailChannelConfig),
}

impl ChannelConfig {
    /// The channel type this configuration belongs to.
    #[must_use]
    pub const fn channel_type(&self) -> ChannelType {
        match self {
            Self::Log(_) => ChannelType::Log,
            Self::Webhook(_) => ChannelType::Webhook,
            Self::Slack(_) => ChannelType::Slack,
            Self::Email(_) => ChannelType::Email,
        }
    }
}

/// One entry of the channel map: an on/off switch plus the channel config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelSettings {
    /// Whether the channel may receive alerts.
    pub enabled: bool,
    /// The channel's configuration.
    pub config: ChannelConfig,
}

/// The externally mutable alerting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfig {
    /// Master switch; when false, `send_alert` is a no-op.
    pub enabled: bool,
    /// Minimum seconds between firings, applied as a floor under every
    /// rule's own cooldown.
    pub global_cooldown_seconds: u64,
    /// Channel settings by type.
    pub channels: HashMap<ChannelType, ChannelSettings>,
    /// Configured rules.
    pub rules: Vec<AlertRule>,
    /// Which channel types each severity routes to.
    pub severity_routing: HashMap<AlertSeverity, Vec<ChannelType>>,
}

impl Default for AlertConfig {
    fn default() -> Self {
        let mut channels = HashMap::new();
        channels.insert(
            ChannelType::Log,
            ChannelSettings {
                enabled: true,
                config: ChannelConfig::Log(LogChannelConfig::default()),
            },
        );

        let severity_routing = AlertSeverity::ALL
            .into_iter()
            .map(|severity| (severity, vec![ChannelType::Log]))
            .collect();

        Self {
            enabled: true,
            global_cooldown_seconds: 0,
            channels,
            rules: Vec::new(),
            severity_routing,
        }
    }
}

/// A partial [`AlertConfig`] update.
///
/// The merge is shallow: a `Some` field replaces the whole corresponding
/// field of the config. Nested maps and lists are never deep-merged, so a
/// caller changing one channel must supply that channel map in full.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertConfigPatch {
    /// New master switch.
    pub enabled: Option<bool>,
    /// New global cooldown floor.
    pub global_cooldown_seconds: Option<u64>,
    /// Full replacement channel map.
    pub channels: Option<HashMap<ChannelType, ChannelSettings>>,
    /// Full replacement rule list.
    pub rules: Option<Vec<AlertRule>>,
    /// Full replacement severity routing.
    pub severity_routing: Option<HashMap<AlertSeverity, Vec<ChannelType>>>,
}

impl AlertConfigPatch {
    /// Applies the patch to `config`, shallowly.
    pub fn apply(self, config: &mut AlertConfig) {
        if let Some(enabled) = self.enabled {
            config.enabled = enabled;
        }
        if let Some(cooldown) = self.global_cooldown_seconds {
            config.global_cooldown_seconds = cooldown;
        }
        if let Some(channels) = self.channels {
            config.channels = channels;
        }
        if let Some(rules) = self.rules {
            config.rules = rules;
        }
        if let Some(routing) = self.severity_routing {
            config.severity_routing = routing;
        }
    }
}

/// Aggregate alert statistics, persisted alongside the history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertStats {
    /// Alerts ever created.
    pub total: u64,
    /// Alert counts by lifecycle status.
    pub by_status: HashMap<AlertStatus, u64>,
    /// Alert counts by severity.
    pub by_severity: HashMap<AlertSeverity, u64>,
    /// Successful deliveries by channel type.
    pub by_channel: HashMap<ChannelType, u64>,
    /// Alerts created in the last 24 hours (recomputed on read).
    #[serde(rename = "last24h")]
    pub last_24h: u64,
    /// When the most recent alert was created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_alert: Option<DateTime<Utc>>,
}

impl AlertStats {
    /// Records a freshly created (pending) alert.
    pub fn record_created(&mut self, alert: &Alert) {
        self.total += 1;
        *self.by_status.entry(AlertStatus::Pending).or_insert(0) += 1;
        *self.by_severity.entry(alert.severity).or_insert(0) += 1;
        self.last_alert = Some(alert.timestamp);
    }

    /// Records the final outcome of a dispatch.
    pub fn record_outcome(&mut self, alert: &Alert, results: &[ChannelResult]) {
        if let Some(pending) = self.by_status.get_mut(&AlertStatus::Pending) {
            *pending = pending.saturating_sub(1);
        }
        *self.by_status.entry(alert.status).or_insert(0) += 1;
        for result in results.iter().filter(|r| r.success) {
            *self.by_channel.entry(result.channel).or_insert(0) += 1;
        }
    }

    /// Records an acknowledgement, moving one count between statuses.
    pub fn record_acknowledged(&mut self, previous: AlertStatus) {
        if let Some(count) = self.by_status.get_mut(&previous) {
            *count = count.saturating_sub(1);
        }
        *self.by_status.entry(AlertStatus::Acknowledged).or_insert(0) += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod operator_tests {
        use super::*;
        use test_case::test_case;

        #[test_case(ComparisonOperator::GreaterThan, 10.0, 5.0, true)]
        #[test_case(ComparisonOperator::GreaterThan, 5.0, 5.0, false)]
        #[test_case(ComparisonOperator::GreaterThanOrEqual, 5.0, 5.0, true)]
        #[test_case(ComparisonOperator::LessThan, 3.0, 5.0, true)]
        #[test_case(ComparisonOperator::LessThan, 5.0, 5.0, false)]
        #[test_case(ComparisonOperator::LessThanOrEqual, 5.0, 5.0, true)]
        #[test_case(ComparisonOperator::Equal, 5.0, 5.0, true)]
        #[test_case(ComparisonOperator::Equal, 5.0, 5.1, false)]
        #[test_case(ComparisonOperator::NotEqual, 5.0, 5.1, true)]
        #[test_case(ComparisonOperator::NotEqual, 5.0, 5.0, false)]
        fn evaluates(op: ComparisonOperator, left: f64, right: f64, expected: bool) {
            assert_eq!(op.evaluate(left, right), expected);
        }

        #[test]
        fn serializes_as_symbol() {
            let json = serde_json::to_string(&ComparisonOperator::GreaterThanOrEqual)
                .expect("serialize");
            assert_eq!(json, "\">=\"");
        }
    }

    mod condition_tests {
        use super::*;

        #[test]
        fn tagged_serialization() {
            let condition = RuleCondition::Threshold {
                metric: "error_count".to_string(),
                operator: ComparisonOperator::GreaterThan,
                threshold: 10.0,
            };
            let json = serde_json::to_value(&condition).expect("serialize");
            assert_eq!(json["type"], "threshold");
            assert_eq!(json["metric"], "error_count");

            let back: RuleCondition = serde_json::from_value(json).expect("deserialize");
            assert_eq!(back, condition);
        }

        #[test]
        fn unit_conditions_round_trip() {
            for condition in [RuleCondition::Circuit, RuleCondition::AgentStale] {
                let json = serde_json::to_string(&condition).expect("serialize");
                let back: RuleCondition = serde_json::from_str(&json).expect("deserialize");
                assert_eq!(back, condition);
            }
            assert_eq!(
                serde_json::to_value(RuleCondition::AgentStale).expect("serialize")["type"],
                "agent_stale"
            );
        }

        #[test]
        fn pattern_regex_flag_defaults_false() {
            let condition: RuleCondition =
                serde_json::from_str(r#"{"type":"pattern","pattern":"OOM"}"#)
                    .expect("deserialize");
            assert_eq!(
                condition,
                RuleCondition::Pattern {
                    pattern: "OOM".to_string(),
                    regex: false,
                }
            );
        }
    }

    mod rule_tests {
        use super::*;

        #[test]
        fn builder_defaults() {
            let rule = AlertRule::builder("open-circuits", RuleCondition::Circuit)
                .build()
                .expect("build");

            assert!(rule.enabled);
            assert_eq!(rule.severity, AlertSeverity::High);
            assert_eq!(rule.cooldown_seconds, 0);
            assert!(rule.last_triggered.is_none());
            assert!(!rule.id.is_empty());
        }

        #[test]
        fn empty_name_fails() {
            let err = AlertRule::builder("", RuleCondition::Circuit)
                .build()
                .expect_err("must fail");
            assert!(matches!(err, AlertError::InvalidRule { .. }));
        }

        #[test]
        fn cooldown_blocks_within_window() {
            let mut rule = AlertRule::builder("r", RuleCondition::Circuit)
                .cooldown_seconds(300)
                .build()
                .expect("build");
            let now = Utc::now();

            assert!(rule.is_cooled_down(now, 0));

            rule.last_triggered = Some(now - chrono::Duration::seconds(100));
            assert!(!rule.is_cooled_down(now, 0));

            rule.last_triggered = Some(now - chrono::Duration::seconds(301));
            assert!(rule.is_cooled_down(now, 0));
        }

        #[test]
        fn global_cooldown_is_a_floor() {
            let mut rule = AlertRule::builder("r", RuleCondition::Circuit)
                .cooldown_seconds(10)
                .build()
                .expect("build");
            let now = Utc::now();

            rule.last_triggered = Some(now - chrono::Duration::seconds(30));
            assert!(rule.is_cooled_down(now, 0));
            assert!(!rule.is_cooled_down(now, 60));
        }
    }

    mod alert_tests {
        use super::*;

        #[test]
        fn new_alert_is_pending() {
            let alert = Alert::new(AlertSeverity::High, "X", "Y", None, "api");
            assert_eq!(alert.status, AlertStatus::Pending);
            assert!(alert.sent_at.is_none());
            assert!(alert.failed_at.is_none());
            assert!(alert.error.is_none());
        }

        #[test]
        fn lifecycle_sent_then_acknowledged() {
            let mut alert = Alert::new(AlertSeverity::High, "X", "Y", None, "api");
            alert.mark_sent(Utc::now());
            assert_eq!(alert.status, AlertStatus::Sent);
            assert!(alert.sent_at.is_some());

            assert!(alert.acknowledge());
            assert_eq!(alert.status, AlertStatus::Acknowledged);
            // Acknowledged is terminal.
            assert!(!alert.acknowledge());
        }

        #[test]
        fn pending_cannot_be_acknowledged() {
            let mut alert = Alert::new(AlertSeverity::Low, "X", "Y", None, "api");
            assert!(!alert.acknowledge());
            assert_eq!(alert.status, AlertStatus::Pending);
        }

        #[test]
        fn failed_records_error() {
            let mut alert = Alert::new(AlertSeverity::High, "X", "Y", None, "api");
            alert.mark_failed(Utc::now(), "connection refused");
            assert_eq!(alert.status, AlertStatus::Failed);
            assert_eq!(alert.error.as_deref(), Some("connection refused"));
        }

        #[test]
        fn serializes_camel_case() {
            let mut alert = Alert::new(AlertSeverity::Critical, "X", "Y", None, "api");
            alert.mark_sent(Utc::now());
            let json = serde_json::to_value(&alert).expect("serialize");
            assert_eq!(json["severity"], "critical");
            assert_eq!(json["status"], "sent");
            assert!(json.get("sentAt").is_some());
            assert!(json.get("failedAt").is_none());
        }
    }

    mod config_tests {
        use super::*;

        #[test]
        fn default_routes_everything_to_log() {
            let config = AlertConfig::default();
            assert!(config.enabled);
            for severity in AlertSeverity::ALL {
                assert_eq!(
                    config.severity_routing.get(&severity),
                    Some(&vec![ChannelType::Log])
                );
            }
            assert!(config.channels.get(&ChannelType::Log).is_some_and(|s| s.enabled));
        }

        #[test]
        fn patch_merge_is_shallow() {
            let mut config = AlertConfig::default();
            config.rules = vec![
                AlertRule::builder("keep-me", RuleCondition::Circuit)
                    .build()
                    .expect("build"),
            ];

            // Replacing channels must not disturb rules or routing…
            let mut channels = HashMap::new();
            channels.insert(
                ChannelType::Webhook,
                ChannelSettings {
                    enabled: true,
                    config: ChannelConfig::Webhook(WebhookChannelConfig {
                        url: "http://example.com/hook".to_string(),
                        method: "POST".to_string(),
                        headers: HashMap::new(),
                        timeout_seconds: 10,
                    }),
                },
            );
            AlertConfigPatch {
                channels: Some(channels),
                ..Default::default()
            }
            .apply(&mut config);

            assert_eq!(config.rules.len(), 1);
            assert!(!config.severity_routing.is_empty());
            // …and it replaces the map wholesale: the default log entry is gone.
            assert!(config.channels.get(&ChannelType::Log).is_none());
            assert!(config.channels.get(&ChannelType::Webhook).is_some());
        }

        #[test]
        fn patch_scalar_fields() {
            let mut config = AlertConfig::default();
            AlertConfigPatch {
                enabled: Some(false),
                global_cooldown_seconds: Some(120),
                ..Default::default()
            }
            .apply(&mut config);

            assert!(!config.enabled);
            assert_eq!(config.global_cooldown_seconds, 120);
        }

        #[test]
        fn channel_config_tagged_round_trip() {
            let settings = ChannelSettings {
                enabled: true,
                config: ChannelConfig::Slack(SlackChannelConfig {
                    webhook_url: "https://hooks.slack.com/services/T/B/X".to_string(),
                    channel: Some("#ops".to_string()),
                    username: None,
                }),
            };
            let json = serde_json::to_value(&settings).expect("serialize");
            assert_eq!(json["config"]["type"], "slack");

            let back: ChannelSettings = serde_json::from_value(json).expect("deserialize");
            assert_eq!(back, settings);
            assert_eq!(back.config.channel_type(), ChannelType::Slack);
        }
    }

    mod stats_tests {
        use super::*;

        #[test]
        fn created_and_outcome_counts() {
            let mut stats = AlertStats::default();
            let mut alert = Alert::new(AlertSeverity::High, "X", "Y", None, "api");
            stats.record_created(&alert);

            assert_eq!(stats.total, 1);
            assert_eq!(stats.by_status.get(&AlertStatus::Pending), Some(&1));
            assert_eq!(stats.by_severity.get(&AlertSeverity::High), Some(&1));

            alert.mark_sent(Utc::now());
            let results = vec![
                ChannelResult::success(ChannelType::Log),
                ChannelResult::failure(ChannelType::Webhook, "boom"),
            ];
            stats.record_outcome(&alert, &results);

            assert_eq!(stats.by_status.get(&AlertStatus::Pending), Some(&0));
            assert_eq!(stats.by_status.get(&AlertStatus::Sent), Some(&1));
            assert_eq!(stats.by_channel.get(&ChannelType::Log), Some(&1));
            assert!(stats.by_channel.get(&ChannelType::Webhook).is_none());
        }

        #[test]
        fn acknowledged_moves_count() {
            let mut stats = AlertStats::default();
            stats.by_status.insert(AlertStatus::Sent, 2);

            stats.record_acknowledged(AlertStatus::Sent);
            assert_eq!(stats.by_status.get(&AlertStatus::Sent), Some(&1));
            assert_eq!(stats.by_status.get(&AlertStatus::Acknowledged), Some(&1));
        }

        #[test]
        fn stats_field_names() {
            let stats = AlertStats::default();
            let json = serde_json::to_value(&stats).expect("serialize");
            assert!(json.get("last24h").is_some());
            assert!(json.get("byStatus").is_some());
            assert!(json.get("byChannel").is_some());
        }
    }
}
