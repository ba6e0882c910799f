//! Notification channel adapters.
//!
//! Every adapter implements [`NotificationChannel`]: an async `send`, a
//! configuration `validate`, and a `test` smoke-send. Adapters never return
//! `Err` from `send` — delivery failures are carried in the returned
//! [`ChannelResult`] so the dispatcher can aggregate partial failures.
//!
//! The email channel is a declared stub: its configuration type exists in
//! [`crate::types::ChannelConfig`], but there is no adapter and the factory
//! in [`crate::dispatch`] returns `None` for it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::types::{
    Alert, AlertSeverity, ChannelResult, ChannelType, LogChannelConfig, Metadata,
    SlackChannelConfig, WebhookChannelConfig,
};

/// Result of validating a channel's configuration.
///
/// Configuration problems are reported here, never thrown: an enabled but
/// misconfigured channel fails validation and then fails its sends, without
/// affecting other channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelValidation {
    /// Whether the configuration is usable.
    pub valid: bool,
    /// What is wrong, when it is not.
    pub error: Option<String>,
}

impl ChannelValidation {
    /// A passing validation.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            valid: true,
            error: None,
        }
    }

    /// A failing validation with its reason.
    #[must_use]
    pub fn invalid(error: impl Into<String>) -> Self {
        Self {
            valid: false,
            error: Some(error.into()),
        }
    }
}

/// A delivery channel for alerts.
#[async_trait]
pub trait NotificationChannel: Send + Sync + std::fmt::Debug {
    /// The channel type tag.
    fn channel_type(&self) -> ChannelType;

    /// Checks the configuration without performing I/O.
    fn validate(&self) -> ChannelValidation;

    /// Delivers one alert. Failures are reported in the result, not as `Err`.
    async fn send(&self, alert: &Alert) -> ChannelResult;

    /// Sends an info-level smoke alert and reports whether it succeeded.
    async fn test(&self) -> bool {
        let alert = Alert::new(
            AlertSeverity::Info,
            "Channel test",
            "hivewatch channel smoke test",
            None,
            "test",
        );
        self.send(&alert).await.success
    }
}

// ─────────────────────────────────────────────────────────────
// Log channel
// ─────────────────────────────────────────────────────────────

/// Writes a formatted alert line through `tracing`, picking the level from
/// the alert severity, and optionally appends the same line to a file.
#[derive(Debug, Clone)]
pub struct LogChannel {
    config: LogChannelConfig,
}

impl LogChannel {
    /// Creates a log channel.
    #[must_use]
    pub const fn new(config: LogChannelConfig) -> Self {
        Self { config }
    }

    /// Formats the alert as a single log line:
    /// `[ISO-timestamp] [SEVERITY] Title: message (source) | {metadata}`.
    #[must_use]
    pub fn format_line(alert: &Alert) -> String {
        let mut line = format!(
            "[{}] [{}] {}: {} ({})",
            alert.timestamp.to_rfc3339(),
            alert.severity.as_str().to_uppercase(),
            alert.title,
            alert.message,
            alert.source,
        );
        if let Some(metadata) = &alert.metadata {
            if !metadata.is_empty() {
                line.push_str(" | ");
                line.push_str(
                    &serde_json::to_string(metadata).unwrap_or_else(|_| "{}".to_string()),
                );
            }
        }
        line
    }
}

impl Default for LogChannel {
    fn default() -> Self {
        Self::new(LogChannelConfig::default())
    }
}

#[async_trait]
impl NotificationChannel for LogChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Log
    }

    fn validate(&self) -> ChannelValidation {
        ChannelValidation::ok()
    }

    async fn send(&self, alert: &Alert) -> ChannelResult {
        let line = Self::format_line(alert);

        match alert.severity {
            AlertSeverity::Critical | AlertSeverity::High => error!("{line}"),
            AlertSeverity::Medium => warn!("{line}"),
            AlertSeverity::Low | AlertSeverity::Info => info!("{line}"),
        }

        if let Some(path) = &self.config.file_path {
            // Console output already satisfied the attempt; a file problem
            // is logged but does not fail the channel.
            if let Err(e) = append_line(path, &line).await {
                warn!(path = %path, error = %e, "failed to append alert to log file");
            }
        }

        ChannelResult::success(ChannelType::Log)
    }
}

async fn append_line(path: &str, line: &str) -> std::io::Result<()> {
    use tokio::io::AsyncWriteExt;

    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(line.as_bytes()).await?;
    file.write_all(b"\n").await?;
    Ok(())
}

// ─────────────────────────────────────────────────────────────
// Webhook channel
// ─────────────────────────────────────────────────────────────

/// JSON body sent by the webhook channel.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody<'a> {
    /// The alert being delivered.
    pub alert: WebhookAlertBody<'a>,
    /// Alert metadata, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Metadata>,
    /// When this delivery was attempted.
    pub sent_at: DateTime<Utc>,
}

/// The alert fields of a webhook body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAlertBody<'a> {
    /// Severity.
    pub severity: AlertSeverity,
    /// Title.
    pub title: &'a str,
    /// Message.
    pub message: &'a str,
    /// Creation time.
    pub timestamp: DateTime<Utc>,
    /// Source.
    pub source: &'a str,
}

impl<'a> WebhookBody<'a> {
    /// Builds the body for one alert, stamped now.
    #[must_use]
    pub fn from_alert(alert: &'a Alert) -> Self {
        Self {
            alert: WebhookAlertBody {
                severity: alert.severity,
                title: &alert.title,
                message: &alert.message,
                timestamp: alert.timestamp,
                source: &alert.source,
            },
            metadata: alert.metadata.as_ref(),
            sent_at: Utc::now(),
        }
    }
}

const SUPPORTED_WEBHOOK_METHODS: [&str; 4] = ["GET", "POST", "PUT", "PATCH"];

/// Delivers alerts as HTTP requests with a JSON body.
///
/// A delivery fails on transport errors and on any non-2xx response; the
/// error text is carried verbatim in the [`ChannelResult`].
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    config: WebhookChannelConfig,
    client: reqwest::Client,
}

impl WebhookChannel {
    /// Creates a webhook channel.
    #[must_use]
    pub fn new(config: WebhookChannelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// The configured URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl NotificationChannel for WebhookChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Webhook
    }

    fn validate(&self) -> ChannelValidation {
        if self.config.url.is_empty() {
            return ChannelValidation::invalid("webhook URL is not configured");
        }
        if reqwest::Url::parse(&self.config.url).is_err() {
            return ChannelValidation::invalid(format!(
                "webhook URL is not valid: {}",
                self.config.url
            ));
        }
        let method = self.config.method.to_uppercase();
        if !SUPPORTED_WEBHOOK_METHODS.contains(&method.as_str()) {
            return ChannelValidation::invalid(format!(
                "unsupported webhook method: {}",
                self.config.method
            ));
        }
        ChannelValidation::ok()
    }

    async fn send(&self, alert: &Alert) -> ChannelResult {
        let method = self.config.method.to_uppercase();
        let mut request = match method.as_str() {
            "GET" => self.client.get(&self.config.url),
            "POST" => self.client.post(&self.config.url),
            "PUT" => self.client.put(&self.config.url),
            "PATCH" => self.client.patch(&self.config.url),
            other => {
                return ChannelResult::failure(
                    ChannelType::Webhook,
                    format!("unsupported webhook method: {other}"),
                );
            }
        };

        for (key, value) in &self.config.headers {
            request = request.header(key, value);
        }

        if method != "GET" {
            request = request.json(&WebhookBody::from_alert(alert));
        }

        let response = request
            .timeout(std::time::Duration::from_secs(self.config.timeout_seconds))
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                ChannelResult::success(ChannelType::Webhook)
            }
            Ok(response) => ChannelResult::failure(
                ChannelType::Webhook,
                format!("webhook returned {}", response.status()),
            ),
            Err(e) => ChannelResult::failure(ChannelType::Webhook, e.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────
// Slack channel
// ─────────────────────────────────────────────────────────────

/// Attachment color per severity, matching the dashboard's badge palette.
#[must_use]
pub const fn severity_color(severity: AlertSeverity) -> &'static str {
    match severity {
        AlertSeverity::Critical => "#8b0000",
        AlertSeverity::High => "#ff0000",
        AlertSeverity::Medium => "#ff9900",
        AlertSeverity::Low => "#36a64f",
        AlertSeverity::Info => "#439fe0",
    }
}

/// Slack incoming-webhook payload.
#[derive(Debug, Serialize)]
pub struct SlackPayload {
    /// Channel override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    /// Username override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// Message attachments.
    pub attachments: Vec<SlackAttachment>,
}

/// One Slack attachment.
#[derive(Debug, Serialize)]
pub struct SlackAttachment {
    /// Sidebar color, keyed by severity.
    pub color: String,
    /// Attachment title.
    pub title: String,
    /// Attachment body.
    pub text: String,
    /// Structured fields (at most [`SLACK_MAX_FIELDS`]).
    pub fields: Vec<SlackField>,
    /// Footer text.
    pub footer: String,
    /// Unix timestamp Slack renders next to the footer.
    pub ts: i64,
}

/// One field of a Slack attachment.
#[derive(Debug, Serialize)]
pub struct SlackField {
    /// Field label.
    pub title: String,
    /// Field value.
    pub value: String,
    /// Render side-by-side with the next field.
    pub short: bool,
}

/// Most fields one attachment carries: severity, time, source, plus up to
/// three metadata entries.
pub const SLACK_MAX_FIELDS: usize = 6;

/// Posts richly formatted alerts to a Slack incoming webhook.
#[derive(Debug, Clone)]
pub struct SlackChannel {
    config: SlackChannelConfig,
    client: reqwest::Client,
}

impl SlackChannel {
    /// Creates a Slack channel.
    #[must_use]
    pub fn new(config: SlackChannelConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Builds the webhook payload for one alert.
    #[must_use]
    pub fn build_payload(&self, alert: &Alert) -> SlackPayload {
        let mut fields = vec![
            SlackField {
                title: "Severity".to_string(),
                value: alert.severity.as_str().to_uppercase(),
                short: true,
            },
            SlackField {
                title: "Time".to_string(),
                value: alert.timestamp.to_rfc3339(),
                short: true,
            },
            SlackField {
                title: "Source".to_string(),
                value: alert.source.clone(),
                short: true,
            },
        ];

        if let Some(metadata) = &alert.metadata {
            for (key, value) in metadata {
                if fields.len() >= SLACK_MAX_FIELDS {
                    break;
                }
                let rendered = match value {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                fields.push(SlackField {
                    title: key.clone(),
                    value: rendered,
                    short: true,
                });
            }
        }

        SlackPayload {
            channel: self.config.channel.clone(),
            username: self.config.username.clone(),
            attachments: vec![SlackAttachment {
                color: severity_color(alert.severity).to_string(),
                title: alert.title.clone(),
                text: alert.message.clone(),
                fields,
                footer: "hivewatch".to_string(),
                ts: alert.timestamp.timestamp(),
            }],
        }
    }
}

#[async_trait]
impl NotificationChannel for SlackChannel {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Slack
    }

    fn validate(&self) -> ChannelValidation {
        if self.config.webhook_url.is_empty() {
            return ChannelValidation::invalid("Slack webhook URL is not configured");
        }
        if reqwest::Url::parse(&self.config.webhook_url).is_err() {
            return ChannelValidation::invalid(format!(
                "Slack webhook URL is not valid: {}",
                self.config.webhook_url
            ));
        }
        ChannelValidation::ok()
    }

    async fn send(&self, alert: &Alert) -> ChannelResult {
        let payload = self.build_payload(alert);

        let response = self
            .client
            .post(&self.config.webhook_url)
            .json(&payload)
            .send()
            .await;

        match response {
            Ok(response) if response.status().is_success() => {
                ChannelResult::success(ChannelType::Slack)
            }
            Ok(response) => ChannelResult::failure(
                ChannelType::Slack,
                format!("Slack webhook returned {}", response.status()),
            ),
            Err(e) => ChannelResult::failure(ChannelType::Slack, e.to_string()),
        }
    }
}
