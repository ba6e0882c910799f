//! Alerting for hivewatch: rules, channels, dispatch and history.
//!
//! `hive-alerts` turns rule conditions into routed, channel-dispatched
//! notifications:
//!
//! - **Rules** ([`AlertRule`], [`RuleCondition`]): threshold, rate, pattern,
//!   `circuit` (any breaker open) and `agent_stale` (any active agent
//!   silent past its timeout) conditions, each with a per-rule cooldown.
//! - **Channels** ([`channels`]): log, webhook and Slack adapters behind the
//!   [`NotificationChannel`] trait; email is a declared stub with
//!   configuration but no adapter.
//! - **Dispatch** ([`ChannelDispatcher`]): wait-all fan-out with a
//!   per-channel timeout; one failing channel never blocks the others.
//! - **Notifier** ([`AlertNotifier`]): the façade owning configuration,
//!   persisted history and stats (`alerts.json`), severity routing and the
//!   alert lifecycle (pending → sent/failed → acknowledged).
//! - **Engine** ([`AlertRuleEngine`]): pull-based evaluation over supplied
//!   metrics plus snapshots from the breaker registry and agent tracker.
//!
//! # Example
//!
//! ```rust,no_run
//! use hive_alerts::{AlertNotifier, AlertSeverity};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() {
//!     let notifier = AlertNotifier::new(Path::new("/var/lib/hivewatch"));
//!     let report = notifier
//!         .send_alert(
//!             AlertSeverity::High,
//!             "Queue depth",
//!             "Backlog exceeded 500 jobs",
//!             None,
//!             None,
//!         )
//!         .await;
//!     println!("delivered: {}", report.success);
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channels;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod notifier;
pub mod types;

pub use channels::{ChannelValidation, LogChannel, NotificationChannel, SlackChannel, WebhookChannel};
pub use dispatch::{ChannelDispatcher, DEFAULT_CHANNEL_TIMEOUT, build_channel};
pub use engine::{
    AlertRuleEngine, CircuitObservation, EvaluationInput, EvaluationResult, EvaluationSnapshot,
    StaleAgentObservation,
};
pub use error::{AlertError, Result};
pub use notifier::{AlertNotifier, SendReport};
pub use types::{
    Alert, AlertConfig, AlertConfigPatch, AlertRule, AlertRuleBuilder, AlertSeverity, AlertStats,
    AlertStatus, ChannelConfig, ChannelResult, ChannelSettings, ChannelType, ComparisonOperator,
    EmailChannelConfig, LogChannelConfig, Metadata, RuleAction, RuleCondition, SlackChannelConfig,
    WebhookChannelConfig,
};
