//! The alert rule engine.
//!
//! Evaluation is pull-based: the engine is handed metric values, rates and
//! text lines by the caller, takes its circuit and agent snapshots from the
//! attached [`CircuitBreakerRegistry`] and [`AgentHeartbeatTracker`], and
//! decides per rule whether the condition holds and the cooldown has
//! elapsed. A firing rule stamps `last_triggered` through the notifier and
//! dispatches one alert per action, with `{placeholder}` names in the
//! action's message template substituted from the evaluation context.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use hive_agents::AgentHeartbeatTracker;
use hive_breaker::{BreakerState, CircuitBreakerRegistry};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::{AlertError, Result};
use crate::notifier::AlertNotifier;
use crate::types::{AlertRule, Metadata, RuleCondition};

/// Caller-supplied inputs for one evaluation pass.
#[derive(Debug, Clone, Default)]
pub struct EvaluationInput {
    /// Current metric values, by metric name (for `threshold` conditions).
    pub metrics: HashMap<String, f64>,
    /// Ratios computed externally over each rule's window, by metric name
    /// (for `rate` conditions).
    pub rates: HashMap<String, f64>,
    /// Text lines to match `pattern` conditions against.
    pub lines: Vec<String>,
}

/// An open breaker as seen by the `circuit` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitObservation {
    /// Breaker name.
    pub name: String,
    /// Failures recorded since it last closed.
    pub failure_count: u64,
    /// Most recent failure reason.
    pub last_failure_reason: Option<String>,
}

/// A stale agent as seen by the `agent_stale` condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleAgentObservation {
    /// Agent id.
    pub id: String,
    /// The agent's heartbeat timeout in seconds.
    pub timeout_seconds: u64,
}

/// Everything one evaluation pass looks at.
#[derive(Debug, Clone, Default)]
pub struct EvaluationSnapshot {
    /// Caller-supplied metrics, rates and lines.
    pub input: EvaluationInput,
    /// Breakers currently open.
    pub open_circuits: Vec<CircuitObservation>,
    /// Active agents whose heartbeat has timed out.
    pub stale_agents: Vec<StaleAgentObservation>,
}

/// Counters for one evaluation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Enabled rules evaluated.
    pub rules_evaluated: usize,
    /// Names of rules that fired.
    pub fired: Vec<String>,
    /// Rules whose condition held but whose cooldown had not elapsed.
    pub suppressed: usize,
    /// Rules that failed to evaluate (e.g. invalid pattern).
    pub rules_errored: usize,
    /// Alerts that ended up sent.
    pub alerts_sent: usize,
    /// Alerts that ended up failed.
    pub alerts_failed: usize,
}

/// Evaluates configured rules against snapshots and drives the notifier.
#[derive(Debug)]
pub struct AlertRuleEngine {
    notifier: Arc<AlertNotifier>,
    registry: Option<Arc<CircuitBreakerRegistry>>,
    tracker: Option<Arc<AgentHeartbeatTracker>>,
}

impl AlertRuleEngine {
    /// Creates an engine that dispatches through `notifier`.
    #[must_use]
    pub fn new(notifier: Arc<AlertNotifier>) -> Self {
        Self {
            notifier,
            registry: None,
            tracker: None,
        }
    }

    /// Attaches the breaker registry consulted by `circuit` conditions.
    #[must_use]
    pub fn with_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Attaches the agent tracker consulted by `agent_stale` conditions.
    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<AgentHeartbeatTracker>) -> Self {
        self.tracker = Some(tracker);
        self
    }

    /// Builds a snapshot from the attached services plus the given input.
    #[must_use]
    pub fn snapshot(&self, input: EvaluationInput) -> EvaluationSnapshot {
        let open_circuits = self.registry.as_ref().map_or_else(Vec::new, |registry| {
            registry
                .all_stats()
                .into_iter()
                .filter(|stats| stats.state == BreakerState::Open)
                .map(|stats| CircuitObservation {
                    name: stats.name,
                    failure_count: stats.failure_count,
                    last_failure_reason: stats.last_failure_reason,
                })
                .collect()
        });

        let stale_agents = self.tracker.as_ref().map_or_else(Vec::new, |tracker| {
            tracker
                .get_stale_agents()
                .into_iter()
                .map(|agent| StaleAgentObservation {
                    id: agent.id,
                    timeout_seconds: agent.heartbeat_timeout,
                })
                .collect()
        });

        EvaluationSnapshot {
            input,
            open_circuits,
            stale_agents,
        }
    }

    /// Evaluates every enabled rule against a fresh snapshot.
    pub async fn evaluate(&self, input: EvaluationInput) -> EvaluationResult {
        let snapshot = self.snapshot(input);
        self.evaluate_with_snapshot(&snapshot).await
    }

    /// Evaluates every enabled rule against the given snapshot.
    pub async fn evaluate_with_snapshot(&self, snapshot: &EvaluationSnapshot) -> EvaluationResult {
        let rules = self.notifier.rules();
        let floor = self.notifier.global_cooldown_seconds();
        let now = Utc::now();
        let mut result = EvaluationResult::default();

        for rule in rules.iter().filter(|r| r.enabled) {
            result.rules_evaluated += 1;

            let context = match evaluate_condition(&rule.condition, snapshot) {
                Ok(Some(context)) => context,
                Ok(None) => continue,
                Err(e) => {
                    result.rules_errored += 1;
                    warn!(rule = %rule.name, error = %e, "failed to evaluate rule");
                    continue;
                }
            };

            if !rule.is_cooled_down(now, floor) {
                debug!(rule = %rule.name, "rule in cooldown, suppressed");
                result.suppressed += 1;
                continue;
            }

            self.notifier.mark_rule_triggered(&rule.id, now);
            result.fired.push(rule.name.clone());

            for action in &rule.actions {
                let message = render_template(&action.message_template, &context);
                let report = self
                    .notifier
                    .send_alert_to(
                        rule.severity,
                        &rule.name,
                        &message,
                        Some(context_metadata(rule, &context)),
                        Some("rule-engine"),
                        &action.channels,
                    )
                    .await;
                if report.success {
                    result.alerts_sent += 1;
                } else {
                    result.alerts_failed += 1;
                }
            }
        }

        debug!(
            rules_evaluated = result.rules_evaluated,
            fired = result.fired.len(),
            suppressed = result.suppressed,
            "evaluation complete"
        );
        result
    }
}

/// The substitution context a firing condition produces: placeholder name
/// (e.g. `rate`, `circuit`, `agentId`) to rendered value.
pub type TemplateContext = BTreeMap<String, String>;

/// Replaces every `{name}` occurrence with its context value.
#[must_use]
pub fn render_template(template: &str, context: &TemplateContext) -> String {
    let mut message = template.to_string();
    for (key, value) in context {
        message = message.replace(&format!("{{{key}}}"), value);
    }
    message
}

/// Renders an f64 the way the dashboard shows it (no trailing `.0`).
fn fmt_number(value: f64) -> String {
    format!("{value}")
}

/// Evaluates one condition. `Ok(Some(context))` means the condition holds.
fn evaluate_condition(
    condition: &RuleCondition,
    snapshot: &EvaluationSnapshot,
) -> Result<Option<TemplateContext>> {
    match condition {
        RuleCondition::Threshold {
            metric,
            operator,
            threshold,
        } => {
            let Some(&value) = snapshot.input.metrics.get(metric) else {
                debug!(metric = %metric, "no value for metric, skipping rule");
                return Ok(None);
            };
            if !operator.evaluate(value, *threshold) {
                return Ok(None);
            }
            let mut context = TemplateContext::new();
            context.insert("metric".to_string(), metric.clone());
            context.insert("value".to_string(), fmt_number(value));
            context.insert("threshold".to_string(), fmt_number(*threshold));
            Ok(Some(context))
        }

        RuleCondition::Rate {
            metric,
            operator,
            threshold,
            window_secs,
        } => {
            let Some(&rate) = snapshot.input.rates.get(metric) else {
                debug!(metric = %metric, "no rate for metric, skipping rule");
                return Ok(None);
            };
            if !operator.evaluate(rate, *threshold) {
                return Ok(None);
            }
            let mut context = TemplateContext::new();
            context.insert("metric".to_string(), metric.clone());
            // Rates render as whole percentages: 0.62 → "62".
            context.insert("rate".to_string(), fmt_number((rate * 100.0).round()));
            context.insert("value".to_string(), fmt_number(rate));
            context.insert("threshold".to_string(), fmt_number(*threshold));
            context.insert("window".to_string(), window_secs.to_string());
            Ok(Some(context))
        }

        RuleCondition::Pattern { pattern, regex } => {
            let count = if *regex {
                let compiled = Regex::new(pattern).map_err(|e| AlertError::InvalidPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })?;
                snapshot
                    .input
                    .lines
                    .iter()
                    .filter(|line| compiled.is_match(line))
                    .count()
            } else {
                snapshot
                    .input
                    .lines
                    .iter()
                    .filter(|line| line.contains(pattern.as_str()))
                    .count()
            };
            if count == 0 {
                return Ok(None);
            }
            let mut context = TemplateContext::new();
            context.insert("pattern".to_string(), pattern.clone());
            context.insert("count".to_string(), count.to_string());
            Ok(Some(context))
        }

        RuleCondition::Circuit => {
            if snapshot.open_circuits.is_empty() {
                return Ok(None);
            }
            let names: Vec<&str> = snapshot
                .open_circuits
                .iter()
                .map(|c| c.name.as_str())
                .collect();
            let failures: u64 = snapshot.open_circuits.iter().map(|c| c.failure_count).sum();
            let mut context = TemplateContext::new();
            context.insert("circuit".to_string(), names.join(", "));
            context.insert("count".to_string(), names.len().to_string());
            context.insert("failureCount".to_string(), failures.to_string());
            Ok(Some(context))
        }

        RuleCondition::AgentStale => {
            if snapshot.stale_agents.is_empty() {
                return Ok(None);
            }
            let ids: Vec<&str> = snapshot
                .stale_agents
                .iter()
                .map(|a| a.id.as_str())
                .collect();
            let mut context = TemplateContext::new();
            context.insert("agentId".to_string(), ids.join(", "));
            context.insert("count".to_string(), ids.len().to_string());
            context.insert(
                "timeout".to_string(),
                snapshot.stale_agents[0].timeout_seconds.to_string(),
            );
            Ok(Some(context))
        }
    }
}

/// Builds the alert metadata for a firing rule.
fn context_metadata(rule: &AlertRule, context: &TemplateContext) -> Metadata {
    let mut metadata = Metadata::new();
    metadata.insert(
        "rule".to_string(),
        serde_json::Value::String(rule.id.clone()),
    );
    metadata.insert(
        "condition".to_string(),
        serde_json::Value::String(rule.condition.kind().to_string()),
    );
    for (key, value) in context {
        metadata.insert(key.clone(), serde_json::Value::String(value.clone()));
    }
    metadata
}
