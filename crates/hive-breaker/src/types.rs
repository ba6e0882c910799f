//! Core types for circuit breakers.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The admission state of a circuit breaker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    /// Normal operation; calls flow through.
    #[default]
    Closed,
    /// The protected resource is considered down; calls should fail fast.
    Open,
    /// Cooldown elapsed; limited probe calls are allowed to test recovery.
    HalfOpen,
}

impl BreakerState {
    /// Returns the state as the string the dashboard renders.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Closed => "CLOSED",
            Self::Open => "OPEN",
            Self::HalfOpen => "HALF_OPEN",
        }
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Thresholds and cooldown for one breaker.
#[derive(Debug, Clone)]
pub struct BreakerConfig {
    /// Failures in `Closed` before the breaker opens.
    pub failure_threshold: u32,
    /// Consecutive successes in `HalfOpen` before the breaker closes.
    pub success_threshold: u32,
    /// How long the breaker stays `Open` before probing.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }
}

/// A point-in-time snapshot of one breaker, as exposed to the dashboard.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakerStats {
    /// The breaker's name (the protected resource).
    pub name: String,
    /// Current state, after any lazy cooldown transition.
    pub state: BreakerState,
    /// Failures recorded since the last transition into `Closed`.
    pub failure_count: u64,
    /// Total successes recorded.
    pub success_count: u64,
    /// Consecutive successes while `HalfOpen`.
    pub consecutive_successes: u32,
    /// Configured failure threshold.
    pub failure_threshold: u32,
    /// Configured success threshold.
    pub success_threshold: u32,
    /// Configured cooldown in seconds.
    pub cooldown_seconds: u64,
    /// When the current `Open` period ends, if open.
    pub cooldown_until: Option<DateTime<Utc>>,
    /// When the last failure was recorded.
    pub last_failure_time: Option<DateTime<Utc>>,
    /// When the last success was recorded.
    pub last_success_time: Option<DateTime<Utc>>,
    /// Reason attached to the most recent failure or force-open.
    pub last_failure_reason: Option<String>,
}

/// Breaker counts per state, for aggregate dashboard tiles and the
/// `circuit` alert rule condition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateCounts {
    /// Breakers currently `Closed`.
    pub closed: usize,
    /// Breakers currently `Open`.
    pub open: usize,
    /// Breakers currently `HalfOpen`.
    pub half_open: usize,
}

impl StateCounts {
    /// Total number of breakers counted.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.closed + self.open + self.half_open
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_as_str() {
        assert_eq!(BreakerState::Closed.as_str(), "CLOSED");
        assert_eq!(BreakerState::Open.as_str(), "OPEN");
        assert_eq!(BreakerState::HalfOpen.as_str(), "HALF_OPEN");
    }

    #[test]
    fn state_serialization() {
        let json = serde_json::to_string(&BreakerState::HalfOpen).expect("serialize");
        assert_eq!(json, "\"HALF_OPEN\"");
        let back: BreakerState = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, BreakerState::HalfOpen);
    }

    #[test]
    fn default_config() {
        let config = BreakerConfig::default();
        assert_eq!(config.failure_threshold, 5);
        assert_eq!(config.success_threshold, 3);
        assert_eq!(config.cooldown, Duration::from_secs(60));
    }

    #[test]
    fn counts_total() {
        let counts = StateCounts {
            closed: 2,
            open: 1,
            half_open: 1,
        };
        assert_eq!(counts.total(), 4);
    }
}
