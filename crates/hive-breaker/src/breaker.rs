//! The circuit breaker state machine.
//!
//! A [`CircuitBreaker`] tracks failures and successes for one protected
//! resource and decides admission:
//!
//! - `Closed` → `Open` once the failure count reaches the threshold.
//! - `Open` → `HalfOpen` lazily, when any operation observes that the
//!   cooldown has elapsed. No background timer drives this transition.
//! - `HalfOpen` → `Closed` after enough consecutive successes.
//! - `HalfOpen` → `Open` immediately on any failure, restarting the cooldown.
//!
//! Every operation is a total function over the state; nothing here returns
//! an error.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::{info, warn};

use crate::types::{BreakerConfig, BreakerState, BreakerStats};

#[derive(Debug, Default)]
struct BreakerInner {
    state: BreakerState,
    failure_count: u64,
    success_count: u64,
    consecutive_successes: u32,
    cooldown_until: Option<DateTime<Utc>>,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    last_failure_reason: Option<String>,
}

/// Failure/success counter and three-state machine for one named resource.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Creates a breaker with the given thresholds.
    #[must_use]
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(BreakerInner::default()),
        }
    }

    /// Creates a breaker with default thresholds.
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, BreakerConfig::default())
    }

    /// The breaker's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The breaker's configuration.
    #[must_use]
    pub const fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Records a successful call.
    ///
    /// In `HalfOpen` this advances the recovery counter and closes the
    /// breaker once the success threshold is met. In `Open` the success is
    /// counted but does not change state; recovery goes through `HalfOpen`.
    pub fn record_success(&self) {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        self.advance_cooldown(&mut inner, now);

        inner.success_count += 1;
        inner.last_success_time = Some(now);

        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_successes = inner.consecutive_successes.saturating_add(1);
            }
            BreakerState::Open => {}
            BreakerState::HalfOpen => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    info!(
                        breaker = %self.name,
                        successes = inner.consecutive_successes,
                        "circuit closed after recovery"
                    );
                    inner.state = BreakerState::Closed;
                    inner.failure_count = 0;
                    inner.consecutive_successes = 0;
                    inner.cooldown_until = None;
                }
            }
        }
    }

    /// Records a failed call with its reason.
    ///
    /// In `Closed` this opens the breaker once the failure threshold is
    /// reached. In `HalfOpen` a single failure reopens immediately and
    /// restarts the cooldown. Failures while already `Open` are counted but
    /// do not extend the cooldown.
    pub fn record_failure(&self, reason: impl Into<String>) {
        let now = Utc::now();
        let mut inner = self.inner.lock();
        self.advance_cooldown(&mut inner, now);

        inner.failure_count += 1;
        inner.consecutive_successes = 0;
        inner.last_failure_time = Some(now);
        inner.last_failure_reason = Some(reason.into());

        match inner.state {
            BreakerState::Closed => {
                if inner.failure_count >= u64::from(self.config.failure_threshold) {
                    warn!(
                        breaker = %self.name,
                        failures = inner.failure_count,
                        reason = inner.last_failure_reason.as_deref().unwrap_or(""),
                        "circuit opened"
                    );
                    self.open(&mut inner, now);
                }
            }
            BreakerState::HalfOpen => {
                warn!(breaker = %self.name, "circuit reopened after failed probe");
                self.open(&mut inner, now);
            }
            BreakerState::Open => {}
        }
    }

    /// The current state, applying the lazy `Open` → `HalfOpen` transition
    /// if the cooldown has elapsed.
    #[must_use]
    pub fn state(&self) -> BreakerState {
        let mut inner = self.inner.lock();
        self.advance_cooldown(&mut inner, Utc::now());
        inner.state
    }

    /// A full snapshot of the breaker.
    #[must_use]
    pub fn stats(&self) -> BreakerStats {
        let mut inner = self.inner.lock();
        self.advance_cooldown(&mut inner, Utc::now());

        BreakerStats {
            name: self.name.clone(),
            state: inner.state,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            consecutive_successes: inner.consecutive_successes,
            failure_threshold: self.config.failure_threshold,
            success_threshold: self.config.success_threshold,
            cooldown_seconds: self.config.cooldown.as_secs(),
            cooldown_until: inner.cooldown_until,
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            last_failure_reason: inner.last_failure_reason.clone(),
        }
    }

    /// Administrative reset: back to `Closed` with every counter zeroed.
    pub fn reset(&self) {
        info!(breaker = %self.name, "circuit reset");
        let mut inner = self.inner.lock();
        *inner = BreakerInner::default();
    }

    /// Administrative trip: force the breaker `Open` from any state.
    pub fn force_open(&self, reason: impl Into<String>) {
        let now = Utc::now();
        let reason = reason.into();
        warn!(breaker = %self.name, reason = %reason, "circuit forced open");

        let mut inner = self.inner.lock();
        inner.last_failure_reason = Some(reason);
        self.open(&mut inner, now);
    }

    fn open(&self, inner: &mut BreakerInner, now: DateTime<Utc>) {
        inner.state = BreakerState::Open;
        inner.consecutive_successes = 0;
        let cooldown =
            chrono::Duration::from_std(self.config.cooldown).unwrap_or(chrono::Duration::MAX);
        inner.cooldown_until = Some(
            now.checked_add_signed(cooldown)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        );
    }

    fn advance_cooldown(&self, inner: &mut BreakerInner, now: DateTime<Utc>) {
        if inner.state == BreakerState::Open {
            if let Some(until) = inner.cooldown_until {
                if now >= until {
                    info!(breaker = %self.name, "cooldown elapsed, circuit half-open");
                    inner.state = BreakerState::HalfOpen;
                    inner.consecutive_successes = 0;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn fast_config(failure_threshold: u32, success_threshold: u32) -> BreakerConfig {
        BreakerConfig {
            failure_threshold,
            success_threshold,
            cooldown: Duration::from_millis(20),
        }
    }

    mod state_machine_tests {
        use super::*;

        #[test]
        fn opens_at_failure_threshold() {
            let breaker = CircuitBreaker::new("db", fast_config(3, 3));

            breaker.record_failure("timeout");
            breaker.record_failure("timeout");
            assert_eq!(breaker.state(), BreakerState::Closed);

            breaker.record_failure("timeout");
            assert_eq!(breaker.state(), BreakerState::Open);
        }

        #[test]
        fn failures_while_open_do_not_extend_cooldown() {
            let breaker = CircuitBreaker::new("db", fast_config(1, 3));

            breaker.record_failure("down");
            let first_deadline = breaker.stats().cooldown_until;
            assert!(first_deadline.is_some());

            breaker.record_failure("still down");
            assert_eq!(breaker.stats().cooldown_until, first_deadline);
            assert_eq!(breaker.stats().failure_count, 2);
        }

        #[test]
        fn open_transitions_to_half_open_after_cooldown() {
            let breaker = CircuitBreaker::new("db", fast_config(1, 3));

            breaker.record_failure("down");
            assert_eq!(breaker.state(), BreakerState::Open);

            std::thread::sleep(Duration::from_millis(30));
            assert_eq!(breaker.state(), BreakerState::HalfOpen);
        }

        #[test]
        fn half_open_closes_after_success_threshold() {
            let breaker = CircuitBreaker::new("db", fast_config(1, 2));

            breaker.record_failure("down");
            std::thread::sleep(Duration::from_millis(30));
            assert_eq!(breaker.state(), BreakerState::HalfOpen);

            breaker.record_success();
            assert_eq!(breaker.state(), BreakerState::HalfOpen);

            breaker.record_success();
            assert_eq!(breaker.state(), BreakerState::Closed);
            assert_eq!(breaker.stats().failure_count, 0);
            assert_eq!(breaker.stats().consecutive_successes, 0);
        }

        #[test]
        fn half_open_failure_reopens_and_restarts_cooldown() {
            let breaker = CircuitBreaker::new("db", fast_config(1, 3));

            breaker.record_failure("down");
            std::thread::sleep(Duration::from_millis(30));

            breaker.record_success();
            assert_eq!(breaker.stats().consecutive_successes, 1);

            breaker.record_failure("probe failed");
            let stats = breaker.stats();
            assert_eq!(stats.state, BreakerState::Open);
            assert_eq!(stats.consecutive_successes, 0);
            assert!(stats.cooldown_until.is_some());
        }

        #[test]
        fn success_while_open_does_not_change_state() {
            let breaker = CircuitBreaker::new("db", BreakerConfig {
                failure_threshold: 1,
                success_threshold: 3,
                cooldown: Duration::from_secs(60),
            });

            breaker.record_failure("down");
            breaker.record_success();

            let stats = breaker.stats();
            assert_eq!(stats.state, BreakerState::Open);
            assert_eq!(stats.success_count, 1);
        }

        #[test]
        fn failure_count_is_cumulative_until_closed() {
            let breaker = CircuitBreaker::new("db", BreakerConfig {
                failure_threshold: 2,
                success_threshold: 3,
                cooldown: Duration::from_secs(60),
            });

            breaker.record_failure("a");
            breaker.record_failure("b");
            breaker.record_failure("c");
            assert_eq!(breaker.stats().failure_count, 3);
        }
    }

    mod admin_tests {
        use super::*;

        #[test]
        fn reset_zeroes_everything_from_any_state() {
            let breaker = CircuitBreaker::new("db", fast_config(1, 3));
            breaker.record_failure("down");
            breaker.record_success();

            breaker.reset();

            let stats = breaker.stats();
            assert_eq!(stats.state, BreakerState::Closed);
            assert_eq!(stats.failure_count, 0);
            assert_eq!(stats.success_count, 0);
            assert_eq!(stats.consecutive_successes, 0);
            assert!(stats.cooldown_until.is_none());
            assert!(stats.last_failure_time.is_none());
            assert!(stats.last_failure_reason.is_none());
        }

        #[test]
        fn force_open_from_closed() {
            let breaker = CircuitBreaker::with_defaults("db");

            breaker.force_open("maintenance window");

            let stats = breaker.stats();
            assert_eq!(stats.state, BreakerState::Open);
            assert_eq!(stats.last_failure_reason.as_deref(), Some("maintenance window"));
            assert!(stats.cooldown_until.is_some());
        }

        #[test]
        fn force_open_preserves_counters() {
            let breaker = CircuitBreaker::with_defaults("db");
            breaker.record_success();
            breaker.record_failure("blip");

            breaker.force_open("manual");

            let stats = breaker.stats();
            assert_eq!(stats.failure_count, 1);
            assert_eq!(stats.success_count, 1);
        }
    }

    mod scenario_tests {
        use super::*;

        // Five failures with threshold 5 open the circuit; the state reads
        // OPEN immediately after, while the cooldown is still running.
        #[test]
        fn database_breaker_opens_after_five_failures() {
            let breaker = CircuitBreaker::new("db", BreakerConfig {
                failure_threshold: 5,
                success_threshold: 3,
                cooldown: Duration::from_secs(60),
            });

            for _ in 0..5 {
                breaker.record_failure("connection refused");
            }

            let stats = breaker.stats();
            assert_eq!(stats.state, BreakerState::Open);
            assert_eq!(stats.failure_count, 5);
            let until = stats.cooldown_until.expect("cooldown set");
            let remaining = until - Utc::now();
            assert!(remaining > chrono::Duration::seconds(55));
            assert!(remaining <= chrono::Duration::seconds(60));
            assert_eq!(breaker.state(), BreakerState::Open);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        #[derive(Debug, Clone)]
        enum Op {
            Success,
            Failure,
            ForceOpen,
        }

        fn op_strategy() -> impl Strategy<Value = Op> {
            prop_oneof![
                Just(Op::Success),
                Just(Op::Failure),
                Just(Op::ForceOpen),
            ]
        }

        proptest! {
            // reset() lands in Closed with zeroed counters no matter what
            // sequence of operations came before it.
            #[test]
            fn reset_always_yields_pristine_closed(ops in proptest::collection::vec(op_strategy(), 0..40)) {
                let breaker = CircuitBreaker::new("prop", BreakerConfig {
                    failure_threshold: 3,
                    success_threshold: 2,
                    cooldown: Duration::from_secs(60),
                });

                for op in ops {
                    match op {
                        Op::Success => breaker.record_success(),
                        Op::Failure => breaker.record_failure("boom"),
                        Op::ForceOpen => breaker.force_open("forced"),
                    }
                }

                breaker.reset();
                let stats = breaker.stats();
                prop_assert_eq!(stats.state, BreakerState::Closed);
                prop_assert_eq!(stats.failure_count, 0);
                prop_assert_eq!(stats.success_count, 0);
                prop_assert_eq!(stats.consecutive_successes, 0);
                prop_assert!(stats.cooldown_until.is_none());
            }

            // With a long cooldown the breaker can never report HalfOpen:
            // only Closed (never tripped) or Open (tripped).
            #[test]
            fn half_open_requires_elapsed_cooldown(ops in proptest::collection::vec(op_strategy(), 0..40)) {
                let breaker = CircuitBreaker::new("prop", BreakerConfig {
                    failure_threshold: 2,
                    success_threshold: 2,
                    cooldown: Duration::from_secs(3600),
                });

                for op in ops {
                    match op {
                        Op::Success => breaker.record_success(),
                        Op::Failure => breaker.record_failure("boom"),
                        Op::ForceOpen => breaker.force_open("forced"),
                    }
                    prop_assert_ne!(breaker.state(), BreakerState::HalfOpen);
                }
            }
        }
    }
}
