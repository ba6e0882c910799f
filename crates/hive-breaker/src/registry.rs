//! Named breaker lifecycle and aggregation.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::breaker::CircuitBreaker;
use crate::types::{BreakerConfig, BreakerState, BreakerStats, StateCounts};

/// Owns the name → breaker map.
///
/// Lookups auto-create: asking for a breaker that does not exist yet creates
/// one with the registry's default thresholds, so callers never handle a
/// "not found" case. All mutation goes through the [`CircuitBreaker`] handles
/// this registry returns.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
    default_config: BreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Creates a registry with default breaker thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self::with_default_config(BreakerConfig::default())
    }

    /// Creates a registry whose auto-created breakers use `config`.
    #[must_use]
    pub fn with_default_config(config: BreakerConfig) -> Self {
        Self {
            breakers: RwLock::new(HashMap::new()),
            default_config: config,
        }
    }

    /// Returns the breaker for `name`, creating it if needed.
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return Arc::clone(breaker);
        }
        self.insert(name, self.default_config.clone())
    }

    /// Returns the breaker for `name`, creating it with `config` if needed.
    ///
    /// An existing breaker keeps its original configuration.
    pub fn get_with_config(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return Arc::clone(breaker);
        }
        self.insert(name, config)
    }

    fn insert(&self, name: &str, config: BreakerConfig) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.write();
        // Double-checked: another caller may have created it between locks.
        if let Some(breaker) = breakers.get(name) {
            return Arc::clone(breaker);
        }

        info!(breaker = %name, "created circuit breaker");
        let breaker = Arc::new(CircuitBreaker::new(name, config));
        breakers.insert(name.to_string(), Arc::clone(&breaker));
        breaker
    }

    /// Current state of every breaker, keyed by name.
    #[must_use]
    pub fn all_states(&self) -> HashMap<String, BreakerState> {
        self.breakers
            .read()
            .iter()
            .map(|(name, breaker)| (name.clone(), breaker.state()))
            .collect()
    }

    /// Full stats snapshot of every breaker, sorted by name.
    #[must_use]
    pub fn all_stats(&self) -> Vec<BreakerStats> {
        let mut stats: Vec<BreakerStats> = self
            .breakers
            .read()
            .values()
            .map(|breaker| breaker.stats())
            .collect();
        stats.sort_by(|a, b| a.name.cmp(&b.name));
        stats
    }

    /// Breaker counts per state, after lazy cooldown transitions.
    #[must_use]
    pub fn count_by_state(&self) -> StateCounts {
        let mut counts = StateCounts::default();
        for breaker in self.breakers.read().values() {
            match breaker.state() {
                BreakerState::Closed => counts.closed += 1,
                BreakerState::Open => counts.open += 1,
                BreakerState::HalfOpen => counts.half_open += 1,
            }
        }
        counts
    }

    /// Registered breaker names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered breakers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    /// True if no breakers are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.breakers.read().is_empty()
    }

    /// Removes a breaker. Returns `true` if it existed.
    pub fn remove(&self, name: &str) -> bool {
        let removed = self.breakers.write().remove(name).is_some();
        if removed {
            debug!(breaker = %name, "removed circuit breaker");
        }
        removed
    }

    /// Resets every breaker to `Closed` with zeroed counters.
    pub fn reset_all(&self) {
        for breaker in self.breakers.read().values() {
            breaker.reset();
        }
    }

    /// Drops every breaker.
    pub fn clear(&self) {
        let mut breakers = self.breakers.write();
        let count = breakers.len();
        breakers.clear();
        info!(count, "cleared circuit breaker registry");
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn get_auto_creates() {
        let registry = CircuitBreakerRegistry::new();
        assert!(registry.is_empty());

        let breaker = registry.get("db");
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn get_returns_same_instance() {
        let registry = CircuitBreakerRegistry::new();
        let first = registry.get("db");
        let second = registry.get("db");
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn get_with_config_keeps_existing() {
        let registry = CircuitBreakerRegistry::new();
        let first = registry.get("db");

        let custom = BreakerConfig {
            failure_threshold: 1,
            ..BreakerConfig::default()
        };
        let second = registry.get_with_config("db", custom);

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.config().failure_threshold, 5);
    }

    #[test]
    fn count_by_state_reflects_lazy_transition() {
        let registry = CircuitBreakerRegistry::with_default_config(BreakerConfig {
            failure_threshold: 1,
            success_threshold: 3,
            cooldown: Duration::from_millis(20),
        });

        registry.get("healthy").record_success();
        registry.get("broken").record_failure("down");

        let counts = registry.count_by_state();
        assert_eq!(counts, StateCounts { closed: 1, open: 1, half_open: 0 });

        std::thread::sleep(Duration::from_millis(30));

        let counts = registry.count_by_state();
        assert_eq!(counts, StateCounts { closed: 1, open: 0, half_open: 1 });
    }

    #[test]
    fn all_stats_sorted_by_name() {
        let registry = CircuitBreakerRegistry::new();
        registry.get("zeta");
        registry.get("alpha");

        let stats = registry.all_stats();
        assert_eq!(stats.len(), 2);
        assert_eq!(stats[0].name, "alpha");
        assert_eq!(stats[1].name, "zeta");
    }

    #[test]
    fn all_states_snapshot() {
        let registry = CircuitBreakerRegistry::with_default_config(BreakerConfig {
            failure_threshold: 1,
            ..BreakerConfig::default()
        });
        registry.get("db").record_failure("down");
        registry.get("cache");

        let states = registry.all_states();
        assert_eq!(states.get("db"), Some(&BreakerState::Open));
        assert_eq!(states.get("cache"), Some(&BreakerState::Closed));
    }

    #[test]
    fn remove_breaker() {
        let registry = CircuitBreakerRegistry::new();
        registry.get("db");

        assert!(registry.remove("db"));
        assert!(!registry.remove("db"));
        assert!(registry.is_empty());
    }

    #[test]
    fn reset_all_closes_everything() {
        let registry = CircuitBreakerRegistry::with_default_config(BreakerConfig {
            failure_threshold: 1,
            ..BreakerConfig::default()
        });
        registry.get("a").record_failure("x");
        registry.get("b").force_open("y");

        registry.reset_all();

        let counts = registry.count_by_state();
        assert_eq!(counts.closed, 2);
        assert_eq!(counts.open, 0);
    }

    #[test]
    fn clear_drops_breakers() {
        let registry = CircuitBreakerRegistry::new();
        registry.get("a");
        registry.get("b");

        registry.clear();
        assert!(registry.is_empty());
        assert!(registry.names().is_empty());
    }
}
