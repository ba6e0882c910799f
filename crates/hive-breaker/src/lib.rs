//! Circuit breakers for hivewatch.
//!
//! `hive-breaker` protects callers from a failing dependency. Each
//! [`CircuitBreaker`] is a three-state machine (`Closed` / `Open` /
//! `HalfOpen`) over a failure counter; the [`CircuitBreakerRegistry`] owns
//! the name → breaker map, creating breakers lazily on first use.
//!
//! The `Open` → `HalfOpen` transition is evaluated lazily whenever the
//! breaker is read — there is no per-breaker timer. Callers that poll state
//! (the dashboard, the alert rule engine) therefore always observe the
//! correct state without any background task running.
//!
//! # Example
//!
//! ```rust
//! use hive_breaker::{BreakerState, CircuitBreakerRegistry};
//!
//! let registry = CircuitBreakerRegistry::new();
//!
//! let db = registry.get("db");
//! for _ in 0..5 {
//!     db.record_failure("connection refused");
//! }
//! assert_eq!(db.state(), BreakerState::Open);
//!
//! // Aggregate view consumed by the alert rule engine.
//! assert_eq!(registry.count_by_state().open, 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod breaker;
pub mod registry;
pub mod types;

pub use breaker::CircuitBreaker;
pub use registry::CircuitBreakerRegistry;
pub use types::{BreakerConfig, BreakerState, BreakerStats, StateCounts};
