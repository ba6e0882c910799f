//! Error types for the hive-alerts crate.

use thiserror::Error;

/// Errors that can occur in the alerting system.
///
/// Delivery failures are deliberately NOT errors: they are captured per
/// channel in [`crate::ChannelResult`] so one channel can never abort its
/// siblings. Misconfigured channels surface through `validate()` rather
/// than `Err`.
#[derive(Debug, Error)]
pub enum AlertError {
    /// Invalid alert rule configuration.
    #[error("invalid alert rule: {reason}")]
    InvalidRule {
        /// Why the rule is invalid.
        reason: String,
    },

    /// A pattern condition carries an invalid regular expression.
    #[error("invalid pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// The regex compile error.
        reason: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for AlertError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Result type for alert operations.
pub type Result<T> = std::result::Result<T, AlertError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_rule() {
        let err = AlertError::InvalidRule {
            reason: "empty name".to_string(),
        };
        assert_eq!(err.to_string(), "invalid alert rule: empty name");
    }

    #[test]
    fn display_invalid_pattern() {
        let err = AlertError::InvalidPattern {
            pattern: "(".to_string(),
            reason: "unclosed group".to_string(),
        };
        assert_eq!(err.to_string(), "invalid pattern '(': unclosed group");
    }

    #[test]
    fn from_serde_json() {
        let json_err = serde_json::from_str::<u32>("oops").expect_err("must fail");
        let err: AlertError = json_err.into();
        assert!(matches!(err, AlertError::Serialization(_)));
    }
}
