//! Error types for the agent crate.

use thiserror::Error;

/// Result type alias for agent operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Agent error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A new instance identity could not be parsed.
    #[error("invalid agent identity '{value}': {reason}")]
    InvalidIdentity { value: String, reason: String },

    /// The control channel failed to deliver a report.
    #[error("control channel error: {reason}")]
    Channel { reason: String },

    /// Applying a configuration item failed.
    #[error(transparent)]
    Reconcile(#[from] incluster_reconciler::Error),
}

impl Error {
    /// Create an invalid identity error.
    pub fn invalid_identity(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentity {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create a channel error.
    pub fn channel(reason: impl Into<String>) -> Self {
        Self::Channel {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::invalid_identity("not-a-ulid", "invalid length");
        assert!(err.to_string().contains("not-a-ulid"));
    }

    #[test]
    fn test_reconcile_error_is_transparent() {
        let inner = incluster_reconciler::Error::unknown_resource_kind("widgets");
        let err: Error = inner.clone().into();
        assert_eq!(err.to_string(), inner.to_string());
    }
}
