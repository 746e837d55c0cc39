//! Error types for the reconciler crate.

use thiserror::Error;

/// Result type alias for reconciler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for orchestrator API calls.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Reconciler error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Payload bytes did not parse as the declared content type.
    #[error("decode failed: {reason}")]
    Decode { reason: String },

    /// Payload declared a content type no decoder understands.
    #[error("unsupported content type '{content_type}'")]
    UnknownContentType { content_type: String },

    /// Descriptor is structurally invalid (no body, several bodies, no name).
    #[error("invalid resource descriptor: {reason}")]
    InvalidDescriptor { reason: String },

    /// No codec is registered for the descriptor's discriminator.
    #[error("unknown resource kind '{kind}'")]
    UnknownResourceKind { kind: String },

    /// Generic object is missing required fields or has the wrong shape.
    #[error("malformed resource: {reason}")]
    MalformedResource { reason: String },

    /// Orchestrator API call failed.
    #[error("orchestrator API error: {0}")]
    Api(#[from] ApiError),

    /// Invalid reconciler configuration.
    #[error("invalid configuration: {reason}")]
    InvalidConfig { reason: String },
}

impl Error {
    /// Create a decode error.
    pub fn decode(reason: impl Into<String>) -> Self {
        Self::Decode {
            reason: reason.into(),
        }
    }

    /// Create an unknown content type error.
    pub fn unknown_content_type(content_type: impl Into<String>) -> Self {
        Self::UnknownContentType {
            content_type: content_type.into(),
        }
    }

    /// Create an invalid descriptor error.
    pub fn invalid_descriptor(reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            reason: reason.into(),
        }
    }

    /// Create an unknown resource kind error.
    pub fn unknown_resource_kind(kind: impl Into<String>) -> Self {
        Self::UnknownResourceKind { kind: kind.into() }
    }

    /// Create a malformed resource error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedResource {
            reason: reason.into(),
        }
    }

    /// Create an invalid config error.
    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Whether this error came from decoding the payload rather than from
    /// the orchestrator.
    pub const fn is_decode(&self) -> bool {
        matches!(
            self,
            Self::Decode { .. } | Self::UnknownContentType { .. } | Self::InvalidDescriptor { .. }
        )
    }
}

/// Orchestrator API error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    /// The addressed resource does not exist.
    #[error("{kind} '{namespace}/{name}' not found")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// Optimistic-concurrency or existence conflict.
    #[error("conflict on '{name}': {reason}")]
    Conflict { name: String, reason: String },

    /// The API server rejected the request.
    #[error("request rejected ({code}): {reason}")]
    Rejected { code: u16, reason: String },

    /// Network, auth handshake, or serialization failure.
    #[error("transport failure: {reason}")]
    Transport { reason: String },
}

impl ApiError {
    /// Create a not found error.
    pub fn not_found(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Create a conflict error.
    pub fn conflict(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Conflict {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Create a rejected error.
    pub fn rejected(code: u16, reason: impl Into<String>) -> Self {
        Self::Rejected {
            code,
            reason: reason.into(),
        }
    }

    /// Create a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Whether this is the distinguished not-found outcome.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
