//! Error types for graph construction and orchestration.
//!
//! Errors are categorized so the retry policy can tell transient failures
//! (worth another attempt) from structural ones (fatal for a node or for
//! the whole run).

use thiserror::Error;

/// Categories of orchestration errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Remote system temporarily unreachable or erroring (retryable)
    Transient,
    /// Invalid declaration set (cycle, duplicate key, unknown dependency)
    Graph,
    /// Live object differs from its declaration
    Drift,
    /// Pre-existing resource is absent
    Missing,
    /// Bad node or edge configuration
    Configuration,
    /// Anything else reported by an adapter
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient)
    }

    /// Get a user-friendly description of this error category.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Transient => "Remote system temporarily unavailable",
            Self::Graph => "Invalid dependency graph",
            Self::Drift => "Live object differs from declaration",
            Self::Missing => "Pre-existing resource not found",
            Self::Configuration => "Invalid configuration",
            Self::Other => "Unexpected error",
        }
    }
}

/// Errors that can occur while building or running a dependency graph.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared dependencies form a cycle
    #[error("dependency cycle detected: {}", path.join(" -> "))]
    Cycle {
        /// Keys along the cycle, first key repeated at the end
        path: Vec<String>,
    },

    /// Two declarations share the same key
    #[error("duplicate resource: {key}")]
    DuplicateResource {
        /// The repeated key
        key: String,
    },

    /// A dependency names a key that is not declared
    #[error("{from} depends on unknown resource {to}")]
    UnknownDependency {
        /// Dependent key
        from: String,
        /// Missing dependency key
        to: String,
    },

    /// Remote query or mutation failed in a way that may succeed later
    #[error("transient failure on {key}: {message}")]
    Transient {
        /// Resource key
        key: String,
        /// Underlying failure
        message: String,
    },

    /// Live object exists but differs from its declaration
    #[error("{key} differs from its declaration, waiting for upgrade")]
    Drift {
        /// Resource key
        key: String,
    },

    /// A resource declared as pre-existing is absent
    #[error("pre-existing resource {key} not found")]
    MissingExisting {
        /// Resource key
        key: String,
    },

    /// A required percentage could not be parsed
    #[error("invalid percentage for {key}: {value:?}")]
    InvalidPercentage {
        /// Resource key
        key: String,
        /// The raw configured value
        value: String,
    },

    /// Optional capability requested from an adapter that lacks it
    #[error("{key} does not support {operation}")]
    Unsupported {
        /// Resource key
        key: String,
        /// Name of the missing operation
        operation: &'static str,
    },

    /// Non-transient adapter failure
    #[error("{key}: {message}")]
    Adapter {
        /// Resource key
        key: String,
        /// Failure description
        message: String,
    },

    /// Polling budget exhausted before the node settled
    #[error("{key} did not settle after {attempts} polls")]
    PollTimeout {
        /// Resource key
        key: String,
        /// Number of polls performed
        attempts: u32,
    },

    /// Worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    ThreadPool(String),
}

impl Error {
    /// Get the error category for retry logic.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Transient { .. } => ErrorCategory::Transient,
            Error::Cycle { .. } | Error::DuplicateResource { .. } | Error::UnknownDependency { .. } => {
                ErrorCategory::Graph
            }
            Error::Drift { .. } => ErrorCategory::Drift,
            Error::MissingExisting { .. } => ErrorCategory::Missing,
            Error::InvalidPercentage { .. } | Error::Unsupported { .. } => {
                ErrorCategory::Configuration
            }
            _ => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Shorthand for a transient failure on `key`.
    pub fn transient(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Transient {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Shorthand for a non-transient adapter failure on `key`.
    pub fn adapter(key: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Adapter {
            key: key.into(),
            message: message.into(),
        }
    }
}

/// Result type for orchestration operations.
pub type Result<T> = std::result::Result<T, Error>;
