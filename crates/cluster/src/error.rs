//! Error types for cluster API access.
//!
//! Errors are categorized so callers can retry transient failures and
//! react to "not found" / "already exists" without string matching.

use std::fmt;

/// Result type alias for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of cluster errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection failures, timeouts, 5xx and 429 (transient, retryable).
    Network,
    /// Object does not exist.
    NotFound,
    /// Object already exists.
    Conflict,
    /// Credentials missing or insufficient.
    Permission,
    /// Request rejected or response malformed.
    Invalid,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Cluster API unreachable or overloaded",
            Self::NotFound => "Object not found",
            Self::Conflict => "Object already exists",
            Self::Permission => "Permission denied",
            Self::Invalid => "Invalid request or response",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check that the API server (or kubectl proxy) is reachable and try again",
            Self::NotFound => "Verify the kind, namespace and name",
            Self::Conflict => "Another actor created the object; inspect it before retrying",
            Self::Permission => "Check the bearer token and its RBAC permissions",
            Self::Invalid => "Check the manifest against the API schema",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur while talking to the cluster API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP request failed: {message}")]
    Http {
        /// Error message.
        message: String,
        /// HTTP status code if available.
        status: Option<u16>,
    },

    /// Object does not exist.
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        /// Resource kind.
        kind: String,
        /// Namespace.
        namespace: String,
        /// Object name.
        name: String,
    },

    /// Object already exists.
    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        /// Resource kind.
        kind: String,
        /// Namespace.
        namespace: String,
        /// Object name.
        name: String,
    },

    /// Kind not supported by this client.
    #[error("unsupported resource kind: {0}")]
    UnsupportedKind(String),

    /// Manifest missing a required field.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),

    /// Invalid response from API.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),
}

impl Error {
    /// Create an HTTP error.
    pub fn http(message: impl Into<String>, status: Option<u16>) -> Self {
        Self::Http {
            message: message.into(),
            status,
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Http { status: None, .. } => ErrorCategory::Network,
            Error::Http {
                status: Some(code), ..
            } => match code {
                404 => ErrorCategory::NotFound,
                409 => ErrorCategory::Conflict,
                401 | 403 => ErrorCategory::Permission,
                429 | 500..=599 => ErrorCategory::Network,
                400..=499 => ErrorCategory::Invalid,
                _ => ErrorCategory::Other,
            },
            Error::NotFound { .. } => ErrorCategory::NotFound,
            Error::AlreadyExists { .. } => ErrorCategory::Conflict,
            Error::UnsupportedKind(_) | Error::InvalidManifest(_) | Error::InvalidResponse(_) => {
                ErrorCategory::Invalid
            }
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Whether the object was reported absent.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Http {
                message: format!("HTTP {code}"),
                status: Some(code),
            },
            ureq::Error::Json(e) => Self::InvalidResponse(e.to_string()),
            other => Self::Http {
                message: other.to_string(),
                status: None,
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidResponse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retryable() {
        assert!(ErrorCategory::Network.is_retryable());
        assert!(!ErrorCategory::NotFound.is_retryable());
        assert!(!ErrorCategory::Conflict.is_retryable());
        assert!(!ErrorCategory::Permission.is_retryable());
        assert!(!ErrorCategory::Invalid.is_retryable());
        assert!(!ErrorCategory::Other.is_retryable());
    }

    #[test]
    fn test_http_status_categories() {
        let category = |code| Error::http("boom", Some(code)).category();
        assert_eq!(category(404), ErrorCategory::NotFound);
        assert_eq!(category(409), ErrorCategory::Conflict);
        assert_eq!(category(401), ErrorCategory::Permission);
        assert_eq!(category(403), ErrorCategory::Permission);
        assert_eq!(category(429), ErrorCategory::Network);
        assert_eq!(category(503), ErrorCategory::Network);
        assert_eq!(category(422), ErrorCategory::Invalid);
    }

    #[test]
    fn test_transport_failure_is_retryable() {
        let err = Error::http("connection refused", None);
        assert!(err.is_retryable());
    }

    #[test]
    fn test_not_found_helpers() {
        let err = Error::NotFound {
            kind: "deployment".into(),
            namespace: "default".into(),
            name: "web".into(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_retryable());
        assert_eq!(err.to_string(), "deployment default/web not found");
        assert!(Error::http("gone", Some(404)).is_not_found());
    }

    #[test]
    fn test_error_category_display() {
        let display = format!("{}", ErrorCategory::Permission);
        assert!(display.contains("Permission"));
        assert!(!ErrorCategory::Network.advice().is_empty());
    }
}
