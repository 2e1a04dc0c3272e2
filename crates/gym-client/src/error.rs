//! The one error type UI code sees

use std::fmt;

/// Failure category. Callers branch on this, never on transport details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// User-correctable input, shown next to the field
    Validation,
    /// Auth failure that survived a refresh attempt; the session is gone
    Unauthorized,
    NotFound,
    ServerError,
    /// No response arrived; retryable by the user, never automatically
    NetworkError,
    Unknown,
}

impl ErrorKind {
    /// Label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Unauthorized => "unauthorized",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ServerError => "server_error",
            ErrorKind::NetworkError => "network_error",
            ErrorKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Normalized failure: a kind tag plus a message fit to show verbatim.
///
/// Only `normalize` builds these, so every value carries a kind chosen by
/// the same rules. `Clone` lets one refresh outcome reach every waiter.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct DomainError {
    kind: ErrorKind,
    message: String,
}

impl DomainError {
    pub(crate) fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, DomainError>;
