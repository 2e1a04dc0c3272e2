//! Error types for sign-in, refresh, and credential storage

use transport::TransportFailure;

/// Errors from auth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("auth request failed: {0}")]
    Transport(#[from] TransportFailure),

    #[error("unexpected auth response: {0}")]
    InvalidResponse(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
