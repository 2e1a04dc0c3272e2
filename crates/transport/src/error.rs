//! Raw transport failures, before normalization

use bytes::Bytes;

/// Everything a single transport call can fail with.
///
/// `Status` means the server answered; the other variants mean no usable
/// response arrived.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportFailure {
    #[error("server returned status {status}")]
    Status { status: u16, body: Bytes },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

/// Result alias for transport calls.
pub type Result<T> = std::result::Result<T, TransportFailure>;
