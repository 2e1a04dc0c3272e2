//! Failure normalization
//!
//! The single place raw failures become `DomainError`s. Server errors carry
//! a `{"message": "..."}` envelope; when it is present the kind follows the
//! status code and the message is passed through untouched. Failures with no
//! response at all (refused connection, DNS, timeout) become `NetworkError`
//! with a fixed message. Any other shape is `Unknown`.
//!
//! `normalize` is total and pure: it never panics and never logs.

use serde::Deserialize;
use transport::TransportFailure;

use crate::error::{DomainError, ErrorKind};

/// Shown for every failure without a server message: nothing arrived, or
/// the reply had no error envelope.
pub const NETWORK_ERROR_MESSAGE: &str =
    "Unable to reach the server. Check your connection and try again.";

/// Shown when a successful reply could not be decoded.
pub const UNEXPECTED_RESPONSE_MESSAGE: &str =
    "The server sent an unexpected response. Try again later.";

/// Shown when an authenticated call is made without a credential, or the
/// session changed under an in-flight refresh.
pub const SIGNED_OUT_MESSAGE: &str = "Your session has ended. Sign in again.";

/// Shown for local failures the user cannot act on.
pub const UNKNOWN_MESSAGE: &str = "Something went wrong. Try again later.";

/// Everything that can go wrong below the UI.
#[derive(Debug)]
pub enum Failure {
    Transport(TransportFailure),
    /// Sign-in/refresh call or credential store failure
    Auth(gym_auth::Error),
    /// A 2xx body did not have the expected shape
    Decode(String),
    /// An authenticated operation with no credential
    MissingCredential,
    /// Sign-out or a new sign-in landed while a refresh was in flight
    Superseded,
    /// The shared refresh task died before producing a result
    Interrupted(String),
    /// Upload rejected locally before any network call
    TooLarge { size: usize, limit: usize },
}

impl From<TransportFailure> for Failure {
    fn from(failure: TransportFailure) -> Self {
        Failure::Transport(failure)
    }
}

impl From<gym_auth::Error> for Failure {
    fn from(error: gym_auth::Error) -> Self {
        match error {
            gym_auth::Error::Transport(failure) => Failure::Transport(failure),
            other => Failure::Auth(other),
        }
    }
}

/// Server error envelope.
#[derive(Deserialize)]
struct Envelope {
    message: String,
}

/// Translate any failure into a `DomainError`.
pub fn normalize(failure: Failure) -> DomainError {
    match failure {
        Failure::Transport(failure) => from_transport(failure),
        Failure::Auth(gym_auth::Error::Transport(failure)) => from_transport(failure),
        Failure::Auth(_) | Failure::Decode(_) => {
            DomainError::new(ErrorKind::Unknown, UNEXPECTED_RESPONSE_MESSAGE)
        }
        Failure::MissingCredential | Failure::Superseded => {
            DomainError::new(ErrorKind::Unauthorized, SIGNED_OUT_MESSAGE)
        }
        Failure::Interrupted(_) => DomainError::new(ErrorKind::Unknown, UNKNOWN_MESSAGE),
        Failure::TooLarge { limit, .. } => DomainError::new(
            ErrorKind::Validation,
            format!("This file is too large. Choose one up to {}MB.", limit / (1024 * 1024)),
        ),
    }
}

fn from_transport(failure: TransportFailure) -> DomainError {
    match failure {
        TransportFailure::Status { status, body } => match envelope_message(&body) {
            Some(message) => DomainError::new(kind_for_status(status), message),
            None => DomainError::new(ErrorKind::NetworkError, NETWORK_ERROR_MESSAGE),
        },
        TransportFailure::Connect(_) | TransportFailure::Timeout(_) => {
            DomainError::new(ErrorKind::NetworkError, NETWORK_ERROR_MESSAGE)
        }
        TransportFailure::InvalidRequest(_) => DomainError::new(ErrorKind::Unknown, UNKNOWN_MESSAGE),
    }
}

fn envelope_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<Envelope>(body)
        .ok()
        .map(|envelope| envelope.message)
}

/// Kind for a status code that came with an error envelope.
pub fn kind_for_status(status: u16) -> ErrorKind {
    match status {
        401 | 403 => ErrorKind::Unauthorized,
        404 => ErrorKind::NotFound,
        400 | 422 => ErrorKind::Validation,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::Unknown,
    }
}
