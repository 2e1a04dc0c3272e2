//! Resilient client core for the gym API
//!
//! Sits between UI code and the network. UI code holds one `SessionFacade`
//! and calls its typed methods (or `send` for anything else); every call
//! gets the current bearer token, one transparent refresh-and-replay on an
//! expired token, and a normalized `DomainError` on failure.
//!
//! Request lifecycle:
//! 1. `RequestPipeline::send` attaches the access token and calls the transport
//! 2. A 401 on an authenticated call joins the single in-flight refresh
//! 3. The refreshed credential is persisted and the request replayed once
//! 4. A failed refresh, or a rejected replay, signs the session out
//! 5. Any remaining failure goes through `normalize` before reaching the caller

pub mod api;
pub mod error;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod session;

mod refresh;
mod state;

#[cfg(test)]
mod testing;

pub use api::{AccountUpdate, Exercise, MAX_AVATAR_BYTES, avatar_file_name};
pub use error::{DomainError, ErrorKind, Result};
pub use normalize::{Failure, normalize};
pub use pipeline::RequestPipeline;
pub use session::SessionFacade;

pub use gym_auth::{Credential, CredentialStore, Session, UserProfile};
pub use transport::{FilePart, RequestSpec};
