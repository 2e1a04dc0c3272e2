//! Gym API authentication library
//!
//! Provides the credential model, the durable credential store, and the two
//! token endpoint calls (sign-in and refresh). Knows nothing about retries or
//! concurrency; the client crate layers the refresh coordinator on top.
//!
//! Credential flow:
//! 1. `token::sign_in()` exchanges email + password for a token pair and a user
//! 2. The session is persisted via `CredentialStore::save()`
//! 3. On an expired access token, `token::refresh_token()` swaps the pair
//! 4. Sign-out or a failed refresh calls `CredentialStore::clear()`

pub mod constants;
pub mod credentials;
pub mod error;
pub mod token;

pub use constants::*;
pub use credentials::{Credential, CredentialStore, Session, UserProfile};
pub use error::{Error, Result};
pub use token::{SignInResponse, TokenResponse, refresh_token, sign_in};
