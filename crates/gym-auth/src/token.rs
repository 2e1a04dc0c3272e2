//! Sign-in and token refresh calls
//!
//! Both POST JSON without a bearer token:
//! 1. `/sessions` trades email + password for a token pair and the user
//! 2. `/refresh-token` trades the refresh token for a new pair
//!
//! Failures are returned raw; the client crate normalizes them.

use common::Secret;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use transport::{RequestSpec, Transport};

use crate::constants::{REFRESH_PATH, SIGN_IN_PATH};
use crate::credentials::{Credential, UserProfile};
use crate::error::{Error, Result};

/// Response body of `POST /sessions`.
#[derive(Debug, Deserialize)]
pub struct SignInResponse {
    pub user: UserProfile,
    pub token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl SignInResponse {
    /// Split into the stored pair.
    pub fn into_parts(self) -> (Credential, UserProfile) {
        let credential = Credential {
            token: self.token,
            refresh_token: self.refresh_token,
        };
        (credential, self.user)
    }
}

/// Response body of `POST /refresh-token`.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub token: Secret<String>,
    pub refresh_token: Secret<String>,
}

impl From<TokenResponse> for Credential {
    fn from(response: TokenResponse) -> Self {
        Credential {
            token: response.token,
            refresh_token: response.refresh_token,
        }
    }
}

/// Build the sign-in request. Exposed so it can be inspected in tests and logs
/// without sending it.
pub fn sign_in_request(email: &str, password: &Secret<String>) -> RequestSpec {
    RequestSpec::post(SIGN_IN_PATH).json(serde_json::json!({
        "email": email,
        "password": password.expose(),
    }))
}

/// Build the refresh request.
pub fn refresh_request(refresh: &Secret<String>) -> RequestSpec {
    RequestSpec::post(REFRESH_PATH).json(serde_json::json!({
        "refresh_token": refresh.expose(),
    }))
}

/// Exchange email + password for a credential and user profile.
pub async fn sign_in(
    transport: &dyn Transport,
    email: &str,
    password: &Secret<String>,
) -> Result<SignInResponse> {
    post_json(transport, &sign_in_request(email, password), "sign-in").await
}

/// Trade a refresh token for a new credential pair.
///
/// Called by the refresh coordinator only, once per expiry no matter how many
/// requests saw the 401.
pub async fn refresh_token(
    transport: &dyn Transport,
    refresh: &Secret<String>,
) -> Result<TokenResponse> {
    post_json(transport, &refresh_request(refresh), "refresh").await
}

async fn post_json<T: DeserializeOwned>(
    transport: &dyn Transport,
    request: &RequestSpec,
    what: &str,
) -> Result<T> {
    let response = transport.execute(request, None).await?;
    response
        .json::<T>()
        .map_err(|e| Error::InvalidResponse(format!("invalid {what} response: {e}")))
}
