//! reqwest-backed transport
//!
//! Joins each request path onto the configured base URL, attaches the bearer
//! token, applies the per-call timeout, and classifies reqwest errors into
//! `TransportFailure`. Non-2xx responses keep their body so the normalizer
//! can read the server's `{"message": ...}` envelope.

use std::str::FromStr;
use std::time::Duration;

use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use tracing::{debug, warn};

use crate::error::{Result, TransportFailure};
use crate::request::{FilePart, RequestBody, RequestSpec, Response};
use crate::{ExecuteFuture, Transport};

/// JSON-over-HTTP transport bound to one base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl HttpTransport {
    /// Build a transport with its own connection pool.
    pub fn new(base_url: &str, timeout: Duration, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_owned());
        }
        let client = builder
            .build()
            .map_err(|e| TransportFailure::InvalidRequest(format!("building HTTP client: {e}")))?;
        Ok(Self::with_client(client, base_url, timeout))
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client, base_url: &str, timeout: Duration) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            timeout,
        }
    }

    fn url_for(&self, request: &RequestSpec) -> Result<reqwest::Url> {
        let raw = format!("{}{}", self.base_url, request.path);
        let mut url = reqwest::Url::parse(&raw)
            .map_err(|e| TransportFailure::InvalidRequest(format!("invalid url {raw}: {e}")))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    async fn send(&self, request: &RequestSpec, bearer: Option<&str>) -> Result<Response> {
        let url = self.url_for(request)?;
        let headers = build_headers(request, bearer)?;

        let mut builder = self
            .client
            .request(request.method.into(), url)
            .headers(headers)
            .timeout(self.timeout);

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(parts) => builder.multipart(build_form(parts)?),
        };

        let response = builder.send().await.map_err(classify)?;
        let status = response.status();
        let body = response.bytes().await.map_err(classify)?;

        debug!(status = status.as_u16(), bytes = body.len(), "response received");

        if !status.is_success() {
            return Err(TransportFailure::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(Response::new(status.as_u16(), body))
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(
        &'a self,
        request: &'a RequestSpec,
        bearer: Option<&'a str>,
    ) -> ExecuteFuture<'a> {
        Box::pin(self.send(request, bearer))
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

/// Caller headers plus the bearer token. Invalid names/values are skipped,
/// and a caller-supplied `authorization` never overrides the session's token.
fn build_headers(request: &RequestSpec, bearer: Option<&str>) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    for (name, value) in &request.headers {
        let name = match HeaderName::from_str(name) {
            Ok(n) => n,
            Err(e) => {
                warn!(header = %name, error = %e, "skipping invalid header name");
                continue;
            }
        };
        if name == AUTHORIZATION {
            warn!("ignoring caller-supplied authorization header");
            continue;
        }
        let value = match HeaderValue::from_str(value) {
            Ok(v) => v,
            Err(e) => {
                warn!(header = %name, error = %e, "skipping invalid header value");
                continue;
            }
        };
        headers.insert(name, value);
    }

    if let Some(token) = bearer {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|e| {
            TransportFailure::InvalidRequest(format!("access token is not a valid header: {e}"))
        })?;
        value.set_sensitive(true);
        headers.insert(AUTHORIZATION, value);
    }
    Ok(headers)
}

fn build_form(parts: &[FilePart]) -> Result<Form> {
    let mut form = Form::new();
    for file in parts {
        let part = Part::bytes(file.bytes.to_vec())
            .file_name(file.file_name.clone())
            .mime_str(&file.mime)
            .map_err(|e| {
                TransportFailure::InvalidRequest(format!("invalid mime type {}: {e}", file.mime))
            })?;
        form = form.part(file.field.clone(), part);
    }
    Ok(form)
}

fn classify(error: reqwest::Error) -> TransportFailure {
    if error.is_timeout() {
        TransportFailure::Timeout(error.to_string())
    } else if error.is_builder() {
        TransportFailure::InvalidRequest(error.to_string())
    } else {
        TransportFailure::Connect(error.to_string())
    }
}
