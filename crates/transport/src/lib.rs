//! Transport seam between the gym API client and the network
//!
//! Defines the `Transport` trait that decouples the request pipeline from the
//! HTTP stack. `HttpTransport` talks JSON-over-HTTPS to one configured base
//! URL with `reqwest`; tests substitute an in-memory double implementing the
//! same trait.
//!
//! A `RequestSpec` is a plain description of a call (method, path, query,
//! headers, body). It holds no live connection state, so the pipeline can
//! replay it verbatim after a credential refresh.

pub mod error;
pub mod http;
pub mod request;

pub use error::{Result, TransportFailure};
pub use http::HttpTransport;
pub use request::{FilePart, Method, RequestBody, RequestSpec, Response};

use std::future::Future;
use std::pin::Pin;

/// Future returned by `Transport::execute`.
pub type ExecuteFuture<'a> = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>>;

/// Abstraction over the wire.
///
/// Implementations must:
/// - send `Authorization: Bearer <bearer>` when `bearer` is `Some`
/// - return `TransportFailure::Status` for any non-2xx response, keeping the body
/// - report connection problems and timeouts as `Connect` / `Timeout`
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility (`Arc<dyn Transport>`).
pub trait Transport: Send + Sync {
    /// Perform one call. Never retries on its own.
    fn execute<'a>(&'a self, request: &'a RequestSpec, bearer: Option<&'a str>)
    -> ExecuteFuture<'a>;

    /// Base URL every request path is joined to (used to build avatar links).
    fn base_url(&self) -> &str;
}
