//! Request pipeline
//!
//! Every API call goes through `send`:
//! 1. Attach the current access token, if any
//! 2. Perform the transport call
//! 3. On an Unauthorized response to a call that carried a token, refresh
//!    (single-flight) and replay the same request once with the new token
//! 4. Normalize whatever failure is left
//!
//! A replay that is rejected again is never replayed; it signs the session
//! out and its error is returned.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use gym_auth::Credential;
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};
use transport::{RequestSpec, Transport, TransportFailure};
use uuid::Uuid;

use crate::error::{ErrorKind, Result};
use crate::metrics;
use crate::normalize::{Failure, normalize};
use crate::refresh::RefreshCoordinator;
use crate::state::SessionCell;

/// Header carrying the per-call id that also tags the tracing span.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct RequestPipeline {
    state: Arc<SessionCell>,
    transport: Arc<dyn Transport>,
    refresher: Arc<RefreshCoordinator>,
}

impl RequestPipeline {
    pub(crate) fn new(
        state: Arc<SessionCell>,
        transport: Arc<dyn Transport>,
        refresher: Arc<RefreshCoordinator>,
    ) -> Self {
        Self {
            state,
            transport,
            refresher,
        }
    }

    /// Perform one API call and return the response body.
    pub async fn send(&self, request: &RequestSpec) -> Result<Bytes> {
        self.dispatch(request, Uuid::new_v4()).await
    }

    /// Perform one API call and decode its JSON body.
    pub async fn send_json<T: DeserializeOwned>(&self, request: &RequestSpec) -> Result<T> {
        let body = self.send(request).await?;
        serde_json::from_slice(&body).map_err(|e| normalize(Failure::Decode(e.to_string())))
    }

    #[instrument(
        name = "api_request",
        skip_all,
        fields(request_id = %request_id, method = request.method.as_str(), path = %request.path)
    )]
    async fn dispatch(&self, request: &RequestSpec, request_id: Uuid) -> Result<Bytes> {
        let started = Instant::now();
        let request = request
            .clone()
            .header(REQUEST_ID_HEADER, request_id.to_string());

        let outcome = self.attempt(&request).await;

        let label = match &outcome {
            Ok(_) => "ok",
            Err(e) => e.kind().label(),
        };
        metrics::record_request(request.method.as_str(), label, started.elapsed().as_secs_f64());
        debug!(outcome = label, "request finished");
        outcome
    }

    async fn attempt(&self, request: &RequestSpec) -> Result<Bytes> {
        let credential = self.state.current().credential().cloned();
        let bearer = credential.as_ref().map(Credential::access);

        let failure = match self.transport.execute(request, bearer).await {
            Ok(response) => return Ok(response.body),
            Err(failure) => failure,
        };

        let error = normalize(Failure::Transport(failure));
        let Some(credential) = credential else {
            return Err(error);
        };
        if error.kind() != ErrorKind::Unauthorized {
            return Err(error);
        }

        debug!("access token rejected, refreshing before replay");
        let refreshed = self.refresher.refresh_after(credential.access()).await?;

        metrics::record_replay();
        match self.transport.execute(request, Some(refreshed.access())).await {
            Ok(response) => Ok(response.body),
            Err(failure) => self.replay_failed(failure, &refreshed).await,
        }
    }

    async fn replay_failed(&self, failure: TransportFailure, sent: &Credential) -> Result<Bytes> {
        let error = normalize(Failure::Transport(failure));
        if error.kind() == ErrorKind::Unauthorized {
            self.state.revoke(sent).await;
        }
        Err(error)
    }
}
