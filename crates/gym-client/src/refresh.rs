//! Single-flight token refresh
//!
//! However many requests see a 401 at once, one `POST /refresh-token` goes
//! out and every caller gets its outcome. The in-flight slot is claimed under
//! a synchronous lock before anything awaits, so two callers can never both
//! find it empty. The refresh runs in its own task: a caller that stops
//! waiting does not cancel it for the others.
//!
//! On success the new credential is persisted and published. On any failure
//! the session is cleared and every waiter receives the same `DomainError`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use gym_auth::{Credential, Session};
use tracing::{debug, info, warn};
use transport::Transport;

use crate::error::Result;
use crate::metrics;
use crate::normalize::{Failure, normalize};
use crate::state::SessionCell;

type SharedRefresh = Shared<BoxFuture<'static, Result<Credential>>>;

pub(crate) struct RefreshCoordinator {
    state: Arc<SessionCell>,
    transport: Arc<dyn Transport>,
    /// Refresh in flight, tagged so a finished task only clears its own entry
    inflight: Arc<Mutex<Option<(u64, SharedRefresh)>>>,
    next_id: AtomicU64,
}

impl RefreshCoordinator {
    pub(crate) fn new(state: Arc<SessionCell>, transport: Arc<dyn Transport>) -> Self {
        Self {
            state,
            transport,
            inflight: Arc::new(Mutex::new(None)),
            next_id: AtomicU64::new(0),
        }
    }

    /// Join the in-flight refresh, starting one if none is running.
    pub(crate) async fn refresh(&self) -> Result<Credential> {
        self.join().await
    }

    /// Refresh because `rejected` got a 401.
    ///
    /// If the session already holds a different access token, another caller
    /// refreshed in the meantime and that credential is returned as is.
    pub(crate) async fn refresh_after(&self, rejected: &str) -> Result<Credential> {
        if let Session::Authenticated { credential, .. } = self.state.current()
            && credential.access() != rejected
        {
            debug!("credential already refreshed, reusing it");
            return Ok(credential);
        }
        self.join().await
    }

    /// True while a refresh task is running.
    pub(crate) fn is_refreshing(&self) -> bool {
        self.inflight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    fn join(&self) -> SharedRefresh {
        let mut slot = self.inflight.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some((_, shared)) = slot.as_ref() {
            debug!("joining in-flight refresh");
            return shared.clone();
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let state = self.state.clone();
        let transport = self.transport.clone();
        let inflight = self.inflight.clone();

        let task = tokio::spawn(async move {
            let outcome = run_refresh(&state, transport.as_ref()).await;
            let mut slot = inflight.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(slot.as_ref(), Some((current, _)) if *current == id) {
                *slot = None;
            }
            outcome
        });

        let shared = async move {
            match task.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "refresh task did not complete");
                    Err(normalize(Failure::Interrupted(e.to_string())))
                }
            }
        }
        .boxed()
        .shared();

        *slot = Some((id, shared.clone()));
        shared
    }
}

async fn run_refresh(state: &SessionCell, transport: &dyn Transport) -> Result<Credential> {
    let Some((generation, refresh)) = state.begin_refresh().await else {
        metrics::record_refresh("superseded");
        return Err(normalize(Failure::MissingCredential));
    };
    info!(generation, "refreshing access token");

    match gym_auth::refresh_token(transport, &refresh).await {
        Ok(response) => {
            let credential = Credential::from(response);
            if state.finish_refresh(generation, credential.clone()).await {
                metrics::record_refresh("success");
                info!(generation, "access token refreshed");
                Ok(credential)
            } else {
                metrics::record_refresh("superseded");
                info!(generation, "session changed during refresh, dropping new token");
                Err(normalize(Failure::Superseded))
            }
        }
        Err(e) => {
            metrics::record_refresh("failure");
            warn!(generation, error = %e, "token refresh failed, signing out");
            state.expire(generation).await;
            Err(normalize(Failure::from(e)))
        }
    }
}
