//! Session facade
//!
//! The one object UI code holds. `init` restores the persisted session;
//! after that the facade owns every transition (sign-in, sign-out,
//! profile replacement, refresh-triggered sign-out) and announces each one
//! on a watch channel. Dropping the receiver unsubscribes.

use std::sync::Arc;

use bytes::Bytes;
use common::Secret;
use gym_auth::{CredentialStore, Session, UserProfile};
use tokio::sync::watch;
use tracing::{info, warn};
use transport::{RequestSpec, Transport};

use crate::error::Result;
use crate::normalize::{Failure, normalize};
use crate::pipeline::RequestPipeline;
use crate::refresh::RefreshCoordinator;
use crate::state::SessionCell;

#[derive(Clone)]
pub struct SessionFacade {
    state: Arc<SessionCell>,
    transport: Arc<dyn Transport>,
    refresher: Arc<RefreshCoordinator>,
    pipeline: RequestPipeline,
}

impl SessionFacade {
    /// Load the persisted session and wire up the pipeline. Never fails: a
    /// missing or unreadable store starts signed out.
    pub async fn init(transport: Arc<dyn Transport>, store: CredentialStore) -> Self {
        let state = Arc::new(SessionCell::open(store).await);
        let refresher = Arc::new(RefreshCoordinator::new(state.clone(), transport.clone()));
        let pipeline = RequestPipeline::new(state.clone(), transport.clone(), refresher.clone());
        Self {
            state,
            transport,
            refresher,
            pipeline,
        }
    }

    /// Trade email and password for a session.
    ///
    /// On failure the current session is left exactly as it was.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<()> {
        let password = Secret::from(password);
        let response = gym_auth::sign_in(self.transport.as_ref(), email, &password)
            .await
            .map_err(|e| {
                warn!(error = %e, "sign-in failed");
                normalize(Failure::from(e))
            })?;

        let (credential, user) = response.into_parts();
        info!(user_id = %user.id, "sign-in accepted");
        self.state
            .establish(credential, user)
            .await
            .map_err(normalize)
    }

    /// Forget the session in memory and on disk. Works offline.
    pub async fn sign_out(&self) {
        self.state.sign_out().await;
    }

    /// Replace the stored profile snapshot. The credential is untouched.
    pub async fn update_profile(&self, user: UserProfile) -> Result<()> {
        self.state.replace_user(user).await.map_err(normalize)
    }

    pub fn current_session(&self) -> Session {
        self.state.current()
    }

    /// Receiver that wakes on every session change.
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.state.subscribe()
    }

    /// Force a token refresh, sharing any refresh already running.
    pub async fn refresh(&self) -> Result<()> {
        self.refresher.refresh().await.map(|_| ())
    }

    pub fn is_refreshing(&self) -> bool {
        self.refresher.is_refreshing()
    }

    pub fn pipeline(&self) -> &RequestPipeline {
        &self.pipeline
    }

    /// Shorthand for `pipeline().send(..)`.
    pub async fn send(&self, request: &RequestSpec) -> Result<Bytes> {
        self.pipeline.send(request).await
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}
