//! Shared session state
//!
//! One `SessionCell` per client. It owns the credential store, publishes
//! every transition on a watch channel, and counts a generation that moves
//! on each sign-in and sign-out. Refresh results carry the generation they
//! started under and are dropped if it moved.
//!
//! Lock order: `generation` first, then the store's own lock.

use common::Secret;
use gym_auth::{Credential, CredentialStore, Session, UserProfile};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::normalize::Failure;

pub(crate) struct SessionCell {
    store: CredentialStore,
    tx: watch::Sender<Session>,
    generation: Mutex<u64>,
}

impl SessionCell {
    /// Restore whatever the store holds. Never fails.
    pub(crate) async fn open(store: CredentialStore) -> Self {
        let session = store.load().await;
        info!(state = session.label(), "session restored");
        let (tx, _) = watch::channel(session);
        Self {
            store,
            tx,
            generation: Mutex::new(0),
        }
    }

    pub(crate) fn current(&self) -> Session {
        self.tx.borrow().clone()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<Session> {
        self.tx.subscribe()
    }

    /// Persist then publish a new signed-in session.
    ///
    /// The store is written first: if that fails nothing changes.
    pub(crate) async fn establish(
        &self,
        credential: Credential,
        user: UserProfile,
    ) -> Result<(), Failure> {
        let mut generation = self.generation.lock().await;
        let session = Session::authenticated(credential, user);
        self.store.save(&session).await?;
        *generation += 1;
        self.tx.send_replace(session);
        info!(generation = *generation, "signed in");
        Ok(())
    }

    /// Drop the session everywhere. Storage errors are logged, not returned.
    pub(crate) async fn sign_out(&self) {
        let mut generation = self.generation.lock().await;
        *generation += 1;
        self.tx.send_replace(Session::Anonymous);
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear stored session");
        }
        info!(generation = *generation, "signed out");
    }

    /// Mark the session as refreshing and hand back what the refresh needs.
    ///
    /// `None` when there is nothing to refresh.
    pub(crate) async fn begin_refresh(&self) -> Option<(u64, Secret<String>)> {
        let generation = self.generation.lock().await;
        let mut refresh = None;
        self.tx.send_if_modified(|session| match std::mem::take(session) {
            Session::Authenticated { credential, user } | Session::Refreshing { credential, user } => {
                refresh = Some(credential.refresh_token.clone());
                *session = Session::Refreshing { credential, user };
                true
            }
            Session::Anonymous => false,
        });
        refresh.map(|token| (*generation, token))
    }

    /// Apply a refreshed credential if the session is still the one the
    /// refresh started under. Returns false when it was superseded.
    pub(crate) async fn finish_refresh(&self, started: u64, credential: Credential) -> bool {
        let generation = self.generation.lock().await;
        if *generation != started {
            debug!(started, current = *generation, "discarding refresh result");
            return false;
        }
        let Some(user) = self.tx.borrow().user().cloned() else {
            return false;
        };
        let session = Session::authenticated(credential, user);
        if let Err(e) = self.store.save(&session).await {
            warn!(error = %e, "failed to persist refreshed credential, keeping it in memory");
        }
        self.tx.send_replace(session);
        true
    }

    /// Sign out because the refresh failed, unless the session already moved on.
    pub(crate) async fn expire(&self, started: u64) -> bool {
        let mut generation = self.generation.lock().await;
        if *generation != started {
            return false;
        }
        *generation += 1;
        self.tx.send_replace(Session::Anonymous);
        if let Err(e) = self.store.clear().await {
            warn!(error = %e, "failed to clear stored session");
        }
        info!(generation = *generation, "session expired");
        true
    }

    /// A freshly refreshed credential was rejected too. Sign out, but only if
    /// that credential is still the current one.
    pub(crate) async fn revoke(&self, rejected: &Credential) {
        if self.current().credential() != Some(rejected) {
            debug!("rejected credential already replaced, keeping session");
            return;
        }
        warn!("credential rejected after refresh, signing out");
        self.sign_out().await;
    }

    /// Swap the stored profile, keeping the credential.
    pub(crate) async fn replace_user(&self, user: UserProfile) -> Result<(), Failure> {
        let _generation = self.generation.lock().await;
        let session = match self.current() {
            Session::Anonymous => return Err(Failure::MissingCredential),
            Session::Authenticated { credential, .. } => Session::authenticated(credential, user),
            Session::Refreshing { credential, .. } => Session::Refreshing { credential, user },
        };
        self.store.save(&session).await?;
        self.tx.send_replace(session);
        debug!("profile updated");
        Ok(())
    }
}
