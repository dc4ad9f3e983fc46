//! Session state
//!
//! Tracks whether the engine holds a live session and funnels every remote
//! failure through [`SessionGuard::screen`], which downgrades the session on
//! the scheduler's logout marker or a connection failure.

use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

use offload_client::{ClientError, SessionStore};
use offload_core::SessionToken;

use crate::error::{EngineError, Result};

/// Logged-in flag plus the persisted token
#[derive(Debug)]
pub struct SessionGuard {
    store: SessionStore,
    logged_in: AtomicBool,
}

impl SessionGuard {
    pub fn new(store: SessionStore) -> Self {
        Self {
            store,
            logged_in: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    pub fn mark_logged_in(&self) {
        self.logged_in.store(true, Ordering::SeqCst);
    }

    pub fn mark_logged_out(&self) {
        self.logged_in.store(false, Ordering::SeqCst);
    }

    /// The persisted token, if any
    pub fn current_token(&self) -> Option<SessionToken> {
        self.store.current_token()
    }

    /// Returns the token for a remote call
    ///
    /// # Errors
    /// - `NotAuthenticated` if no session is active
    /// - `TokenMissing` if the token file vanished; the session is downgraded
    pub fn require_token(&self) -> Result<SessionToken> {
        if !self.is_logged_in() {
            return Err(EngineError::NotAuthenticated);
        }
        match self.store.current_token() {
            Some(token) => Ok(token),
            None => {
                warn!("The session token was deleted, please logon again");
                self.mark_logged_out();
                Err(EngineError::TokenMissing)
            }
        }
    }

    /// Classifies a remote failure, downgrading the session on session loss
    pub fn screen(&self, err: ClientError) -> EngineError {
        let err = EngineError::from(err);
        match &err {
            EngineError::SessionExpired(_) | EngineError::Unreachable(_) => {
                warn!("Session lost: {}", err);
                self.drop_session();
            }
            EngineError::TokenMissing => self.mark_logged_out(),
            _ => {}
        }
        err
    }

    /// Marks the session logged out and purges the token file
    pub fn drop_session(&self) {
        self.mark_logged_out();
        match self.store.invalidate() {
            Ok(()) => info!("Session token removed"),
            Err(e) => warn!(
                "Failed to remove token file {}: {}",
                self.store.path().display(),
                e
            ),
        }
    }
}
