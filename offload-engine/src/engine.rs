//! The lifecycle engine
//!
//! Owns the scheduler client, the session state, the job registry, the
//! workspace, the packager and the worker pool. Job operations live in
//! [`crate::service`] as further `impl Engine` blocks.

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

use offload_client::{SchedulerClient, SessionStore};
use offload_core::{Credentials, SessionToken};

use crate::config::EngineConfig;
use crate::error::{AuthError, EngineError, Result};
use crate::packager::{Packager, ShellPackager};
use crate::registry::JobRegistry;
use crate::scheduler::WorkerPool;
use crate::session::SessionGuard;
use crate::workspace::Workspace;

/// Remote job lifecycle engine
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Engine {
    pub(crate) config: Arc<EngineConfig>,
    pub(crate) client: SchedulerClient,
    pub(crate) session: Arc<SessionGuard>,
    pub(crate) registry: Arc<JobRegistry>,
    pub(crate) workspace: Arc<Workspace>,
    pub(crate) packager: Arc<dyn Packager>,
    pub(crate) pool: Arc<WorkerPool>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("logged_in", &self.session.is_logged_in())
            .field("jobs", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Creates an engine over the reqwest transport and the shell packager
    ///
    /// The workspace root is created if missing. No session is active until
    /// [`Engine::logon`] or [`Engine::restore_session`] succeeds.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config
            .validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;

        let workspace = Workspace::new(config.workspace_root.clone());
        workspace.ensure_root()?;

        let client = SchedulerClient::http(workspace.root())
            .with_request_timeout(config.request_timeout);
        let session = SessionGuard::new(SessionStore::new(workspace.root()));
        let pool = WorkerPool::new(config.worker_threads);

        info!(
            "Engine ready (workspace: {}, poll interval: {:?})",
            workspace.root().display(),
            config.poll_interval
        );

        Ok(Self {
            config: Arc::new(config),
            client,
            session: Arc::new(session),
            registry: Arc::new(JobRegistry::new()),
            workspace: Arc::new(workspace),
            packager: Arc::new(ShellPackager::new()),
            pool: Arc::new(pool),
        })
    }

    /// Replaces the packager
    pub fn with_packager(mut self, packager: Arc<dyn Packager>) -> Self {
        self.packager = packager;
        self
    }

    /// Replaces the scheduler client
    pub fn with_client(mut self, client: SchedulerClient) -> Self {
        self.client = client;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn workspace_root(&self) -> &Path {
        self.workspace.root()
    }

    pub fn is_logged_in(&self) -> bool {
        self.session.is_logged_in()
    }

    /// The persisted session token, if any
    pub fn current_token(&self) -> Option<SessionToken> {
        self.session.current_token()
    }

    // =============================================================================
    // Session
    // =============================================================================

    /// Logs on and persists the issued token
    ///
    /// Any existing token is discarded first, so a failed logon leaves the
    /// engine logged out.
    pub async fn logon(&self, credentials: &Credentials) -> std::result::Result<(), AuthError> {
        self.session.drop_session();

        let token = self.client.logon(credentials).await.map_err(|e| {
            warn!("Logon to {} failed: {}", credentials.host, e);
            AuthError::from(e)
        })?;

        self.session
            .store()
            .save(&token)
            .map_err(AuthError::PersistFailure)?;
        self.session.mark_logged_in();

        info!("Logged on to {}", token.server_url);
        Ok(())
    }

    /// Logs out
    ///
    /// The remote call is best effort; the token file is always removed.
    pub async fn logout(&self) {
        if let Some(token) = self.session.current_token() {
            match self.client.logout(&token).await {
                Ok(()) => info!("Logged out from {}", token.server_url),
                Err(e) => warn!("Remote logout failed: {}", e),
            }
        }
        self.session.drop_session();
    }

    /// Resumes a persisted session
    ///
    /// The token is verified with an unfiltered job listing. Returns whether
    /// the engine is now logged in.
    pub async fn restore_session(&self) -> bool {
        let Some(token) = self.session.current_token() else {
            debug!("No persisted session to restore");
            return false;
        };

        match self.client.list_jobs(&token, "").await {
            Ok(_) => {
                self.session.mark_logged_in();
                info!("Restored session on {}", token.server_url);
                true
            }
            Err(e) => {
                let err = self.session.screen(e);
                warn!("Persisted session is not usable: {}", err);
                false
            }
        }
    }

    /// Stops the worker pool and waits for background work to finish
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
        info!("Engine shut down");
    }
}
