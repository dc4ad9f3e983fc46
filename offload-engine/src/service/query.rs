//! Job lookups, cancellation and listings

use tracing::{debug, info};

use offload_client::RemoteJob;
use offload_core::{JobHandle, JobOutcome, JobRecord, JobRef, JobState, RemoteJobId};

use crate::engine::Engine;
use crate::error::{EngineError, Result};

impl Engine {
    // =============================================================================
    // Lookups
    // =============================================================================

    /// Returns the outcome of a job
    ///
    /// A handle resolves through the registry, then through the artifacts
    /// left in its workspace. A remote id resolves through the registry, or
    /// is adopted under a fresh handle. Terminal results are served from
    /// cache without contacting the scheduler.
    pub async fn get(&self, job: JobRef) -> Result<JobOutcome> {
        match job {
            JobRef::Handle(handle) => self.get_by_handle(handle).await,
            JobRef::Remote(id) => match self.registry.find_by_remote(id) {
                Some(record) => self.get_by_handle(record.handle).await,
                None => self.adopt(id).await,
            },
        }
    }

    async fn get_by_handle(&self, handle: JobHandle) -> Result<JobOutcome> {
        if let Some(record) = self.registry.get(handle) {
            if let Some(outcome) = record.cached_outcome() {
                return Ok(outcome);
            }
            let Some(_claim) = self.registry.try_begin(handle) else {
                debug!("Job {} is busy, reporting pending", handle);
                return Ok(JobOutcome::Pending);
            };
            let remote_id = record.remote_id.ok_or_else(|| {
                EngineError::InvalidInput(format!("Job {} has no scheduler id", handle))
            })?;
            let refreshed = self.refresh(handle, remote_id).await?;
            return Ok(refreshed.unwrap_or(JobOutcome::Pending));
        }

        if let Some(record) = self.workspace.reconstruct(handle) {
            info!("Recovered job {} from its workspace", handle);
            let outcome = record.cached_outcome().unwrap_or(JobOutcome::Pending);
            self.registry.insert(record);
            return Ok(outcome);
        }

        Err(EngineError::InvalidInput(format!("Unknown job {}", handle)))
    }

    /// Tracks a scheduler job this engine did not submit
    ///
    /// Concurrent adoptions of one scheduler id settle on a single handle;
    /// the losers report through the winner's record.
    async fn adopt(&self, remote_id: RemoteJobId) -> Result<JobOutcome> {
        let _ = self.session.require_token()?;

        let handle = JobHandle::new();
        let claim = self.registry.try_begin(handle);
        let owner = self
            .registry
            .insert_unless_tracked(JobRecord::sent(handle, remote_id));
        if owner.handle != handle {
            drop(claim);
            return self.get_by_handle(owner.handle).await;
        }

        let adopted = match self.workspace.create(handle) {
            Ok(_) => self.refresh(handle, remote_id).await,
            Err(e) => Err(e.into()),
        };
        drop(claim);

        match adopted {
            Ok(outcome) => {
                debug!("Adopted scheduler job {} as {}", remote_id, handle);
                Ok(outcome.unwrap_or(JobOutcome::Pending))
            }
            Err(e) => {
                self.registry.remove(handle);
                self.workspace.rollback(handle);
                Err(e)
            }
        }
    }

    /// Snapshot of one job record
    pub fn record(&self, job: JobRef) -> Option<JobRecord> {
        match job {
            JobRef::Handle(handle) => self.registry.get(handle),
            JobRef::Remote(id) => self.registry.find_by_remote(id),
        }
    }

    /// Snapshot of every tracked job
    pub fn records(&self) -> Vec<JobRecord> {
        self.registry.snapshot()
    }

    /// Lists scheduler jobs matching a query-string filter (e.g. `id=12`)
    pub async fn list_jobs(&self, filter: &str) -> Result<Vec<RemoteJob>> {
        let token = self.session.require_token()?;
        self.client
            .list_jobs(&token, filter)
            .await
            .map_err(|e| self.session.screen(e))
    }

    // =============================================================================
    // Cancellation
    // =============================================================================

    /// Asks the scheduler to kill a job and returns its message
    pub async fn cancel(&self, job: JobRef) -> Result<String> {
        let (handle, remote_id) = self.resolve_remote(job)?;
        let token = self.session.require_token()?;

        let message = self
            .client
            .kill(&token, remote_id)
            .await
            .map_err(|e| self.session.screen(e))?;

        if let Some(handle) = handle {
            self.registry.update(handle, |record| {
                if !record.state.is_terminal() {
                    record.cancel();
                }
            });
        }
        info!("Scheduler job {}: {}", remote_id, message);
        Ok(message)
    }

    /// Resolves a reference to its scheduler id, plus the handle if tracked
    pub(crate) fn resolve_remote(
        &self,
        job: JobRef,
    ) -> Result<(Option<JobHandle>, RemoteJobId)> {
        match job {
            JobRef::Handle(handle) => {
                let record = self
                    .registry
                    .get(handle)
                    .or_else(|| self.workspace.reconstruct(handle))
                    .ok_or_else(|| EngineError::InvalidInput(format!("Unknown job {}", handle)))?;
                match record.remote_id {
                    Some(id) => Ok((Some(handle), id)),
                    None if record.state == JobState::Uploading => Err(EngineError::InvalidInput(
                        format!("Job {} is still uploading", handle),
                    )),
                    None => Err(EngineError::InvalidInput(format!(
                        "Job {} has no scheduler id",
                        handle
                    ))),
                }
            }
            JobRef::Remote(id) => Ok((self.registry.find_by_remote(id).map(|r| r.handle), id)),
        }
    }
}
