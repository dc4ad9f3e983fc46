//! Waiting for completion and refreshing job state

use std::time::Duration;
use tracing::{debug, info, warn};

use offload_core::artifact::{ERROR_FILE, RESULT_FILE};
use offload_core::{JobHandle, JobOutcome, JobRecord, JobState, RemoteJobId, RemoteStatus};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::scheduler::{Interrupt, Polled, WaitOutcome, poll_until};

impl Engine {
    /// Waits for a sent job to finish
    ///
    /// Polls immediately and then every `poll_interval` until `timeout` has
    /// elapsed. On timeout or interrupt the job is marked `Cancelled`, a
    /// best-effort kill is sent, and the handle is returned so the caller
    /// can query it later.
    pub async fn wait(
        &self,
        handle: JobHandle,
        timeout: Duration,
        interrupt: Option<&Interrupt>,
    ) -> Result<WaitOutcome> {
        let record = self
            .registry
            .get(handle)
            .ok_or_else(|| EngineError::InvalidInput(format!("Unknown job {}", handle)))?;
        if let Some(outcome) = record.cached_outcome().filter(|o| !o.is_pending()) {
            return Ok(WaitOutcome::Completed(outcome));
        }
        let remote_id = record.remote_id.ok_or_else(|| {
            EngineError::InvalidInput(format!("Job {} has not been sent yet", handle))
        })?;

        let _claim = self
            .registry
            .try_begin(handle)
            .ok_or(EngineError::Busy(handle))?;

        info!("Waiting for job {} (timeout {:?})", handle, timeout);
        let polled = poll_until(self.config.poll_interval, timeout, interrupt, move || {
            self.refresh(handle, remote_id)
        })
        .await?;

        match polled {
            Polled::Ready(outcome) => Ok(WaitOutcome::Completed(outcome)),
            Polled::TimedOut => {
                warn!("Timeout. Job {} will be cancelled", handle);
                self.abandon(handle, remote_id).await;
                Ok(WaitOutcome::TimedOut(handle))
            }
            Polled::Interrupted => {
                warn!("Interrupted. Job {} will be cancelled", handle);
                self.abandon(handle, remote_id).await;
                Ok(WaitOutcome::Interrupted(handle))
            }
        }
    }

    /// Queries the scheduler once and caches a terminal result
    ///
    /// Returns `None` while the job is queued or running. On `Done` or
    /// `Exit` the result and error artifacts are downloaded into the job
    /// workspace and the record becomes terminal. A record cancelled on
    /// this side stays cancelled whatever the scheduler reports.
    pub(crate) async fn refresh(
        &self,
        handle: JobHandle,
        remote_id: RemoteJobId,
    ) -> Result<Option<JobOutcome>> {
        if self.is_cancelled(handle) {
            return Ok(Some(JobOutcome::Cancelled));
        }

        let token = self.session.require_token()?;
        let status = self
            .client
            .job_status(&token, remote_id)
            .await
            .map_err(|e| self.session.screen(e))?;

        if !status.is_terminal() {
            debug!("Job {} is {}", handle, status);
            return Ok(None);
        }

        let dir = self.workspace.job_dir(handle);
        std::fs::create_dir_all(&dir)?;
        let artifacts = [RESULT_FILE.to_string(), ERROR_FILE.to_string()];
        self.client
            .download(
                &token,
                remote_id,
                &artifacts,
                &dir,
                self.client.request_timeout(),
            )
            .await
            .map_err(|e| self.session.screen(e))?;

        let found = self.workspace.read_artifacts(handle)?;
        let record = match status {
            RemoteStatus::Done => {
                JobRecord::done(handle, Some(remote_id), found.result.unwrap_or_default())
            }
            _ => JobRecord::exit(handle, Some(remote_id), found.error.unwrap_or_default()),
        };
        let fetched = record.cached_outcome();
        let settled = self.registry.update(handle, |current| {
            if current.state != JobState::Cancelled {
                *current = record;
            }
        });

        match settled {
            Some(current) if current.state == JobState::Cancelled => {
                debug!("Job {} was cancelled, ignoring scheduler status {}", handle, status);
                Ok(Some(JobOutcome::Cancelled))
            }
            Some(current) => {
                info!("Job {} finished: {}", handle, status);
                Ok(current.cached_outcome())
            }
            None => Ok(fetched),
        }
    }

    fn is_cancelled(&self, handle: JobHandle) -> bool {
        self.registry
            .get(handle)
            .is_some_and(|record| record.state == JobState::Cancelled)
    }

    /// Marks a job cancelled and asks the scheduler to kill it
    async fn abandon(&self, handle: JobHandle, remote_id: RemoteJobId) {
        self.registry.update(handle, |record| record.cancel());

        let token = match self.session.require_token() {
            Ok(token) => token,
            Err(e) => {
                warn!("Cannot kill scheduler job {}: {}", remote_id, e);
                return;
            }
        };
        match self.client.kill(&token, remote_id).await {
            Ok(message) => info!("Scheduler job {}: {}", remote_id, message),
            Err(e) => {
                let err = self.session.screen(e);
                warn!("Failed to kill scheduler job {}: {}", remote_id, err);
            }
        }
    }
}
