//! Job submission

use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};

use offload_client::{FileEntry, SubmitForm};
use offload_core::artifact::{ERROR_FILE, STDOUT_FILE};
use offload_core::{JobHandle, JobRecord, JobState, SessionToken};

use crate::engine::Engine;
use crate::error::{EngineError, Result};
use crate::packager::{PackagedArtifact, WorkUnit};
use crate::scheduler::{Interrupt, WaitOutcome};

/// How [`Engine::submit`] returns
#[derive(Debug, Clone)]
pub enum SubmitMode {
    /// Return the handle once the job is sent
    ///
    /// With `async_upload` and dependency files, the upload itself runs on
    /// the worker pool and the handle is returned while still `Uploading`.
    Detached { async_upload: bool },
    /// Wait for the job to finish, up to `timeout`
    Blocking {
        timeout: Duration,
        interrupt: Option<Interrupt>,
    },
}

impl SubmitMode {
    pub fn detached() -> Self {
        SubmitMode::Detached {
            async_upload: false,
        }
    }

    pub fn background_upload() -> Self {
        SubmitMode::Detached { async_upload: true }
    }

    pub fn blocking(timeout: Duration) -> Self {
        SubmitMode::Blocking {
            timeout,
            interrupt: None,
        }
    }

    pub fn blocking_with_interrupt(timeout: Duration, interrupt: Interrupt) -> Self {
        SubmitMode::Blocking {
            timeout,
            interrupt: Some(interrupt),
        }
    }

    fn async_upload(&self) -> bool {
        matches!(self, SubmitMode::Detached { async_upload: true })
    }
}

/// A submitted job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub handle: JobHandle,
    /// How the wait ended, for blocking submissions
    pub waited: Option<WaitOutcome>,
}

impl Engine {
    // =============================================================================
    // Submission
    // =============================================================================

    /// Packages and submits a unit of work
    ///
    /// # Arguments
    /// * `unit` - The work to run remotely
    /// * `files` - Dependency files uploaded next to the artifact
    /// * `mode` - Detached or blocking
    ///
    /// # Errors
    /// - `NotAuthenticated` without a session
    /// - `InvalidInput` for missing, unreadable or oversized dependency files
    /// - `Packaging` if the artifact cannot be produced
    /// - screened remote errors if the scheduler refuses the job
    ///
    /// A failed submission never leaves its workspace behind.
    pub async fn submit(
        &self,
        unit: &WorkUnit,
        files: &[PathBuf],
        mode: SubmitMode,
    ) -> Result<Submission> {
        let token = self.session.require_token()?;
        let dependencies = self
            .workspace
            .validate_dependencies(files, self.config.max_upload_bytes)?;

        let handle = JobHandle::new();
        let dir = self.workspace.create(handle)?;

        let artifact = match self.packager.package(unit, &dir) {
            Ok(artifact) => artifact,
            Err(e) => {
                self.workspace.rollback(handle);
                return Err(e.into());
            }
        };
        let form = self.build_form(&artifact, &dependencies);

        if mode.async_upload() && !dependencies.is_empty() {
            return self.submit_in_background(handle, token, form);
        }

        let timeout = if mode.async_upload() {
            None
        } else {
            self.client.request_timeout()
        };
        let remote_id = match self.client.submit(&token, &form, timeout).await {
            Ok(id) => id,
            Err(e) => {
                self.workspace.rollback(handle);
                let err = self.session.screen(e);
                error!("Failed to submit job: {}", err);
                return Err(err);
            }
        };

        self.registry.insert(JobRecord::sent(handle, remote_id));
        info!("Job {} sent as scheduler job {}", handle, remote_id);

        match mode {
            SubmitMode::Blocking { timeout, interrupt } => {
                let waited = self.wait(handle, timeout, interrupt.as_ref()).await?;
                Ok(Submission {
                    handle,
                    waited: Some(waited),
                })
            }
            SubmitMode::Detached { .. } => Ok(Submission {
                handle,
                waited: None,
            }),
        }
    }

    /// Hands the upload to the worker pool and returns at once
    fn submit_in_background(
        &self,
        handle: JobHandle,
        token: SessionToken,
        form: SubmitForm,
    ) -> Result<Submission> {
        let claim = self
            .registry
            .try_begin(handle)
            .ok_or(EngineError::Busy(handle))?;
        self.registry.insert(JobRecord::uploading(handle));

        let engine = self.clone();
        let spawned = self.pool.spawn("upload", async move {
            let _claim = claim;
            engine.finish_upload(handle, token, form).await;
        });

        if let Err(e) = spawned {
            self.registry.remove(handle);
            self.workspace.rollback(handle);
            return Err(e);
        }

        info!("Uploading job {} in the background", handle);
        Ok(Submission {
            handle,
            waited: None,
        })
    }

    /// Completion of a background upload
    async fn finish_upload(&self, handle: JobHandle, token: SessionToken, form: SubmitForm) {
        match self.client.submit(&token, &form, None).await {
            Ok(remote_id) => {
                self.registry.update(handle, |record| {
                    record.remote_id = Some(remote_id);
                    record.state = JobState::Sent;
                    record.updated_at = chrono::Utc::now();
                });
                info!("Job {} sent as scheduler job {}", handle, remote_id);
            }
            Err(e) => {
                let err = self.session.screen(e);
                self.registry.remove(handle);
                self.workspace.rollback(handle);
                error!("Background upload of job {} failed: {}", handle, err);
            }
        }
    }

    /// Builds the submission form of a packaged job
    pub(crate) fn build_form(
        &self,
        artifact: &PackagedArtifact,
        dependencies: &[PathBuf],
    ) -> SubmitForm {
        let mut form = SubmitForm::new(self.config.app_name.as_str())
            .param("COMMANDTORUN", artifact.command.as_str())
            .param("ERROR_FILE", format!("./{}", ERROR_FILE))
            .param("OUTPUT_FILE", format!("./{}", STDOUT_FILE))
            .file("INPUT_FILE", FileEntry::upload(artifact.path.clone()));

        for (index, path) in dependencies.iter().enumerate() {
            form = form.file(format!("{}INPUT_FILE", index), FileEntry::upload(path.clone()));
        }
        form
    }
}
