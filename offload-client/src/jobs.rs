//! Job endpoints: submission, listing, operations and file retrieval

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use offload_core::{RemoteJobId, RemoteStatus, SessionToken};

use crate::codec::{DecodeError, SubmitForm, decode_download, write_parts, xml};
use crate::error::{ClientError, Result};
use crate::transport::{WireRequest, WireResponse};
use crate::{ACCEPT_MULTIPLE, ACCEPT_SUBMIT, ACCEPT_XML, SchedulerClient};

/// A job as listed by the scheduler
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteJob {
    pub id: RemoteJobId,
    pub name: Option<String>,
    pub status: RemoteStatus,
}

impl SchedulerClient {
    // =============================================================================
    // Job Lifecycle
    // =============================================================================

    /// Submit an application and return the scheduler's job id
    ///
    /// # Arguments
    /// * `token` - The session to submit under
    /// * `form` - Parameters and files of the submission
    /// * `timeout` - Request timeout; `None` for long asynchronous uploads
    pub async fn submit(
        &self,
        token: &SessionToken,
        form: &SubmitForm,
        timeout: Option<Duration>,
    ) -> Result<RemoteJobId> {
        let encoding = form.clone();
        let body = tokio::task::spawn_blocking(move || encoding.encode())
            .await
            .map_err(|e| ClientError::Io(std::io::Error::other(e)))??;

        let url = Self::endpoint(&token.server_url, "submitapp");
        let request = WireRequest::post(url)
            .header("Content-Type", SubmitForm::content_type())
            .header("Accept", ACCEPT_SUBMIT)
            .header("Cookie", token.cookie())
            .header("Content-Length", body.len().to_string())
            .header("Accept-Language", "en-us")
            .body(body)
            .timeout(timeout);
        let response = self.send(request).await?;
        let text = Self::handle_xml("submit", &response)?;

        let id = xml::field(&text, "id")
            .and_then(|id| id.parse::<RemoteJobId>().ok())
            .ok_or_else(|| ClientError::action_failed("submit", "No job id in response"))?;

        debug!("Scheduler accepted job {}", id);
        Ok(id)
    }

    /// List jobs matching a query-string filter (e.g. `id=12`, or empty for all)
    pub async fn list_jobs(&self, token: &SessionToken, filter: &str) -> Result<Vec<RemoteJob>> {
        let url = Self::endpoint(&token.server_url, &format!("jobs?{}", filter));
        let request = WireRequest::get(url)
            .header("Content-Type", "application/xml")
            .header("Cookie", token.cookie())
            .header("Accept", ACCEPT_MULTIPLE)
            .header("Accept-Language", "en-us")
            .timeout(self.request_timeout());
        let response = self.send(request).await?;
        let text = Self::handle_xml("list jobs", &response)?;

        if let Some(note) = xml::field(&text, "note") {
            return Err(ClientError::from_remote_message("list jobs", note));
        }

        let jobs = xml::elements(&text, "Job")
            .into_iter()
            .filter_map(|job| {
                let id = xml::field(job, "id")?.parse::<RemoteJobId>().ok()?;
                Some(RemoteJob {
                    id,
                    name: xml::field(job, "name"),
                    status: RemoteStatus::parse(&xml::field(job, "status").unwrap_or_default()),
                })
            })
            .collect();

        Ok(jobs)
    }

    /// Query the status of a single job
    pub async fn job_status(&self, token: &SessionToken, id: RemoteJobId) -> Result<RemoteStatus> {
        let jobs = self.list_jobs(token, &format!("id={}", id)).await?;
        jobs.into_iter()
            .find(|job| job.id == id)
            .map(|job| job.status)
            .ok_or_else(|| ClientError::action_failed("query", format!("Job {} not found", id)))
    }

    /// Run a job operation (e.g. `kill`) and return the scheduler's message
    pub async fn job_operation(
        &self,
        token: &SessionToken,
        action: &str,
        id: RemoteJobId,
    ) -> Result<String> {
        let url = Self::endpoint(&token.server_url, &format!("jobOperation/{}/{}", action, id));
        let request = WireRequest::get(url)
            .header("Content-Type", "text/plain")
            .header("Cookie", token.cookie())
            .header("Accept", ACCEPT_XML)
            .header("Accept-Language", "en-us")
            .timeout(self.request_timeout());
        let response = self.send(request).await?;
        let text = Self::handle_xml(action, &response)?;

        xml::field(&text, "actionMsg")
            .ok_or_else(|| ClientError::action_failed(action, format!("Failed to {} the task", action)))
    }

    /// Ask the scheduler to terminate a job
    pub async fn kill(&self, token: &SessionToken, id: RemoteJobId) -> Result<String> {
        self.job_operation(token, "kill", id).await
    }

    // =============================================================================
    // File Retrieval
    // =============================================================================

    /// Download files from a job's working directory into `destination`
    ///
    /// # Arguments
    /// * `files` - Names relative to the job's working directory
    /// * `destination` - Existing local directory to write into
    /// * `timeout` - Request timeout; `None` for long asynchronous downloads
    ///
    /// # Returns
    /// The written paths, in the order the scheduler returned the files
    pub async fn download(
        &self,
        token: &SessionToken,
        id: RemoteJobId,
        files: &[String],
        destination: &Path,
        timeout: Option<Duration>,
    ) -> Result<Vec<PathBuf>> {
        let listing = files.join(",");
        let url = Self::endpoint(&token.server_url, &format!("file/{}", id));
        let request = WireRequest::get(url)
            .header("Content-Type", "text/plain")
            .header("Cookie", token.cookie())
            .header("Accept", ACCEPT_MULTIPLE)
            .header("Accept-Language", "en-us")
            .body(listing.clone())
            .timeout(timeout);
        let response = self.send(request).await?;

        Self::check_download(&listing, &response)?;

        let parts = decode_download(&response.body)?;
        let written = write_parts(destination, &parts)?;
        debug!(
            "Downloaded {} file(s) of job {} to {}",
            written.len(),
            id,
            destination.display()
        );
        Ok(written)
    }

    /// Classifies a file retrieval response before its body is decoded
    ///
    /// Any status other than 200 is a failed action. A 200 body without a
    /// single `Content-ID:` section is malformed.
    pub(crate) fn check_download(listing: &str, response: &WireResponse) -> Result<()> {
        let remote_message = || {
            std::str::from_utf8(&response.body)
                .ok()
                .and_then(|text| xml::field(text, "errMsg"))
        };

        if !response.is_ok() {
            if let Some(message) = remote_message() {
                return Err(ClientError::from_remote_message("download", message));
            }
            let message = match response.status {
                404 => format!("The specified file does not exist: {}", listing),
                403 => format!("Permission denied: {}", listing),
                status => format!("Failed to download the file: {} (status {})", listing, status),
            };
            return Err(ClientError::action_failed("download", message));
        }

        let has_files = response
            .body
            .windows(b"Content-ID:".len())
            .any(|window| window == b"Content-ID:");
        if !has_files {
            if let Some(message) = remote_message() {
                return Err(ClientError::from_remote_message("download", message));
            }
            return Err(DecodeError::NoFiles.into());
        }
        Ok(())
    }
}
