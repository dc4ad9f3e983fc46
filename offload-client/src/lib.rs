//! Offload scheduler client
//!
//! A typed client for the batch scheduler's `webservice/pacclient` HTTP API.
//!
//! This crate provides:
//! - [`SchedulerClient`]: logon/logout, application submission, job listing,
//!   job operations and file retrieval
//! - [`transport`]: the pluggable HTTP transport and its reqwest implementation
//! - [`codec`]: the multipart submission/retrieval wire format and XML fields
//! - [`session`]: the persisted session token
//!
//! # Example
//!
//! ```no_run
//! use offload_client::{SchedulerClient, SessionStore};
//! use offload_core::Credentials;
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let workspace = Path::new("/tmp/offload");
//!     let client = SchedulerClient::http(workspace);
//!     let store = SessionStore::new(workspace);
//!
//!     let token = client
//!         .logon(&Credentials::new("alice", "secret", "scheduler.local", 8080))
//!         .await?;
//!     store.save(&token)?;
//!
//!     for job in client.list_jobs(&token, "").await? {
//!         println!("{} {}", job.id, job.status);
//!     }
//!     Ok(())
//! }
//! ```

mod auth;
pub mod codec;
pub mod error;
mod jobs;
pub mod session;
pub mod transport;

// Re-export commonly used types
pub use codec::{FileEntry, SubmitForm, UploadMode};
pub use error::{ClientError, Result, SESSION_LOGOUT};
pub use jobs::RemoteJob;
pub use session::SessionStore;
pub use transport::{HttpTransport, Transport, WireRequest, WireResponse};

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Path of the web service under the scheduler's base URL
pub const SERVICE_PATH: &str = "webservice/pacclient/";

/// `Accept` value for job operations
pub const ACCEPT_XML: &str = "application/xml";

/// `Accept` value for submissions
pub const ACCEPT_SUBMIT: &str = "text/xml,application/xml;";

/// `Accept` value for file retrieval and the session calls
pub const ACCEPT_MULTIPLE: &str = "text/plain,application/xml,text/xml,multipart/mixed";

/// Timeout applied to control calls unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Client for the scheduler web service
///
/// Every authenticated call takes the [`offload_core::SessionToken`] to use;
/// the token carries the server URL, so one client can follow a session
/// across re-logons to different servers.
#[derive(Clone)]
pub struct SchedulerClient {
    /// Transport used for every request
    transport: Arc<dyn Transport>,
    /// Timeout for control calls; `None` waits indefinitely
    request_timeout: Option<Duration>,
}

impl std::fmt::Debug for SchedulerClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerClient")
            .field("request_timeout", &self.request_timeout)
            .finish_non_exhaustive()
    }
}

impl SchedulerClient {
    /// Create a client over a custom transport
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            request_timeout: Some(DEFAULT_REQUEST_TIMEOUT),
        }
    }

    /// Create a client over the reqwest transport
    ///
    /// The CA bundle for TLS sessions is looked up under `workspace_root`.
    pub fn http(workspace_root: &Path) -> Self {
        Self::new(Arc::new(HttpTransport::new(workspace_root)))
    }

    /// Override the control-call timeout
    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Timeout applied to control calls
    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout
    }

    // =============================================================================
    // Request Helpers
    // =============================================================================

    /// Build the URL of a web service endpoint under `server_url`
    pub(crate) fn endpoint(server_url: &str, path: &str) -> String {
        let base = if server_url.ends_with('/') {
            server_url.to_string()
        } else {
            format!("{}/", server_url)
        };
        format!("{}{}{}", base, SERVICE_PATH, path)
    }

    /// Send a request through the transport
    pub(crate) async fn send(&self, request: WireRequest) -> Result<WireResponse> {
        let url = request.url.clone();
        let response = self.transport.execute(request).await.map_err(|e| {
            tracing::debug!("Request to {} failed: {}", url, e);
            ClientError::from(e)
        })?;
        Ok(response)
    }

    // =============================================================================
    // Response Handlers
    // =============================================================================

    /// Handle a control-call response and return its XML text
    ///
    /// Non-200 statuses become a generic failure of `action`; an `errMsg`
    /// payload is classified so the logout marker is recognised.
    pub(crate) fn handle_xml(action: &str, response: &WireResponse) -> Result<String> {
        if !response.is_ok() {
            return Err(ClientError::action_failed(
                action,
                format!("Failed to {} (status {})", action, response.status),
            ));
        }

        let text = std::str::from_utf8(&response.body).map_err(|e| {
            ClientError::action_failed(action, format!("Failed to decode content: {}", e))
        })?;

        if let Some(message) = codec::xml::field(text, "errMsg") {
            return Err(ClientError::from_remote_message(action, message));
        }

        Ok(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok(body: &str) -> WireResponse {
        WireResponse {
            status: 200,
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn test_endpoint_joins_service_path() {
        assert_eq!(
            SchedulerClient::endpoint("http://h:8080/platform/", "jobs?id=1"),
            "http://h:8080/platform/webservice/pacclient/jobs?id=1"
        );
        assert_eq!(
            SchedulerClient::endpoint("http://h:8080/platform", "logout/"),
            "http://h:8080/platform/webservice/pacclient/logout/"
        );
    }

    #[test]
    fn test_handle_xml_classifies_errors() {
        let err = SchedulerClient::handle_xml(
            "kill",
            &ok("<x><errMsg>Your current login session was logout</errMsg></x>"),
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::SessionExpired(_)));

        let err = SchedulerClient::handle_xml(
            "kill",
            &WireResponse {
                status: 500,
                body: Vec::new(),
            },
        )
        .unwrap_err();
        assert!(matches!(err, ClientError::RemoteActionFailed { .. }));

        assert!(SchedulerClient::handle_xml("kill", &ok("<actionMsg>ok</actionMsg>")).is_ok());
    }

    #[test]
    fn test_client_timeout_override() {
        let dir = tempfile::tempdir().unwrap();
        let client = SchedulerClient::http(dir.path());
        assert_eq!(client.request_timeout(), Some(DEFAULT_REQUEST_TIMEOUT));
        assert_eq!(client.with_request_timeout(None).request_timeout(), None);
    }
}
