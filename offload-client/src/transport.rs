//! HTTP transport
//!
//! The client speaks to the scheduler through the [`Transport`] trait so the
//! wire layer can be swapped (tests, proxies, alternative TLS stacks). The
//! default [`HttpTransport`] is backed by reqwest.

use async_trait::async_trait;
use reqwest::{Certificate, Client};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use offload_core::artifact::CA_BUNDLE_FILE;

/// Transport-level failures
#[derive(Debug, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout and the like
    #[error("{0}")]
    Unreachable(String),

    /// TLS was selected but the CA bundle file does not exist
    #[error("CA bundle missing: {}", .0.display())]
    MissingCaBundle(PathBuf),

    /// The CA bundle could not be read or parsed
    #[error("Invalid CA bundle: {0}")]
    InvalidCaBundle(String),
}

/// HTTP method used by the scheduler API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// An outbound request
#[derive(Debug, Clone)]
pub struct WireRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// `None` waits indefinitely
    pub timeout: Option<Duration>,
}

impl WireRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            body: Vec::new(),
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self {
            method: Method::Post,
            ..Self::get(url)
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether the request goes over TLS
    pub fn is_tls(&self) -> bool {
        self.url.to_ascii_lowercase().starts_with("https://")
    }
}

/// Raw response: status code plus body bytes
#[derive(Debug, Clone)]
pub struct WireResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Pluggable transport used by [`crate::SchedulerClient`]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Sends the request and returns the status and body
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

/// reqwest-backed transport
///
/// Plain HTTP requests share one client. The TLS client is built on first
/// use from `cacert.pem` in the workspace root, which must exist.
pub struct HttpTransport {
    plain: Client,
    ca_bundle: PathBuf,
    tls: Mutex<Option<Client>>,
}

impl HttpTransport {
    /// Creates a transport that looks for its CA bundle under `workspace_root`
    pub fn new(workspace_root: &Path) -> Self {
        Self {
            plain: Client::new(),
            ca_bundle: workspace_root.join(CA_BUNDLE_FILE),
            tls: Mutex::new(None),
        }
    }

    /// Path of the CA bundle required for TLS
    pub fn ca_bundle(&self) -> &Path {
        &self.ca_bundle
    }

    fn client_for(&self, request: &WireRequest) -> Result<Client, TransportError> {
        if !request.is_tls() {
            return Ok(self.plain.clone());
        }

        let mut tls = self
            .tls
            .lock()
            .map_err(|_| TransportError::InvalidCaBundle("TLS client lock poisoned".to_string()))?;
        if let Some(client) = tls.as_ref() {
            return Ok(client.clone());
        }

        if !self.ca_bundle.is_file() {
            return Err(TransportError::MissingCaBundle(self.ca_bundle.clone()));
        }
        let pem = std::fs::read(&self.ca_bundle)
            .map_err(|e| TransportError::InvalidCaBundle(e.to_string()))?;
        let certificate =
            Certificate::from_pem(&pem).map_err(|e| TransportError::InvalidCaBundle(e.to_string()))?;
        let client = Client::builder()
            .add_root_certificate(certificate)
            .build()
            .map_err(|e| TransportError::InvalidCaBundle(e.to_string()))?;

        debug!("Built TLS client from {}", self.ca_bundle.display());
        *tls = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let client = self.client_for(&request)?;

        let mut builder = match request.method {
            Method::Get => client.get(&request.url),
            Method::Post => client.post(&request.url),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() {
            builder = builder.body(request.body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Unreachable(e.to_string()))?;

        Ok(WireResponse {
            status,
            body: body.to_vec(),
        })
    }
}
