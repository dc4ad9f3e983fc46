//! Engine configuration
//!
//! Defines the workspace location, polling cadence, request timeouts,
//! the upload ceiling and the size of the background worker pool.

use std::path::PathBuf;
use std::time::Duration;

/// Default ceiling on the aggregate size of dependency files
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 536_870_912;

/// Directory created under the home directory when no workspace is given
pub const DEFAULT_WORKSPACE_DIR: &str = ".lsf_faas";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Root directory holding the token file and one directory per job
    pub workspace_root: PathBuf,

    /// How often a blocking wait polls the scheduler
    pub poll_interval: Duration,

    /// Timeout for control calls; `None` waits indefinitely
    pub request_timeout: Option<Duration>,

    /// Aggregate size limit for dependency files
    pub max_upload_bytes: u64,

    /// Size of the background worker pool
    pub worker_threads: usize,

    /// Scheduler application that runs submitted jobs
    pub app_name: String,
}

impl EngineConfig {
    /// Creates a new configuration with defaults
    pub fn new(workspace_root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            poll_interval: Duration::from_secs(5),
            request_timeout: Some(Duration::from_secs(5)),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            worker_threads: 5,
            app_name: "generic".to_string(),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - OFFLOAD_WORKSPACE (default: $HOME/.lsf_faas)
    /// - OFFLOAD_POLL_INTERVAL (seconds, default: 5)
    /// - OFFLOAD_REQUEST_TIMEOUT (seconds, 0 for none, default: 5)
    /// - OFFLOAD_MAX_UPLOAD_BYTES (default: 536870912)
    /// - OFFLOAD_WORKER_THREADS (default: 5)
    /// - OFFLOAD_APP_NAME (default: generic)
    pub fn from_env() -> anyhow::Result<Self> {
        let workspace_root = match std::env::var_os("OFFLOAD_WORKSPACE") {
            Some(path) => PathBuf::from(path),
            None => default_workspace()?,
        };
        let mut config = Self::new(workspace_root);

        if let Some(secs) = env_parse::<u64>("OFFLOAD_POLL_INTERVAL")? {
            config.poll_interval = Duration::from_secs(secs);
        }

        if let Some(secs) = env_parse::<u64>("OFFLOAD_REQUEST_TIMEOUT")? {
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(bytes) = env_parse::<u64>("OFFLOAD_MAX_UPLOAD_BYTES")? {
            config.max_upload_bytes = bytes;
        }

        if let Some(threads) = env_parse::<usize>("OFFLOAD_WORKER_THREADS")? {
            config.worker_threads = threads;
        }

        if let Ok(app_name) = std::env::var("OFFLOAD_APP_NAME") {
            config.app_name = app_name;
        }

        Ok(config)
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_max_upload_bytes(mut self, bytes: u64) -> Self {
        self.max_upload_bytes = bytes;
        self
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    pub fn with_app_name(mut self, app_name: impl Into<String>) -> Self {
        self.app_name = app_name.into();
        self
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workspace_root.as_os_str().is_empty() {
            anyhow::bail!("workspace_root cannot be empty");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.request_timeout.is_some_and(|t| t.is_zero()) {
            anyhow::bail!("request_timeout must be greater than 0 when set");
        }

        if self.max_upload_bytes == 0 {
            anyhow::bail!("max_upload_bytes must be greater than 0");
        }

        if self.worker_threads == 0 {
            anyhow::bail!("worker_threads must be greater than 0");
        }

        if self.app_name.trim().is_empty() {
            anyhow::bail!("app_name cannot be empty");
        }

        Ok(())
    }
}

/// `$HOME/.lsf_faas`
pub fn default_workspace() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| anyhow::anyhow!("HOME is not set and OFFLOAD_WORKSPACE is not given"))?;
    Ok(PathBuf::from(home).join(DEFAULT_WORKSPACE_DIR))
}

fn env_parse<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, value, e)),
        Err(_) => Ok(None),
    }
}
