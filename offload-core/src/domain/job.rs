//! Job domain types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Client-side identifier for a submitted unit of work
///
/// Generated before the scheduler assigns its own job id and used as the
/// name of the job's workspace directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(Uuid);

impl JobHandle {
    /// Allocates a fresh handle
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for JobHandle {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The scheduler's own job id
pub type RemoteJobId = u64;

/// Identifier accepted by lookups: either a local handle or a raw scheduler id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobRef {
    /// Handle returned by a submission
    Handle(JobHandle),
    /// Job id known to the scheduler, possibly submitted elsewhere
    Remote(RemoteJobId),
}

/// Error returned when a string is neither a handle nor a scheduler job id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidJobRef(pub String);

impl std::fmt::Display for InvalidJobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "'{}' is neither a job handle nor a scheduler job id",
            self.0
        )
    }
}

impl std::error::Error for InvalidJobRef {}

impl JobRef {
    /// Parse a caller-supplied identifier
    ///
    /// Integer-like input is a scheduler job id, a UUID is a handle. Anything
    /// else is rejected.
    pub fn parse(input: &str) -> Result<Self, InvalidJobRef> {
        let input = input.trim();
        if let Ok(id) = input.parse::<RemoteJobId>() {
            return Ok(JobRef::Remote(id));
        }
        Uuid::parse_str(input)
            .map(|uuid| JobRef::Handle(JobHandle(uuid)))
            .map_err(|_| InvalidJobRef(input.to_string()))
    }

    pub fn as_handle(&self) -> Option<JobHandle> {
        match self {
            JobRef::Handle(handle) => Some(*handle),
            JobRef::Remote(_) => None,
        }
    }

    pub fn as_remote(&self) -> Option<RemoteJobId> {
        match self {
            JobRef::Handle(_) => None,
            JobRef::Remote(id) => Some(*id),
        }
    }
}

impl std::fmt::Display for JobRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobRef::Handle(handle) => write!(f, "{}", handle),
            JobRef::Remote(id) => write!(f, "{}", id),
        }
    }
}

impl From<JobHandle> for JobRef {
    fn from(handle: JobHandle) -> Self {
        JobRef::Handle(handle)
    }
}

impl From<RemoteJobId> for JobRef {
    fn from(id: RemoteJobId) -> Self {
        JobRef::Remote(id)
    }
}

impl std::str::FromStr for JobRef {
    type Err = InvalidJobRef;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        JobRef::parse(s)
    }
}

/// Locally tracked job state
///
/// The scheduler's intermediate states (pending, running) are not stored:
/// they stay folded into `Sent` until a poll observes a terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    /// Dependency files are still being uploaded by the worker pool
    Uploading,
    /// Accepted by the scheduler
    Sent,
    Done,
    Exit,
    Cancelled,
}

impl JobState {
    /// Whether no further remote polling happens in this state
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done | JobState::Exit | JobState::Cancelled)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Uploading => write!(f, "Uploading"),
            JobState::Sent => write!(f, "Sent"),
            JobState::Done => write!(f, "Done"),
            JobState::Exit => write!(f, "Exit"),
            JobState::Cancelled => write!(f, "Cancelled"),
        }
    }
}

/// Job status as reported by the scheduler's `<status>` field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteStatus {
    Pending,
    Running,
    Done,
    Exit,
    Other(String),
}

impl RemoteStatus {
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "Done" | "DONE" => RemoteStatus::Done,
            "Exit" | "EXIT" => RemoteStatus::Exit,
            "Pending" | "PEND" | "PSUSP" => RemoteStatus::Pending,
            "Running" | "RUN" => RemoteStatus::Running,
            other => RemoteStatus::Other(other.to_string()),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RemoteStatus::Done | RemoteStatus::Exit)
    }
}

impl std::fmt::Display for RemoteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteStatus::Pending => write!(f, "Pending"),
            RemoteStatus::Running => write!(f, "Running"),
            RemoteStatus::Done => write!(f, "Done"),
            RemoteStatus::Exit => write!(f, "Exit"),
            RemoteStatus::Other(value) => write!(f, "{}", value),
        }
    }
}

/// Job metadata held by the registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub handle: JobHandle,
    pub remote_id: Option<RemoteJobId>,
    pub state: JobState,
    /// Decoded result artifact, present once `Done`
    pub output: Option<Vec<u8>>,
    /// Error artifact text, present once `Exit`
    pub error_message: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Record for a job whose dependency files are still uploading
    pub fn uploading(handle: JobHandle) -> Self {
        Self {
            handle,
            remote_id: None,
            state: JobState::Uploading,
            output: None,
            error_message: None,
            updated_at: Utc::now(),
        }
    }

    /// Record for a job accepted by the scheduler
    pub fn sent(handle: JobHandle, remote_id: RemoteJobId) -> Self {
        Self {
            remote_id: Some(remote_id),
            state: JobState::Sent,
            ..Self::uploading(handle)
        }
    }

    pub fn done(handle: JobHandle, remote_id: Option<RemoteJobId>, output: Vec<u8>) -> Self {
        Self {
            remote_id,
            state: JobState::Done,
            output: Some(output),
            ..Self::uploading(handle)
        }
    }

    pub fn exit(handle: JobHandle, remote_id: Option<RemoteJobId>, message: String) -> Self {
        Self {
            remote_id,
            state: JobState::Exit,
            error_message: Some(message),
            ..Self::uploading(handle)
        }
    }

    /// Moves the record to `Cancelled`, keeping whatever was cached
    pub fn cancel(&mut self) {
        self.state = JobState::Cancelled;
        self.updated_at = Utc::now();
    }

    /// What a lookup of this record returns without contacting the scheduler
    ///
    /// `None` means the record is `Sent` and needs a fresh status query.
    pub fn cached_outcome(&self) -> Option<JobOutcome> {
        match self.state {
            JobState::Done => Some(JobOutcome::Done(self.output.clone().unwrap_or_default())),
            JobState::Exit => Some(JobOutcome::Exit(
                self.error_message.clone().unwrap_or_default(),
            )),
            JobState::Cancelled => Some(JobOutcome::Cancelled),
            JobState::Uploading => Some(JobOutcome::Pending),
            JobState::Sent => None,
        }
    }
}

/// Result of looking up a job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobOutcome {
    /// Finished; carries the decoded result artifact
    Done(Vec<u8>),
    /// Failed; carries the error artifact text
    Exit(String),
    /// Uploading, queued or running
    Pending,
    /// Cancelled by this client after a timeout or interrupt
    Cancelled,
}

impl JobOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, JobOutcome::Pending)
    }

    /// Result artifact as UTF-8 text, when the job finished
    pub fn output_text(&self) -> Option<String> {
        match self {
            JobOutcome::Done(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
            _ => None,
        }
    }
}
