//! Engine error types

use std::io;
use thiserror::Error;

use offload_client::ClientError;
use offload_client::codec::{DecodeError, EncodeError};
use offload_core::{InvalidJobRef, JobHandle};

use crate::packager::PackagingError;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by the lifecycle engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// No session is active
    #[error("Please logon before using this function")]
    NotAuthenticated,

    /// Bad path, bad size, bad job id or unknown job
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The packager could not produce an artifact
    #[error(transparent)]
    Packaging(#[from] PackagingError),

    /// An upload file could not be read while encoding
    #[error(transparent)]
    Encode(EncodeError),

    /// The scheduler could not be reached
    #[error("Cannot connect to the server. {0}")]
    Unreachable(String),

    /// The scheduler ended the session
    #[error("{0}")]
    SessionExpired(String),

    /// The persisted token disappeared while the session was active
    #[error("The session token was deleted, please logon again")]
    TokenMissing,

    /// The scheduler refused or failed an action
    #[error("{action} failed: {message}")]
    RemoteActionFailed { action: String, message: String },

    /// A file retrieval body could not be decoded
    #[error(transparent)]
    Decode(DecodeError),

    /// The handle already has an operation in flight
    #[error("Job {0} already has an operation in progress")]
    Busy(JobHandle),

    /// The worker pool no longer accepts work
    #[error("The worker pool has been shut down")]
    PoolClosed,

    /// Local filesystem failure in the workspace
    #[error("Workspace I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid or incomplete local configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EngineError {
    /// Check if this error ends the active session
    pub fn is_session_loss(&self) -> bool {
        matches!(
            self,
            Self::SessionExpired(_) | Self::Unreachable(_) | Self::TokenMissing
        )
    }

    /// Check if this error was raised before any remote call
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::NotAuthenticated
                | Self::InvalidInput(_)
                | Self::Packaging(_)
                | Self::Busy(_)
                | Self::PoolClosed
                | Self::Config(_)
        )
    }
}

impl From<ClientError> for EngineError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unreachable(message) => Self::Unreachable(message),
            ClientError::SessionExpired(message) => Self::SessionExpired(message),
            ClientError::MissingCaBundle(_) | ClientError::InvalidCaBundle(_) => {
                Self::Config(err.to_string())
            }
            ClientError::Rejected(message) => Self::RemoteActionFailed {
                action: "logon".to_string(),
                message,
            },
            ClientError::RemoteActionFailed { action, message } => {
                Self::RemoteActionFailed { action, message }
            }
            ClientError::Encode(e) => Self::Encode(e),
            ClientError::Decode(e) => Self::Decode(e),
            ClientError::Io(e) => Self::Io(e),
        }
    }
}

impl From<InvalidJobRef> for EngineError {
    fn from(err: InvalidJobRef) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Errors raised by session operations
#[derive(Debug, Error)]
pub enum AuthError {
    /// Bad credentials, or the server did not issue a token
    #[error("Logon rejected: {0}")]
    Rejected(String),

    /// The server could not be reached or TLS could not be set up
    #[error("Cannot connect to the server. {0}")]
    Unreachable(String),

    /// The token could not be written to the workspace
    #[error("Failed to save the session token: {0}")]
    PersistFailure(#[source] io::Error),
}

impl From<ClientError> for AuthError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Rejected(message) => Self::Rejected(message),
            ClientError::Unreachable(message) => Self::Unreachable(message),
            ClientError::MissingCaBundle(_) | ClientError::InvalidCaBundle(_) => {
                Self::Unreachable(err.to_string())
            }
            other => Self::Rejected(other.to_string()),
        }
    }
}
