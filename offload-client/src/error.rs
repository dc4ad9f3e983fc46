//! Error types for the scheduler client

use std::path::PathBuf;
use thiserror::Error;

use crate::codec::{DecodeError, EncodeError};
use crate::transport::TransportError;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Message the scheduler embeds when it has ended the session on its side
pub const SESSION_LOGOUT: &str = "Your current login session was logout";

/// Errors that can occur when talking to the scheduler
#[derive(Debug, Error)]
pub enum ClientError {
    /// The request never produced a response
    #[error("Cannot connect to the server. {0}")]
    Unreachable(String),

    /// TLS was selected but the CA bundle is absent
    #[error("The https certificate is missing: copy the scheduler's CA bundle to {}", .0.display())]
    MissingCaBundle(PathBuf),

    /// The CA bundle exists but could not be loaded
    #[error("Invalid CA bundle: {0}")]
    InvalidCaBundle(String),

    /// The scheduler reported that the session was ended server-side
    #[error("{0}")]
    SessionExpired(String),

    /// The scheduler refused the logon
    #[error("Logon rejected: {0}")]
    Rejected(String),

    /// Non-200 status, error payload or malformed XML on a control call
    #[error("{action} failed: {message}")]
    RemoteActionFailed {
        /// Name of the attempted action (e.g. "submit", "kill")
        action: String,
        /// Message from the scheduler, or a generic description
        message: String,
    },

    /// Building the submission body failed
    #[error(transparent)]
    Encode(#[from] EncodeError),

    /// The file retrieval body could not be decoded
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Writing downloaded artifacts failed
    #[error("Failed to write downloaded file: {0}")]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Create an action failure from an action name and message
    pub fn action_failed(action: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteActionFailed {
            action: action.into(),
            message: message.into(),
        }
    }

    /// Classify a message returned by the scheduler for a failed action
    ///
    /// Every error payload passes through here so that the logout marker is
    /// recognised the same way regardless of the call that produced it.
    pub fn from_remote_message(action: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        if message.contains(SESSION_LOGOUT) {
            Self::SessionExpired(message)
        } else {
            Self::action_failed(action, message)
        }
    }

    /// Check if this error means the session can no longer be used
    pub fn is_session_loss(&self) -> bool {
        matches!(self, Self::SessionExpired(_) | Self::Unreachable(_))
    }

    /// Check if this error is a configuration problem rather than a remote one
    pub fn is_config_error(&self) -> bool {
        matches!(self, Self::MissingCaBundle(_) | Self::InvalidCaBundle(_))
    }
}

impl From<TransportError> for ClientError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Unreachable(message) => Self::Unreachable(message),
            TransportError::MissingCaBundle(path) => Self::MissingCaBundle(path),
            TransportError::InvalidCaBundle(message) => Self::InvalidCaBundle(message),
        }
    }
}
