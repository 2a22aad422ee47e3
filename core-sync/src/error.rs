use bridge_traits::BridgeError;
use core_library::LibraryError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Coarse classification of a failure, used by callers to decide whether to
/// retry, fix their input, or report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Bad input; retrying the same call cannot succeed
    Validation,
    /// The call conflicts with current state (duplicate sync, closed conflict)
    Conflict,
    /// Network, timeout or rate limit talking to the remote catalog
    TransientRemote,
    /// Repository failure
    Persistence,
    /// Anything else, including non-transient remote failures
    Internal,
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Sync already in progress for user {user_id}")]
    SyncInProgress { user_id: String },

    #[error("No active sync for user {user_id}")]
    NoActiveSync { user_id: String },

    #[error("No sync job found for user {user_id}")]
    JobNotFound { user_id: String },

    #[error("Conflict {conflict_id} not found")]
    ConflictNotFound { conflict_id: String },

    #[error("Conflict {conflict_id} is already {status}")]
    AlreadyResolved { conflict_id: String, status: String },

    #[error("Invalid sync type: {0}")]
    InvalidSyncType(String),

    #[error("Invalid resolution strategy: {0}")]
    InvalidStrategy(String),

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Remote catalog error: {0}")]
    Remote(#[from] BridgeError),

    #[error("Sync timeout after {0} seconds")]
    Timeout(u64),

    #[error("Persistence error: {0}")]
    Library(#[from] LibraryError),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::InvalidSyncType(_)
            | SyncError::InvalidStrategy(_)
            | SyncError::InvalidInput { .. } => ErrorKind::Validation,
            SyncError::SyncInProgress { .. }
            | SyncError::NoActiveSync { .. }
            | SyncError::JobNotFound { .. }
            | SyncError::ConflictNotFound { .. }
            | SyncError::AlreadyResolved { .. } => ErrorKind::Conflict,
            SyncError::Remote(err) if err.is_transient() => ErrorKind::TransientRemote,
            SyncError::Timeout(_) => ErrorKind::TransientRemote,
            SyncError::Library(_) => ErrorKind::Persistence,
            SyncError::Remote(_) | SyncError::InvalidStateTransition { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether retrying the failed sync could reasonably succeed.
    pub fn is_recoverable(&self) -> bool {
        self.kind() == ErrorKind::TransientRemote
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
