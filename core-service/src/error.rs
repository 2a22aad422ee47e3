use core_library::LibraryError;
use core_sync::{ErrorKind, SyncError};
use serde::Serialize;
use thiserror::Error;

/// Numeric error codes surfaced at the operation boundary
pub mod codes {
    pub const METHOD_NOT_FOUND: i32 = -32601;
    pub const INVALID_PARAMS: i32 = -32602;
    pub const INTERNAL: i32 = -32603;

    pub const SYNC_IN_PROGRESS: i32 = 1001;
    pub const NO_ACTIVE_SYNC: i32 = 1002;
    pub const CONFLICT_NOT_FOUND: i32 = 1003;
    pub const CONFLICT_ALREADY_RESOLVED: i32 = 1004;
    pub const JOB_NOT_FOUND: i32 = 1005;

    pub const REMOTE_CATALOG: i32 = 2001;
    pub const PERSISTENCE: i32 = 2002;
}

/// Structured error returned by every service operation
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("{message} (code {code})")]
pub struct ServiceError {
    pub code: i32,
    pub kind: ErrorKind,
    pub message: String,
}

impl ServiceError {
    pub fn new(code: i32, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            kind,
            message: message.into(),
        }
    }

    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            codes::METHOD_NOT_FOUND,
            ErrorKind::Validation,
            format!("Unknown method: {}", method),
        )
    }

    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(codes::INVALID_PARAMS, ErrorKind::Validation, message)
    }

    /// Missing or blank required parameter
    pub fn missing_param(name: &str) -> Self {
        Self::invalid_params(format!("Missing required parameter: {}", name))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(codes::INTERNAL, ErrorKind::Internal, message)
    }

    /// Whether retrying the same call later could succeed
    pub fn is_retryable(&self) -> bool {
        self.kind == ErrorKind::TransientRemote
    }
}

impl From<SyncError> for ServiceError {
    fn from(err: SyncError) -> Self {
        let kind = err.kind();
        let code = match &err {
            SyncError::SyncInProgress { .. } => codes::SYNC_IN_PROGRESS,
            SyncError::NoActiveSync { .. } => codes::NO_ACTIVE_SYNC,
            SyncError::ConflictNotFound { .. } => codes::CONFLICT_NOT_FOUND,
            SyncError::AlreadyResolved { .. } => codes::CONFLICT_ALREADY_RESOLVED,
            SyncError::JobNotFound { .. } => codes::JOB_NOT_FOUND,
            SyncError::Remote(_) | SyncError::Timeout(_) => codes::REMOTE_CATALOG,
            SyncError::Library(_) => codes::PERSISTENCE,
            SyncError::InvalidStateTransition { .. } => codes::INTERNAL,
            _ if kind == ErrorKind::Validation => codes::INVALID_PARAMS,
            _ => codes::INTERNAL,
        };
        Self::new(code, kind, err.to_string())
    }
}

impl From<LibraryError> for ServiceError {
    fn from(err: LibraryError) -> Self {
        Self::new(codes::PERSISTENCE, ErrorKind::Persistence, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::BridgeError;

    #[test]
    fn test_sync_error_codes() {
        let cases = [
            (
                SyncError::SyncInProgress {
                    user_id: "u1".to_string(),
                },
                codes::SYNC_IN_PROGRESS,
            ),
            (
                SyncError::NoActiveSync {
                    user_id: "u1".to_string(),
                },
                codes::NO_ACTIVE_SYNC,
            ),
            (
                SyncError::ConflictNotFound {
                    conflict_id: "c1".to_string(),
                },
                codes::CONFLICT_NOT_FOUND,
            ),
            (
                SyncError::JobNotFound {
                    user_id: "u1".to_string(),
                },
                codes::JOB_NOT_FOUND,
            ),
            (
                SyncError::InvalidSyncType("partial".to_string()),
                codes::INVALID_PARAMS,
            ),
            (
                SyncError::InvalidStrategy("newest".to_string()),
                codes::INVALID_PARAMS,
            ),
            (
                SyncError::Remote(BridgeError::Network("reset".to_string())),
                codes::REMOTE_CATALOG,
            ),
            (SyncError::Timeout(60), codes::REMOTE_CATALOG),
        ];

        for (err, code) in cases {
            let message = err.to_string();
            let service_error = ServiceError::from(err);
            assert_eq!(service_error.code, code, "{}", message);
            assert_eq!(service_error.message, message);
        }
    }

    #[test]
    fn test_transient_errors_are_retryable() {
        let err = ServiceError::from(SyncError::Remote(BridgeError::Timeout(500)));
        assert_eq!(err.kind, ErrorKind::TransientRemote);
        assert!(err.is_retryable());

        let err = ServiceError::from(SyncError::Remote(BridgeError::NotFound("u1".to_string())));
        assert_eq!(err.code, codes::REMOTE_CATALOG);
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_error_serializes_with_code_and_message() {
        let err = ServiceError::method_not_found("sync_everything");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], -32601);
        assert_eq!(json["kind"], "validation");
        assert_eq!(json["message"], "Unknown method: sync_everything");
    }
}
