use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Remote request timed out after {0} ms")]
    Timeout(u64),

    #[error("Rate limit exceeded, retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Remote resource not found: {0}")]
    NotFound(String),
}

impl BridgeError {
    /// Whether retrying the same request could reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BridgeError::Timeout(_) | BridgeError::RateLimited { .. } | BridgeError::Network(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
