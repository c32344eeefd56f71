use std::time::Duration;
use thiserror::Error;

/// Failure reported by a node group service implementation.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("api error: status={status} body={body}")]
    Api { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),
}

impl ServiceError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ServiceError::NotFound(_))
    }
}

#[derive(Debug, Error)]
pub enum AutoscalerError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{operation}: permission denied ({message})")]
    Authorization { operation: String, message: String },

    #[error("{operation}: not found ({message})")]
    NotFound { operation: String, message: String },

    #[error("{operation}: {message}")]
    Transient { operation: String, message: String },

    #[error(
        "node group {group}: target size {target} is outside bounds [{min}, {max}] (current={current})"
    )]
    BoundsExceeded {
        group: String,
        current: usize,
        target: i64,
        min: usize,
        max: usize,
    },

    #[error("node group {group}: invalid delta {delta}, {reason}")]
    InvalidArgument {
        group: String,
        delta: i64,
        reason: &'static str,
    },

    #[error("failed to scale node group {group} to {target}: {source}")]
    ScaleRequestFailed {
        group: String,
        target: usize,
        #[source]
        source: ServiceError,
    },

    #[error("node group {group} state check ({polls}) timed out")]
    ConvergenceTimeout { group: String, polls: u32 },
}

impl AutoscalerError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Map a remote failure into the taxonomy, tagging it with the attempted operation.
    pub fn from_service(operation: impl Into<String>, err: ServiceError) -> Self {
        let operation = operation.into();
        match err {
            ServiceError::NotFound(message) => Self::NotFound { operation, message },
            ServiceError::PermissionDenied(message) => Self::Authorization { operation, message },
            other => Self::Transient {
                operation,
                message: other.to_string(),
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}
